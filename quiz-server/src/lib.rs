//! quiz-server: consistency core for the quiz backend
//!
//! Keeps three stores in step:
//! - PostgreSQL holds quizzes, ordered questions and ordered answers
//! - Redis caches user profile and quiz detail read models
//! - Meilisearch indexes quiz documents, updated by a retrying worker

pub mod api;
pub mod cache;
pub mod config;
pub mod db;
pub mod monitor;
pub mod principal;
pub mod search;
pub mod services;
pub mod state;

pub use principal::Principal;
pub use services::{ServiceError, ServiceResult, ServiceSettings, Services};
