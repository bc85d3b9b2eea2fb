//! Meilisearch index

use async_trait::async_trait;
use meilisearch_sdk::client::Client;
use meilisearch_sdk::settings::Settings;
use meilisearch_sdk::tasks::Task;
use shared::models::IndexDocument;

use super::{IndexError, SearchIndex};

pub const QUIZ_INDEX: &str = "quizzes";
const QUIZ_ID: &str = "id";

#[derive(Clone)]
pub struct MeiliIndex {
    client: Client,
}

impl MeiliIndex {
    pub async fn connect(url: &str, admin_key: &str) -> Result<Self, IndexError> {
        let client = Client::new(url, Some(admin_key))?;
        let index = Self { client };
        index.apply_settings().await?;
        tracing::info!("Connected to Meilisearch");
        Ok(index)
    }

    async fn apply_settings(&self) -> Result<(), IndexError> {
        let task = self
            .client
            .index(QUIZ_INDEX)
            .set_settings(&quiz_settings())
            .await?
            .wait_for_completion(&self.client, None, None)
            .await?;
        check_task(task)
    }
}

fn quiz_settings() -> Settings {
    Settings::new()
        .with_searchable_attributes(["title", "description", "tags"])
        .with_filterable_attributes(["owner_id", "tags"])
        .with_sortable_attributes(["updated_at", "question_count"])
}

fn check_task(task: Task) -> Result<(), IndexError> {
    if task.is_failure() {
        return Err(IndexError::TaskFailed(format!("{task:?}")));
    }
    Ok(())
}

impl From<meilisearch_sdk::errors::Error> for IndexError {
    fn from(err: meilisearch_sdk::errors::Error) -> Self {
        IndexError::Unavailable(err.to_string())
    }
}

#[async_trait]
impl SearchIndex for MeiliIndex {
    async fn upsert(&self, doc: &IndexDocument) -> Result<(), IndexError> {
        let task = self
            .client
            .index(QUIZ_INDEX)
            .add_or_update(std::slice::from_ref(doc), Some(QUIZ_ID))
            .await?
            .wait_for_completion(&self.client, None, None)
            .await?;
        check_task(task)
    }

    async fn remove(&self, quiz_id: i64) -> Result<(), IndexError> {
        let task = self
            .client
            .index(QUIZ_INDEX)
            .delete_document(quiz_id)
            .await?
            .wait_for_completion(&self.client, None, None)
            .await?;
        check_task(task)
    }
}
