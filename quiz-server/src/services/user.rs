//! User profile read model and account writes

use shared::error::ErrorCode;
use shared::models::{User, UserProfile, UserUpdate};
use validator::Validate;

use super::{ServiceContext, ServiceError, ServiceResult, run_detached};
use crate::cache::CacheKey;
use crate::principal::Principal;

#[derive(Clone)]
pub struct UserService {
    ctx: ServiceContext,
}

impl UserService {
    pub(crate) fn new(ctx: ServiceContext) -> Self {
        Self { ctx }
    }

    /// User with owned quizzes and result history, served from cache when present.
    pub async fn get_profile(&self, user_id: i64) -> ServiceResult<UserProfile> {
        let key = CacheKey::UserProfile(user_id);
        if let Some(profile) = self.ctx.cache.load::<UserProfile>(key).await {
            return Ok(profile);
        }

        let ticket = self.ctx.cache.begin_fill(key);
        let user = self
            .ctx
            .store
            .get_user(user_id)
            .await?
            .ok_or_else(|| ServiceError::not_found(ErrorCode::UserNotFound, vec![user_id]))?;
        let quizzes = self.ctx.store.list_quizzes_by_owner(user_id).await?;
        let results = self.ctx.store.list_results_by_user(user_id).await?;
        let profile = UserProfile {
            user,
            quizzes,
            results,
        };
        self.ctx.cache.fill(ticket, &profile).await;
        Ok(profile)
    }

    pub async fn update_profile(
        &self,
        principal: Principal,
        user_id: i64,
        data: UserUpdate,
    ) -> ServiceResult<User> {
        ensure_self(principal, user_id)?;
        data.validate()?;
        let ctx = self.ctx.clone();
        run_detached("update_user", async move {
            let user = ctx.store.update_user(user_id, &data).await?;
            ctx.cache.invalidate(CacheKey::UserProfile(user_id)).await;
            tracing::info!(user_id, "profile updated");
            Ok(user)
        })
        .await
    }

    /// Point the profile at an already-stored avatar.
    pub async fn set_avatar(
        &self,
        principal: Principal,
        user_id: i64,
        avatar: String,
    ) -> ServiceResult<User> {
        ensure_self(principal, user_id)?;
        if avatar.trim().is_empty() {
            return Err(ServiceError::validation(
                ErrorCode::RequiredField,
                "avatar must not be empty",
            ));
        }
        self.write_avatar(user_id, Some(avatar)).await
    }

    pub async fn clear_avatar(&self, principal: Principal, user_id: i64) -> ServiceResult<User> {
        ensure_self(principal, user_id)?;
        self.write_avatar(user_id, None).await
    }

    async fn write_avatar(&self, user_id: i64, avatar: Option<String>) -> ServiceResult<User> {
        let ctx = self.ctx.clone();
        run_detached("user_avatar", async move {
            let user = ctx.store.set_user_avatar(user_id, avatar.as_deref()).await?;
            ctx.cache.invalidate(CacheKey::UserProfile(user_id)).await;
            tracing::info!(user_id, has_avatar = user.avatar.is_some(), "avatar changed");
            Ok(user)
        })
        .await
    }

    /// Delete an account together with its quizzes and results.
    pub async fn delete_user(&self, principal: Principal, user_id: i64) -> ServiceResult<()> {
        ensure_self(principal, user_id)?;
        let ctx = self.ctx.clone();
        run_detached("delete_user", async move {
            let report = ctx.store.delete_user(user_id).await?;

            let keys = std::iter::once(CacheKey::UserProfile(user_id))
                .chain(report.quiz_ids.iter().copied().map(CacheKey::QuizDetail))
                .chain(report.result_user_ids.iter().copied().map(CacheKey::UserProfile));
            ctx.cache.invalidate_all(keys).await;
            for quiz_id in &report.quiz_ids {
                ctx.index.remove(*quiz_id);
            }

            tracing::info!(
                user_id,
                quizzes = report.quiz_ids.len(),
                affected_users = report.result_user_ids.len(),
                "user deleted"
            );
            Ok(())
        })
        .await
    }
}

fn ensure_self(principal: Principal, user_id: i64) -> ServiceResult<()> {
    if principal.user_id() != user_id {
        return Err(ServiceError::forbidden(ErrorCode::PermissionDenied));
    }
    Ok(())
}
