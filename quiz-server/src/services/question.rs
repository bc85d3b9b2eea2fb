//! Question writes

use shared::error::ErrorCode;
use shared::models::{Question, QuestionCreate, QuestionUpdate};
use validator::Validate;

use super::{ServiceContext, ServiceError, ServiceResult, access, run_detached};
use crate::cache::CacheKey;
use crate::principal::Principal;

#[derive(Clone)]
pub struct QuestionService {
    ctx: ServiceContext,
}

impl QuestionService {
    pub(crate) fn new(ctx: ServiceContext) -> Self {
        Self { ctx }
    }

    /// Add a question; without a position it is appended after the last one.
    pub async fn create(
        &self,
        principal: Principal,
        quiz_id: i64,
        data: QuestionCreate,
    ) -> ServiceResult<Question> {
        let ctx = self.ctx.clone();
        run_detached("create_question", async move {
            access::owned_quiz(&ctx, principal, quiz_id).await?;
            data.validate()?;
            let question = ctx.store.create_question(quiz_id, &data).await?;
            ctx.cache.invalidate(CacheKey::QuizDetail(quiz_id)).await;
            ctx.index.upsert(quiz_id);
            tracing::info!(
                quiz_id,
                question_id = question.id,
                order_id = question.order_id,
                "question created"
            );
            Ok(question)
        })
        .await
    }

    pub async fn update(
        &self,
        principal: Principal,
        quiz_id: i64,
        question_id: i64,
        data: QuestionUpdate,
    ) -> ServiceResult<Question> {
        let ctx = self.ctx.clone();
        run_detached("update_question", async move {
            access::owned_quiz(&ctx, principal, quiz_id).await?;
            access::question_in_quiz(&ctx, quiz_id, question_id).await?;
            data.validate()?;
            let question = ctx.store.update_question(question_id, &data).await?;
            ctx.cache.invalidate(CacheKey::QuizDetail(quiz_id)).await;
            Ok(question)
        })
        .await
    }

    /// Attach an already-stored image to a question.
    pub async fn set_image(
        &self,
        principal: Principal,
        quiz_id: i64,
        question_id: i64,
        image: String,
    ) -> ServiceResult<Question> {
        self.write_image(principal, quiz_id, question_id, Some(image))
            .await
    }

    pub async fn clear_image(
        &self,
        principal: Principal,
        quiz_id: i64,
        question_id: i64,
    ) -> ServiceResult<Question> {
        self.write_image(principal, quiz_id, question_id, None).await
    }

    async fn write_image(
        &self,
        principal: Principal,
        quiz_id: i64,
        question_id: i64,
        image: Option<String>,
    ) -> ServiceResult<Question> {
        let ctx = self.ctx.clone();
        run_detached("question_image", async move {
            access::owned_quiz(&ctx, principal, quiz_id).await?;
            access::question_in_quiz(&ctx, quiz_id, question_id).await?;
            if image.as_deref().is_some_and(|i| i.trim().is_empty()) {
                return Err(ServiceError::validation(
                    ErrorCode::RequiredField,
                    "image must not be empty",
                ));
            }
            let question = ctx
                .store
                .set_question_image(question_id, image.as_deref())
                .await?;
            ctx.cache.invalidate(CacheKey::QuizDetail(quiz_id)).await;
            Ok(question)
        })
        .await
    }

    /// Delete a question and its answers. Remaining positions are left as-is.
    pub async fn delete(
        &self,
        principal: Principal,
        quiz_id: i64,
        question_id: i64,
    ) -> ServiceResult<()> {
        let ctx = self.ctx.clone();
        run_detached("delete_question", async move {
            access::owned_quiz(&ctx, principal, quiz_id).await?;
            access::question_in_quiz(&ctx, quiz_id, question_id).await?;
            ctx.store.delete_question(question_id).await?;
            ctx.cache.invalidate(CacheKey::QuizDetail(quiz_id)).await;
            ctx.index.upsert(quiz_id);
            tracing::info!(quiz_id, question_id, "question deleted");
            Ok(())
        })
        .await
    }
}
