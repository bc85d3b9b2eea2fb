//! Answer writes

use shared::models::{Answer, AnswerCreate, AnswerUpdate};
use validator::Validate;

use super::{ServiceContext, ServiceResult, access, run_detached};
use crate::cache::CacheKey;
use crate::principal::Principal;

#[derive(Clone)]
pub struct AnswerService {
    ctx: ServiceContext,
}

impl AnswerService {
    pub(crate) fn new(ctx: ServiceContext) -> Self {
        Self { ctx }
    }

    pub async fn create(
        &self,
        principal: Principal,
        quiz_id: i64,
        question_id: i64,
        data: AnswerCreate,
    ) -> ServiceResult<Answer> {
        let ctx = self.ctx.clone();
        run_detached("create_answer", async move {
            access::owned_quiz(&ctx, principal, quiz_id).await?;
            access::question_in_quiz(&ctx, quiz_id, question_id).await?;
            data.validate()?;
            let answer = ctx.store.create_answer(question_id, &data).await?;
            ctx.cache.invalidate(CacheKey::QuizDetail(quiz_id)).await;
            tracing::info!(quiz_id, question_id, answer_id = answer.id, "answer created");
            Ok(answer)
        })
        .await
    }

    pub async fn update(
        &self,
        principal: Principal,
        quiz_id: i64,
        question_id: i64,
        answer_id: i64,
        data: AnswerUpdate,
    ) -> ServiceResult<Answer> {
        let ctx = self.ctx.clone();
        run_detached("update_answer", async move {
            access::owned_quiz(&ctx, principal, quiz_id).await?;
            access::question_in_quiz(&ctx, quiz_id, question_id).await?;
            access::answer_in_question(&ctx, question_id, answer_id).await?;
            data.validate()?;
            let answer = ctx.store.update_answer(answer_id, &data).await?;
            ctx.cache.invalidate(CacheKey::QuizDetail(quiz_id)).await;
            Ok(answer)
        })
        .await
    }

    pub async fn delete(
        &self,
        principal: Principal,
        quiz_id: i64,
        question_id: i64,
        answer_id: i64,
    ) -> ServiceResult<()> {
        let ctx = self.ctx.clone();
        run_detached("delete_answer", async move {
            access::owned_quiz(&ctx, principal, quiz_id).await?;
            access::question_in_quiz(&ctx, quiz_id, question_id).await?;
            access::answer_in_question(&ctx, question_id, answer_id).await?;
            ctx.store.delete_answer(answer_id).await?;
            ctx.cache.invalidate(CacheKey::QuizDetail(quiz_id)).await;
            tracing::info!(quiz_id, question_id, answer_id, "answer deleted");
            Ok(())
        })
        .await
    }
}
