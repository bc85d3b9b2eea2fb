//! Quiz lifecycle, quiz detail read model and results

use std::collections::{BTreeSet, HashMap};

use shared::error::ErrorCode;
use shared::models::{
    Answer, QuestionWithAnswers, Quiz, QuizCreate, QuizDetail, QuizResult, QuizUpdate,
    SessionScore,
};
use validator::Validate;

use super::{ServiceContext, ServiceError, ServiceResult, access, run_detached};
use crate::cache::CacheKey;
use crate::db::QuizStore;
use crate::principal::Principal;

#[derive(Clone)]
pub struct QuizService {
    ctx: ServiceContext,
}

impl QuizService {
    pub(crate) fn new(ctx: ServiceContext) -> Self {
        Self { ctx }
    }

    pub async fn create(&self, principal: Principal, data: QuizCreate) -> ServiceResult<Quiz> {
        data.validate()?;
        let ctx = self.ctx.clone();
        run_detached("create_quiz", async move {
            let quiz = ctx.store.create_quiz(principal.user_id(), &data).await?;
            ctx.cache
                .invalidate(CacheKey::UserProfile(quiz.owner_id))
                .await;
            ctx.index.upsert(quiz.id);
            tracing::info!(quiz_id = quiz.id, owner_id = quiz.owner_id, "quiz created");
            Ok(quiz)
        })
        .await
    }

    /// Quiz with ordered questions and answers, served from cache when present.
    pub async fn get(&self, quiz_id: i64) -> ServiceResult<QuizDetail> {
        let key = CacheKey::QuizDetail(quiz_id);
        if let Some(detail) = self.ctx.cache.load::<QuizDetail>(key).await {
            return Ok(detail);
        }

        let ticket = self.ctx.cache.begin_fill(key);
        let detail = load_detail(self.ctx.store.as_ref(), quiz_id)
            .await?
            .ok_or_else(|| ServiceError::not_found(ErrorCode::QuizNotFound, vec![quiz_id]))?;
        self.ctx.cache.fill(ticket, &detail).await;
        Ok(detail)
    }

    pub async fn update(
        &self,
        principal: Principal,
        quiz_id: i64,
        data: QuizUpdate,
    ) -> ServiceResult<Quiz> {
        let ctx = self.ctx.clone();
        run_detached("update_quiz", async move {
            access::owned_quiz(&ctx, principal, quiz_id).await?;
            data.validate()?;
            let quiz = ctx.store.update_quiz(quiz_id, &data).await?;
            ctx.cache
                .invalidate_all([
                    CacheKey::QuizDetail(quiz_id),
                    CacheKey::UserProfile(quiz.owner_id),
                ])
                .await;
            ctx.index.upsert(quiz_id);
            tracing::info!(quiz_id, "quiz updated");
            Ok(quiz)
        })
        .await
    }

    /// Delete a quiz with its questions, answers and results.
    pub async fn delete(&self, principal: Principal, quiz_id: i64) -> ServiceResult<()> {
        let ctx = self.ctx.clone();
        run_detached("delete_quiz", async move {
            let quiz = access::owned_quiz(&ctx, principal, quiz_id).await?;
            let report = ctx.store.delete_quiz(quiz_id).await?;

            let mut keys = vec![
                CacheKey::QuizDetail(quiz_id),
                CacheKey::UserProfile(quiz.owner_id),
            ];
            keys.extend(report.result_user_ids.iter().map(|&id| CacheKey::UserProfile(id)));
            ctx.cache.invalidate_all(keys).await;
            ctx.index.remove(quiz_id);

            tracing::info!(
                quiz_id,
                affected_users = report.result_user_ids.len(),
                "quiz deleted"
            );
            Ok(())
        })
        .await
    }

    /// Record the requester's score on a quiz.
    pub async fn save_result(
        &self,
        principal: Principal,
        quiz_id: i64,
        score: i32,
    ) -> ServiceResult<QuizResult> {
        let ctx = self.ctx.clone();
        run_detached("save_result", async move {
            if ctx.store.get_quiz(quiz_id).await?.is_none() {
                return Err(ServiceError::not_found(ErrorCode::QuizNotFound, vec![quiz_id]));
            }
            ensure_users_exist(&ctx, &[principal.user_id()]).await?;
            let scores = [SessionScore {
                user_id: principal.user_id(),
                score,
            }];
            let saved = ctx.store.save_results(quiz_id, &scores).await?;
            ctx.cache
                .invalidate(CacheKey::UserProfile(principal.user_id()))
                .await;
            saved.into_iter().next().ok_or_else(|| {
                ServiceError::dependency(ErrorCode::DatabaseError, "result was not returned")
            })
        })
        .await
    }

    /// Persist every participant's score at the end of a live session hosted
    /// by the quiz owner. All results are written in one transaction.
    pub async fn on_session_finished(
        &self,
        host: Principal,
        quiz_id: i64,
        scores: Vec<SessionScore>,
    ) -> ServiceResult<Vec<QuizResult>> {
        let ctx = self.ctx.clone();
        run_detached("session_finished", async move {
            access::owned_quiz(&ctx, host, quiz_id).await?;
            if scores.is_empty() {
                return Ok(Vec::new());
            }
            let participants: BTreeSet<i64> = scores.iter().map(|s| s.user_id).collect();
            let ids: Vec<i64> = participants.iter().copied().collect();
            ensure_users_exist(&ctx, &ids).await?;

            let saved = ctx.store.save_results(quiz_id, &scores).await?;
            ctx.cache
                .invalidate_all(participants.iter().copied().map(CacheKey::UserProfile))
                .await;
            tracing::info!(
                quiz_id,
                participants = participants.len(),
                "session results saved"
            );
            Ok(saved)
        })
        .await
    }
}

/// Fail with every unknown id if any of `ids` has no user row.
async fn ensure_users_exist(ctx: &ServiceContext, ids: &[i64]) -> ServiceResult<()> {
    let missing = ctx.store.missing_users(ids).await?;
    if missing.is_empty() {
        return Ok(());
    }
    tracing::info!(?missing, "results reference unknown users");
    Err(ServiceError::not_found(ErrorCode::UserNotFound, missing))
}

/// Assemble the quiz detail from the store.
async fn load_detail(store: &dyn QuizStore, quiz_id: i64) -> ServiceResult<Option<QuizDetail>> {
    let Some(quiz) = store.get_quiz(quiz_id).await? else {
        return Ok(None);
    };
    let questions = store.list_questions(quiz_id).await?;
    let mut answers_by_question: HashMap<i64, Vec<Answer>> = HashMap::new();
    for answer in store.list_answers_for_quiz(quiz_id).await? {
        answers_by_question
            .entry(answer.question_id)
            .or_default()
            .push(answer);
    }

    let questions = questions
        .into_iter()
        .map(|question| {
            let mut answers = answers_by_question.remove(&question.id).unwrap_or_default();
            answers.sort_by_key(|a| (a.order_id, a.id));
            QuestionWithAnswers { question, answers }
        })
        .collect();
    Ok(Some(QuizDetail { quiz, questions }))
}
