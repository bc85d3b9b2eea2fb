//! Ownership and containment checks

use shared::error::ErrorCode;
use shared::models::{Answer, Question, Quiz};

use super::{ServiceContext, ServiceError, ServiceResult};
use crate::principal::Principal;

/// The quiz, if `principal` owns it.
pub(super) async fn owned_quiz(
    ctx: &ServiceContext,
    principal: Principal,
    quiz_id: i64,
) -> ServiceResult<Quiz> {
    let quiz = ctx
        .store
        .get_quiz(quiz_id)
        .await?
        .ok_or_else(|| ServiceError::not_found(ErrorCode::QuizNotFound, vec![quiz_id]))?;
    if !principal.owns(quiz.owner_id) {
        tracing::info!(
            user_id = principal.user_id(),
            quiz_id,
            "rejected write to a quiz owned by another user"
        );
        return Err(ServiceError::forbidden(ErrorCode::NotQuizOwner));
    }
    Ok(quiz)
}

/// The question, if it belongs to `quiz_id`.
pub(super) async fn question_in_quiz(
    ctx: &ServiceContext,
    quiz_id: i64,
    question_id: i64,
) -> ServiceResult<Question> {
    match ctx.store.get_question(question_id).await? {
        Some(q) if q.quiz_id == quiz_id => Ok(q),
        Some(_) => Err(ServiceError::not_found(
            ErrorCode::QuestionNotInQuiz,
            vec![question_id],
        )),
        None => Err(ServiceError::not_found(
            ErrorCode::QuestionNotFound,
            vec![question_id],
        )),
    }
}

/// The answer, if it belongs to `question_id`.
pub(super) async fn answer_in_question(
    ctx: &ServiceContext,
    question_id: i64,
    answer_id: i64,
) -> ServiceResult<Answer> {
    match ctx.store.get_answer(answer_id).await? {
        Some(a) if a.question_id == question_id => Ok(a),
        Some(_) => Err(ServiceError::not_found(
            ErrorCode::AnswerNotInQuestion,
            vec![answer_id],
        )),
        None => Err(ServiceError::not_found(
            ErrorCode::AnswerNotFound,
            vec![answer_id],
        )),
    }
}
