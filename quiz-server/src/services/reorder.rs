//! Reorder coordinator
//!
//! Validates a change set against the current children of one parent and
//! hands it to the store as a single transaction. Racing reorders of the same
//! parent are resolved by the store: the last commit wins.

use shared::error::ErrorCode;
use shared::models::OrderChangeSet;

use super::{ServiceContext, ServiceError, ServiceResult, access, run_detached};
use crate::cache::CacheKey;
use crate::db::Parent;
use crate::principal::Principal;

#[derive(Clone)]
pub struct ReorderCoordinator {
    ctx: ServiceContext,
}

impl ReorderCoordinator {
    pub(crate) fn new(ctx: ServiceContext) -> Self {
        Self { ctx }
    }

    pub async fn reorder_questions(
        &self,
        principal: Principal,
        quiz_id: i64,
        set: OrderChangeSet,
    ) -> ServiceResult<()> {
        let ctx = self.ctx.clone();
        run_detached("reorder_questions", async move {
            access::owned_quiz(&ctx, principal, quiz_id).await?;
            set.check()?;
            apply(&ctx, Parent::Quiz(quiz_id), quiz_id, &set).await
        })
        .await
    }

    pub async fn reorder_answers(
        &self,
        principal: Principal,
        quiz_id: i64,
        question_id: i64,
        set: OrderChangeSet,
    ) -> ServiceResult<()> {
        let ctx = self.ctx.clone();
        run_detached("reorder_answers", async move {
            access::owned_quiz(&ctx, principal, quiz_id).await?;
            access::question_in_quiz(&ctx, quiz_id, question_id).await?;
            set.check()?;
            apply(&ctx, Parent::Question(question_id), quiz_id, &set).await
        })
        .await
    }
}

async fn apply(
    ctx: &ServiceContext,
    parent: Parent,
    quiz_id: i64,
    set: &OrderChangeSet,
) -> ServiceResult<()> {
    let current = ctx.store.child_positions(parent).await?;
    let existing: Vec<i64> = current.iter().map(|&(id, _)| id).collect();
    let missing = set.missing_from(&existing);
    if !missing.is_empty() {
        tracing::info!(?parent, ?missing, "reorder references unknown children");
        return Err(ServiceError::not_found(ErrorCode::ChildrenNotFound, missing));
    }

    // Surface collisions with untouched siblings as a conflict with the
    // exact positions before the store rejects the commit.
    set.apply_to(&current)?;

    ctx.store.apply_order_change_set(parent, set).await?;
    ctx.cache.invalidate(CacheKey::QuizDetail(quiz_id)).await;
    tracing::info!(?parent, items = set.len(), "children reordered");
    Ok(())
}
