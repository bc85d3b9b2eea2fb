//! In-process store
//!
//! Backs tests and local runs without PostgreSQL. All tables live behind one
//! mutex, so every operation (a change set included) is atomic and
//! serializable. Failure injection mirrors a database outage.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use parking_lot::Mutex;
use shared::models::{
    Answer, AnswerCreate, AnswerUpdate, OrderChangeSet, Question, QuestionCreate,
    QuestionUpdate, Quiz, QuizCreate, QuizResult, QuizUpdate, SessionScore, User, UserUpdate,
};
use shared::util::now_millis;

use super::{CascadeReport, ConflictKind, Parent, QuizStore, StoreError, StoreResult};

#[derive(Debug, Default)]
struct Tables {
    last_id: i64,
    users: BTreeMap<i64, User>,
    quizzes: BTreeMap<i64, Quiz>,
    questions: BTreeMap<i64, Question>,
    answers: BTreeMap<i64, Answer>,
    results: BTreeMap<i64, QuizResult>,
}

impl Tables {
    fn next_id(&mut self) -> i64 {
        self.last_id += 1;
        self.last_id
    }

    fn positions(&self, parent: Parent) -> Vec<(i64, i32)> {
        let mut rows: Vec<(i64, i32)> = match parent {
            Parent::Quiz(quiz_id) => self
                .questions
                .values()
                .filter(|q| q.quiz_id == quiz_id)
                .map(|q| (q.id, q.order_id))
                .collect(),
            Parent::Question(question_id) => self
                .answers
                .values()
                .filter(|a| a.question_id == question_id)
                .map(|a| (a.id, a.order_id))
                .collect(),
        };
        rows.sort_by_key(|&(id, pos)| (pos, id));
        rows
    }

    /// Position for a new child: explicit, or one past the current maximum.
    fn place_child(&self, parent: Parent, requested: Option<i32>) -> StoreResult<i32> {
        let positions = self.positions(parent);
        match requested {
            Some(pos) if positions.iter().any(|&(_, p)| p == pos) => Err(StoreError::Conflict(
                ConflictKind::Position,
                format!("position {pos} already taken in {parent:?}"),
            )),
            Some(pos) => Ok(pos),
            None => Ok(positions.iter().map(|&(_, p)| p).max().unwrap_or(0) + 1),
        }
    }

    fn remove_question(&mut self, id: i64) {
        self.questions.remove(&id);
        self.answers.retain(|_, a| a.question_id != id);
    }

    fn remove_quiz(&mut self, id: i64) -> Vec<i64> {
        self.quizzes.remove(&id);
        let question_ids: Vec<i64> = self
            .questions
            .values()
            .filter(|q| q.quiz_id == id)
            .map(|q| q.id)
            .collect();
        for qid in question_ids {
            self.remove_question(qid);
        }
        let takers: BTreeSet<i64> = self
            .results
            .values()
            .filter(|r| r.quiz_id == id)
            .map(|r| r.user_id)
            .collect();
        self.results.retain(|_, r| r.quiz_id != id);
        takers.into_iter().collect()
    }
}

#[derive(Debug, Default)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
    failing: AtomicBool,
    fail_next: AtomicUsize,
    failing_order_writes: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a user. Sign-up is handled elsewhere, so this is not on the trait.
    pub fn insert_user(&self, username: &str, email: &str) -> User {
        let mut t = self.tables.lock();
        let user = User {
            id: t.next_id(),
            username: username.to_string(),
            email: email.to_string(),
            avatar: None,
            created_at: now_millis(),
        };
        t.users.insert(user.id, user.clone());
        user
    }

    /// Make every operation fail until reset.
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Make the next `n` operations fail.
    pub fn fail_next(&self, n: usize) {
        self.fail_next.store(n, Ordering::SeqCst);
    }

    /// Make only change-set applies fail, leaving reads working.
    pub fn set_failing_order_writes(&self, failing: bool) {
        self.failing_order_writes.store(failing, Ordering::SeqCst);
    }

    fn check_available(&self) -> StoreResult<()> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(StoreError::Database("store unavailable".into()));
        }
        let consumed = self
            .fail_next
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if consumed {
            return Err(StoreError::Database("injected failure".into()));
        }
        Ok(())
    }
}

#[async_trait]
impl QuizStore for MemoryStore {
    async fn get_user(&self, id: i64) -> StoreResult<Option<User>> {
        self.check_available()?;
        Ok(self.tables.lock().users.get(&id).cloned())
    }

    async fn update_user(&self, id: i64, data: &UserUpdate) -> StoreResult<User> {
        self.check_available()?;
        let mut t = self.tables.lock();
        if let Some(username) = &data.username {
            if t.users.values().any(|u| u.id != id && &u.username == username) {
                return Err(StoreError::Conflict(
                    ConflictKind::Username,
                    format!("username {username} taken"),
                ));
            }
        }
        if let Some(email) = &data.email {
            if t.users.values().any(|u| u.id != id && &u.email == email) {
                return Err(StoreError::Conflict(
                    ConflictKind::Email,
                    format!("email {email} taken"),
                ));
            }
        }
        let user = t.users.get_mut(&id).ok_or(StoreError::NotFound("user"))?;
        if let Some(username) = &data.username {
            user.username = username.clone();
        }
        if let Some(email) = &data.email {
            user.email = email.clone();
        }
        Ok(user.clone())
    }

    async fn delete_user(&self, id: i64) -> StoreResult<CascadeReport> {
        self.check_available()?;
        let mut t = self.tables.lock();
        if t.users.remove(&id).is_none() {
            return Err(StoreError::NotFound("user"));
        }
        let quiz_ids: Vec<i64> = t
            .quizzes
            .values()
            .filter(|q| q.owner_id == id)
            .map(|q| q.id)
            .collect();
        let mut result_user_ids = BTreeSet::new();
        for quiz_id in &quiz_ids {
            result_user_ids.extend(t.remove_quiz(*quiz_id));
        }
        result_user_ids.remove(&id);
        t.results.retain(|_, r| r.user_id != id);
        Ok(CascadeReport {
            quiz_ids,
            result_user_ids: result_user_ids.into_iter().collect(),
        })
    }

    async fn set_user_avatar(&self, id: i64, avatar: Option<&str>) -> StoreResult<User> {
        self.check_available()?;
        let mut t = self.tables.lock();
        let user = t.users.get_mut(&id).ok_or(StoreError::NotFound("user"))?;
        user.avatar = avatar.map(str::to_string);
        Ok(user.clone())
    }

    async fn missing_users(&self, ids: &[i64]) -> StoreResult<Vec<i64>> {
        self.check_available()?;
        let t = self.tables.lock();
        let missing: BTreeSet<i64> = ids
            .iter()
            .copied()
            .filter(|id| !t.users.contains_key(id))
            .collect();
        Ok(missing.into_iter().collect())
    }

    async fn create_quiz(&self, owner_id: i64, data: &QuizCreate) -> StoreResult<Quiz> {
        self.check_available()?;
        let mut t = self.tables.lock();
        if !t.users.contains_key(&owner_id) {
            return Err(StoreError::NotFound("user"));
        }
        let now = now_millis();
        let quiz = Quiz {
            id: t.next_id(),
            owner_id,
            title: data.title.clone(),
            description: data.description.clone(),
            tags: data.tags.clone(),
            created_at: now,
            updated_at: now,
        };
        t.quizzes.insert(quiz.id, quiz.clone());
        Ok(quiz)
    }

    async fn get_quiz(&self, id: i64) -> StoreResult<Option<Quiz>> {
        self.check_available()?;
        Ok(self.tables.lock().quizzes.get(&id).cloned())
    }

    async fn list_quizzes_by_owner(&self, owner_id: i64) -> StoreResult<Vec<Quiz>> {
        self.check_available()?;
        Ok(self
            .tables
            .lock()
            .quizzes
            .values()
            .filter(|q| q.owner_id == owner_id)
            .cloned()
            .collect())
    }

    async fn list_quiz_ids(&self) -> StoreResult<Vec<i64>> {
        self.check_available()?;
        Ok(self.tables.lock().quizzes.keys().copied().collect())
    }

    async fn update_quiz(&self, id: i64, data: &QuizUpdate) -> StoreResult<Quiz> {
        self.check_available()?;
        let mut t = self.tables.lock();
        let quiz = t.quizzes.get_mut(&id).ok_or(StoreError::NotFound("quiz"))?;
        if let Some(title) = &data.title {
            quiz.title = title.clone();
        }
        if let Some(description) = &data.description {
            quiz.description = Some(description.clone());
        }
        if let Some(tags) = &data.tags {
            quiz.tags = tags.clone();
        }
        quiz.updated_at = now_millis();
        Ok(quiz.clone())
    }

    async fn delete_quiz(&self, id: i64) -> StoreResult<CascadeReport> {
        self.check_available()?;
        let mut t = self.tables.lock();
        if !t.quizzes.contains_key(&id) {
            return Err(StoreError::NotFound("quiz"));
        }
        let result_user_ids = t.remove_quiz(id);
        Ok(CascadeReport {
            quiz_ids: vec![id],
            result_user_ids,
        })
    }

    async fn create_question(&self, quiz_id: i64, data: &QuestionCreate) -> StoreResult<Question> {
        self.check_available()?;
        let mut t = self.tables.lock();
        if !t.quizzes.contains_key(&quiz_id) {
            return Err(StoreError::NotFound("quiz"));
        }
        let order_id = t.place_child(Parent::Quiz(quiz_id), data.order_id)?;
        let question = Question {
            id: t.next_id(),
            quiz_id,
            order_id,
            title: data.title.clone(),
            image: None,
        };
        t.questions.insert(question.id, question.clone());
        Ok(question)
    }

    async fn get_question(&self, id: i64) -> StoreResult<Option<Question>> {
        self.check_available()?;
        Ok(self.tables.lock().questions.get(&id).cloned())
    }

    async fn list_questions(&self, quiz_id: i64) -> StoreResult<Vec<Question>> {
        self.check_available()?;
        let t = self.tables.lock();
        let mut questions: Vec<Question> = t
            .questions
            .values()
            .filter(|q| q.quiz_id == quiz_id)
            .cloned()
            .collect();
        questions.sort_by_key(|q| (q.order_id, q.id));
        Ok(questions)
    }

    async fn count_questions(&self, quiz_id: i64) -> StoreResult<i64> {
        self.check_available()?;
        let t = self.tables.lock();
        Ok(t.questions.values().filter(|q| q.quiz_id == quiz_id).count() as i64)
    }

    async fn update_question(&self, id: i64, data: &QuestionUpdate) -> StoreResult<Question> {
        self.check_available()?;
        let mut t = self.tables.lock();
        let question = t
            .questions
            .get_mut(&id)
            .ok_or(StoreError::NotFound("question"))?;
        if let Some(title) = &data.title {
            question.title = title.clone();
        }
        Ok(question.clone())
    }

    async fn set_question_image(&self, id: i64, image: Option<&str>) -> StoreResult<Question> {
        self.check_available()?;
        let mut t = self.tables.lock();
        let question = t
            .questions
            .get_mut(&id)
            .ok_or(StoreError::NotFound("question"))?;
        question.image = image.map(str::to_string);
        Ok(question.clone())
    }

    async fn delete_question(&self, id: i64) -> StoreResult<()> {
        self.check_available()?;
        let mut t = self.tables.lock();
        if !t.questions.contains_key(&id) {
            return Err(StoreError::NotFound("question"));
        }
        t.remove_question(id);
        Ok(())
    }

    async fn create_answer(&self, question_id: i64, data: &AnswerCreate) -> StoreResult<Answer> {
        self.check_available()?;
        let mut t = self.tables.lock();
        if !t.questions.contains_key(&question_id) {
            return Err(StoreError::NotFound("question"));
        }
        let order_id = t.place_child(Parent::Question(question_id), data.order_id)?;
        let answer = Answer {
            id: t.next_id(),
            question_id,
            order_id,
            text: data.text.clone(),
            is_correct: data.is_correct,
        };
        t.answers.insert(answer.id, answer.clone());
        Ok(answer)
    }

    async fn get_answer(&self, id: i64) -> StoreResult<Option<Answer>> {
        self.check_available()?;
        Ok(self.tables.lock().answers.get(&id).cloned())
    }

    async fn list_answers_for_quiz(&self, quiz_id: i64) -> StoreResult<Vec<Answer>> {
        self.check_available()?;
        let t = self.tables.lock();
        let mut answers: Vec<Answer> = t
            .answers
            .values()
            .filter(|a| {
                t.questions
                    .get(&a.question_id)
                    .is_some_and(|q| q.quiz_id == quiz_id)
            })
            .cloned()
            .collect();
        answers.sort_by_key(|a| (a.question_id, a.order_id, a.id));
        Ok(answers)
    }

    async fn update_answer(&self, id: i64, data: &AnswerUpdate) -> StoreResult<Answer> {
        self.check_available()?;
        let mut t = self.tables.lock();
        let answer = t.answers.get_mut(&id).ok_or(StoreError::NotFound("answer"))?;
        if let Some(text) = &data.text {
            answer.text = text.clone();
        }
        if let Some(is_correct) = data.is_correct {
            answer.is_correct = is_correct;
        }
        Ok(answer.clone())
    }

    async fn delete_answer(&self, id: i64) -> StoreResult<()> {
        self.check_available()?;
        let mut t = self.tables.lock();
        t.answers
            .remove(&id)
            .map(|_| ())
            .ok_or(StoreError::NotFound("answer"))
    }

    async fn child_positions(&self, parent: Parent) -> StoreResult<Vec<(i64, i32)>> {
        self.check_available()?;
        Ok(self.tables.lock().positions(parent))
    }

    async fn apply_order_change_set(
        &self,
        parent: Parent,
        set: &OrderChangeSet,
    ) -> StoreResult<()> {
        self.check_available()?;
        if self.failing_order_writes.load(Ordering::SeqCst) {
            return Err(StoreError::Database("transaction aborted".into()));
        }
        let mut t = self.tables.lock();
        let next = set
            .apply_to(&t.positions(parent))
            .map_err(|e| StoreError::Conflict(ConflictKind::Position, e.to_string()))?;
        for (id, order_id) in next {
            match parent {
                Parent::Quiz(_) => {
                    if let Some(q) = t.questions.get_mut(&id) {
                        q.order_id = order_id;
                    }
                }
                Parent::Question(_) => {
                    if let Some(a) = t.answers.get_mut(&id) {
                        a.order_id = order_id;
                    }
                }
            }
        }
        Ok(())
    }

    async fn save_results(
        &self,
        quiz_id: i64,
        scores: &[SessionScore],
    ) -> StoreResult<Vec<QuizResult>> {
        self.check_available()?;
        let mut t = self.tables.lock();
        if !t.quizzes.contains_key(&quiz_id) {
            return Err(StoreError::NotFound("quiz"));
        }
        if scores.iter().any(|s| !t.users.contains_key(&s.user_id)) {
            return Err(StoreError::NotFound("user"));
        }
        let now = now_millis();
        let mut saved = Vec::with_capacity(scores.len());
        for score in scores {
            let result = QuizResult {
                id: t.next_id(),
                user_id: score.user_id,
                quiz_id,
                score: score.score,
                created_at: now,
            };
            t.results.insert(result.id, result.clone());
            saved.push(result);
        }
        Ok(saved)
    }

    async fn list_results_by_user(&self, user_id: i64) -> StoreResult<Vec<QuizResult>> {
        self.check_available()?;
        let t = self.tables.lock();
        let mut results: Vec<QuizResult> = t
            .results
            .values()
            .filter(|r| r.user_id == user_id)
            .cloned()
            .collect();
        results.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        Ok(results)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seeded() -> (MemoryStore, i64) {
        let store = MemoryStore::new();
        let owner = store.insert_user("owner", "owner@example.com");
        (store, owner.id)
    }

    async fn quiz_with_questions(store: &MemoryStore, owner: i64, n: usize) -> (i64, Vec<i64>) {
        let quiz = store
            .create_quiz(
                owner,
                &QuizCreate {
                    title: "Capitals".into(),
                    description: None,
                    tags: vec![],
                },
            )
            .await
            .unwrap();
        let mut ids = Vec::new();
        for i in 0..n {
            let q = store
                .create_question(
                    quiz.id,
                    &QuestionCreate {
                        title: format!("Q{i}"),
                        order_id: None,
                    },
                )
                .await
                .unwrap();
            ids.push(q.id);
        }
        (quiz.id, ids)
    }

    #[tokio::test]
    async fn new_children_append_after_max() {
        let (store, owner) = seeded();
        let (quiz_id, ids) = quiz_with_questions(&store, owner, 3).await;
        let positions = store.child_positions(Parent::Quiz(quiz_id)).await.unwrap();
        assert_eq!(positions, vec![(ids[0], 1), (ids[1], 2), (ids[2], 3)]);
    }

    #[tokio::test]
    async fn explicit_duplicate_position_conflicts() {
        let (store, owner) = seeded();
        let (quiz_id, _) = quiz_with_questions(&store, owner, 2).await;
        let err = store
            .create_question(
                quiz_id,
                &QuestionCreate {
                    title: "dup".into(),
                    order_id: Some(2),
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Conflict(ConflictKind::Position, _)));
    }

    #[tokio::test]
    async fn swap_applies_atomically() {
        let (store, owner) = seeded();
        let (quiz_id, ids) = quiz_with_questions(&store, owner, 3).await;
        let set = OrderChangeSet::new([(ids[0], 3), (ids[2], 1)]);
        store
            .apply_order_change_set(Parent::Quiz(quiz_id), &set)
            .await
            .unwrap();
        let positions = store.child_positions(Parent::Quiz(quiz_id)).await.unwrap();
        assert_eq!(positions, vec![(ids[2], 1), (ids[1], 2), (ids[0], 3)]);
    }

    #[tokio::test]
    async fn collision_with_sibling_leaves_positions_unchanged() {
        let (store, owner) = seeded();
        let (quiz_id, ids) = quiz_with_questions(&store, owner, 3).await;
        let set = OrderChangeSet::new([(ids[0], 2)]);
        let err = store
            .apply_order_change_set(Parent::Quiz(quiz_id), &set)
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Conflict(ConflictKind::Position, _)));
        let positions = store.child_positions(Parent::Quiz(quiz_id)).await.unwrap();
        assert_eq!(positions, vec![(ids[0], 1), (ids[1], 2), (ids[2], 3)]);
    }

    #[tokio::test]
    async fn delete_quiz_cascades_and_reports_takers() {
        let (store, owner) = seeded();
        let taker = store.insert_user("taker", "taker@example.com");
        let (quiz_id, ids) = quiz_with_questions(&store, owner, 2).await;
        store
            .create_answer(ids[0], &AnswerCreate::default())
            .await
            .unwrap();
        store
            .save_results(quiz_id, &[SessionScore { user_id: taker.id, score: 5 }])
            .await
            .unwrap();

        let report = store.delete_quiz(quiz_id).await.unwrap();
        assert_eq!(report.quiz_ids, vec![quiz_id]);
        assert_eq!(report.result_user_ids, vec![taker.id]);
        assert!(store.list_questions(quiz_id).await.unwrap().is_empty());
        assert!(store.list_answers_for_quiz(quiz_id).await.unwrap().is_empty());
        assert!(store.list_results_by_user(taker.id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn taken_username_and_email_conflict_by_kind() {
        let (store, owner) = seeded();
        store.insert_user("other", "other@example.com");

        let err = store
            .update_user(
                owner,
                &UserUpdate {
                    username: Some("other".into()),
                    email: None,
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Conflict(ConflictKind::Username, _)));

        let err = store
            .update_user(
                owner,
                &UserUpdate {
                    username: None,
                    email: Some("other@example.com".into()),
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Conflict(ConflictKind::Email, _)));

        // Keeping one's own name is not a clash.
        let user = store
            .update_user(
                owner,
                &UserUpdate {
                    username: Some("owner".into()),
                    email: None,
                },
            )
            .await
            .unwrap();
        assert_eq!(user.username, "owner");
    }

    #[tokio::test]
    async fn results_for_unknown_users_write_nothing() {
        let (store, owner) = seeded();
        let (quiz_id, _) = quiz_with_questions(&store, owner, 1).await;
        let scores = [
            SessionScore { user_id: owner, score: 3 },
            SessionScore { user_id: 9_999, score: 1 },
        ];
        let err = store.save_results(quiz_id, &scores).await.unwrap_err();
        assert!(matches!(err, StoreError::NotFound("user")));
        assert!(store.list_results_by_user(owner).await.unwrap().is_empty());
        assert_eq!(
            store.missing_users(&[9_999, owner, 9_999, 42]).await.unwrap(),
            vec![42, 9_999]
        );
    }

    #[tokio::test]
    async fn avatar_is_set_and_cleared() {
        let (store, owner) = seeded();
        let user = store.set_user_avatar(owner, Some("avatars/1.png")).await.unwrap();
        assert_eq!(user.avatar.as_deref(), Some("avatars/1.png"));
        let user = store.set_user_avatar(owner, None).await.unwrap();
        assert_eq!(user.avatar, None);
        assert!(matches!(
            store.set_user_avatar(9_999, None).await,
            Err(StoreError::NotFound("user"))
        ));
    }

    #[tokio::test]
    async fn injected_failures_are_consumed() {
        let (store, _) = seeded();
        store.fail_next(1);
        assert!(matches!(
            store.list_quiz_ids().await,
            Err(StoreError::Database(_))
        ));
        assert!(store.list_quiz_ids().await.is_ok());
    }
}
