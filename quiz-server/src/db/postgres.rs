//! PostgreSQL store

use std::time::Duration;

use async_trait::async_trait;
use shared::models::{
    Answer, AnswerCreate, AnswerUpdate, OrderChangeSet, Question, QuestionCreate,
    QuestionUpdate, Quiz, QuizCreate, QuizResult, QuizUpdate, SessionScore, User, UserUpdate,
};
use shared::util::now_millis;
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;

use super::{CascadeReport, Parent, QuizStore, StoreError, StoreResult};

#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Connect and run pending migrations.
    pub async fn connect(
        url: &str,
        max_connections: u32,
        acquire_timeout: Duration,
    ) -> Result<Self, StoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .acquire_timeout(acquire_timeout)
            .connect(url)
            .await?;
        tracing::info!("Connected to PostgreSQL");

        sqlx::migrate!("./migrations")
            .run(&pool)
            .await
            .map_err(|e| StoreError::Database(format!("migration failed: {e}")))?;
        tracing::info!("Database migrations applied");

        Ok(Self { pool })
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Lock a parent row for the rest of the transaction and return the next
    /// free position among its children.
    async fn next_position(
        tx: &mut sqlx::PgConnection,
        parent: Parent,
    ) -> StoreResult<i32> {
        let lock_sql = match parent {
            Parent::Quiz(_) => "SELECT id FROM quizzes WHERE id = $1 FOR UPDATE",
            Parent::Question(_) => "SELECT id FROM questions WHERE id = $1 FOR UPDATE",
        };
        let locked: Option<(i64,)> = sqlx::query_as(lock_sql)
            .bind(parent.id())
            .fetch_optional(&mut *tx)
            .await?;
        if locked.is_none() {
            return Err(match parent {
                Parent::Quiz(_) => StoreError::NotFound("quiz"),
                Parent::Question(_) => StoreError::NotFound("question"),
            });
        }

        let sql = format!(
            "SELECT COALESCE(MAX(order_id), 0) + 1 FROM {} WHERE {} = $1",
            parent.child_table(),
            parent.parent_column()
        );
        let (next,): (i32,) = sqlx::query_as(&sql)
            .bind(parent.id())
            .fetch_one(&mut *tx)
            .await?;
        Ok(next)
    }
}

const QUIZ_COLUMNS: &str = "id, owner_id, title, description, tags, created_at, updated_at";

#[async_trait]
impl QuizStore for PgStore {
    // ── Users ──

    async fn get_user(&self, id: i64) -> StoreResult<Option<User>> {
        let user = sqlx::query_as::<_, User>(
            "SELECT id, username, email, avatar, created_at FROM users WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(user)
    }

    async fn update_user(&self, id: i64, data: &UserUpdate) -> StoreResult<User> {
        let user = sqlx::query_as::<_, User>(
            r#"
            UPDATE users SET
                username = COALESCE($2, username),
                email = COALESCE($3, email)
            WHERE id = $1
            RETURNING id, username, email, avatar, created_at
            "#,
        )
        .bind(id)
        .bind(&data.username)
        .bind(&data.email)
        .fetch_optional(&self.pool)
        .await?;
        user.ok_or(StoreError::NotFound("user"))
    }

    async fn delete_user(&self, id: i64) -> StoreResult<CascadeReport> {
        let mut tx = self.pool.begin().await?;

        let quiz_ids: Vec<i64> =
            sqlx::query_scalar("SELECT id FROM quizzes WHERE owner_id = $1 ORDER BY id")
                .bind(id)
                .fetch_all(&mut *tx)
                .await?;

        // Other users who took one of this user's quizzes lose those results.
        let result_user_ids: Vec<i64> = sqlx::query_scalar(
            r#"
            SELECT DISTINCT user_id FROM quiz_results
            WHERE quiz_id = ANY($1) AND user_id <> $2
            ORDER BY user_id
            "#,
        )
        .bind(&quiz_ids)
        .bind(id)
        .fetch_all(&mut *tx)
        .await?;

        let rows = sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?
            .rows_affected();
        if rows == 0 {
            return Err(StoreError::NotFound("user"));
        }

        tx.commit().await?;
        Ok(CascadeReport {
            quiz_ids,
            result_user_ids,
        })
    }

    async fn set_user_avatar(&self, id: i64, avatar: Option<&str>) -> StoreResult<User> {
        let user = sqlx::query_as::<_, User>(
            r#"
            UPDATE users SET avatar = $2
            WHERE id = $1
            RETURNING id, username, email, avatar, created_at
            "#,
        )
        .bind(id)
        .bind(avatar)
        .fetch_optional(&self.pool)
        .await?;
        user.ok_or(StoreError::NotFound("user"))
    }

    async fn missing_users(&self, ids: &[i64]) -> StoreResult<Vec<i64>> {
        let missing: Vec<i64> = sqlx::query_scalar(
            r#"
            SELECT DISTINCT wanted.id FROM UNNEST($1::BIGINT[]) AS wanted(id)
            WHERE NOT EXISTS (SELECT 1 FROM users u WHERE u.id = wanted.id)
            ORDER BY wanted.id
            "#,
        )
        .bind(ids)
        .fetch_all(&self.pool)
        .await?;
        Ok(missing)
    }

    // ── Quizzes ──

    async fn create_quiz(&self, owner_id: i64, data: &QuizCreate) -> StoreResult<Quiz> {
        let now = now_millis();
        let quiz = sqlx::query_as::<_, Quiz>(&format!(
            r#"
            INSERT INTO quizzes (owner_id, title, description, tags, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $5)
            RETURNING {QUIZ_COLUMNS}
            "#
        ))
        .bind(owner_id)
        .bind(&data.title)
        .bind(&data.description)
        .bind(&data.tags)
        .bind(now)
        .fetch_one(&self.pool)
        .await?;
        Ok(quiz)
    }

    async fn get_quiz(&self, id: i64) -> StoreResult<Option<Quiz>> {
        let quiz =
            sqlx::query_as::<_, Quiz>(&format!("SELECT {QUIZ_COLUMNS} FROM quizzes WHERE id = $1"))
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;
        Ok(quiz)
    }

    async fn list_quizzes_by_owner(&self, owner_id: i64) -> StoreResult<Vec<Quiz>> {
        let quizzes = sqlx::query_as::<_, Quiz>(&format!(
            "SELECT {QUIZ_COLUMNS} FROM quizzes WHERE owner_id = $1 ORDER BY id"
        ))
        .bind(owner_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(quizzes)
    }

    async fn list_quiz_ids(&self) -> StoreResult<Vec<i64>> {
        let ids = sqlx::query_scalar("SELECT id FROM quizzes ORDER BY id")
            .fetch_all(&self.pool)
            .await?;
        Ok(ids)
    }

    async fn update_quiz(&self, id: i64, data: &QuizUpdate) -> StoreResult<Quiz> {
        let quiz = sqlx::query_as::<_, Quiz>(&format!(
            r#"
            UPDATE quizzes SET
                title = COALESCE($2, title),
                description = COALESCE($3, description),
                tags = COALESCE($4, tags),
                updated_at = $5
            WHERE id = $1
            RETURNING {QUIZ_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(&data.title)
        .bind(&data.description)
        .bind(&data.tags)
        .bind(now_millis())
        .fetch_optional(&self.pool)
        .await?;
        quiz.ok_or(StoreError::NotFound("quiz"))
    }

    async fn delete_quiz(&self, id: i64) -> StoreResult<CascadeReport> {
        let mut tx = self.pool.begin().await?;

        let result_user_ids: Vec<i64> = sqlx::query_scalar(
            "SELECT DISTINCT user_id FROM quiz_results WHERE quiz_id = $1 ORDER BY user_id",
        )
        .bind(id)
        .fetch_all(&mut *tx)
        .await?;

        let rows = sqlx::query("DELETE FROM quizzes WHERE id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?
            .rows_affected();
        if rows == 0 {
            return Err(StoreError::NotFound("quiz"));
        }

        tx.commit().await?;
        Ok(CascadeReport {
            quiz_ids: vec![id],
            result_user_ids,
        })
    }

    // ── Questions ──

    async fn create_question(&self, quiz_id: i64, data: &QuestionCreate) -> StoreResult<Question> {
        let mut tx = self.pool.begin().await?;

        let next = Self::next_position(&mut tx, Parent::Quiz(quiz_id)).await?;
        let order_id = data.order_id.unwrap_or(next);

        let question = sqlx::query_as::<_, Question>(
            r#"
            INSERT INTO questions (quiz_id, order_id, title)
            VALUES ($1, $2, $3)
            RETURNING id, quiz_id, order_id, title, image
            "#,
        )
        .bind(quiz_id)
        .bind(order_id)
        .bind(&data.title)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(question)
    }

    async fn get_question(&self, id: i64) -> StoreResult<Option<Question>> {
        let question = sqlx::query_as::<_, Question>(
            "SELECT id, quiz_id, order_id, title, image FROM questions WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(question)
    }

    async fn list_questions(&self, quiz_id: i64) -> StoreResult<Vec<Question>> {
        let questions = sqlx::query_as::<_, Question>(
            r#"
            SELECT id, quiz_id, order_id, title, image FROM questions
            WHERE quiz_id = $1
            ORDER BY order_id, id
            "#,
        )
        .bind(quiz_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(questions)
    }

    async fn count_questions(&self, quiz_id: i64) -> StoreResult<i64> {
        let count = sqlx::query_scalar("SELECT COUNT(*) FROM questions WHERE quiz_id = $1")
            .bind(quiz_id)
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    async fn update_question(&self, id: i64, data: &QuestionUpdate) -> StoreResult<Question> {
        let question = sqlx::query_as::<_, Question>(
            r#"
            UPDATE questions SET title = COALESCE($2, title)
            WHERE id = $1
            RETURNING id, quiz_id, order_id, title, image
            "#,
        )
        .bind(id)
        .bind(&data.title)
        .fetch_optional(&self.pool)
        .await?;
        question.ok_or(StoreError::NotFound("question"))
    }

    async fn set_question_image(&self, id: i64, image: Option<&str>) -> StoreResult<Question> {
        let question = sqlx::query_as::<_, Question>(
            r#"
            UPDATE questions SET image = $2
            WHERE id = $1
            RETURNING id, quiz_id, order_id, title, image
            "#,
        )
        .bind(id)
        .bind(image)
        .fetch_optional(&self.pool)
        .await?;
        question.ok_or(StoreError::NotFound("question"))
    }

    async fn delete_question(&self, id: i64) -> StoreResult<()> {
        let rows = sqlx::query("DELETE FROM questions WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?
            .rows_affected();
        if rows == 0 {
            return Err(StoreError::NotFound("question"));
        }
        Ok(())
    }

    // ── Answers ──

    async fn create_answer(&self, question_id: i64, data: &AnswerCreate) -> StoreResult<Answer> {
        let mut tx = self.pool.begin().await?;

        let next = Self::next_position(&mut tx, Parent::Question(question_id)).await?;
        let order_id = data.order_id.unwrap_or(next);

        let answer = sqlx::query_as::<_, Answer>(
            r#"
            INSERT INTO answers (question_id, order_id, text, is_correct)
            VALUES ($1, $2, $3, $4)
            RETURNING id, question_id, order_id, text, is_correct
            "#,
        )
        .bind(question_id)
        .bind(order_id)
        .bind(&data.text)
        .bind(data.is_correct)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(answer)
    }

    async fn get_answer(&self, id: i64) -> StoreResult<Option<Answer>> {
        let answer = sqlx::query_as::<_, Answer>(
            "SELECT id, question_id, order_id, text, is_correct FROM answers WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(answer)
    }

    async fn list_answers_for_quiz(&self, quiz_id: i64) -> StoreResult<Vec<Answer>> {
        let answers = sqlx::query_as::<_, Answer>(
            r#"
            SELECT a.id, a.question_id, a.order_id, a.text, a.is_correct
            FROM answers a
            JOIN questions q ON q.id = a.question_id
            WHERE q.quiz_id = $1
            ORDER BY a.question_id, a.order_id, a.id
            "#,
        )
        .bind(quiz_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(answers)
    }

    async fn update_answer(&self, id: i64, data: &AnswerUpdate) -> StoreResult<Answer> {
        let answer = sqlx::query_as::<_, Answer>(
            r#"
            UPDATE answers SET
                text = COALESCE($2, text),
                is_correct = COALESCE($3, is_correct)
            WHERE id = $1
            RETURNING id, question_id, order_id, text, is_correct
            "#,
        )
        .bind(id)
        .bind(&data.text)
        .bind(data.is_correct)
        .fetch_optional(&self.pool)
        .await?;
        answer.ok_or(StoreError::NotFound("answer"))
    }

    async fn delete_answer(&self, id: i64) -> StoreResult<()> {
        let rows = sqlx::query("DELETE FROM answers WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?
            .rows_affected();
        if rows == 0 {
            return Err(StoreError::NotFound("answer"));
        }
        Ok(())
    }

    // ── Ordering ──

    async fn child_positions(&self, parent: Parent) -> StoreResult<Vec<(i64, i32)>> {
        let sql = format!(
            "SELECT id, order_id FROM {} WHERE {} = $1 ORDER BY order_id, id",
            parent.child_table(),
            parent.parent_column()
        );
        let rows: Vec<(i64, i32)> = sqlx::query_as(&sql)
            .bind(parent.id())
            .fetch_all(&self.pool)
            .await?;
        Ok(rows)
    }

    async fn apply_order_change_set(
        &self,
        parent: Parent,
        set: &OrderChangeSet,
    ) -> StoreResult<()> {
        let sql = format!(
            "UPDATE {} SET order_id = $1 WHERE id = $2 AND {} = $3",
            parent.child_table(),
            parent.parent_column()
        );

        // Any failed statement drops `tx`, which rolls back every prior update.
        // The uniqueness of positions is checked at COMMIT (deferred constraint),
        // so swaps inside one set are allowed.
        let mut tx = self.pool.begin().await?;
        for item in &set.items {
            sqlx::query(&sql)
                .bind(item.order_id)
                .bind(item.id)
                .bind(parent.id())
                .execute(&mut *tx)
                .await?;
        }
        tx.commit().await?;
        Ok(())
    }

    // ── Results ──

    async fn save_results(
        &self,
        quiz_id: i64,
        scores: &[SessionScore],
    ) -> StoreResult<Vec<QuizResult>> {
        let now = now_millis();
        let mut tx = self.pool.begin().await?;
        let mut saved = Vec::with_capacity(scores.len());
        for score in scores {
            let result = sqlx::query_as::<_, QuizResult>(
                r#"
                INSERT INTO quiz_results (user_id, quiz_id, score, created_at)
                VALUES ($1, $2, $3, $4)
                RETURNING id, user_id, quiz_id, score, created_at
                "#,
            )
            .bind(score.user_id)
            .bind(quiz_id)
            .bind(score.score)
            .bind(now)
            .fetch_one(&mut *tx)
            .await?;
            saved.push(result);
        }
        tx.commit().await?;
        Ok(saved)
    }

    async fn list_results_by_user(&self, user_id: i64) -> StoreResult<Vec<QuizResult>> {
        let results = sqlx::query_as::<_, QuizResult>(
            r#"
            SELECT id, user_id, quiz_id, score, created_at FROM quiz_results
            WHERE user_id = $1
            ORDER BY created_at DESC, id DESC
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(results)
    }
}
