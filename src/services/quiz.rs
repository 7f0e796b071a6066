//! Quiz authoring: quizzes and their questions.
//!
//! Teachers create quizzes; only the owner edits a quiz or touches its
//! questions. Every question write re-checks the one-correct-three-incorrect
//! rule from [`crate::quiz::validate_answer_set`], and the table carries a
//! matching `CHECK` constraint. Players never read questions from here: the
//! play service turns them into shuffled cards without answers.

use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::quiz::{AnswerSetError, QuestionSpec, validate_answer_set};
use crate::services::Ownership;
use crate::services::session::SessionUser;
use crate::services::storage::{ObjectKey, ObjectStore};
use crate::validate::{self, ValidationError};

const QUESTION_IMAGE_CATEGORY: &str = "images/questions";

#[derive(Debug, thiserror::Error)]
pub enum QuizError {
    #[error("quiz not found: {0}")]
    NotFound(Uuid),
    #[error("question not found: {0}")]
    QuestionNotFound(Uuid),
    #[error("only the quiz owner may do that")]
    Forbidden,
    #[error("only teachers can create quizzes")]
    TeachersOnly,
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    InvalidAnswers(#[from] AnswerSetError),
    #[error("database error: {0}")]
    Db(#[from] sqlx::Error),
}

impl crate::frame::ErrorCode for QuizError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::NotFound(_) => "E_QUIZ_NOT_FOUND",
            Self::QuestionNotFound(_) => "E_QUESTION_NOT_FOUND",
            Self::Forbidden | Self::TeachersOnly => "E_FORBIDDEN",
            Self::Validation(_) | Self::InvalidAnswers(_) => "E_VALIDATION",
            Self::Db(_) => "E_DATABASE",
        }
    }
}

// =============================================================================
// TYPES
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, sqlx::FromRow)]
pub struct Quiz {
    pub id: Uuid,
    pub title: String,
    pub description: String,
    pub user_id: Uuid,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, sqlx::FromRow)]
pub struct QuizListing {
    #[sqlx(flatten)]
    #[serde(flatten)]
    pub quiz: Quiz,
    pub question_count: i64,
}

/// Authoring view of a question, answers included.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, sqlx::FromRow)]
pub struct Question {
    pub id: Uuid,
    pub quiz_id: Uuid,
    pub question: String,
    pub correct_answer: String,
    pub incorrect_answers: Vec<String>,
    pub image_url: Option<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

impl From<Question> for QuestionSpec {
    fn from(q: Question) -> Self {
        Self {
            id: q.id,
            question: q.question,
            correct_answer: q.correct_answer,
            incorrect_answers: q.incorrect_answers,
            image_url: q.image_url,
        }
    }
}

const QUIZ_COLUMNS: &str = "id, title, description, user_id, created_at";
const QUESTION_COLUMNS: &str = "id, quiz_id, question, correct_answer, incorrect_answers, image_url, created_at";

#[derive(Debug, Clone, Deserialize)]
pub struct QuizDraft {
    pub title: String,
    pub description: String,
}

impl QuizDraft {
    /// # Errors
    ///
    /// Both fields are required.
    pub fn validate(&self) -> Result<Self, ValidationError> {
        Ok(Self {
            title: validate::required("title", &self.title)?,
            description: validate::required("description", &self.description)?,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct QuestionDraft {
    pub question: String,
    pub correct_answer: String,
    pub incorrect_answers: Vec<String>,
}

impl QuestionDraft {
    /// Trim every string and enforce the answer-set rule.
    ///
    /// # Errors
    ///
    /// `EmptyQuestion`, or whatever [`validate_answer_set`] rejects.
    pub fn validate(&self) -> Result<Self, AnswerSetError> {
        let question = self.question.trim();
        if question.is_empty() {
            return Err(AnswerSetError::EmptyQuestion);
        }
        let correct_answer = self.correct_answer.trim().to_owned();
        let incorrect_answers: Vec<String> = self.incorrect_answers.iter().map(|a| a.trim().to_owned()).collect();
        validate_answer_set(&correct_answer, &incorrect_answers)?;
        Ok(Self { question: question.to_owned(), correct_answer, incorrect_answers })
    }
}

#[must_use]
pub fn question_image_key(quiz_id: Uuid, question_id: Uuid) -> ObjectKey {
    ObjectKey::paired(QUESTION_IMAGE_CATEGORY, quiz_id, question_id)
}

// =============================================================================
// QUIZZES
// =============================================================================

/// Fail unless `user_id` owns the quiz.
///
/// # Errors
///
/// `NotFound` or `Forbidden`.
pub async fn ensure_owner(pool: &PgPool, quiz_id: Uuid, user_id: Uuid) -> Result<(), QuizError> {
    Ownership::check(pool, "quizzes", quiz_id, user_id)
        .await?
        .require(QuizError::Forbidden, QuizError::NotFound)
}

/// # Errors
///
/// `TeachersOnly` or validation errors.
pub async fn create_quiz(pool: &PgPool, author: &SessionUser, draft: &QuizDraft) -> Result<Quiz, QuizError> {
    if !author.is_teacher() {
        return Err(QuizError::TeachersOnly);
    }
    let draft = draft.validate()?;
    let quiz = sqlx::query_as::<_, Quiz>(&format!(
        "INSERT INTO quizzes (id, title, description, user_id) VALUES ($1, $2, $3, $4) RETURNING {QUIZ_COLUMNS}"
    ))
    .bind(Uuid::new_v4())
    .bind(&draft.title)
    .bind(&draft.description)
    .bind(author.id)
    .fetch_one(pool)
    .await?;
    Ok(quiz)
}

/// Every quiz with its question count, newest first.
///
/// # Errors
///
/// Returns a database error if the query fails.
pub async fn list_quizzes(pool: &PgPool) -> Result<Vec<QuizListing>, QuizError> {
    let rows = sqlx::query_as::<_, QuizListing>(
        "SELECT q.id, q.title, q.description, q.user_id, q.created_at,
                (SELECT COUNT(*) FROM questions qs WHERE qs.quiz_id = q.id) AS question_count
         FROM quizzes q
         ORDER BY q.created_at DESC, q.id ASC",
    )
    .fetch_all(pool)
    .await?;
    Ok(rows)
}

/// # Errors
///
/// `NotFound` if missing.
pub async fn get_quiz(pool: &PgPool, quiz_id: Uuid) -> Result<Quiz, QuizError> {
    sqlx::query_as::<_, Quiz>(&format!("SELECT {QUIZ_COLUMNS} FROM quizzes WHERE id = $1"))
        .bind(quiz_id)
        .fetch_optional(pool)
        .await?
        .ok_or(QuizError::NotFound(quiz_id))
}

/// # Errors
///
/// Validation, `NotFound` or `Forbidden`.
pub async fn update_quiz(pool: &PgPool, quiz_id: Uuid, user_id: Uuid, draft: &QuizDraft) -> Result<Quiz, QuizError> {
    let draft = draft.validate()?;
    ensure_owner(pool, quiz_id, user_id).await?;
    sqlx::query_as::<_, Quiz>(&format!(
        "UPDATE quizzes SET title = $2, description = $3 WHERE id = $1 RETURNING {QUIZ_COLUMNS}"
    ))
    .bind(quiz_id)
    .bind(&draft.title)
    .bind(&draft.description)
    .fetch_optional(pool)
    .await?
    .ok_or(QuizError::NotFound(quiz_id))
}

/// Delete a quiz, its questions (cascade), and their stored images.
///
/// # Errors
///
/// `NotFound`, `Forbidden`, or the database failure. Image cleanup failures
/// are logged and do not fail the delete.
pub async fn delete_quiz(pool: &PgPool, store: &dyn ObjectStore, quiz_id: Uuid, user_id: Uuid) -> Result<(), QuizError> {
    ensure_owner(pool, quiz_id, user_id).await?;
    let with_images: Vec<Uuid> =
        sqlx::query_scalar("SELECT id FROM questions WHERE quiz_id = $1 AND image_url IS NOT NULL")
            .bind(quiz_id)
            .fetch_all(pool)
            .await?;

    sqlx::query("DELETE FROM quizzes WHERE id = $1")
        .bind(quiz_id)
        .execute(pool)
        .await?;

    for question_id in with_images {
        discard_question_image(store, quiz_id, question_id).await;
    }
    Ok(())
}

/// Remove a deleted question's image. Failures are logged, not returned:
/// the row is already gone and the caller's delete has succeeded.
async fn discard_question_image(store: &dyn ObjectStore, quiz_id: Uuid, question_id: Uuid) -> bool {
    let key = question_image_key(quiz_id, question_id);
    match store.delete(&key).await {
        Ok(()) => true,
        Err(e) => {
            tracing::warn!(%quiz_id, %question_id, key = %key, error = %e, "quiz: image cleanup failed");
            false
        }
    }
}

// =============================================================================
// QUESTIONS
// =============================================================================

/// Owner view of a quiz's questions in insertion order.
///
/// # Errors
///
/// `NotFound` or `Forbidden`.
pub async fn list_questions(pool: &PgPool, quiz_id: Uuid, user_id: Uuid) -> Result<Vec<Question>, QuizError> {
    ensure_owner(pool, quiz_id, user_id).await?;
    Ok(fetch_questions(pool, quiz_id).await?)
}

async fn fetch_questions(pool: &PgPool, quiz_id: Uuid) -> Result<Vec<Question>, sqlx::Error> {
    sqlx::query_as::<_, Question>(&format!(
        "SELECT {QUESTION_COLUMNS} FROM questions WHERE quiz_id = $1 ORDER BY created_at ASC, id ASC"
    ))
    .bind(quiz_id)
    .fetch_all(pool)
    .await
}

/// Quiz questions as engine input for a play session.
///
/// # Errors
///
/// `NotFound` if the quiz does not exist.
pub async fn load_question_specs(pool: &PgPool, quiz_id: Uuid) -> Result<(Quiz, Vec<QuestionSpec>), QuizError> {
    let quiz = get_quiz(pool, quiz_id).await?;
    let questions = fetch_questions(pool, quiz_id).await?;
    Ok((quiz, questions.into_iter().map(QuestionSpec::from).collect()))
}

/// # Errors
///
/// `NotFound`, `Forbidden`, or an invalid answer set.
pub async fn add_question(
    pool: &PgPool,
    quiz_id: Uuid,
    user_id: Uuid,
    draft: &QuestionDraft,
) -> Result<Question, QuizError> {
    let draft = draft.validate()?;
    ensure_owner(pool, quiz_id, user_id).await?;
    let question = sqlx::query_as::<_, Question>(&format!(
        "INSERT INTO questions (id, quiz_id, question, correct_answer, incorrect_answers)
         VALUES ($1, $2, $3, $4, $5)
         RETURNING {QUESTION_COLUMNS}"
    ))
    .bind(Uuid::new_v4())
    .bind(quiz_id)
    .bind(&draft.question)
    .bind(&draft.correct_answer)
    .bind(&draft.incorrect_answers)
    .fetch_one(pool)
    .await?;
    Ok(question)
}

/// # Errors
///
/// `NotFound`, `Forbidden`, `QuestionNotFound`.
pub async fn get_question(pool: &PgPool, quiz_id: Uuid, question_id: Uuid, user_id: Uuid) -> Result<Question, QuizError> {
    ensure_owner(pool, quiz_id, user_id).await?;
    sqlx::query_as::<_, Question>(&format!(
        "SELECT {QUESTION_COLUMNS} FROM questions WHERE id = $1 AND quiz_id = $2"
    ))
    .bind(question_id)
    .bind(quiz_id)
    .fetch_optional(pool)
    .await?
    .ok_or(QuizError::QuestionNotFound(question_id))
}

/// Replace prompt and answers. The image is left alone.
///
/// # Errors
///
/// `NotFound`, `Forbidden`, `QuestionNotFound`, or an invalid answer set.
pub async fn update_question(
    pool: &PgPool,
    quiz_id: Uuid,
    question_id: Uuid,
    user_id: Uuid,
    draft: &QuestionDraft,
) -> Result<Question, QuizError> {
    let draft = draft.validate()?;
    ensure_owner(pool, quiz_id, user_id).await?;
    sqlx::query_as::<_, Question>(&format!(
        "UPDATE questions SET question = $3, correct_answer = $4, incorrect_answers = $5
         WHERE id = $1 AND quiz_id = $2
         RETURNING {QUESTION_COLUMNS}"
    ))
    .bind(question_id)
    .bind(quiz_id)
    .bind(&draft.question)
    .bind(&draft.correct_answer)
    .bind(&draft.incorrect_answers)
    .fetch_optional(pool)
    .await?
    .ok_or(QuizError::QuestionNotFound(question_id))
}

/// Point a question at its uploaded image.
///
/// # Errors
///
/// `QuestionNotFound` if the question vanished during upload.
pub async fn set_question_image(
    pool: &PgPool,
    quiz_id: Uuid,
    question_id: Uuid,
    image_url: &str,
) -> Result<Question, QuizError> {
    sqlx::query_as::<_, Question>(&format!(
        "UPDATE questions SET image_url = $3 WHERE id = $1 AND quiz_id = $2 RETURNING {QUESTION_COLUMNS}"
    ))
    .bind(question_id)
    .bind(quiz_id)
    .bind(image_url)
    .fetch_optional(pool)
    .await?
    .ok_or(QuizError::QuestionNotFound(question_id))
}

/// Delete a question, then its image if it had one.
///
/// # Errors
///
/// `NotFound`, `Forbidden`, `QuestionNotFound`.
pub async fn delete_question(
    pool: &PgPool,
    store: &dyn ObjectStore,
    quiz_id: Uuid,
    question_id: Uuid,
    user_id: Uuid,
) -> Result<(), QuizError> {
    ensure_owner(pool, quiz_id, user_id).await?;
    let image: Option<Option<String>> =
        sqlx::query_scalar("DELETE FROM questions WHERE id = $1 AND quiz_id = $2 RETURNING image_url")
            .bind(question_id)
            .bind(quiz_id)
            .fetch_optional(pool)
            .await?;
    match image {
        None => Err(QuizError::QuestionNotFound(question_id)),
        Some(None) => Ok(()),
        Some(Some(_)) => {
            discard_question_image(store, quiz_id, question_id).await;
            Ok(())
        }
    }
}

#[cfg(test)]
#[path = "quiz_test.rs"]
mod tests;
