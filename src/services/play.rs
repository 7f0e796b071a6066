//! Quiz play sessions.
//!
//! DESIGN
//! ======
//! Sessions live in memory, keyed by a random session id and owned by the
//! user who started them. Each entry carries its own `Mutex` so answers to
//! different sessions never contend; the registry map is only write-locked
//! to insert or remove entries.
//!
//! SCORE PERSISTENCE
//! =================
//! The engine reports completion exactly once (the answer that fills the
//! last slot). That answer triggers one atomic increment of the user's
//! stored score through a [`ScoreLedger`]. A failed write is remembered and
//! retried only when the player calls `finish`; a written score is never
//! written again.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use serde::Serialize;
use sqlx::PgPool;
use tokio::sync::{Mutex, RwLock};
use tokio::task::JoinHandle;
use uuid::Uuid;

use crate::quiz::{AnswerOutcome, Phase, QuestionCard, QuizSession, QuizSummary, RecordedAnswer, ScoringRule, SessionError};
use crate::services::quiz::{self, QuizError};
use crate::services::user::{self, UserError};

const SWEEP_INTERVAL_CAP: Duration = Duration::from_secs(60);

#[derive(Debug, thiserror::Error)]
pub enum PlayError {
    #[error("play session not found: {0}")]
    NotFound(Uuid),
    #[error("play session belongs to another user")]
    Forbidden,
    #[error(transparent)]
    Quiz(#[from] QuizError),
    #[error(transparent)]
    Session(#[from] SessionError),
    #[error("score write failed: {0}")]
    Score(#[from] UserError),
}

impl crate::frame::ErrorCode for PlayError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::NotFound(_) => "E_PLAY_NOT_FOUND",
            Self::Forbidden => "E_FORBIDDEN",
            Self::Quiz(e) => crate::frame::ErrorCode::error_code(e),
            Self::Session(e) => match e {
                SessionError::NoQuestions | SessionError::InvalidQuestion { .. } | SessionError::DuplicateQuestion(_) => {
                    "E_QUIZ_NOT_PLAYABLE"
                }
                SessionError::UnknownQuestion(_) => "E_QUESTION_NOT_FOUND",
                SessionError::InvalidOption(_) => "E_VALIDATION",
                SessionError::AlreadyAnswered(_) => "E_ALREADY_ANSWERED",
                SessionError::WrongPhase { .. } => "E_WRONG_PHASE",
            },
            Self::Score(_) => "E_SCORE_WRITE",
        }
    }

    fn retryable(&self) -> bool {
        matches!(self, Self::Score(_))
    }
}

// =============================================================================
// SCORE LEDGER
// =============================================================================

/// Where completed session scores are added.
#[async_trait]
pub trait ScoreLedger: Send + Sync {
    /// Add `delta` and return the user's new total.
    async fn add(&self, user_id: Uuid, delta: i64) -> Result<i64, UserError>;
}

#[async_trait]
impl ScoreLedger for PgPool {
    async fn add(&self, user_id: Uuid, delta: i64) -> Result<i64, UserError> {
        user::add_score(self, user_id, delta).await
    }
}

// =============================================================================
// TYPES
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ScoreWrite {
    Pending,
    Written { total: i64 },
    Failed,
}

struct Progress {
    session: QuizSession,
    score_write: ScoreWrite,
}

struct PlayEntry {
    owner: Uuid,
    quiz_id: Uuid,
    title: String,
    started_at: Instant,
    progress: Mutex<Progress>,
}

/// Everything a player needs to render a session. Never carries answers
/// the player has not earned.
#[derive(Debug, Clone, Serialize)]
pub struct PlayView {
    pub session_id: Uuid,
    pub quiz_id: Uuid,
    pub title: String,
    pub phase: Phase,
    pub cards: Vec<QuestionCard>,
    pub answers: HashMap<Uuid, RecordedAnswer>,
    pub summary: QuizSummary,
}

#[derive(Debug, Clone, Serialize)]
pub struct AnswerReply {
    #[serde(flatten)]
    pub outcome: AnswerOutcome,
    /// The user's stored total once this answer completed the quiz.
    pub total_score: Option<i64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct FinishReply {
    pub summary: QuizSummary,
    pub total_score: i64,
}

// =============================================================================
// REGISTRY
// =============================================================================

#[derive(Clone, Default)]
pub struct PlayRegistry {
    sessions: Arc<RwLock<HashMap<Uuid, Arc<PlayEntry>>>>,
}

impl PlayRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of sessions currently held.
    pub async fn active(&self) -> usize {
        self.sessions.read().await.len()
    }

    /// Register a loaded session for `owner`.
    pub async fn open(&self, owner: Uuid, quiz_id: Uuid, title: String, session: QuizSession) -> PlayView {
        let session_id = Uuid::new_v4();
        let view = render(session_id, quiz_id, &title, &session);
        let entry = PlayEntry {
            owner,
            quiz_id,
            title,
            started_at: Instant::now(),
            progress: Mutex::new(Progress { session, score_write: ScoreWrite::Pending }),
        };
        self.sessions.write().await.insert(session_id, Arc::new(entry));
        view
    }

    async fn entry(&self, session_id: Uuid, user_id: Uuid) -> Result<Arc<PlayEntry>, PlayError> {
        let entry = self
            .sessions
            .read()
            .await
            .get(&session_id)
            .cloned()
            .ok_or(PlayError::NotFound(session_id))?;
        if entry.owner != user_id {
            return Err(PlayError::Forbidden);
        }
        Ok(entry)
    }

    /// Record one answer. The answer that completes the quiz also writes the
    /// session score. If that write fails the answer still stands, the
    /// `Score` error is returned, and `finish` retries the write.
    ///
    /// # Errors
    ///
    /// `NotFound`, `Forbidden`, the engine's rejection, or `Score` when the
    /// completing answer could not be credited.
    pub async fn answer(
        &self,
        ledger: &dyn ScoreLedger,
        session_id: Uuid,
        user_id: Uuid,
        question_id: Uuid,
        option: &str,
    ) -> Result<AnswerReply, PlayError> {
        let entry = self.entry(session_id, user_id).await?;
        let mut progress = entry.progress.lock().await;
        let outcome = progress.session.answer(question_id, option)?;

        let total_score = if outcome.completed {
            tracing::info!(%session_id, %user_id, quiz_id = %entry.quiz_id, score = outcome.score, "play: completed");
            Some(settle(ledger, &entry, &mut progress).await?)
        } else {
            None
        };
        Ok(AnswerReply { outcome, total_score })
    }

    /// # Errors
    ///
    /// `NotFound` or `Forbidden`.
    pub async fn status(&self, session_id: Uuid, user_id: Uuid) -> Result<PlayView, PlayError> {
        let entry = self.entry(session_id, user_id).await?;
        let progress = entry.progress.lock().await;
        Ok(render(session_id, entry.quiz_id, &entry.title, &progress.session))
    }

    /// Summary plus the stored total. Repeating the call is harmless; a
    /// previously failed score write is retried here.
    ///
    /// # Errors
    ///
    /// `WrongPhase` before completion, `Score` if the retry fails again.
    pub async fn finish(&self, ledger: &dyn ScoreLedger, session_id: Uuid, user_id: Uuid) -> Result<FinishReply, PlayError> {
        let entry = self.entry(session_id, user_id).await?;
        let mut progress = entry.progress.lock().await;
        let phase = progress.session.phase();
        if phase != Phase::Completed {
            return Err(SessionError::WrongPhase { expected: Phase::Completed, actual: phase }.into());
        }
        let total_score = settle(ledger, &entry, &mut progress).await?;
        Ok(FinishReply { summary: progress.session.summary(), total_score })
    }

    /// Drop the session. The stored score is untouched.
    ///
    /// # Errors
    ///
    /// `NotFound` or `Forbidden`.
    pub async fn abandon(&self, session_id: Uuid, user_id: Uuid) -> Result<(), PlayError> {
        self.entry(session_id, user_id).await?;
        self.sessions.write().await.remove(&session_id);
        tracing::info!(%session_id, %user_id, "play: abandoned");
        Ok(())
    }

    /// Remove sessions started more than `ttl` ago. Returns how many went.
    pub async fn evict_older_than(&self, ttl: Duration) -> usize {
        let mut sessions = self.sessions.write().await;
        let before = sessions.len();
        sessions.retain(|_, entry| entry.started_at.elapsed() < ttl);
        before - sessions.len()
    }
}

async fn settle(ledger: &dyn ScoreLedger, entry: &PlayEntry, progress: &mut Progress) -> Result<i64, UserError> {
    if let ScoreWrite::Written { total } = progress.score_write {
        return Ok(total);
    }
    match ledger.add(entry.owner, progress.session.score()).await {
        Ok(total) => {
            progress.score_write = ScoreWrite::Written { total };
            Ok(total)
        }
        Err(e) => {
            tracing::error!(user_id = %entry.owner, quiz_id = %entry.quiz_id, error = %e, "play: score write failed");
            progress.score_write = ScoreWrite::Failed;
            Err(e)
        }
    }
}

fn render(session_id: Uuid, quiz_id: Uuid, title: &str, session: &QuizSession) -> PlayView {
    let answers = session
        .questions()
        .iter()
        .filter_map(|q| session.recorded_answer(q.id()).map(|a| (q.id(), a.clone())))
        .collect();
    PlayView {
        session_id,
        quiz_id,
        title: title.to_owned(),
        phase: session.phase(),
        cards: session.cards(),
        answers,
        summary: session.summary(),
    }
}

// =============================================================================
// ENTRY POINTS
// =============================================================================

/// Fetch the quiz, shuffle its questions into a new session, and register it.
///
/// # Errors
///
/// `Quiz(NotFound)` for unknown quizzes, `Session(NoQuestions)` for empty ones.
pub async fn start(
    pool: &PgPool,
    plays: &PlayRegistry,
    rule: ScoringRule,
    user_id: Uuid,
    quiz_id: Uuid,
) -> Result<PlayView, PlayError> {
    let (quiz, specs) = quiz::load_question_specs(pool, quiz_id).await?;
    let mut session = QuizSession::new(rule);
    session.load(specs, &mut rand::rng())?;
    let view = plays.open(user_id, quiz.id, quiz.title, session).await;
    tracing::info!(session_id = %view.session_id, %user_id, %quiz_id, rule = rule.as_str(), "play: started");
    Ok(view)
}

/// Spawn the background task that evicts sessions older than `ttl`.
pub fn spawn_sweeper(plays: PlayRegistry, ttl: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(ttl.min(SWEEP_INTERVAL_CAP).max(Duration::from_secs(1)));
        loop {
            interval.tick().await;
            let evicted = plays.evict_older_than(ttl).await;
            if evicted > 0 {
                let active = plays.active().await;
                tracing::info!(evicted, active, "play: swept expired sessions");
            }
        }
    })
}

#[cfg(test)]
#[path = "play_test.rs"]
mod tests;
