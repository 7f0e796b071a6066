//! Quiz session engine.
//!
//! DESIGN
//! ======
//! A `QuizSession` walks `Loading → InProgress → Completed`. Loading shuffles
//! each question's four answers; every answer commits immediately, at most
//! once per question, and moves the running score by the session's
//! [`ScoringRule`]. Completion is a set-membership check on answered question
//! ids taken after the answer is recorded, so the last answer always
//! completes the session.
//!
//! The engine is pure: no I/O, no clock. Callers own persistence of the
//! final score (see `services::play`).

pub mod scoring;
pub mod shuffle;

use std::collections::HashMap;

use rand::Rng;
use serde::Serialize;
use uuid::Uuid;

pub use scoring::ScoringRule;
pub use shuffle::shuffle_options;

/// Every question carries exactly this many incorrect answers.
pub const INCORRECT_ANSWER_COUNT: usize = 3;

// =============================================================================
// ANSWER SETS
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AnswerSetError {
    #[error("question text is required")]
    EmptyQuestion,
    #[error("answers must not be empty")]
    EmptyAnswer,
    #[error("expected 3 incorrect answers, got {0}")]
    IncorrectCount(usize),
    #[error("duplicate answer option: {0}")]
    DuplicateOption(String),
}

/// Check the one-correct-three-incorrect invariant. Options must be
/// non-blank and pairwise distinct so a selected string identifies exactly
/// one option.
///
/// # Errors
///
/// Returns the first violated rule.
pub fn validate_answer_set(correct: &str, incorrect: &[String]) -> Result<(), AnswerSetError> {
    if incorrect.len() != INCORRECT_ANSWER_COUNT {
        return Err(AnswerSetError::IncorrectCount(incorrect.len()));
    }
    if correct.trim().is_empty() || incorrect.iter().any(|a| a.trim().is_empty()) {
        return Err(AnswerSetError::EmptyAnswer);
    }
    let mut seen: Vec<&str> = Vec::with_capacity(INCORRECT_ANSWER_COUNT + 1);
    for option in std::iter::once(correct).chain(incorrect.iter().map(String::as_str)) {
        if seen.contains(&option) {
            return Err(AnswerSetError::DuplicateOption(option.to_owned()));
        }
        seen.push(option);
    }
    Ok(())
}

// =============================================================================
// TYPES
// =============================================================================

/// A stored question as handed to the engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuestionSpec {
    pub id: Uuid,
    pub question: String,
    pub correct_answer: String,
    pub incorrect_answers: Vec<String>,
    pub image_url: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Loading,
    InProgress,
    Completed,
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Loading => "loading",
            Self::InProgress => "in_progress",
            Self::Completed => "completed",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SessionError {
    #[error("quiz has no questions")]
    NoQuestions,
    #[error("session is {actual}, expected {expected}")]
    WrongPhase { expected: Phase, actual: Phase },
    #[error("duplicate question id: {0}")]
    DuplicateQuestion(Uuid),
    #[error("question {id} is malformed: {source}")]
    InvalidQuestion { id: Uuid, source: AnswerSetError },
    #[error("unknown question: {0}")]
    UnknownQuestion(Uuid),
    #[error("option is not one of the choices for question {0}")]
    InvalidOption(Uuid),
    #[error("question {0} already answered")]
    AlreadyAnswered(Uuid),
}

/// A loaded question with its shuffled options.
#[derive(Debug, Clone)]
pub struct PlayQuestion {
    id: Uuid,
    question: String,
    image_url: Option<String>,
    options: Vec<String>,
    correct_answer: String,
}

impl PlayQuestion {
    #[must_use]
    pub fn id(&self) -> Uuid {
        self.id
    }

    #[cfg(test)]
    #[must_use]
    pub fn options(&self) -> &[String] {
        &self.options
    }

    #[cfg(test)]
    #[must_use]
    pub fn correct_answer(&self) -> &str {
        &self.correct_answer
    }

    /// Client-facing view. Never includes the correct answer.
    #[must_use]
    pub fn card(&self) -> QuestionCard {
        QuestionCard {
            id: self.id,
            question: self.question.clone(),
            image_url: self.image_url.clone(),
            options: self.options.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QuestionCard {
    pub id: Uuid,
    pub question: String,
    pub image_url: Option<String>,
    pub options: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RecordedAnswer {
    pub option: String,
    pub correct: bool,
}

/// Result of one accepted answer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AnswerOutcome {
    pub question_id: Uuid,
    pub correct: bool,
    pub correct_answer: String,
    pub delta: i64,
    pub score: i64,
    pub answered: usize,
    pub total: usize,
    pub completed: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QuizSummary {
    pub phase: Phase,
    pub rule: ScoringRule,
    pub correct: usize,
    pub incorrect: usize,
    pub unattempted: usize,
    pub total: usize,
    pub score: i64,
    pub display: String,
}

// =============================================================================
// SESSION
// =============================================================================

#[derive(Debug, Clone)]
pub struct QuizSession {
    rule: ScoringRule,
    phase: Phase,
    questions: Vec<PlayQuestion>,
    index: HashMap<Uuid, usize>,
    answers: HashMap<Uuid, RecordedAnswer>,
    score: i64,
}

impl QuizSession {
    #[must_use]
    pub fn new(rule: ScoringRule) -> Self {
        Self {
            rule,
            phase: Phase::Loading,
            questions: Vec::new(),
            index: HashMap::new(),
            answers: HashMap::new(),
            score: 0,
        }
    }

    /// Install the fetched questions, shuffling each one's options, and move
    /// to `InProgress`.
    ///
    /// # Errors
    ///
    /// Fails if the session is not loading, the list is empty, a question id
    /// repeats, or a question breaks the answer-set invariant. On error the
    /// session stays in `Loading`.
    pub fn load<R: Rng + ?Sized>(&mut self, questions: Vec<QuestionSpec>, rng: &mut R) -> Result<(), SessionError> {
        self.expect_phase(Phase::Loading)?;
        if questions.is_empty() {
            return Err(SessionError::NoQuestions);
        }

        let mut loaded = Vec::with_capacity(questions.len());
        let mut index = HashMap::with_capacity(questions.len());
        for spec in questions {
            validate_answer_set(&spec.correct_answer, &spec.incorrect_answers)
                .map_err(|source| SessionError::InvalidQuestion { id: spec.id, source })?;
            if index.insert(spec.id, loaded.len()).is_some() {
                return Err(SessionError::DuplicateQuestion(spec.id));
            }
            let options = shuffle_options(&spec.correct_answer, &spec.incorrect_answers, rng);
            loaded.push(PlayQuestion {
                id: spec.id,
                question: spec.question,
                image_url: spec.image_url,
                options,
                correct_answer: spec.correct_answer,
            });
        }

        self.questions = loaded;
        self.index = index;
        self.phase = Phase::InProgress;
        Ok(())
    }

    /// Record an answer. Commits immediately; a question accepts one answer.
    ///
    /// # Errors
    ///
    /// Fails outside `InProgress`, for unknown questions, for options that
    /// are not among the question's choices, and for already-answered
    /// questions. A rejected answer leaves the session untouched.
    pub fn answer(&mut self, question_id: Uuid, option: &str) -> Result<AnswerOutcome, SessionError> {
        self.expect_phase(Phase::InProgress)?;
        let Some(&position) = self.index.get(&question_id) else {
            return Err(SessionError::UnknownQuestion(question_id));
        };
        if self.answers.contains_key(&question_id) {
            return Err(SessionError::AlreadyAnswered(question_id));
        }
        let question = &self.questions[position];
        if !question.options.iter().any(|o| o == option) {
            return Err(SessionError::InvalidOption(question_id));
        }

        let correct = option == question.correct_answer;
        let correct_answer = question.correct_answer.clone();
        let delta = self.rule.delta(correct);
        self.answers
            .insert(question_id, RecordedAnswer { option: option.to_owned(), correct });
        self.score += delta;

        if self.answers.len() == self.questions.len() {
            self.phase = Phase::Completed;
        }

        Ok(AnswerOutcome {
            question_id,
            correct,
            correct_answer,
            delta,
            score: self.score,
            answered: self.answers.len(),
            total: self.questions.len(),
            completed: self.phase == Phase::Completed,
        })
    }

    fn expect_phase(&self, expected: Phase) -> Result<(), SessionError> {
        if self.phase == expected {
            Ok(())
        } else {
            Err(SessionError::WrongPhase { expected, actual: self.phase })
        }
    }

    #[must_use]
    pub fn phase(&self) -> Phase {
        self.phase
    }

    #[must_use]
    pub fn score(&self) -> i64 {
        self.score
    }

    #[cfg(test)]
    #[must_use]
    pub fn is_completed(&self) -> bool {
        self.phase == Phase::Completed
    }

    #[must_use]
    pub fn questions(&self) -> &[PlayQuestion] {
        &self.questions
    }

    #[must_use]
    pub fn cards(&self) -> Vec<QuestionCard> {
        self.questions.iter().map(PlayQuestion::card).collect()
    }

    #[cfg(test)]
    #[must_use]
    pub fn question_count(&self) -> usize {
        self.questions.len()
    }

    #[cfg(test)]
    #[must_use]
    pub fn answered_count(&self) -> usize {
        self.answers.len()
    }

    #[must_use]
    pub fn recorded_answer(&self, question_id: Uuid) -> Option<&RecordedAnswer> {
        self.answers.get(&question_id)
    }

    #[must_use]
    pub fn summary(&self) -> QuizSummary {
        let correct = self.answers.values().filter(|a| a.correct).count();
        let incorrect = self.answers.len() - correct;
        let total = self.questions.len();
        QuizSummary {
            phase: self.phase,
            rule: self.rule,
            correct,
            incorrect,
            unattempted: total - self.answers.len(),
            total,
            score: self.score,
            display: self.rule.display(self.score, total),
        }
    }
}

#[cfg(test)]
#[path = "mod_test.rs"]
mod tests;
