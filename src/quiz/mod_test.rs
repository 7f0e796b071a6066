//! Tests for the quiz session engine.

use std::collections::HashSet;

use rand::SeedableRng;
use rand::rngs::StdRng;

use super::*;

fn spec(question: &str, correct: &str, incorrect: [&str; 3]) -> QuestionSpec {
    QuestionSpec {
        id: Uuid::new_v4(),
        question: question.to_owned(),
        correct_answer: correct.to_owned(),
        incorrect_answers: incorrect.iter().map(|s| (*s).to_owned()).collect(),
        image_url: None,
    }
}

fn three_questions() -> Vec<QuestionSpec> {
    vec![
        spec("2 + 2?", "4", ["3", "5", "22"]),
        spec("Capital of France?", "Paris", ["Lyon", "Nice", "Lille"]),
        spec("H2O is?", "Water", ["Salt", "Air", "Fire"]),
    ]
}

fn loaded(rule: ScoringRule, questions: Vec<QuestionSpec>) -> QuizSession {
    let mut session = QuizSession::new(rule);
    let mut rng = StdRng::seed_from_u64(7);
    session.load(questions, &mut rng).expect("load should succeed");
    session
}

fn wrong_option(session: &QuizSession, question_id: Uuid) -> String {
    let question = session
        .questions()
        .iter()
        .find(|q| q.id() == question_id)
        .expect("question should exist");
    question
        .options()
        .iter()
        .find(|o| o.as_str() != question.correct_answer())
        .expect("an incorrect option should exist")
        .clone()
}

// =============================================================================
// ANSWER SET VALIDATION
// =============================================================================

#[test]
fn answer_set_accepts_one_correct_three_incorrect() {
    let incorrect = vec!["b".to_owned(), "c".to_owned(), "d".to_owned()];
    assert_eq!(validate_answer_set("a", &incorrect), Ok(()));
}

#[test]
fn answer_set_rejects_wrong_incorrect_count() {
    let incorrect = vec!["b".to_owned(), "c".to_owned()];
    assert_eq!(validate_answer_set("a", &incorrect), Err(AnswerSetError::IncorrectCount(2)));
}

#[test]
fn answer_set_rejects_blank_answers() {
    let incorrect = vec!["b".to_owned(), "  ".to_owned(), "d".to_owned()];
    assert_eq!(validate_answer_set("a", &incorrect), Err(AnswerSetError::EmptyAnswer));
}

#[test]
fn answer_set_rejects_duplicate_options() {
    let incorrect = vec!["b".to_owned(), "a".to_owned(), "d".to_owned()];
    assert_eq!(
        validate_answer_set("a", &incorrect),
        Err(AnswerSetError::DuplicateOption("a".into()))
    );
}

// =============================================================================
// SHUFFLE
// =============================================================================

#[test]
fn shuffle_is_a_permutation_of_the_four_answers() {
    let incorrect = vec!["b".to_owned(), "c".to_owned(), "d".to_owned()];
    let mut rng = StdRng::seed_from_u64(42);
    for _ in 0..200 {
        let options = shuffle_options("a", &incorrect, &mut rng);
        assert_eq!(options.len(), 4);
        let set: HashSet<&str> = options.iter().map(String::as_str).collect();
        assert_eq!(set, HashSet::from(["a", "b", "c", "d"]));
    }
}

#[test]
fn correct_answer_position_is_roughly_uniform() {
    let incorrect = vec!["b".to_owned(), "c".to_owned(), "d".to_owned()];
    let mut rng = StdRng::seed_from_u64(2024);
    let trials = 8000;
    let mut counts = [0usize; 4];
    for _ in 0..trials {
        let options = shuffle_options("a", &incorrect, &mut rng);
        let pos = options.iter().position(|o| o == "a").expect("correct answer present");
        counts[pos] += 1;
    }
    // Expected 2000 per slot; the bound is far outside sampling noise.
    for count in counts {
        assert!((1700..=2300).contains(&count), "skewed distribution: {counts:?}");
    }
}

// =============================================================================
// PHASES
// =============================================================================

#[test]
fn new_session_is_loading() {
    let session = QuizSession::new(ScoringRule::Points);
    assert_eq!(session.phase(), Phase::Loading);
    assert_eq!(session.score(), 0);
}

#[test]
fn load_moves_to_in_progress_with_shuffled_cards() {
    let session = loaded(ScoringRule::Points, three_questions());
    assert_eq!(session.phase(), Phase::InProgress);
    assert_eq!(session.question_count(), 3);
    for card in session.cards() {
        assert_eq!(card.options.len(), 4);
    }
}

#[test]
fn load_rejects_empty_quiz_and_stays_loading() {
    let mut session = QuizSession::new(ScoringRule::Points);
    let mut rng = StdRng::seed_from_u64(1);
    assert_eq!(session.load(Vec::new(), &mut rng), Err(SessionError::NoQuestions));
    assert_eq!(session.phase(), Phase::Loading);
}

#[test]
fn load_rejects_malformed_question() {
    let mut bad = spec("?", "a", ["b", "c", "d"]);
    bad.incorrect_answers.pop();
    let bad_id = bad.id;
    let mut session = QuizSession::new(ScoringRule::Points);
    let mut rng = StdRng::seed_from_u64(1);
    let err = session.load(vec![bad], &mut rng).unwrap_err();
    assert_eq!(
        err,
        SessionError::InvalidQuestion { id: bad_id, source: AnswerSetError::IncorrectCount(2) }
    );
    assert_eq!(session.phase(), Phase::Loading);
}

#[test]
fn load_rejects_duplicate_question_ids() {
    let first = spec("a?", "a", ["b", "c", "d"]);
    let mut second = spec("b?", "w", ["x", "y", "z"]);
    second.id = first.id;
    let mut session = QuizSession::new(ScoringRule::Points);
    let mut rng = StdRng::seed_from_u64(1);
    assert_eq!(
        session.load(vec![first.clone(), second], &mut rng),
        Err(SessionError::DuplicateQuestion(first.id))
    );
}

#[test]
fn load_twice_is_rejected() {
    let mut session = loaded(ScoringRule::Points, three_questions());
    let mut rng = StdRng::seed_from_u64(1);
    assert_eq!(
        session.load(three_questions(), &mut rng),
        Err(SessionError::WrongPhase { expected: Phase::Loading, actual: Phase::InProgress })
    );
}

#[test]
fn answer_before_load_is_rejected() {
    let mut session = QuizSession::new(ScoringRule::Points);
    let err = session.answer(Uuid::new_v4(), "x").unwrap_err();
    assert_eq!(err, SessionError::WrongPhase { expected: Phase::InProgress, actual: Phase::Loading });
}

// =============================================================================
// SCORING
// =============================================================================

#[test]
fn points_scenario_correct_incorrect_correct_scores_80() {
    let questions = three_questions();
    let ids: Vec<Uuid> = questions.iter().map(|q| q.id).collect();
    let mut session = loaded(ScoringRule::Points, questions);

    let first = session.answer(ids[0], "4").unwrap();
    assert!(first.correct);
    assert_eq!(first.delta, 50);

    let wrong = wrong_option(&session, ids[1]);
    let second = session.answer(ids[1], &wrong).unwrap();
    assert!(!second.correct);
    assert_eq!(second.correct_answer, "Paris");
    assert_eq!(second.delta, -20);
    assert_eq!(second.score, 30);
    assert!(!second.completed);

    let third = session.answer(ids[2], "Water").unwrap();
    assert!(third.completed);
    assert_eq!(third.score, 80);
    assert_eq!(session.phase(), Phase::Completed);

    let summary = session.summary();
    assert_eq!(summary.correct, 2);
    assert_eq!(summary.incorrect, 1);
    assert_eq!(summary.unattempted, 0);
    assert_eq!(summary.display, "80 points");
}

#[test]
fn binary_scenario_scores_two_of_three() {
    let questions = three_questions();
    let ids: Vec<Uuid> = questions.iter().map(|q| q.id).collect();
    let mut session = loaded(ScoringRule::Binary, questions);

    session.answer(ids[0], "4").unwrap();
    let wrong = wrong_option(&session, ids[1]);
    session.answer(ids[1], &wrong).unwrap();
    let last = session.answer(ids[2], "Water").unwrap();

    assert!(last.completed);
    assert_eq!(session.score(), 2);
    assert_eq!(session.summary().display, "2/3");
}

#[test]
fn points_score_can_go_negative() {
    let questions = three_questions();
    let ids: Vec<Uuid> = questions.iter().map(|q| q.id).collect();
    let mut session = loaded(ScoringRule::Points, questions);
    for id in &ids {
        let wrong = wrong_option(&session, *id);
        session.answer(*id, &wrong).unwrap();
    }
    assert_eq!(session.score(), -60);
    assert!(session.is_completed());
}

#[test]
fn points_formula_holds_for_mixed_sequences() {
    let mut rng = StdRng::seed_from_u64(99);
    for pattern in 0u32..32 {
        let questions: Vec<QuestionSpec> = (0..5)
            .map(|i| spec(&format!("q{i}"), "right", ["w1", "w2", "w3"]))
            .collect();
        let ids: Vec<Uuid> = questions.iter().map(|q| q.id).collect();
        let mut session = QuizSession::new(ScoringRule::Points);
        session.load(questions, &mut rng).unwrap();

        let mut correct = 0i64;
        let mut incorrect = 0i64;
        for (bit, id) in ids.iter().enumerate() {
            if pattern & (1 << bit) == 0 {
                session.answer(*id, "right").unwrap();
                correct += 1;
            } else {
                session.answer(*id, "w2").unwrap();
                incorrect += 1;
            }
        }
        assert_eq!(session.score(), 50 * correct - 20 * incorrect);
    }
}

#[test]
fn binary_score_stays_within_bounds() {
    let questions: Vec<QuestionSpec> = (0..4)
        .map(|i| spec(&format!("q{i}"), "right", ["w1", "w2", "w3"]))
        .collect();
    let ids: Vec<Uuid> = questions.iter().map(|q| q.id).collect();
    let mut session = loaded(ScoringRule::Binary, questions);
    for (i, id) in ids.iter().enumerate() {
        let option = if i % 2 == 0 { "right" } else { "w1" };
        session.answer(*id, option).unwrap();
        let score = session.score();
        assert!(score >= 0 && score <= i64::try_from(ids.len()).unwrap());
    }
    assert_eq!(session.score(), 2);
}

// =============================================================================
// IDEMPOTENCE AND COMPLETION
// =============================================================================

#[test]
fn second_answer_to_same_question_is_rejected_without_side_effects() {
    let questions = three_questions();
    let ids: Vec<Uuid> = questions.iter().map(|q| q.id).collect();
    let mut session = loaded(ScoringRule::Points, questions);

    let wrong = wrong_option(&session, ids[0]);
    session.answer(ids[0], &wrong).unwrap();
    let before = session.score();

    assert_eq!(session.answer(ids[0], "4"), Err(SessionError::AlreadyAnswered(ids[0])));
    assert_eq!(session.score(), before);
    assert_eq!(session.answered_count(), 1);
    assert_eq!(session.recorded_answer(ids[0]).map(|a| a.option.as_str()), Some(wrong.as_str()));
}

#[test]
fn completion_only_after_every_question_answered() {
    let questions = three_questions();
    let ids: Vec<Uuid> = questions.iter().map(|q| q.id).collect();
    let mut session = loaded(ScoringRule::Binary, questions);

    assert!(!session.answer(ids[2], "Water").unwrap().completed);
    assert!(!session.answer(ids[0], "4").unwrap().completed);
    assert_eq!(session.phase(), Phase::InProgress);
    assert!(session.answer(ids[1], "Paris").unwrap().completed);
}

#[test]
fn single_question_quiz_completes_on_first_answer() {
    let question = spec("only?", "yes", ["no", "maybe", "never"]);
    let id = question.id;
    let mut session = loaded(ScoringRule::Points, vec![question]);
    let outcome = session.answer(id, "yes").unwrap();
    assert!(outcome.completed);
    assert_eq!(outcome.answered, 1);
    assert_eq!(outcome.total, 1);
}

#[test]
fn answers_after_completion_are_rejected() {
    let question = spec("only?", "yes", ["no", "maybe", "never"]);
    let id = question.id;
    let mut session = loaded(ScoringRule::Points, vec![question]);
    session.answer(id, "yes").unwrap();
    assert_eq!(
        session.answer(id, "no"),
        Err(SessionError::WrongPhase { expected: Phase::InProgress, actual: Phase::Completed })
    );
}

#[test]
fn unknown_question_and_foreign_option_are_rejected() {
    let questions = three_questions();
    let first = questions[0].id;
    let mut session = loaded(ScoringRule::Points, questions);

    let stranger = Uuid::new_v4();
    assert_eq!(session.answer(stranger, "4"), Err(SessionError::UnknownQuestion(stranger)));
    assert_eq!(session.answer(first, "Paris"), Err(SessionError::InvalidOption(first)));
    assert_eq!(session.answered_count(), 0);
}

#[test]
fn summary_counts_unattempted_questions() {
    let questions = three_questions();
    let first = questions[0].id;
    let mut session = loaded(ScoringRule::Points, questions);
    session.answer(first, "4").unwrap();

    let summary = session.summary();
    assert_eq!(summary.phase, Phase::InProgress);
    assert_eq!(summary.correct, 1);
    assert_eq!(summary.unattempted, 2);
    assert_eq!(summary.total, 3);
}

#[test]
fn cards_never_reveal_correct_answer_field() {
    let session = loaded(ScoringRule::Points, three_questions());
    let json = serde_json::to_value(session.cards()).unwrap();
    for card in json.as_array().unwrap() {
        assert!(card.get("correct_answer").is_none());
        assert!(card.get("options").is_some());
    }
}

// =============================================================================
// SCORING RULE
// =============================================================================

#[test]
fn scoring_rule_parses_config_values() {
    assert_eq!("points".parse::<ScoringRule>(), Ok(ScoringRule::Points));
    assert_eq!(" Binary ".parse::<ScoringRule>(), Ok(ScoringRule::Binary));
    assert!("both".parse::<ScoringRule>().is_err());
    assert_eq!(ScoringRule::default(), ScoringRule::Points);
    assert_eq!(ScoringRule::Binary.as_str(), "binary");
}
