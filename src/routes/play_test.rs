use super::*;
use crate::quiz::{Phase, QuestionSpec, QuizSession, ScoringRule};
use crate::services::auth::AccountType;
use crate::services::session::SessionUser;
use crate::services::user::UserError;

fn auth(id: Uuid) -> AuthUser {
    AuthUser {
        user: SessionUser {
            id,
            full_name: "P".into(),
            email: None,
            account_type: AccountType::Student,
            score: 0,
            is_anonymous: false,
        },
        token: "t".into(),
    }
}

fn specs() -> Vec<QuestionSpec> {
    ["Red", "Blue"]
        .into_iter()
        .map(|colour| QuestionSpec {
            id: Uuid::new_v4(),
            question: format!("Pick {colour}"),
            correct_answer: colour.to_owned(),
            incorrect_answers: vec!["Green".into(), "Black".into(), "White".into()],
            image_url: None,
        })
        .collect()
}

async fn open(state: &AppState, owner: Uuid) -> (PlayView, Vec<QuestionSpec>) {
    let specs = specs();
    let mut session = QuizSession::new(ScoringRule::Points);
    session.load(specs.clone(), &mut rand::rng()).unwrap();
    let view = state.plays.open(owner, Uuid::new_v4(), "Colours".into(), session).await;
    (view, specs)
}

#[test]
fn play_status_maps_engine_errors() {
    let id = Uuid::nil();
    assert_eq!(play_status(&PlayError::NotFound(id)), StatusCode::NOT_FOUND);
    assert_eq!(play_status(&PlayError::Session(SessionError::NoQuestions)), StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(play_status(&PlayError::Session(SessionError::AlreadyAnswered(id))), StatusCode::CONFLICT);
    assert_eq!(
        play_status(&PlayError::Session(SessionError::WrongPhase { expected: Phase::Completed, actual: Phase::InProgress })),
        StatusCode::CONFLICT
    );
    assert_eq!(play_status(&PlayError::Session(SessionError::InvalidOption(id))), StatusCode::BAD_REQUEST);
}

#[test]
fn failed_score_write_is_retryable() {
    let err = ApiError::from(PlayError::Score(UserError::Db(sqlx::Error::PoolTimedOut)));
    assert_eq!(err.status(), StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(err.code(), "E_SCORE_WRITE");
}

#[tokio::test]
async fn answering_mid_quiz_does_not_touch_the_ledger() {
    let (state, _dir) = crate::state::test_helpers::test_app_state();
    let owner = Uuid::new_v4();
    let (view, specs) = open(&state, owner).await;

    let Json(reply) = answer(
        State(state.clone()),
        auth(owner),
        Path(view.session_id),
        Json(AnswerBody { question_id: specs[0].id, option: specs[0].correct_answer.clone() }),
    )
    .await
    .unwrap();
    assert!(reply.outcome.correct);
    assert!(!reply.outcome.completed);
    assert_eq!(reply.total_score, None);

    let Json(current) = status(State(state.clone()), auth(owner), Path(view.session_id)).await.unwrap();
    assert_eq!(current.answers.len(), 1);

    let err = finish(State(state), auth(owner), Path(view.session_id)).await.err().unwrap();
    assert_eq!(err.code(), "E_WRONG_PHASE");
}

#[tokio::test]
async fn other_users_cannot_touch_a_session() {
    let (state, _dir) = crate::state::test_helpers::test_app_state();
    let owner = Uuid::new_v4();
    let (view, _) = open(&state, owner).await;

    let err = abandon(State(state.clone()), auth(Uuid::new_v4()), Path(view.session_id)).await.err().unwrap();
    assert_eq!(err.status(), StatusCode::FORBIDDEN);

    assert_eq!(abandon(State(state.clone()), auth(owner), Path(view.session_id)).await.unwrap(), StatusCode::NO_CONTENT);
    let err = status(State(state), auth(owner), Path(view.session_id)).await.err().unwrap();
    assert_eq!(err.status(), StatusCode::NOT_FOUND);
}
