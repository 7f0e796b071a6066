use super::*;
use crate::services::auth;
use crate::state::test_helpers::live_app_state;

#[tokio::test]
async fn add_score_is_cumulative_and_may_go_negative() {
    let (state, _dir) = live_app_state().await;
    let id = auth::sign_in_anonymously(&state.pool).await.unwrap();

    assert_eq!(add_score(&state.pool, id, 80).await.unwrap(), 80);
    assert_eq!(add_score(&state.pool, id, -100).await.unwrap(), -20);
    assert_eq!(get_profile(&state.pool, id).await.unwrap().score, -20);
}

#[tokio::test]
async fn concurrent_increments_are_not_lost() {
    let (state, _dir) = live_app_state().await;
    let id = auth::sign_in_anonymously(&state.pool).await.unwrap();

    let mut handles = Vec::new();
    for _ in 0..10 {
        let pool = state.pool.clone();
        handles.push(tokio::spawn(async move { add_score(&pool, id, 50).await }));
    }
    for handle in handles {
        handle.await.unwrap().unwrap();
    }
    assert_eq!(get_profile(&state.pool, id).await.unwrap().score, 500);
}

#[tokio::test]
async fn add_score_for_missing_user_is_not_found() {
    let (state, _dir) = live_app_state().await;
    let ghost = Uuid::new_v4();
    assert!(matches!(add_score(&state.pool, ghost, 1).await, Err(UserError::NotFound(id)) if id == ghost));
}

#[tokio::test]
async fn update_profile_rejects_blank_name() {
    let (state, _dir) = live_app_state().await;
    let id = auth::sign_in_anonymously(&state.pool).await.unwrap();
    assert!(matches!(
        update_profile(&state.pool, id, "  ", "555").await,
        Err(UserError::Validation(_))
    ));
    let updated = update_profile(&state.pool, id, "Grace", "555").await.unwrap();
    assert_eq!(updated.full_name, "Grace");
}
