use super::*;
use crate::services::auth::AccountType;
use crate::services::session::SessionUser;
use crate::validate::ValidationError;

fn auth(account_type: AccountType) -> AuthUser {
    AuthUser {
        user: SessionUser {
            id: Uuid::new_v4(),
            full_name: "T".into(),
            email: None,
            account_type,
            score: 0,
            is_anonymous: false,
        },
        token: "t".into(),
    }
}

#[test]
fn course_status_maps_each_error() {
    assert_eq!(course_status(&CourseError::NotFound(Uuid::nil())), StatusCode::NOT_FOUND);
    assert_eq!(course_status(&CourseError::Forbidden), StatusCode::FORBIDDEN);
    assert_eq!(course_status(&CourseError::TeachersOnly), StatusCode::FORBIDDEN);
    assert_eq!(
        course_status(&CourseError::Validation(ValidationError::Required("name"))),
        StatusCode::BAD_REQUEST
    );
}

#[tokio::test]
async fn students_cannot_create_courses() {
    let (state, _dir) = crate::state::test_helpers::test_app_state();
    let draft = CourseDraft { name: "A".into(), category: "B".into(), description: "C".into() };
    let err = create_course(State(state), auth(AccountType::Student), Json(draft))
        .await
        .err()
        .unwrap();
    assert_eq!(err.status(), StatusCode::FORBIDDEN);
    assert_eq!(err.code(), "E_FORBIDDEN");
}

#[cfg(feature = "live-db-tests")]
mod live {
    use super::*;
    use crate::services::session;
    use crate::state::test_helpers::live_app_state;
    use tokio::sync::mpsc;

    #[tokio::test]
    async fn video_upload_appends_url_and_notifies() {
        let (state, _dir) = live_app_state().await;
        let owner = crate::services::auth::sign_in_anonymously(&state.pool).await.unwrap();
        sqlx::query("UPDATE users SET account_type = 'teacher' WHERE id = $1")
            .bind(owner)
            .execute(&state.pool)
            .await
            .unwrap();
        let token = session::create_session(&state.pool, owner).await.unwrap();
        let user = session::validate_session(&state.pool, &token).await.unwrap().unwrap();
        let draft = CourseDraft { name: "Optics".into(), category: "Physics".into(), description: "Light".into() };
        let created = course::create_course(&state.pool, &user, &draft).await.unwrap();

        let (tx, mut rx) = mpsc::channel(8);
        let _guard = state.hub.subscribe(Topic::Courses, owner, tx);

        let Json(updated) = upload_video(
            State(state.clone()),
            AuthUser { user, token },
            Path(created.id),
            Query(VideoQuery { filename: "lens.mp4".into() }),
            HeaderMap::new(),
            Body::from("not really a video"),
        )
        .await
        .unwrap();

        assert_eq!(updated.video_urls.len(), 1);
        assert!(updated.video_urls[0].contains(&format!("/files/courses/{}/videos/", created.id)));
        assert_eq!(rx.recv().await.unwrap().syscall, "course:updated");
    }
}
