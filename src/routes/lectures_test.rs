use super::*;
use crate::services::auth::AccountType;
use crate::services::session::SessionUser;
use crate::services::storage::StorageError;

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

fn upload_query(name: &str) -> UploadQuery {
    UploadQuery {
        draft: LectureDraft { name: name.into(), category: "Physics".into(), description: "Motion".into() },
        filename: "week1.mp4".into(),
    }
}

#[test]
fn lecture_status_maps_each_error() {
    assert_eq!(lecture_status(&LectureError::NotFound(Uuid::nil())), StatusCode::NOT_FOUND);
    assert_eq!(lecture_status(&LectureError::TeachersOnly), StatusCode::FORBIDDEN);
    assert_eq!(
        lecture_status(&LectureError::Storage(StorageError::TooLarge { limit: 10 })),
        StatusCode::PAYLOAD_TOO_LARGE
    );
}

#[test]
fn upload_query_reads_form_fields() {
    let uri = "/api/lectures?name=Week%201&category=Physics&description=Motion&filename=w1.mp4"
        .parse()
        .unwrap();
    let Query(q): Query<UploadQuery> = Query::try_from_uri(&uri).unwrap();
    assert_eq!(q.draft.name, "Week 1");
    assert_eq!(q.filename, "w1.mp4");
}

#[tokio::test]
async fn rejected_uploads_store_nothing() {
    let (state, dir) = crate::state::test_helpers::test_app_state();

    let err = upload_lecture(
        State(state.clone()),
        auth(AccountType::Student),
        Query(upload_query("Week 1")),
        HeaderMap::new(),
        Body::from("bytes"),
    )
    .await
    .err()
    .unwrap();
    assert_eq!(err.status(), StatusCode::FORBIDDEN);

    let err = upload_lecture(
        State(state),
        auth(AccountType::Teacher),
        Query(upload_query("  ")),
        HeaderMap::new(),
        Body::from("bytes"),
    )
    .await
    .err()
    .unwrap();
    assert_eq!(err.status(), StatusCode::BAD_REQUEST);

    assert!(!dir.path().join(lecture::CATEGORY).exists());
}
