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

#[test]
fn resource_status_maps_each_error() {
    assert_eq!(resource_status(&ResourceError::NotFound(Uuid::nil())), StatusCode::NOT_FOUND);
    assert_eq!(resource_status(&ResourceError::TeachersOnly), StatusCode::FORBIDDEN);
    assert_eq!(
        resource_status(&ResourceError::Storage(StorageError::Interrupted(std::io::Error::other("reset")))),
        StatusCode::BAD_REQUEST
    );
}

#[tokio::test]
async fn oversized_declared_upload_is_refused_without_writing() {
    let (mut state, dir) = crate::state::test_helpers::test_app_state();
    let mut config = (*state.config).clone();
    config.upload_max_bytes = 4;
    state.config = std::sync::Arc::new(config);

    let mut headers = HeaderMap::new();
    headers.insert(axum::http::header::CONTENT_LENGTH, "10".parse().unwrap());
    let query = UploadQuery {
        draft: PdfDraft { name: "Notes".into(), category: "Chem".into(), description: "Week 1".into() },
        filename: "notes.pdf".into(),
    };

    let err = upload_pdf(State(state), auth(AccountType::Teacher), Query(query), headers, Body::from("0123456789"))
        .await
        .err()
        .unwrap();
    assert_eq!(err.status(), StatusCode::PAYLOAD_TOO_LARGE);
    assert_eq!(err.code(), "E_TOO_LARGE");
    assert!(!dir.path().join(resource::CATEGORY).exists());
}

#[tokio::test]
async fn students_cannot_upload() {
    let (state, _dir) = crate::state::test_helpers::test_app_state();
    let query = UploadQuery {
        draft: PdfDraft { name: "Notes".into(), category: "Chem".into(), description: "Week 1".into() },
        filename: "notes.pdf".into(),
    };
    let err = upload_pdf(State(state), auth(AccountType::Student), Query(query), HeaderMap::new(), Body::empty())
        .await
        .err()
        .unwrap();
    assert_eq!(err.status(), StatusCode::FORBIDDEN);
}
