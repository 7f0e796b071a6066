use super::*;
use crate::services::auth::AccountType;

fn user(account_type: AccountType) -> SessionUser {
    SessionUser {
        id: Uuid::new_v4(),
        full_name: "T".into(),
        email: None,
        account_type,
        score: 0,
        is_anonymous: false,
    }
}

fn draft() -> LectureDraft {
    LectureDraft { name: " Week 1 ".into(), category: "Physics".into(), description: "Motion".into() }
}

#[test]
fn teachers_pass_the_upload_gate() {
    let checked = check_upload(&user(AccountType::Teacher), &draft()).unwrap();
    assert_eq!(checked.name, "Week 1");
}

#[test]
fn students_are_stopped_before_upload() {
    assert!(matches!(
        check_upload(&user(AccountType::Student), &draft()),
        Err(LectureError::TeachersOnly)
    ));
}

#[test]
fn blank_fields_are_stopped_before_upload() {
    let mut d = draft();
    d.description = String::new();
    assert!(matches!(
        check_upload(&user(AccountType::Teacher), &d),
        Err(LectureError::Validation(ValidationError::Required("description")))
    ));
}

#[test]
fn object_key_keeps_the_filename() {
    let key = object_key("intro clip.mp4", 5);
    assert!(key.as_str().starts_with("lectures/5_"), "{key}");
    assert!(key.as_str().ends_with("_intro_clip.mp4"), "{key}");
}

#[test]
fn storage_key_is_not_serialized() {
    let lecture = Lecture {
        id: Uuid::nil(),
        name: "n".into(),
        category: "c".into(),
        description: "d".into(),
        video_url: "http://localhost:3000/files/lectures/1_v.mp4".into(),
        storage_key: "lectures/1_v.mp4".into(),
        user_id: Uuid::nil(),
        created_at: OffsetDateTime::UNIX_EPOCH,
    };
    let json = serde_json::to_value(&lecture).unwrap();
    assert!(json.get("storage_key").is_none());
    assert_eq!(json["video_url"], "http://localhost:3000/files/lectures/1_v.mp4");
}

#[test]
fn storage_errors_keep_their_code() {
    use crate::frame::ErrorCode;
    let err = LectureError::from(StorageError::TooLarge { limit: 1 });
    assert_eq!(err.error_code(), "E_TOO_LARGE");
}
