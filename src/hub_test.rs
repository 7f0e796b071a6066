use super::*;

fn user() -> Uuid {
    Uuid::new_v4()
}

fn chat_topic(a: Uuid, b: Uuid) -> Topic {
    Topic::Chat(chat::chat_id(a, b))
}

// =============================================================================
// TOPIC PARSING
// =============================================================================

#[test]
fn parse_public_topics() {
    assert_eq!(Topic::parse("community").unwrap(), Topic::Community);
    assert_eq!(Topic::parse("pdfs").unwrap(), Topic::Pdfs);
    assert_eq!(Topic::parse("quizzes").unwrap(), Topic::Quizzes);
    assert_eq!(Topic::parse("courses").unwrap(), Topic::Courses);
    assert_eq!(Topic::parse("lectures").unwrap(), Topic::Lectures);
}

#[test]
fn parse_scoped_topics_round_trip_through_display() {
    let a = user();
    let b = user();
    for topic in [
        chat_topic(a, b),
        Topic::Inbox(a),
        Topic::Replies(b),
        Topic::Uploads(a),
    ] {
        assert_eq!(Topic::parse(&topic.to_string()).unwrap(), topic);
    }
}

#[test]
fn parse_rejects_unknown_and_malformed() {
    assert_eq!(Topic::parse("boards"), Err(TopicError::Unknown("boards".into())));
    assert_eq!(Topic::parse("board:1"), Err(TopicError::Unknown("board:1".into())));
    assert_eq!(Topic::parse("inbox:nope"), Err(TopicError::Malformed("inbox:nope".into())));
    assert_eq!(Topic::parse("chat:onlyone"), Err(TopicError::Malformed("chat:onlyone".into())));
}

// =============================================================================
// AUTHORIZATION
// =============================================================================

#[test]
fn private_topics_require_ownership() {
    let me = user();
    let other = user();
    assert!(Topic::Inbox(me).allows(me));
    assert!(!Topic::Inbox(other).allows(me));
    assert!(Topic::Uploads(me).allows(me));
    assert!(!Topic::Uploads(other).allows(me));
}

#[test]
fn chat_topic_allows_only_participants() {
    let a = user();
    let b = user();
    let topic = chat_topic(a, b);
    assert!(topic.is_private());
    assert!(topic.allows(a));
    assert!(topic.allows(b));
    assert!(!topic.allows(user()));
}

#[test]
fn public_topics_allow_everyone() {
    assert!(!Topic::Community.is_private());
    assert!(Topic::Community.allows(user()));
    assert!(Topic::Replies(user()).allows(user()));
}

// =============================================================================
// PUBLISH / SUBSCRIBE
// =============================================================================

#[tokio::test]
async fn publish_reaches_subscribers_with_topic_stamped() {
    let hub = Hub::new();
    let (tx, mut rx) = mpsc::channel(8);
    let _sub = hub.subscribe(Topic::Community, user(), tx);

    let mut data = Data::new();
    data.insert("id".into(), serde_json::json!("q1"));
    assert_eq!(hub.publish(&Topic::Community, "community:question", data), 1);

    let frame = rx.recv().await.expect("frame should arrive");
    assert_eq!(frame.syscall, "community:question");
    assert_eq!(frame.topic.as_deref(), Some("community"));
    assert_eq!(frame.data_str("id"), Some("q1"));
}

#[tokio::test]
async fn publish_is_scoped_to_topic() {
    let hub = Hub::new();
    let (tx, mut rx) = mpsc::channel(8);
    let _sub = hub.subscribe(Topic::Pdfs, user(), tx);

    assert_eq!(hub.publish(&Topic::Quizzes, "quiz:created", Data::new()), 0);
    assert!(rx.try_recv().is_err());
}

#[test]
fn dropping_guard_unsubscribes() {
    let hub = Hub::new();
    let (tx, _rx) = mpsc::channel(8);
    let sub = hub.subscribe(Topic::Community, user(), tx);
    assert_eq!(hub.subscriber_count(&Topic::Community), 1);

    drop(sub);
    assert_eq!(hub.subscriber_count(&Topic::Community), 0);
    assert_eq!(hub.topic_count(), 0);
}

#[test]
fn guards_are_independent_per_subscriber() {
    let hub = Hub::new();
    let (tx1, _rx1) = mpsc::channel(8);
    let (tx2, _rx2) = mpsc::channel(8);
    let first = hub.subscribe(Topic::Courses, user(), tx1);
    let _second = hub.subscribe(Topic::Courses, user(), tx2);

    drop(first);
    assert_eq!(hub.subscriber_count(&Topic::Courses), 1);
}

#[test]
fn full_channel_is_skipped() {
    let hub = Hub::new();
    let (tx, _rx) = mpsc::channel(1);
    let _sub = hub.subscribe(Topic::Lectures, user(), tx);

    assert_eq!(hub.publish(&Topic::Lectures, "lecture:created", Data::new()), 1);
    assert_eq!(hub.publish(&Topic::Lectures, "lecture:created", Data::new()), 0);
}

#[test]
fn closed_channel_is_skipped() {
    let hub = Hub::new();
    let (tx, rx) = mpsc::channel(4);
    let _sub = hub.subscribe(Topic::Community, user(), tx);
    drop(rx);

    assert_eq!(hub.publish(&Topic::Community, "community:question", Data::new()), 0);
}
