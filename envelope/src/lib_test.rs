use super::*;
use serde_json::json;

fn summary(id: &str, name: &str) -> CollectionSummary {
    CollectionSummary {
        id: id.to_owned(),
        name: name.to_owned(),
        icon: Some("folder".to_owned()),
        color: Some("#3366ff".to_owned()),
        position: Some(0),
        is_pinned: false,
        is_shared: false,
        bookmark_count: 3,
        updated_at: Some(1_700_000_000_000),
    }
}

// =============================================================================
// Envelope
// =============================================================================

#[test]
fn new_envelope_is_stamped_and_unaddressed() {
    let envelope = Envelope::new("AUTH_STATE_CHANGED");
    assert_eq!(envelope.kind, "AUTH_STATE_CHANGED");
    assert!(envelope.target.is_none());
    assert!(envelope.request_id.is_none());
    assert!(envelope.ts > 0);
}

#[test]
fn unaddressed_envelope_reaches_every_context() {
    let envelope = Envelope::new("COLLECTIONS_UPDATED");
    assert!(envelope.is_addressed_to(Target::Background));
    assert!(envelope.is_addressed_to(Target::Offscreen));
    assert!(envelope.is_addressed_to(Target::Dashboard));
}

#[test]
fn addressed_envelope_reaches_only_its_target() {
    let envelope = Envelope::new("FETCH_COLLECTIONS").with_target(Target::Offscreen);
    assert!(envelope.is_addressed_to(Target::Offscreen));
    assert!(!envelope.is_addressed_to(Target::Background));
}

#[test]
fn decode_reads_object_message() {
    let raw = json!({"type": "FETCH_BOOKMARKS", "target": "offscreen", "requestId": 7, "userId": "u1"});
    let envelope = Envelope::decode(&raw).expect("decode");
    assert_eq!(envelope.kind, "FETCH_BOOKMARKS");
    assert_eq!(envelope.target, Some(Target::Offscreen));
    assert_eq!(envelope.request_id, Some(7));
    assert_eq!(envelope.payload.get("userId"), Some(&json!("u1")));
}

#[test]
fn decode_reads_json_string_message() {
    let raw = json!(r#"{"type":"FRAME_READY"}"#);
    let envelope = Envelope::decode(&raw).expect("decode");
    assert_eq!(envelope.kind, "FRAME_READY");
}

#[test]
fn decode_accepts_kind_spelling() {
    let raw = json!({"kind": "GET_FRESH_ID_TOKEN"});
    let envelope = Envelope::decode(&raw).expect("decode");
    assert_eq!(envelope.kind, "GET_FRESH_ID_TOKEN");
}

#[test]
fn decode_rejects_non_json_string() {
    let err = Envelope::decode(&json!("!_{\"h\":\"x\"}")).expect_err("noise should fail");
    assert!(matches!(err, EnvelopeError::NotJson(_)));
}

#[test]
fn decode_rejects_missing_discriminant() {
    let err = Envelope::decode(&json!({"userId": "u1"})).expect_err("no type");
    assert!(matches!(err, EnvelopeError::MissingType));

    let err = Envelope::decode(&json!({"type": 5})).expect_err("numeric type");
    assert!(matches!(err, EnvelopeError::MissingType));
}

#[test]
fn decode_as_produces_typed_payload() {
    #[derive(Debug, serde::Deserialize)]
    #[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
    enum Probe {
        FetchCollections {
            #[serde(rename = "userId")]
            user_id: String,
        },
    }

    let envelope = Envelope::new("FETCH_COLLECTIONS").with_data("userId", "u1");
    let Probe::FetchCollections { user_id } = envelope.decode_as::<Probe>().expect("typed");
    assert_eq!(user_id, "u1");
}

#[test]
fn decode_as_reports_payload_kind_on_mismatch() {
    #[derive(Debug, serde::Deserialize)]
    #[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
    enum Probe {
        FetchCollections {
            #[serde(rename = "userId")]
            _user_id: String,
        },
    }

    let envelope = Envelope::new("FETCH_COLLECTIONS");
    let err = envelope.decode_as::<Probe>().expect_err("missing userId");
    match err {
        EnvelopeError::Payload { kind, .. } => assert_eq!(kind, "FETCH_COLLECTIONS"),
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn request_id_of_reads_echoed_id() {
    assert_eq!(request_id_of(&json!({"type": "X", "requestId": 12})), Some(12));
    assert_eq!(request_id_of(&json!({"type": "X"})), None);
    assert_eq!(request_id_of(&json!({"type": "X", "requestId": "12"})), None);
}

// =============================================================================
// ErrorBody
// =============================================================================

#[test]
fn error_body_from_typed_error() {
    #[derive(Debug, thiserror::Error)]
    #[error("timed out")]
    struct TimedOut;

    impl ErrorCode for TimedOut {
        fn error_code(&self) -> &str {
            "timeout"
        }

        fn retryable(&self) -> bool {
            true
        }
    }

    let body = ErrorBody::from_error(&TimedOut);
    assert_eq!(body, ErrorBody { code: "timeout".into(), message: "timed out".into(), retryable: true });
}

#[test]
fn error_body_defaults_missing_code() {
    let body: ErrorBody = serde_json::from_value(json!({"message": "boom"})).expect("decode");
    assert_eq!(body.code, "unknown");
    assert!(!body.retryable);
}

#[test]
fn error_body_omits_false_retryable() {
    let value = serde_json::to_value(ErrorBody::new("auth/popup-blocked", "blocked")).expect("encode");
    assert_eq!(value, json!({"code": "auth/popup-blocked", "message": "blocked"}));
}

// =============================================================================
// Session
// =============================================================================

#[test]
fn session_uses_camel_case_wire_names() {
    let identity = Identity::new("u1").with_email("a@example.com");
    let session = Session::signed_in(identity, "id-token", Some("refresh".into()));
    let value = serde_json::to_value(&session).expect("encode");
    assert_eq!(value["identity"]["id"], "u1");
    assert_eq!(value["identity"]["email"], "a@example.com");
    assert_eq!(value["idToken"], "id-token");
    assert_eq!(value["refreshToken"], "refresh");
}

#[test]
fn identity_accepts_provider_field_names() {
    let identity: Identity = serde_json::from_value(json!({
        "uid": "u9",
        "displayName": "Nine",
        "photoURL": "https://example.com/p.png"
    }))
    .expect("decode");
    assert_eq!(identity.id, "u9");
    assert_eq!(identity.display_name.as_deref(), Some("Nine"));
    assert_eq!(identity.photo_url.as_deref(), Some("https://example.com/p.png"));
}

#[test]
fn signed_out_session_has_no_identity() {
    let session = Session::signed_out();
    assert!(!session.is_signed_in());
    assert!(session.identity_id().is_none());
    assert!(!session.is_desynchronized());
}

#[test]
fn identity_without_token_is_desynchronized() {
    let mut session = Session::signed_in(Identity::new("u1"), "t", None);
    assert!(!session.is_desynchronized());

    session.id_token = None;
    assert!(session.is_desynchronized());

    session.id_token = Some(String::new());
    assert!(session.is_desynchronized());
}

// =============================================================================
// collections_signature
// =============================================================================

#[test]
fn signature_is_deterministic() {
    let set = vec![summary("c1", "Reading"), summary("c2", "Work")];
    assert_eq!(collections_signature(&set), collections_signature(&set.clone()));
    assert_eq!(collections_signature(&set).len(), 64);
}

#[test]
fn signature_changes_with_each_relevant_field() {
    let base = vec![summary("c1", "Reading")];
    let original = collections_signature(&base);

    let mutations: Vec<fn(&mut CollectionSummary)> = vec![
        |c: &mut CollectionSummary| c.id = "c9".into(),
        |c: &mut CollectionSummary| c.name = "Later".into(),
        |c: &mut CollectionSummary| c.icon = None,
        |c: &mut CollectionSummary| c.color = Some("#000000".into()),
        |c: &mut CollectionSummary| c.position = Some(4),
        |c: &mut CollectionSummary| c.is_pinned = true,
        |c: &mut CollectionSummary| c.is_shared = true,
        |c: &mut CollectionSummary| c.bookmark_count = 4,
        |c: &mut CollectionSummary| c.updated_at = Some(1_700_000_000_001),
    ];
    for mutate in mutations {
        let mut changed = base.clone();
        mutate(&mut changed[0]);
        assert_ne!(collections_signature(&changed), original);
    }
}

#[test]
fn signature_is_order_sensitive() {
    let forward = vec![summary("c1", "A"), summary("c2", "B")];
    let reversed = vec![summary("c2", "B"), summary("c1", "A")];
    assert_ne!(collections_signature(&forward), collections_signature(&reversed));
}

#[test]
fn signature_separates_adjacent_fields() {
    let a = vec![summary("ab", "c")];
    let b = vec![summary("a", "bc")];
    assert_ne!(collections_signature(&a), collections_signature(&b));
}

#[test]
fn separator_bytes_in_names_cannot_shift_fields() {
    let mut a = summary("c1", "Read\u{1f}");
    a.icon = Some("x".into());
    let mut b = summary("c1", "Read");
    b.icon = Some("\u{1f}x".into());
    assert_ne!(collections_signature(&[a]), collections_signature(&[b]));
}

#[test]
fn missing_field_differs_from_empty_field() {
    let mut a = summary("c1", "Reading");
    a.color = None;
    let mut b = a.clone();
    b.color = Some(String::new());
    assert_ne!(collections_signature(&[a]), collections_signature(&[b]));
}

#[test]
fn empty_set_has_stable_signature() {
    assert_eq!(collections_signature(&[]), collections_signature(&[]));
    assert_ne!(collections_signature(&[]), collections_signature(&[summary("c1", "A")]));
}

// =============================================================================
// bytes_to_hex
// =============================================================================

#[test]
fn bytes_to_hex_pads_leading_zero() {
    assert_eq!(bytes_to_hex(&[0x0a, 0xff]), "0aff");
    assert_eq!(bytes_to_hex(&[]), "");
}
