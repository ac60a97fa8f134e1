use super::*;
use serde_json::json;

#[test]
fn decode_companion_session() {
    let raw = json!({
        "type": "AUTH_STATE_CHANGED",
        "origin": "extension",
        "session": {"identity": {"uid": "u1"}, "idToken": "t"},
        "ts": 42,
    });
    let Some(Broadcast::AuthStateChanged { origin, session, ts }) = Broadcast::decode(&raw).unwrap() else {
        panic!("expected auth state");
    };
    assert_eq!(origin, Origin::Companion);
    assert_eq!(session.identity_id(), Some("u1"));
    assert_eq!(ts, 42);
}

#[test]
fn decode_accepts_json_string() {
    let raw = json!("{\"type\":\"REQUEST_CURRENT_SESSION\"}");
    assert_eq!(Broadcast::decode(&raw).unwrap(), Some(Broadcast::RequestCurrentSession));
}

#[test]
fn decode_skips_messages_for_other_contexts() {
    let raw = json!({"type": "REQUEST_CURRENT_SESSION", "target": "offscreen"});
    assert_eq!(Broadcast::decode(&raw).unwrap(), None);
}

#[test]
fn decode_rejects_unknown_type() {
    let raw = json!({"type": "PING"});
    assert!(Broadcast::decode(&raw).is_err());
}

#[test]
fn collections_changed_wire_shape() {
    let message = Broadcast::CollectionsChanged { origin: Origin::Host, signature: Some("ab".into()), ts: 7 };
    assert_eq!(
        serde_json::to_value(&message).unwrap(),
        json!({"type": "COLLECTIONS_CHANGED", "origin": "host", "signature": "ab", "ts": 7})
    );
}

#[test]
fn token_reply_shapes() {
    let tokens = TokenReply::Tokens { id_token: "t".into(), refresh_token: None, identity: Identity::new("u1") };
    let wire = serde_json::to_value(&tokens).unwrap();
    assert_eq!(wire["idToken"], "t");
    assert_eq!(wire["identity"]["id"], "u1");
    assert_eq!(tokens.id_token(), Some("t"));

    let no_user = TokenReply::from_error(&crate::error::DashboardError::NoUser);
    assert_eq!(serde_json::to_value(&no_user).unwrap()["error"], "NO_USER");
    assert_eq!(no_user.id_token(), None);
}

#[test]
fn token_reply_decodes_error() {
    let reply: TokenReply = serde_json::from_value(json!({"error": "NO_USER"})).unwrap();
    assert_eq!(reply, TokenReply::Error { error: "NO_USER".into(), message: String::new() });
}
