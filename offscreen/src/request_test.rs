use super::*;
use serde_json::json;

// =========================================================================
// WorkRequest
// =========================================================================

#[test]
fn decode_addressed_request() {
    let raw = json!({"type": "FETCH_BOOKMARKS", "target": "offscreen", "userId": "u", "collectionId": "c"});
    let request = WorkRequest::decode(&raw).unwrap().unwrap();
    assert_eq!(request, WorkRequest::FetchBookmarks { user_id: "u".into(), collection_id: "c".into() });
}

#[test]
fn decode_skips_other_targets() {
    let raw = json!({"type": "SIGN_OUT", "target": "dashboard"});
    assert_eq!(WorkRequest::decode(&raw).unwrap(), None);
}

#[test]
fn decode_untargeted_is_accepted() {
    let raw = json!({"type": "GET_CACHED_SESSION"});
    assert_eq!(WorkRequest::decode(&raw).unwrap(), Some(WorkRequest::GetCachedSession));
}

#[test]
fn decode_missing_field_fails() {
    let raw = json!({"type": "FETCH_COLLECTIONS", "target": "offscreen"});
    assert!(WorkRequest::decode(&raw).is_err());
}

#[test]
fn local_requests_have_no_command() {
    assert_eq!(WorkRequest::GetCachedSession.into_command(), None);
    assert_eq!(WorkRequest::SignOut.into_command(), None);
    assert_eq!(WorkRequest::BeginSignIn.into_command(), Some(FrameCommand::InitializeInteractiveAuth));
}

#[test]
fn kind_names_match_wire_discriminants() {
    let request = WorkRequest::SaveBookmark { user_id: "u".into(), bookmark_data: json!({}) };
    let wire = serde_json::to_value(&request).unwrap();
    assert_eq!(wire["type"], request.kind().as_str());
}

// =========================================================================
// RequestKind
// =========================================================================

#[test]
fn sign_in_accepts_fallback() {
    assert!(RequestKind::BeginSignIn.accepts(ReplyKind::AuthFallbackInProgress));
    assert!(!RequestKind::BeginSignIn.accepts(ReplyKind::LoginSuccess));
}

#[test]
fn local_kinds_accept_nothing() {
    assert!(RequestKind::GetCachedSession.accepted_replies().is_empty());
    assert!(!RequestKind::SignOut.needs_frame());
}

#[test]
fn default_deadlines() {
    assert_eq!(RequestKind::FetchBookmarks.default_deadline(), Duration::from_secs(30));
    assert_eq!(RequestKind::FetchCollections.default_deadline(), Duration::from_secs(10));
    assert_eq!(RequestKind::BeginSignIn.default_deadline(), Duration::from_secs(60));
}

#[test]
fn error_response_uses_kind_specific_error() {
    let response = RequestKind::FetchBookmarks.error_response(ErrorBody::new("timeout", "late"));
    let wire = serde_json::to_value(&response).unwrap();
    assert_eq!(wire, json!({"type": "BOOKMARKS_ERROR", "code": "timeout", "message": "late"}));
    assert_eq!(response.error().map(|e| e.code.as_str()), Some("timeout"));
}

#[test]
fn local_error_response_is_session_error() {
    let response = RequestKind::SignOut.error_response(ErrorBody::new("storage_error", "disk"));
    let wire = serde_json::to_value(&response).unwrap();
    assert_eq!(wire["type"], "SESSION_ERROR");
}

// =========================================================================
// RequestOutcome
// =========================================================================

#[test]
fn deferred_outcome_has_no_response() {
    assert_eq!(RequestOutcome::DeferredToRedirect.into_response(), None);
    let signed_out = RequestOutcome::Resolved(Response::Local(LocalResponse::SignedOut));
    assert!(signed_out.into_response().is_some());
}
