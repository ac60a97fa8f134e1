use super::*;
use envelope::ErrorBody;
use std::time::Duration;

fn deadline() -> Instant {
    Instant::now() + Duration::from_secs(10)
}

fn bookmarks() -> Settlement {
    Settlement::Reply(FrameEvent::BookmarksData { bookmarks: Vec::new() })
}

#[test]
fn ids_are_monotonic_from_one() {
    let mut table = PendingTable::new();
    let (a, _rx_a) = table.register(RequestKind::FetchBookmarks, deadline());
    let (b, _rx_b) = table.register(RequestKind::FetchCollections, deadline());
    assert_eq!((a, b), (1, 2));
    assert_eq!(table.len(), 2);
}

#[tokio::test]
async fn first_reply_wins_second_is_dropped() {
    let mut table = PendingTable::new();
    let (id, rx) = table.register(RequestKind::FetchBookmarks, deadline());

    assert_eq!(table.settle(ReplyKind::BookmarksData, None, bookmarks()), Some((id, RequestKind::FetchBookmarks)));
    assert_eq!(table.settle(ReplyKind::BookmarksData, None, bookmarks()), None);
    assert!(table.is_empty());

    assert!(matches!(rx.await, Ok(Settlement::Reply(FrameEvent::BookmarksData { .. }))));
}

#[test]
fn reply_of_unaccepted_kind_resolves_nothing() {
    let mut table = PendingTable::new();
    let (id, _rx) = table.register(RequestKind::FetchBookmarks, deadline());
    assert_eq!(table.settle(ReplyKind::CollectionsData, None, bookmarks()), None);
    assert!(table.contains(id));
}

#[test]
fn echoed_id_beats_registration_order() {
    let mut table = PendingTable::new();
    let (first, _rx1) = table.register(RequestKind::FetchBookmarks, deadline());
    let (second, _rx2) = table.register(RequestKind::FetchBookmarks, deadline());

    let resolved = table.settle(ReplyKind::BookmarksData, Some(second), bookmarks());
    assert_eq!(resolved, Some((second, RequestKind::FetchBookmarks)));
    assert!(table.contains(first));
}

#[test]
fn echoed_id_of_finished_request_is_dropped() {
    let mut table = PendingTable::new();
    let (first, _rx1) = table.register(RequestKind::FetchBookmarks, deadline());
    let (second, _rx2) = table.register(RequestKind::FetchBookmarks, deadline());
    assert!(table.expire(first));

    assert_eq!(table.settle(ReplyKind::BookmarksData, Some(first), bookmarks()), None);
    assert!(table.contains(second));
}

#[test]
fn uncorrelated_reply_goes_to_oldest() {
    let mut table = PendingTable::new();
    let (first, _rx1) = table.register(RequestKind::SaveBookmark, deadline());
    let (_second, _rx2) = table.register(RequestKind::SaveBookmark, deadline());

    let settlement = Settlement::Failed(BridgeError::FrameUnavailable("gone".into()));
    assert_eq!(table.settle(ReplyKind::BookmarkSaveError, None, settlement), Some((first, RequestKind::SaveBookmark)));
}

#[test]
fn expire_after_settle_reports_false() {
    let mut table = PendingTable::new();
    let (id, _rx) = table.register(RequestKind::CreateCollection, deadline());
    let settlement = Settlement::Reply(FrameEvent::CollectionCreateError { error: ErrorBody::new("x", "y") });
    table.settle(ReplyKind::CollectionCreateError, Some(id), settlement);
    assert!(!table.expire(id));
}

#[test]
fn outstanding_lists_in_registration_order() {
    let mut table = PendingTable::new();
    let d = deadline();
    table.register(RequestKind::BeginSignIn, d);
    table.register(RequestKind::FetchCollections, d);
    let kinds: Vec<_> = table.outstanding().into_iter().map(|(_, kind, _)| kind).collect();
    assert_eq!(kinds, vec![RequestKind::BeginSignIn, RequestKind::FetchCollections]);
}

#[tokio::test]
async fn clear_closes_every_receiver() {
    let mut table = PendingTable::new();
    let (_, rx1) = table.register(RequestKind::FetchBookmarks, deadline());
    let (_, rx2) = table.register(RequestKind::BeginSignIn, deadline());

    assert_eq!(table.clear(), 2);
    assert!(rx1.await.is_err());
    assert!(rx2.await.is_err());
}

#[tokio::test]
async fn closed_table_refuses_registrations() {
    let mut table = PendingTable::new();
    let (_, before) = table.register(RequestKind::FetchBookmarks, deadline());
    assert_eq!(table.close(), 1);
    assert!(table.is_closed());

    let (id, after) = table.register(RequestKind::FetchBookmarks, deadline());
    assert!(!table.contains(id));
    assert!(before.await.is_err());
    assert!(after.await.is_err());
}
