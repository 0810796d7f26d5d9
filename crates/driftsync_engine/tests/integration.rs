//! End-to-end scenarios against the in-memory remote and object storage.

use chrono::{Duration as ChronoDuration, Utc};
use driftsync_engine::{EngineConfig, MemoryObjectStorage, MemoryRemote, RetryPolicy, SyncEngine};
use driftsync_store::{Comment, Like, LocalStore, MediaKind, Post, RecordId};
use std::fs;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

struct Harness {
    engine: SyncEngine,
    remote: Arc<MemoryRemote>,
    storage: Arc<MemoryObjectStorage>,
    docs: TempDir,
}

fn harness() -> Harness {
    let docs = tempfile::tempdir().unwrap();
    let remote = Arc::new(MemoryRemote::new());
    let storage = Arc::new(MemoryObjectStorage::new());
    let config = EngineConfig::new(docs.path())
        .with_retry(RetryPolicy::new(1).with_base_delay(Duration::ZERO));
    let engine = SyncEngine::new(
        config,
        Arc::new(LocalStore::open_in_memory()),
        remote.clone(),
        storage.clone(),
    );
    Harness {
        engine,
        remote,
        storage,
        docs,
    }
}

fn store_post(engine: &SyncEngine, post: Post) -> RecordId {
    let id = post.id;
    engine
        .store()
        .write(|txn| {
            txn.put_post(post);
            Ok(())
        })
        .unwrap();
    id
}

// S1: a post authored offline syncs fully once connectivity returns.
#[test]
fn offline_create_then_sync() {
    let h = harness();
    fs::write(h.docs.path().join("a.jpg"), b"jpeg bytes").unwrap();

    let post = Post::new("hi", MediaKind::Image, "a@example.com", Utc::now())
        .with_local_uri("a.jpg");
    let id = store_post(&h.engine, post);

    h.engine.on_connectivity_change(true);

    let key = format!("{}.jpg", id.as_hex());
    assert_eq!(h.storage.object("media", &key).unwrap(), b"jpeg bytes");

    let row = h.remote.post(id).unwrap();
    assert_eq!(
        row.image_url.as_deref(),
        Some(format!("https://objects.test/media/{key}").as_str())
    );
    assert_eq!(row.video_url, None);

    let local = h.engine.store().post(id).unwrap().unwrap();
    assert!(local.is_synced);
}

// S2: toggling a like twice before push resurrects the same row; push sends
// one active upsert.
#[test]
fn like_toggle_with_resurrect() {
    let h = harness();
    let post = Post::new("p", MediaKind::Image, "a@example.com", Utc::now());
    let post_id = post.id;
    h.engine
        .store()
        .write(|txn| {
            txn.put_post(post);
            txn.mark_post_synced(post_id)
        })
        .unwrap();

    // An already-synced active like.
    let like = Like::new(post_id, "a@example.com");
    let like_id = like.id;
    h.engine
        .store()
        .write(|txn| {
            txn.put_like(like);
            txn.mark_like_synced(like_id)
        })
        .unwrap();

    // Unlike, then like again before any push.
    let now = Utc::now();
    let toggled = h.engine.store().toggle_like(post_id, "a@example.com", now).unwrap();
    assert_eq!(toggled.id, like_id);
    assert!(toggled.is_tombstoned());

    let toggled = h.engine.store().toggle_like(post_id, "a@example.com", now).unwrap();
    assert_eq!(toggled.id, like_id, "same row resurrected");
    assert!(!toggled.is_tombstoned());
    assert!(!toggled.is_synced);

    h.engine.try_push().unwrap();

    let row = h.remote.like(like_id).unwrap();
    assert!(row.deleted_at.is_none());
    assert_eq!(h.remote.like_count(), 1);

    let likes = h
        .engine
        .store()
        .likes_where(|l| l.post_id == post_id && l.user_email == "a@example.com")
        .unwrap();
    assert_eq!(likes.len(), 1);
    assert_eq!(likes[0].id, like_id);
}

// S3: a media-blocked parent holds its children back; both drain once the
// file reappears.
#[test]
fn parent_blocked_child_drains_after_file_returns() {
    let h = harness();

    let post = Post::new("p", MediaKind::Image, "a@example.com", Utc::now())
        .with_local_uri("missing.jpg");
    let post_id = store_post(&h.engine, post);

    let like = Like::new(post_id, "a@example.com");
    let like_id = like.id;
    h.engine
        .store()
        .write(|txn| {
            txn.put_like(like);
            Ok(())
        })
        .unwrap();

    let outcome = h.engine.try_push().unwrap();
    assert_eq!(outcome.posts_skipped, 1);
    assert_eq!(outcome.likes_deferred, 1);
    assert!(!h.engine.store().post(post_id).unwrap().unwrap().is_synced);
    assert!(!h.engine.store().like(like_id).unwrap().unwrap().is_synced);
    assert_eq!(h.remote.like_count(), 0);

    // The file shows up; the next cycle syncs parent then child.
    fs::write(h.docs.path().join("missing.jpg"), b"late bytes").unwrap();
    let outcome = h.engine.try_push().unwrap();
    assert_eq!(outcome.posts_pushed, 1);
    assert_eq!(outcome.likes_pushed, 1);
    assert!(h.engine.store().post(post_id).unwrap().unwrap().is_synced);
    assert!(h.engine.store().like(like_id).unwrap().unwrap().is_synced);
    assert_eq!(h.remote.like_count(), 1);
}

// S4: a concurrent edit resolves by last-write-wins when the remote side is
// newer on the contested field.
#[test]
fn concurrent_edit_takes_newer_remote() {
    let h = harness();

    let local = Post::new(
        "A",
        MediaKind::Image,
        "a@example.com",
        Utc::now() - ChronoDuration::minutes(10),
    );
    let id = store_post(&h.engine, local);

    let server = Post::new("B", MediaKind::Image, "a@example.com", Utc::now());
    let mut row = driftsync_protocol::PostRow::from_record(&server);
    row.id = id;
    row.updated_at = Some(Utc::now());
    h.remote.seed_post(row);

    h.engine.try_pull().unwrap();

    let merged = h.engine.store().post(id).unwrap().unwrap();
    assert_eq!(merged.text, "B");
    assert!(merged.is_synced);
}

// S5: the second trigger inside the cooldown window is swallowed.
#[test]
fn push_cooldown_single_cycle() {
    let h = harness();
    store_post(
        &h.engine,
        Post::new("one", MediaKind::Image, "a@example.com", Utc::now()),
    );

    h.engine.trigger_push();
    assert_eq!(h.engine.stats().push_cycles, 1);

    store_post(
        &h.engine,
        Post::new("two", MediaKind::Image, "a@example.com", Utc::now()),
    );
    h.engine.trigger_push();

    assert_eq!(h.engine.stats().push_cycles, 1, "cooldown swallowed the call");
    assert_eq!(h.remote.post_count(), 1);
}

// S6: 600 active synced posts and 5 stale tombstones prune down to the cap
// with no orphans left behind.
#[test]
fn pruner_caps_reaps_and_sweeps() {
    let h = harness();
    let now = Utc::now();

    let mut oldest_ids = Vec::new();
    for i in 0..600i64 {
        // Evenly spread over roughly a year, oldest at the high offsets.
        let at = now - ChronoDuration::hours(i * 14);
        let post = Post::new(format!("p{i}"), MediaKind::Image, "a@example.com", at);
        let id = post.id;
        h.engine
            .store()
            .write(|txn| {
                txn.put_post(post);
                txn.mark_post_synced(id)
            })
            .unwrap();
        if i >= 500 {
            oldest_ids.push(id);
        }
    }

    // Five tombstones past retention, each with a child to orphan.
    let mut doomed = Vec::new();
    for i in 0..5 {
        let post = Post::new(
            format!("dead{i}"),
            MediaKind::Image,
            "a@example.com",
            now - ChronoDuration::days(100),
        );
        let id = post.id;
        let like = Like::new(id, "a@example.com");
        let comment = Comment::new(id, "a@example.com", "c", now);
        h.engine
            .store()
            .write(|txn| {
                txn.put_post(post);
                txn.soft_delete_post(id, now - ChronoDuration::days(40))?;
                txn.mark_post_synced(id)?;
                txn.put_like(like);
                txn.put_comment(comment);
                Ok(())
            })
            .unwrap();
        doomed.push(id);
    }

    let outcome = h.engine.prune_at(now).unwrap();
    assert_eq!(outcome.tombstones_reaped, 5);
    assert_eq!(outcome.posts_capped, 100);
    assert_eq!(outcome.orphans_removed, 10, "children of reaped posts swept");

    let active = h
        .engine
        .store()
        .posts_where(|p| p.deleted_at.is_none() && p.is_synced)
        .unwrap();
    assert_eq!(active.len(), 500);

    let tombstoned = h
        .engine
        .store()
        .posts_where(|p| p.deleted_at.is_some())
        .unwrap();
    assert!(tombstoned.is_empty());

    for id in doomed {
        assert!(h.engine.store().post(id).unwrap().is_none());
    }

    for id in oldest_ids {
        assert!(h.engine.store().post(id).unwrap().is_none(), "oldest reaped");
    }

    // Referential integrity: every remaining child has a parent.
    let posts: std::collections::HashSet<RecordId> = h
        .engine
        .store()
        .posts_where(|_| true)
        .unwrap()
        .into_iter()
        .map(|p| p.id)
        .collect();
    for like in h.engine.store().likes_where(|_| true).unwrap() {
        assert!(posts.contains(&like.post_id));
    }
    for comment in h.engine.store().comments_where(|_| true).unwrap() {
        assert!(posts.contains(&comment.post_id));
    }
}

// P1: pushing twice with a healthy network is a no-op the second time.
#[test]
fn push_is_idempotent() {
    let h = harness();

    let post = Post::new("p", MediaKind::Image, "a@example.com", Utc::now());
    let post_id = store_post(&h.engine, post);
    let like = Like::new(post_id, "a@example.com");
    let comment = Comment::new(post_id, "a@example.com", "c", Utc::now());
    let (like_id, comment_id) = (like.id, comment.id);
    h.engine
        .store()
        .write(|txn| {
            txn.put_like(like);
            txn.put_comment(comment);
            Ok(())
        })
        .unwrap();

    let first = h.engine.try_push().unwrap();
    assert_eq!(first.posts_pushed, 1);
    assert_eq!(first.comments_pushed, 1);

    let snapshot = (
        h.remote.post(post_id).unwrap(),
        h.remote.like(like_id),
        h.remote.comment(comment_id).unwrap(),
        h.remote.post_count(),
        h.remote.like_count(),
        h.remote.comment_count(),
    );

    let second = h.engine.try_push().unwrap();
    assert_eq!(second.posts_pushed, 0);
    assert_eq!(second.likes_pushed, 0);
    assert_eq!(second.comments_pushed, 0);

    let after = (
        h.remote.post(post_id).unwrap(),
        h.remote.like(like_id),
        h.remote.comment(comment_id).unwrap(),
        h.remote.post_count(),
        h.remote.like_count(),
        h.remote.comment_count(),
    );
    assert_eq!(after, snapshot, "second push changed nothing remotely");

    assert!(h.engine.store().post(post_id).unwrap().unwrap().is_synced);
    assert!(h.engine.store().comment(comment_id).unwrap().unwrap().is_synced);
}

// P2: children only reach the remote once their parent is locally synced.
#[test]
fn parent_always_precedes_child() {
    let h = harness();

    let post = Post::new("p", MediaKind::Image, "a@example.com", Utc::now());
    let post_id = store_post(&h.engine, post);
    let like = Like::new(post_id, "a@example.com");
    let comment = Comment::new(post_id, "a@example.com", "c", Utc::now());
    h.engine
        .store()
        .write(|txn| {
            txn.put_like(like);
            txn.put_comment(comment);
            Ok(())
        })
        .unwrap();

    // The post upsert keeps failing: children must not leak out.
    h.remote.fail_next_writes(2);
    h.engine.try_push().unwrap();
    assert_eq!(h.remote.like_count(), 0);
    assert_eq!(h.remote.comment_count(), 0);

    // Healthy remote: parent first, then both children.
    let outcome = h.engine.try_push().unwrap();
    assert_eq!(outcome.posts_pushed, 1);
    assert_eq!(outcome.likes_pushed, 1);
    assert_eq!(outcome.comments_pushed, 1);
    assert_eq!(h.remote.like_count(), 1);
    assert_eq!(h.remote.comment_count(), 1);
}

// P4: the watermark never decreases across pull cycles.
#[test]
fn watermark_never_decreases() {
    let h = harness();

    let mut last = h.engine.store().settings().unwrap().last_sync_time;
    for _ in 0..3 {
        h.engine.try_pull().unwrap();
        let current = h.engine.store().settings().unwrap().last_sync_time;
        assert!(current >= last);
        last = current;
    }
}

// A full background tick drains a mixed workload end to end.
#[test]
fn background_tick_end_to_end() {
    let h = harness();
    fs::write(h.docs.path().join("v.mp4"), b"video bytes").unwrap();

    let post = Post::new("clip", MediaKind::Video, "a@example.com", Utc::now())
        .with_local_uri("v.mp4");
    let id = store_post(&h.engine, post);

    // Something from another device waiting on the server.
    let other = Post::new("theirs", MediaKind::Image, "other@example.com", Utc::now());
    let mut row = driftsync_protocol::PostRow::from_record(&other);
    row.updated_at = Some(Utc::now());
    h.remote.seed_post(row);

    h.engine.background_tick();

    let key = format!("{}.mp4", id.as_hex());
    assert!(h.storage.object("reels", &key).is_some());
    assert!(h.engine.store().post(id).unwrap().unwrap().is_synced);
    assert!(h.engine.store().post(other.id).unwrap().is_some(), "pulled");
}
