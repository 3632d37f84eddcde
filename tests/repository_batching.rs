//! Integration tests for repository caching and batched flushes.

mod common;

use chatsync::proto::User;
use common::{TestEngine, alice, bob};
use std::sync::Arc;
use std::time::Duration;

const FLUSH_DELAY: Duration = Duration::from_millis(2000);

#[tokio::test(start_paused = true)]
async fn test_edit_before_flush_writes_final_version_once() {
    let t = TestEngine::new();
    let repo = &t.engine.repos().users;

    repo.put(alice());
    repo.put(alice().with_name("Alice Liddell"));
    assert_eq!(t.users.stats().writes(), 0);

    tokio::time::sleep(FLUSH_DELAY + Duration::from_millis(10)).await;

    let batches = t.users.written_batches();
    assert_eq!(batches.len(), 1);
    assert_eq!(batches[0], vec![alice().with_name("Alice Liddell")]);
}

#[tokio::test(start_paused = true)]
async fn test_identical_put_is_written_once() {
    let t = TestEngine::new();
    let repo = &t.engine.repos().users;

    repo.put(alice());
    repo.put(alice());
    tokio::time::sleep(FLUSH_DELAY * 2).await;
    repo.put(alice());
    tokio::time::sleep(FLUSH_DELAY * 2).await;

    assert_eq!(t.users.written_batches(), vec![vec![alice()]]);
}

#[tokio::test(start_paused = true)]
async fn test_put_is_visible_without_store_read() {
    let t = TestEngine::new();
    let repo = &t.engine.repos().users;

    repo.put(bob());
    let read = repo.get(&"bob".to_string()).await.unwrap();
    assert_eq!(read, Some(bob()));
    assert_eq!(t.users.stats().reads(), 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_put_on_one_task_is_visible_to_another() {
    let t = TestEngine::new();
    let repos = Arc::clone(t.engine.repos());

    let writers: Vec<_> = (0..16)
        .map(|i| {
            let repos = Arc::clone(&repos);
            tokio::spawn(async move {
                repos.users.put(User::new(format!("u{i}"), format!("User {i}")));
            })
        })
        .collect();
    for writer in writers {
        writer.await.unwrap();
    }

    let readers: Vec<_> = (0..16)
        .map(|i| {
            let repos = Arc::clone(&repos);
            tokio::spawn(async move { repos.users.get(&format!("u{i}")).await.unwrap() })
        })
        .collect();
    for (i, reader) in readers.into_iter().enumerate() {
        let user = reader.await.unwrap();
        assert_eq!(user.map(|u| u.name), Some(format!("User {i}")));
    }
    assert_eq!(t.users.stats().reads(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_burst_is_one_insert_many() {
    let t = TestEngine::new();
    let repo = &t.engine.repos().users;

    let users: Vec<User> = (0..50)
        .map(|i| User::new(format!("u{i}"), format!("User {i}")))
        .collect();
    for user in &users {
        repo.put(user.clone());
    }
    tokio::time::sleep(FLUSH_DELAY + Duration::from_millis(10)).await;

    let batches = t.users.written_batches();
    assert_eq!(batches.len(), 1);
    assert_eq!(batches[0].len(), 50);
    assert_eq!(t.users.stats().insert_many.load(std::sync::atomic::Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_shutdown_flushes_pending_writes() {
    let t = TestEngine::new();
    t.connect(&alice(), "c1").await;
    t.engine.repos().users.put(bob());

    let flushed = t.engine.shutdown().await.unwrap();
    assert_eq!(flushed, 2);
    assert_eq!(t.users.len(), 2);
    assert_eq!(t.engine.repos().users.pending_len(), 0);
}

#[tokio::test]
async fn test_failed_flush_keeps_cache_ahead_of_store() {
    let t = TestEngine::new();
    let repo = &t.engine.repos().users;
    t.users.set_fail_writes(true);

    repo.put(alice());
    let err = repo.flush().await.unwrap_err();
    assert_eq!(err.lost, 1);
    assert_eq!(err.repository, "users");

    // Not retried, not rolled back.
    assert_eq!(repo.pending_len(), 0);
    assert_eq!(repo.peek(&"alice".to_string()), Some(alice()));
    assert!(t.users.is_empty());
}
