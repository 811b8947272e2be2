use super::*;
use st_db::DuckDbBackend;

fn lock(timeout_ms: u64) -> MigrationLock {
    MigrationLock::new(7, Duration::from_millis(timeout_ms), Duration::from_millis(10))
}

#[tokio::test]
async fn test_acquire_and_release() {
    let db = DuckDbBackend::in_memory().unwrap();
    let lock = lock(100);
    lock.acquire(&db, "run-a").await.unwrap();
    lock.release(&db, "run-a").await.unwrap();
    lock.acquire(&db, "run-b").await.unwrap();
}

#[tokio::test]
async fn test_contention_times_out() {
    let first = DuckDbBackend::in_memory().unwrap();
    let second = first.try_clone().unwrap();
    let lock = lock(50);
    lock.acquire(&first, "run-a").await.unwrap();

    let started = Instant::now();
    let err = lock.acquire(&second, "run-b").await.unwrap_err();
    assert!(started.elapsed() >= Duration::from_millis(50));
    match err {
        MigrateError::LockContention { key, waited_ms } => {
            assert_eq!(key, 7);
            assert!(waited_ms >= 50);
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[tokio::test]
async fn test_waits_for_release() {
    let first = DuckDbBackend::in_memory().unwrap();
    let second = first.try_clone().unwrap();
    let holder = lock(1_000);
    holder.acquire(&first, "run-a").await.unwrap();

    let waiter = async {
        lock(1_000).acquire(&second, "run-b").await
    };
    let releaser = async {
        tokio::time::sleep(Duration::from_millis(40)).await;
        holder.release(&first, "run-a").await
    };
    let (acquired, released) = tokio::join!(waiter, releaser);
    released.unwrap();
    acquired.unwrap();
}
