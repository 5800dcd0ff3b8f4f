// End-to-end scenarios against the pool's public surface, using the in-memory mock connector
// rather than a real driver.

use std::time::Duration;

use rusty_pool::pool::mock::shared_connector;
use rusty_pool::pool::{MaxWait, Pool, PoolConfig};

#[tokio::test]
async fn round_trip_preserves_identity() {
    let connector = shared_connector();
    let config = PoolConfig::builder().min_size(0).max_size(2).build().unwrap();
    let pool = Pool::new(config, connector.clone(), None).await.unwrap();

    let lease = pool.acquire().await.unwrap();
    let first_id = lease.get().await.unwrap().id();
    pool.release(Some(lease)).await.unwrap();

    let lease = pool.acquire().await.unwrap();
    let second_id = lease.get().await.unwrap().id();
    pool.release(Some(lease)).await.unwrap();

    assert_eq!(first_id, second_id, "a single idle session should be reused");
    assert_eq!(connector.opened_count(), 1, "no extra sessions should have been opened");

    let stats = pool.statistics().await;
    assert_eq!(stats.lifetime_lease_count, 2);
    assert_eq!(stats.outstanding_leases, 0);
    assert_eq!(stats.available_connections, 1);
}

#[tokio::test]
async fn growth_under_contention_blocks_then_succeeds() {
    let connector = shared_connector();
    let config = PoolConfig::builder().min_size(0).max_size(1).build().unwrap();
    let pool = Pool::new(config, connector.clone(), None).await.unwrap();

    let first = pool.acquire().await.unwrap();

    let waiter_pool = pool.clone();
    let waiter = tokio::spawn(async move { waiter_pool.acquire().await });

    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(!waiter.is_finished(), "second acquire should block while the pool is exhausted");

    pool.release(Some(first)).await.unwrap();

    let second = tokio::time::timeout(Duration::from_secs(2), waiter)
        .await
        .expect("waiter should complete shortly after release")
        .expect("join should not panic")
        .expect("acquire should succeed");
    pool.release(Some(second)).await.unwrap();

    assert_eq!(connector.opened_count(), 1, "max_size of 1 should never be exceeded");
}

#[tokio::test]
async fn acquire_timeout_returns_none_on_exhaustion() {
    let connector = shared_connector();
    let config = PoolConfig::builder().min_size(0).max_size(1).build().unwrap();
    let pool = Pool::new(config, connector, None).await.unwrap();

    let _held = pool.acquire().await.unwrap();

    let result = pool
        .acquire_timeout(MaxWait::Bounded(Duration::from_millis(50)))
        .await
        .unwrap();
    assert!(result.is_none(), "acquire should time out rather than wait forever");
}

#[tokio::test]
async fn acquire_none_fails_fast_without_waiting() {
    let connector = shared_connector();
    let config = PoolConfig::builder().min_size(0).max_size(1).build().unwrap();
    let pool = Pool::new(config, connector, None).await.unwrap();

    let _held = pool.acquire().await.unwrap();

    let start = std::time::Instant::now();
    let result = pool.acquire_timeout(MaxWait::None).await.unwrap();
    assert!(result.is_none());
    assert!(start.elapsed() < Duration::from_millis(100), "MaxWait::None must not block");
}

/// Literal end-to-end scenario 4 from the specification: min=1, max=2, retire_after=2; acquire
/// and release the *same* session twice; on the second release it retires and, being below
/// min_size, is immediately replaced.
#[tokio::test]
async fn retirement_closes_and_refills_after_use_limit() {
    let connector = shared_connector();
    let config = PoolConfig::builder()
        .min_size(1)
        .max_size(2)
        .retire_after(2)
        .build()
        .unwrap();
    let pool = Pool::new(config, connector.clone(), None).await.unwrap();
    assert_eq!(connector.opened_count(), 1);

    let lease = pool.acquire().await.unwrap();
    let first_id = lease.get().await.unwrap().id();
    pool.release(Some(lease)).await.unwrap();

    let stats = pool.statistics().await;
    assert_eq!(stats.retired_connections, Some(0), "retirement must not fire before the configured limit");

    let lease = pool.acquire().await.unwrap();
    assert_eq!(lease.get().await.unwrap().id(), first_id, "the same session should be reused for its 2nd lease");
    pool.release(Some(lease)).await.unwrap();

    let stats = pool.statistics().await;
    assert_eq!(stats.retired_connections, Some(1), "the session's 2nd release should retire it");
    assert_eq!(stats.current_pool_size, 1, "min_size should be refilled after retirement");
    assert_eq!(connector.opened_count(), 2, "the retired session should be replaced with a new one");

    let lease = pool.acquire().await.unwrap();
    assert_ne!(
        lease.get().await.unwrap().id(),
        first_id,
        "the replacement session must have a distinct identity from the retired one"
    );
    pool.release(Some(lease)).await.unwrap();
}

#[tokio::test]
async fn expiry_sweep_closes_idle_sessions_and_refills() {
    let connector = shared_connector();
    let config = PoolConfig::builder()
        .min_size(1)
        .max_size(2)
        .expire_after(Duration::from_millis(30))
        .build()
        .unwrap();
    let pool = Pool::new(config, connector.clone(), None).await.unwrap();
    assert_eq!(connector.opened_count(), 1);

    tokio::time::sleep(Duration::from_millis(400)).await;

    let stats = pool.statistics().await;
    assert_eq!(stats.expired_connections, Some(1));
    assert_eq!(stats.current_pool_size, 1, "sweeper should refill down to min_size");
    assert!(connector.opened_count() >= 2, "the expired session should have been replaced");

    pool.shutdown().await;
}

#[tokio::test]
async fn shutdown_waits_for_outstanding_lease_then_closes_everything() {
    let connector = shared_connector();
    let config = PoolConfig::builder().min_size(1).max_size(2).build().unwrap();
    let pool = Pool::new(config, connector.clone(), None).await.unwrap();

    let lease = pool.acquire().await.unwrap();

    let shutdown_pool = pool.clone();
    let shutdown_task = tokio::spawn(async move { shutdown_pool.shutdown().await });

    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(!shutdown_task.is_finished(), "shutdown should wait for the outstanding lease");

    pool.release(Some(lease)).await.unwrap();
    tokio::time::timeout(Duration::from_secs(2), shutdown_task)
        .await
        .expect("shutdown should complete shortly after the lease is released")
        .expect("join should not panic");

    assert!(pool.is_shutdown());
    assert!(pool.acquire().await.is_err(), "acquire must fail once the pool is shut down");
}
