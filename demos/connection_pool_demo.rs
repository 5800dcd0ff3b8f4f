//! Walks through the three things a caller of `rusty_pool` actually does: acquire/release
//! under an elastic size range, watch use-count retirement kick in, and read a statistics
//! snapshot back out. Uses the crate's own in-memory mock connector (`test-support`) rather
//! than a real driver, so the demo runs with no external database.

use std::time::Duration;

use rusty_pool::pool::mock::shared_connector;
use rusty_pool::pool::{MaxWait, Pool, PoolConfig};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt::init();

    println!("=== rusty-pool connection pool demo ===\n");

    basic_pool_example().await?;
    retirement_example().await?;
    statistics_example().await?;

    Ok(())
}

async fn basic_pool_example() -> Result<(), Box<dyn std::error::Error>> {
    println!("Example 1: elastic sizing under contention");
    println!("--------------------------------------------");

    let config = PoolConfig::builder().min_size(0).max_size(3).build()?;
    println!(
        "Pool configured: min_size={} max_size={}",
        config.min_size, config.max_size
    );

    let connector = shared_connector();
    let pool = Pool::new(config, connector.clone(), None).await?;

    println!("\nAcquiring connections...");
    let mut leases = Vec::new();
    for i in 0..3 {
        let lease = pool.acquire_timeout(MaxWait::None).await?;
        match lease {
            Some(lease) => {
                let id = lease.get().await?.id();
                println!("  [{i}] acquired session {id}");
                leases.push(lease);
            }
            None => println!("  [{i}] no session immediately available"),
        }
    }

    let stats = pool.statistics().await;
    println!(
        "\nPool state with all leases held: current_pool_size={} outstanding_leases={}",
        stats.current_pool_size, stats.outstanding_leases
    );

    for lease in leases {
        pool.release(Some(lease)).await?;
    }

    let stats = pool.statistics().await;
    println!(
        "Pool state after releasing: current_pool_size={} available_connections={}\n",
        stats.current_pool_size, stats.available_connections
    );

    pool.shutdown().await;
    Ok(())
}

async fn retirement_example() -> Result<(), Box<dyn std::error::Error>> {
    println!("Example 2: use-count retirement and refill");
    println!("---------------------------------------------");

    let config = PoolConfig::builder()
        .min_size(1)
        .max_size(2)
        .retire_after(2)
        .build()?;
    let connector = shared_connector();
    let pool = Pool::new(config, connector.clone(), None).await?;

    for i in 0..3 {
        let lease = pool.acquire().await?;
        let id = lease.get().await?.id();
        println!("  lease {i}: session {id}");
        pool.release(Some(lease)).await?;
    }

    let stats = pool.statistics().await;
    println!(
        "\nAfter 3 leases with retire_after=2: retired_connections={:?} sessions_opened={}\n",
        stats.retired_connections,
        connector.opened_count()
    );

    pool.shutdown().await;
    Ok(())
}

async fn statistics_example() -> Result<(), Box<dyn std::error::Error>> {
    println!("Example 3: statistics snapshot");
    println!("---------------------------------");

    let config = PoolConfig::builder().min_size(1).max_size(5).build()?;
    let connector = shared_connector();
    let pool = Pool::new(config, connector, None).await?;

    for _ in 0..5 {
        let lease = pool.acquire().await?;
        tokio::time::sleep(Duration::from_millis(5)).await;
        pool.release(Some(lease)).await?;
    }

    let stats = pool.statistics().await;
    println!("  lifetime_lease_count:       {}", stats.lifetime_lease_count);
    println!("  greatest_leased_count:      {}", stats.greatest_leased_count);
    println!("  average_leased_count:       {:.2}", stats.average_leased_count);
    println!(
        "  average_acquire_time_ms:    {:?}",
        stats.average_acquire_time_ms
    );
    println!("  average_lease_time_ms:      {:?}", stats.average_lease_time_ms);

    println!("\n  JSON:");
    let json = serde_json::to_string_pretty(&stats)?;
    println!("{json}");

    pool.shutdown().await;
    Ok(())
}
