//! Worker pool collection tests.

use procsock::{CallerConfig, Collector, Error, Result};

use crate::common::{FixtureSource, SockBuf};

fn busy_host() -> FixtureSource {
    let mut source = FixtureSource::new();
    for pid in 1..=40 {
        source = source.process(pid, &format!("worker{pid}"));
        for fd in 0..4 {
            let local = format!("10.0.{}.{}:{}", pid, fd, 20000 + fd);
            source = source.socket(pid, fd + 3, SockBuf::tcp(&local, "10.1.0.1:443", 4));
        }
        // every process also sees the same shared listener
        source = source.socket(pid, 10, SockBuf::tcp("0.0.0.0:8080", "0.0.0.0:0", 1));
    }
    source
}

#[tokio::test]
async fn test_concurrent_matches_sequential() -> Result<()> {
    let config = CallerConfig {
        processes: true,
        ..Default::default()
    };

    let sequential = Collector::new(busy_host(), &config).collect()?;
    for workers in [1, 3, 16] {
        let concurrent = Collector::new(busy_host(), &config)
            .collect_concurrent(workers)
            .await?;
        assert_eq!(
            concurrent.clone().into_records(),
            sequential.clone().into_records(),
            "workers = {workers}"
        );
    }

    // 4 connections per process plus one shared listener
    assert_eq!(sequential.len(), 40 * 4 + 1);
    Ok(())
}

#[tokio::test]
async fn test_concurrent_zero_workers_still_runs() -> Result<()> {
    let set = Collector::new(busy_host(), &CallerConfig::default())
        .collect_concurrent(0)
        .await?;
    assert_eq!(set.len(), 161);
    Ok(())
}

#[tokio::test]
async fn test_concurrent_oversized_worker_count() -> Result<()> {
    let set = Collector::new(busy_host(), &CallerConfig::default())
        .collect_concurrent(usize::MAX)
        .await?;
    assert_eq!(set.len(), 161);
    assert_eq!(set.iter().next().unwrap().owner_pid, 40);
    Ok(())
}

#[tokio::test]
async fn test_concurrent_enumeration_failure() {
    let source = FixtureSource::new().failing(13);
    let err = Collector::new(source, &CallerConfig::default())
        .collect_concurrent(4)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::EnumerationFailed { errno: 13, .. }));
}
