//! Rotation Integration Tests
//!
//! End-to-end scenarios over real temp directories: size and date rolls,
//! the backup cascade, compression, retention, locking, and durability
//! accounting.

use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, TimeZone, Utc};
use rollsink::{
    Error, FileLockCoordinator, MockClock, RollingSink, RotationConfig,
};
use tempfile::TempDir;

/// Helper to build a block of `len` copies of `byte`.
fn block(byte: u8, len: usize) -> Vec<u8> {
    vec![byte; len]
}

/// Helper to read a file fully.
fn read(path: &Path) -> Vec<u8> {
    std::fs::read(path).unwrap()
}

/// Helper to gunzip a compressed backup.
fn gunzip(path: &Path) -> Vec<u8> {
    let file = std::fs::File::open(path).unwrap();
    let mut decoder = flate2::read::GzDecoder::new(file);
    let mut body = Vec::new();
    decoder.read_to_end(&mut body).unwrap();
    body
}

/// Helper to list a directory's file names, sorted.
fn file_names(dir: &Path) -> Vec<String> {
    let mut names: Vec<String> = std::fs::read_dir(dir)
        .unwrap()
        .map(|entry| entry.unwrap().file_name().into_string().unwrap())
        .collect();
    names.sort();
    names
}

fn at(y: i32, mo: u32, d: u32, h: u32, mi: u32, s: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(y, mo, d, h, mi, s).unwrap()
}

/// Helper to open a sink on a mock clock.
async fn open_at(
    path: &Path,
    config: RotationConfig,
    clock: &Arc<MockClock>,
) -> RollingSink {
    RollingSink::open_with(
        path,
        config,
        clock.clone(),
        Arc::new(FileLockCoordinator::new()),
    )
    .await
    .unwrap()
}

#[tokio::test]
async fn test_size_rotation_cascade() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("app.log");
    let config = RotationConfig {
        max_size_bytes: 100,
        backup_count: 2,
        ..Default::default()
    };
    let mut sink = RollingSink::open(&path, config).await.unwrap();

    // First block fits; second and third each force a roll.
    sink.write(&block(b'a', 60)).await.unwrap();
    assert_eq!(sink.stats().rolls, 0);
    sink.write(&block(b'b', 60)).await.unwrap();
    sink.write(&block(b'c', 60)).await.unwrap();
    assert_eq!(sink.stats().rolls, 2);
    sink.close().await.unwrap();

    assert_eq!(read(&path), block(b'c', 60));
    assert_eq!(read(&dir.path().join("app.log.1")), block(b'b', 60));
    assert_eq!(read(&dir.path().join("app.log.2")), block(b'a', 60));
    assert_eq!(file_names(dir.path()), ["app.log", "app.log.1", "app.log.2"]);
}

#[tokio::test]
async fn test_oversized_block_lands_whole_then_rolls() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("app.log");
    let config = RotationConfig {
        max_size_bytes: 100,
        backup_count: 2,
        ..Default::default()
    };
    let mut sink = RollingSink::open(&path, config).await.unwrap();

    // An empty live file takes any block, even one past the limit.
    sink.write(&block(b'x', 250)).await.unwrap();
    assert_eq!(sink.stats().rolls, 0);
    assert_eq!(sink.current_size(), 250);

    // The next write rolls the oversized file out first.
    sink.write(&block(b'y', 10)).await.unwrap();
    assert_eq!(sink.stats().rolls, 1);
    assert_eq!(sink.current_size(), 10);
    sink.close().await.unwrap();

    assert_eq!(read(&dir.path().join("app.log.1")), block(b'x', 250));
    assert_eq!(read(&path), block(b'y', 10));
}

#[tokio::test]
async fn test_no_bytes_lost_across_rolls() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("app.log");
    let config = RotationConfig {
        max_size_bytes: 64,
        backup_count: 10,
        ..Default::default()
    };
    let mut sink = RollingSink::open(&path, config).await.unwrap();

    // Eight 40-byte blocks: every write after the first rolls.
    let blocks: Vec<Vec<u8>> = (0..8).map(|i| block(b'a' + i, 40)).collect();
    for b in &blocks {
        sink.write(b).await.unwrap();
    }
    assert_eq!(sink.stats().rolls, 7);
    sink.close().await.unwrap();

    // Oldest-to-newest is highest index down to slot 1, then the live file.
    let mut recovered = Vec::new();
    for index in (1..=7u32).rev() {
        recovered.extend(read(&dir.path().join(format!("app.log.{index}"))));
    }
    recovered.extend(read(&path));

    let written: Vec<u8> = blocks.concat();
    assert_eq!(recovered, written, "concatenation must reproduce every block in order");
}

#[tokio::test]
async fn test_midnight_rollover_labels_new_day() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("app.log");
    let clock = Arc::new(MockClock::new(at(2023, 12, 31, 23, 59, 0)));
    let config = RotationConfig {
        date_pattern: Some("%Y-%m-%d".to_string()),
        backup_count: 3,
        ..Default::default()
    };
    let mut sink = open_at(&path, config, &clock).await;

    sink.write(b"day-one\n").await.unwrap();
    assert_eq!(sink.stats().rolls, 0);

    // Midnight passes between writes; no size pressure anywhere.
    clock.set(at(2024, 1, 1, 0, 0, 5));
    sink.write(b"day-two\n").await.unwrap();
    assert_eq!(sink.stats().rolls, 1);
    assert_eq!(sink.current_size(), 8, "size accounting resets on the roll");
    sink.close().await.unwrap();

    // The backup carries the new day's label.
    assert_eq!(
        read(&dir.path().join("app.log.2024-01-01.1")),
        b"day-one\n"
    );
    assert_eq!(read(&path), b"day-two\n");
}

#[tokio::test]
async fn test_size_roll_stays_in_current_bucket() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("app.log");
    let clock = Arc::new(MockClock::new(at(2024, 1, 1, 9, 0, 0)));
    let config = RotationConfig {
        date_pattern: Some("%Y-%m-%d".to_string()),
        max_size_bytes: 100,
        backup_count: 3,
        ..Default::default()
    };
    let mut sink = open_at(&path, config, &clock).await;

    sink.write(&block(b'a', 60)).await.unwrap();
    sink.write(&block(b'b', 60)).await.unwrap(); // size roll, same day
    sink.write(&block(b'c', 60)).await.unwrap(); // size roll, same day
    assert_eq!(sink.stats().rolls, 2);
    sink.close().await.unwrap();

    // Everything stays under the 2024-01-01 label; indexes do the shifting.
    assert_eq!(read(&dir.path().join("app.log.2024-01-01.2")), block(b'a', 60));
    assert_eq!(read(&dir.path().join("app.log.2024-01-01.1")), block(b'b', 60));
    assert_eq!(read(&path), block(b'c', 60));
}

#[tokio::test]
async fn test_date_roll_preserves_backups_in_revisited_bucket() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("app.log");
    // Hourly labels repeat every day: yesterday's 10:00 backup already
    // occupies slot 1 of the bucket today's roll is about to use.
    std::fs::write(dir.path().join("app.log.10.1"), b"yesterday").unwrap();

    let clock = Arc::new(MockClock::new(at(2024, 1, 2, 9, 0, 0)));
    let config = RotationConfig {
        date_pattern: Some("%H".to_string()),
        backup_count: 3,
        ..Default::default()
    };
    let mut sink = open_at(&path, config, &clock).await;
    sink.write(b"nine\n").await.unwrap();

    clock.set(at(2024, 1, 2, 10, 0, 0));
    sink.write(b"ten\n").await.unwrap();
    assert_eq!(sink.stats().rolls, 1);
    sink.close().await.unwrap();

    // The stale occupant shifts up a slot instead of being clobbered.
    assert_eq!(read(&dir.path().join("app.log.10.1")), b"nine\n");
    assert_eq!(read(&dir.path().join("app.log.10.2")), b"yesterday");
    assert_eq!(read(&path), b"ten\n");
}

#[tokio::test]
async fn test_retention_keeps_most_recent_across_days() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("app.log");
    let clock = Arc::new(MockClock::new(at(2024, 1, 1, 9, 0, 0)));
    let config = RotationConfig {
        date_pattern: Some("%Y-%m-%d".to_string()),
        backup_count: 2,
        ..Default::default()
    };
    let mut sink = open_at(&path, config, &clock).await;

    // One write per day across four days; each day change rolls.
    sink.write(b"monday\n").await.unwrap();
    clock.set(at(2024, 1, 2, 9, 0, 0));
    sink.write(b"tuesday\n").await.unwrap();
    clock.set(at(2024, 1, 3, 9, 0, 0));
    sink.write(b"wednesday\n").await.unwrap();
    clock.set(at(2024, 1, 4, 9, 0, 0));
    sink.write(b"thursday\n").await.unwrap();
    assert_eq!(sink.stats().rolls, 3);
    assert_eq!(sink.stats().cleanup_failures, 0);

    // Only the two most recent backups survive the third roll.
    assert_eq!(
        file_names(dir.path()),
        [
            "app.log",
            "app.log.2024-01-03.1",
            "app.log.2024-01-04.1"
        ]
    );
    assert_eq!(read(&dir.path().join("app.log.2024-01-04.1")), b"wednesday\n");
    assert_eq!(read(&dir.path().join("app.log.2024-01-03.1")), b"tuesday\n");
    assert_eq!(read(&path), b"thursday\n");

    // Another day, another roll: pruning stays consistent, nothing double-
    // deleted, no failures counted.
    clock.set(at(2024, 1, 5, 9, 0, 0));
    sink.write(b"friday\n").await.unwrap();
    assert_eq!(sink.stats().cleanup_failures, 0);
    sink.close().await.unwrap();
    assert_eq!(
        file_names(dir.path()),
        [
            "app.log",
            "app.log.2024-01-04.1",
            "app.log.2024-01-05.1"
        ]
    );
}

#[tokio::test]
async fn test_compressed_backups_round_trip() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("app.log");
    let config = RotationConfig {
        max_size_bytes: 100,
        backup_count: 2,
        compress: true,
        ..Default::default()
    };
    let mut sink = RollingSink::open(&path, config).await.unwrap();

    sink.write(&block(b'a', 60)).await.unwrap();
    sink.write(&block(b'b', 60)).await.unwrap(); // roll: a -> .1.gz
    sink.write(&block(b'c', 60)).await.unwrap(); // roll: .1.gz -> .2.gz, b -> .1.gz
    sink.close().await.unwrap();

    assert_eq!(
        file_names(dir.path()),
        ["app.log", "app.log.1.gz", "app.log.2.gz"]
    );
    assert_eq!(gunzip(&dir.path().join("app.log.1.gz")), block(b'b', 60));
    assert_eq!(gunzip(&dir.path().join("app.log.2.gz")), block(b'a', 60));
    assert_eq!(read(&path), block(b'c', 60));
}

#[tokio::test]
async fn test_foreign_gz_neighbor_survives_compressed_roll() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("app.log");
    // A hand-compressed archive sharing the live file's name plus `.gz`.
    // The roll must rotate the live file itself, not this neighbor.
    std::fs::write(dir.path().join("app.log.gz"), b"archive").unwrap();

    let config = RotationConfig {
        max_size_bytes: 100,
        backup_count: 2,
        compress: true,
        ..Default::default()
    };
    let mut sink = RollingSink::open(&path, config).await.unwrap();
    sink.write(&block(b'a', 60)).await.unwrap();
    sink.write(&block(b'b', 60)).await.unwrap(); // size roll
    sink.close().await.unwrap();

    assert_eq!(
        file_names(dir.path()),
        ["app.log", "app.log.1.gz", "app.log.gz"]
    );
    assert_eq!(gunzip(&dir.path().join("app.log.1.gz")), block(b'a', 60));
    assert_eq!(read(&path), block(b'b', 60));
    assert_eq!(read(&dir.path().join("app.log.gz")), b"archive");
}

#[tokio::test]
async fn test_lock_contention_fails_write_and_recovers() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("app.log");
    let lock_path = dir.path().join("app.log.lock");
    let config = RotationConfig {
        max_size_bytes: 100,
        backup_count: 2,
        use_lock: true,
        lock_retries: 2,
        ..Default::default()
    };
    let mut sink = RollingSink::open(&path, config).await.unwrap();
    sink.write(&block(b'a', 60)).await.unwrap();

    // Another process holds the rotation lock.
    std::fs::write(&lock_path, b"").unwrap();
    let err = sink.write(&block(b'b', 60)).await.unwrap_err();
    assert!(matches!(err, Error::LockContention { attempts: 2, .. }));
    assert_eq!(read(&path), block(b'a', 60), "failed write appended nothing");

    // Holder releases; the same write now rolls and lands.
    std::fs::remove_file(&lock_path).unwrap();
    sink.write(&block(b'b', 60)).await.unwrap();
    assert_eq!(sink.stats().rolls, 1);
    assert!(!lock_path.exists(), "roll released the lock");
    sink.close().await.unwrap();

    assert_eq!(read(&dir.path().join("app.log.1")), block(b'a', 60));
    assert_eq!(read(&path), block(b'b', 60));
}

#[tokio::test]
async fn test_append_mode_restores_size_accounting() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("app.log");
    std::fs::write(&path, block(b'z', 120)).unwrap();

    let config = RotationConfig {
        max_size_bytes: 100,
        backup_count: 1,
        ..Default::default()
    };
    let mut sink = RollingSink::open(&path, config).await.unwrap();
    assert_eq!(sink.current_size(), 120);

    // The preexisting file is already over the limit, so the first write
    // rolls it out before appending.
    sink.write(&block(b'n', 10)).await.unwrap();
    assert_eq!(sink.stats().rolls, 1);
    sink.close().await.unwrap();

    assert_eq!(read(&dir.path().join("app.log.1")), block(b'z', 120));
    assert_eq!(read(&path), block(b'n', 10));
}

#[tokio::test]
async fn test_keep_extension_layout_end_to_end() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("app.log");
    let clock = Arc::new(MockClock::new(at(2024, 1, 1, 9, 0, 0)));
    let config = RotationConfig {
        date_pattern: Some("%Y-%m-%d".to_string()),
        max_size_bytes: 100,
        backup_count: 3,
        keep_extension: true,
        ..Default::default()
    };
    let mut sink = open_at(&path, config, &clock).await;

    sink.write(&block(b'a', 60)).await.unwrap();
    sink.write(&block(b'b', 60)).await.unwrap();
    sink.close().await.unwrap();

    assert_eq!(
        file_names(dir.path()),
        ["app.2024-01-01.1.log", "app.log"]
    );
    assert_eq!(read(&dir.path().join("app.2024-01-01.1.log")), block(b'a', 60));
}

#[tokio::test]
async fn test_custom_separator_layout() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("app.log");
    let config = RotationConfig {
        max_size_bytes: 100,
        backup_count: 1,
        separator: "-".to_string(),
        ..Default::default()
    };
    let mut sink = RollingSink::open(&path, config).await.unwrap();

    sink.write(&block(b'a', 60)).await.unwrap();
    sink.write(&block(b'b', 60)).await.unwrap();
    sink.close().await.unwrap();

    assert_eq!(file_names(dir.path()), ["app.log", "app.log-1"]);
}

#[tokio::test]
async fn test_flush_scheduling_smoke() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("app.log");
    let clock = Arc::new(MockClock::new(at(2024, 1, 1, 9, 0, 0)));
    let config = RotationConfig {
        sync_threshold_bytes: 1,
        sync_interval: std::time::Duration::from_millis(100),
        ..Default::default()
    };
    let mut sink = open_at(&path, config, &clock).await;

    // Byte threshold: every write flushes.
    sink.write(b"first\n").await.unwrap();

    // Interval: trips on the next write once the clock moves past it.
    clock.advance(chrono::Duration::milliseconds(150));
    sink.write(b"second\n").await.unwrap();

    assert_eq!(sink.stats().flush_failures, 0);
    sink.sync().await.unwrap();
    sink.close().await.unwrap();
    assert_eq!(read(&path), b"first\nsecond\n");
}

#[tokio::test]
async fn test_foreign_files_survive_pruning() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("app.log");
    // Neighbors that merely share a prefix with backup names.
    std::fs::write(dir.path().join("app.log.bak"), b"keep me").unwrap();
    std::fs::write(dir.path().join("app.log.1.txt"), b"me too").unwrap();

    let config = RotationConfig {
        max_size_bytes: 100,
        backup_count: 1,
        ..Default::default()
    };
    let mut sink = RollingSink::open(&path, config).await.unwrap();
    sink.write(&block(b'a', 60)).await.unwrap();
    sink.write(&block(b'b', 60)).await.unwrap();
    sink.write(&block(b'c', 60)).await.unwrap();
    sink.close().await.unwrap();

    assert_eq!(
        file_names(dir.path()),
        ["app.log", "app.log.1", "app.log.1.txt", "app.log.bak"]
    );
}

#[tokio::test]
async fn test_reopen_continues_rotation_family() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("app.log");
    let config = RotationConfig {
        max_size_bytes: 100,
        backup_count: 3,
        ..Default::default()
    };

    // First run: one roll.
    {
        let mut sink = RollingSink::open(&path, config.clone()).await.unwrap();
        sink.write(&block(b'a', 60)).await.unwrap();
        sink.write(&block(b'b', 60)).await.unwrap();
        sink.close().await.unwrap();
    }

    // Restart: the existing live file and backups feed into the same chain.
    {
        let mut sink = RollingSink::open(&path, config).await.unwrap();
        assert_eq!(sink.current_size(), 60);
        sink.write(&block(b'c', 60)).await.unwrap();
        sink.close().await.unwrap();
    }

    assert_eq!(read(&dir.path().join("app.log.2")), block(b'a', 60));
    assert_eq!(read(&dir.path().join("app.log.1")), block(b'b', 60));
    assert_eq!(read(&path), block(b'c', 60));
}

#[tokio::test]
async fn test_paths_are_reported_expanded() {
    let dir = TempDir::new().unwrap();
    let path: PathBuf = dir.path().join("app.log");
    let sink = RollingSink::open(&path, RotationConfig::default())
        .await
        .unwrap();
    assert_eq!(sink.path(), path.as_path());
    sink.abort();
}
