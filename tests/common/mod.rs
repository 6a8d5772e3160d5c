/*!
 * Common test utilities for the subtrans test suite
 */

#![allow(dead_code)]

use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;

use subtrans::document::{BatchingConfig, SubtitleBatcher, SubtitleFile, SubtitleLine};
use subtrans::project::SubtitleProject;
use subtrans::providers::{BackoffTimer, ClientSettings};

/// Route library logging through env_logger; safe to call from every test
pub fn init_test_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Backoff timer that records requested delays instead of sleeping
#[derive(Debug, Default)]
pub struct RecordingTimer {
    delays: Mutex<Vec<Duration>>,
}

impl RecordingTimer {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn delays(&self) -> Vec<Duration> {
        self.delays.lock().clone()
    }
}

#[async_trait]
impl BackoffTimer for RecordingTimer {
    async fn sleep(&self, duration: Duration) {
        self.delays.lock().push(duration);
    }
}

/// Client settings with a short backoff and no rate limit
pub fn fast_settings(max_retries: u32) -> ClientSettings {
    ClientSettings::default()
        .with_model("mock-model")
        .with_max_retries(max_retries)
        .with_backoff_time(Duration::from_millis(10))
        .with_timeout(Some(Duration::from_secs(5)))
}

/// `count` lines two seconds apart, numbered from `first`, starting at `start_ms`
pub fn lines_from(first: usize, count: usize, start_ms: u64) -> Vec<SubtitleLine> {
    (0..count)
        .map(|offset| {
            let start = start_ms + offset as u64 * 2000;
            SubtitleLine::new(first + offset, start, start + 1500, format!("Line {}", first + offset))
        })
        .collect()
}

/// Lines with a long gap after each scene: `scene_sizes[i]` lines per scene
pub fn scene_lines(scene_sizes: &[usize]) -> Vec<SubtitleLine> {
    let mut lines = Vec::new();
    let mut start_ms = 0;
    for size in scene_sizes {
        let first = lines.len() + 1;
        lines.extend(lines_from(first, *size, start_ms));
        start_ms += *size as u64 * 2000 + 120_000;
    }
    lines
}

/// A batched file with one scene per entry of `scene_sizes`
pub fn batched_file(scene_sizes: &[usize], max_batch_size: usize) -> SubtitleFile {
    let mut file = SubtitleFile::from_lines(scene_lines(scene_sizes));
    let batcher = SubtitleBatcher::new(BatchingConfig::new(60.0, 1, max_batch_size)).unwrap();
    batcher.batch_file(&mut file).unwrap();
    file
}

/// A project around `batched_file`
pub fn batched_project(scene_sizes: &[usize], max_batch_size: usize) -> SubtitleProject {
    SubtitleProject::new(batched_file(scene_sizes, max_batch_size))
}
