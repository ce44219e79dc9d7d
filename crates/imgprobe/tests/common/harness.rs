//! Test harness for isolated test execution.
//!
//! Every harness owns a temporary directory with `input/`, `uploads/` and
//! `config/` subdirectories, and writes image fixtures with the `image` crate.

#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use image::{Rgba, RgbaImage};
use tempfile::TempDir;

use imgprobe::{AnalysisTask, Config, Dispatcher, StatusReporter};

pub struct TestHarness {
    temp_dir: TempDir,
    pub input_dir: PathBuf,
    pub artifact_dir: PathBuf,
    pub config_dir: PathBuf,
}

impl TestHarness {
    pub fn new() -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let base = temp_dir.path();

        let input_dir = base.join("input");
        let artifact_dir = base.join("uploads");
        let config_dir = base.join("config");

        std::fs::create_dir_all(&input_dir).expect("Failed to create input dir");
        std::fs::create_dir_all(&config_dir).expect("Failed to create config dir");

        Self {
            temp_dir,
            input_dir,
            artifact_dir,
            config_dir,
        }
    }

    pub fn temp_path(&self) -> &Path {
        self.temp_dir.path()
    }

    /// Writes a uniform opaque PNG with every color channel set to `value`.
    pub fn write_gray_png(&self, filename: &str, width: u32, height: u32, value: u8) -> PathBuf {
        let path = self.input_dir.join(filename);
        RgbaImage::from_pixel(width, height, Rgba([value, value, value, 255]))
            .save(&path)
            .expect("Failed to write PNG fixture");
        path
    }

    /// Writes bytes that no decoder accepts, under an image extension.
    pub fn write_corrupt(&self, filename: &str) -> PathBuf {
        let path = self.input_dir.join(filename);
        std::fs::write(&path, b"\x89PNG\r\n\x1a\nthis is not really a png")
            .expect("Failed to write corrupt fixture");
        path
    }

    pub fn write_config(&self, filename: &str, config: &Config) -> PathBuf {
        let path = self.config_dir.join(filename);
        let json = serde_json::to_string_pretty(config).expect("Failed to serialize config");
        std::fs::write(&path, json).expect("Failed to write config file");
        path
    }

    pub fn dispatcher(&self, config: &Config) -> Dispatcher {
        Dispatcher::from_config(config).expect("Failed to build dispatcher")
    }

    /// Polls `status` until the task is terminal, calling `observe` on every
    /// snapshot along the way.
    pub async fn poll_until_terminal(
        reporter: &StatusReporter,
        id: &str,
        timeout: Duration,
        mut observe: impl FnMut(&AnalysisTask),
    ) -> AnalysisTask {
        let deadline = Instant::now() + timeout;
        loop {
            let task = reporter.status(id).expect("Task disappeared");
            observe(&task);
            if task.is_terminal() {
                return task;
            }
            assert!(Instant::now() < deadline, "Task {} did not finish in time", id);
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    }
}
