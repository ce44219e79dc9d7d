//! Builders for test configurations.

#![allow(dead_code)]

use std::path::Path;

use imgprobe::config::schema::{AnalyzerConfig, Config};
use imgprobe::{AnalyzerKind, ArtifactFormat, ArtifactKind, Narrowing};

/// Builder for creating `Config` instances.
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    /// Starts from the defaults with PNG artifacts and no analyzers.
    pub fn new(artifact_dir: &Path) -> Self {
        let mut config = Config::default();
        config.artifact_directory = artifact_dir.to_path_buf();
        config.artifacts.format = ArtifactFormat::Png;
        config.analyzers = Vec::new();
        config.max_concurrent_tasks = 4;
        config.analyzer_timeout_secs = 30;
        config.task_timeout_secs = 60;
        Self { config }
    }

    pub fn max_concurrent_tasks(mut self, n: usize) -> Self {
        self.config.max_concurrent_tasks = n;
        self
    }

    pub fn task_timeout_secs(mut self, secs: u64) -> Self {
        self.config.task_timeout_secs = secs;
        self
    }

    pub fn analyzer_timeout_secs(mut self, secs: u64) -> Self {
        self.config.analyzer_timeout_secs = secs;
        self
    }

    pub fn max_finished_tasks(mut self, n: usize) -> Self {
        self.config.max_finished_tasks = n;
        self
    }

    pub fn finished_task_grace_secs(mut self, secs: u64) -> Self {
        self.config.finished_task_grace_secs = secs;
        self
    }

    pub fn narrowing(mut self, narrowing: Narrowing) -> Self {
        self.config.transforms.narrowing = narrowing;
        self
    }

    pub fn jpeg(mut self) -> Self {
        self.config.artifacts.format = ArtifactFormat::Jpeg;
        self
    }

    /// Adds a custom analyzer running `program [args...] <target>`.
    pub fn analyzer(
        mut self,
        name: &str,
        program: &str,
        args: &[&str],
        targets: &[ArtifactKind],
    ) -> Self {
        self.config.analyzers.push(AnalyzerConfig {
            name: name.to_string(),
            kind: AnalyzerKind::Custom,
            program: Some(program.to_string()),
            args: Some(args.iter().map(|a| a.to_string()).collect()),
            targets: targets.to_vec(),
        });
        self
    }

    pub fn build(self) -> Config {
        self.config
    }
}
