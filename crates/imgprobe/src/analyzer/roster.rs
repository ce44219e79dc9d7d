use std::sync::Arc;
use std::time::Duration;

use crate::config::schema::AnalyzerConfig;
use crate::error::ConfigError;
use crate::storage::ArtifactKind;

use super::{Analyzer, ExternalAnalyzer};

pub struct RosterEntry {
    pub analyzer: Arc<dyn Analyzer>,
    /// Artifacts this analyzer runs against, one invocation each.
    pub targets: Vec<ArtifactKind>,
}

/// The set of analyzers every task fans out to.
#[derive(Default)]
pub struct AnalyzerRoster {
    entries: Vec<RosterEntry>,
}

impl AnalyzerRoster {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds external analyzers from config. Program and args fall back to
    /// the defaults of the analyzer kind.
    pub fn from_config(
        analyzers: &[AnalyzerConfig],
        timeout: Duration,
    ) -> Result<Self, ConfigError> {
        let mut roster = Self::new();

        for config in analyzers {
            let program = config
                .program
                .clone()
                .or_else(|| config.kind.default_program().map(str::to_string))
                .ok_or_else(|| ConfigError::InvalidAnalyzer {
                    name: config.name.clone(),
                    reason: "No program configured".to_string(),
                })?;
            let args = config
                .args
                .clone()
                .unwrap_or_else(|| config.kind.default_args());

            let analyzer =
                ExternalAnalyzer::new(config.name.clone(), config.kind, program, args, timeout);
            roster = roster.with_analyzer(Arc::new(analyzer), config.targets.clone());
        }

        Ok(roster)
    }

    pub fn with_analyzer(mut self, analyzer: Arc<dyn Analyzer>, targets: Vec<ArtifactKind>) -> Self {
        self.entries.push(RosterEntry { analyzer, targets });
        self
    }

    pub fn entries(&self) -> &[RosterEntry] {
        &self.entries
    }

    pub fn names(&self) -> Vec<&str> {
        self.entries.iter().map(|e| e.analyzer.name()).collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
