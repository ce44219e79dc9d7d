//! External forensic analyzers and the concurrent fan-out that runs them.

pub mod external;
pub mod fanout;
pub mod roster;

use std::path::Path;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

pub use external::ExternalAnalyzer;
pub use fanout::{AnalysisFanOut, FanOutSummary, Invocation};
pub use roster::{AnalyzerRoster, RosterEntry};

/// The analyzer families known to the default roster.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnalyzerKind {
    /// LSB/steganography scanner (zsteg).
    Steganography,
    /// Printable string extractor (strings).
    Strings,
    /// EXIF/IPTC/XMP metadata reader (exiv2).
    Metadata,
    /// Embedded file signature scanner (binwalk).
    Signatures,
    /// Any other tool; requires an explicit program.
    Custom,
}

impl AnalyzerKind {
    pub fn default_program(&self) -> Option<&'static str> {
        match self {
            AnalyzerKind::Steganography => Some("zsteg"),
            AnalyzerKind::Strings => Some("strings"),
            AnalyzerKind::Metadata => Some("exiv2"),
            AnalyzerKind::Signatures => Some("binwalk"),
            AnalyzerKind::Custom => None,
        }
    }

    pub fn default_args(&self) -> Vec<String> {
        match self {
            AnalyzerKind::Steganography => vec!["-a".to_string()],
            _ => vec![],
        }
    }
}

/// What happened when an analyzer was run against one file.
///
/// Failures are data: they end up in the task record next to successful
/// outputs and never abort sibling invocations.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AnalyzerOutcome {
    Success { output: String },
    NotFound { program: String },
    SpawnFailed { message: String },
    NonZeroExit { code: Option<i32>, output: String },
    TimedOut { after_ms: u64 },
    Crashed { message: String },
}

impl AnalyzerOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, AnalyzerOutcome::Success { .. })
    }

    /// Renders the outcome as the text stored for pollers. Anything other
    /// than success becomes `Error (<analyzer>): <detail>`.
    pub fn render(&self, analyzer: &str) -> String {
        match self {
            AnalyzerOutcome::Success { output } => output.clone(),
            AnalyzerOutcome::NotFound { program } => {
                format!("Error ({}): program '{}' not found", analyzer, program)
            }
            AnalyzerOutcome::SpawnFailed { message } => {
                format!("Error ({}): {}", analyzer, message)
            }
            AnalyzerOutcome::NonZeroExit { code, .. } => match code {
                Some(code) => format!("Error ({}): exit status {}", analyzer, code),
                None => format!("Error ({}): terminated by signal", analyzer),
            },
            AnalyzerOutcome::TimedOut { after_ms } => {
                format!("Error ({}): timed out after {}ms", analyzer, after_ms)
            }
            AnalyzerOutcome::Crashed { message } => {
                format!("Error ({}): analyzer crashed: {}", analyzer, message)
            }
        }
    }
}

/// One forensic tool that can be pointed at a file.
#[async_trait]
pub trait Analyzer: Send + Sync {
    /// Name used in result keys and error markers.
    fn name(&self) -> &str;

    fn kind(&self) -> AnalyzerKind;

    async fn analyze(&self, target: &Path) -> AnalyzerOutcome;
}
