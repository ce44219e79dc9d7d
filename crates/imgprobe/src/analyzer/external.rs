use std::path::Path;
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use tokio::process::Command;

use super::{Analyzer, AnalyzerKind, AnalyzerOutcome};

/// Runs a command-line tool as `program [args...] <target>` and captures
/// stdout followed by stderr.
pub struct ExternalAnalyzer {
    name: String,
    kind: AnalyzerKind,
    program: String,
    args: Vec<String>,
    timeout: Duration,
}

impl ExternalAnalyzer {
    pub fn new(
        name: impl Into<String>,
        kind: AnalyzerKind,
        program: impl Into<String>,
        args: Vec<String>,
        timeout: Duration,
    ) -> Self {
        Self {
            name: name.into(),
            kind,
            program: program.into(),
            args,
            timeout,
        }
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    pub fn args(&self) -> &[String] {
        &self.args
    }
}

#[async_trait]
impl Analyzer for ExternalAnalyzer {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> AnalyzerKind {
        self.kind
    }

    async fn analyze(&self, target: &Path) -> AnalyzerOutcome {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args)
            .arg(target)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let child = match cmd.spawn() {
            Ok(child) => child,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                log::warn!("Analyzer {}: program '{}' not found", self.name, self.program);
                return AnalyzerOutcome::NotFound {
                    program: self.program.clone(),
                };
            }
            Err(e) => {
                log::warn!("Analyzer {} failed to start: {}", self.name, e);
                return AnalyzerOutcome::SpawnFailed {
                    message: e.to_string(),
                };
            }
        };

        // Dropping the child on timeout kills it.
        let output = match tokio::time::timeout(self.timeout, child.wait_with_output()).await {
            Ok(Ok(output)) => output,
            Ok(Err(e)) => {
                return AnalyzerOutcome::SpawnFailed {
                    message: e.to_string(),
                }
            }
            Err(_) => {
                log::warn!(
                    "Analyzer {} timed out after {:?} on {}",
                    self.name,
                    self.timeout,
                    crate::sanitize::redact_path(target)
                );
                return AnalyzerOutcome::TimedOut {
                    after_ms: self.timeout.as_millis() as u64,
                };
            }
        };

        let mut combined = String::from_utf8_lossy(&output.stdout).into_owned();
        combined.push_str(&String::from_utf8_lossy(&output.stderr));

        if output.status.success() {
            AnalyzerOutcome::Success { output: combined }
        } else {
            AnalyzerOutcome::NonZeroExit {
                code: output.status.code(),
                output: combined,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn analyzer(program: &str, args: &[&str], timeout: Duration) -> ExternalAnalyzer {
        ExternalAnalyzer::new(
            "inspector",
            AnalyzerKind::Custom,
            program,
            args.iter().map(|a| a.to_string()).collect(),
            timeout,
        )
    }

    #[tokio::test]
    async fn test_captures_stdout() {
        let dir = TempDir::new().unwrap();
        let target = dir.path().join("payload.txt");
        std::fs::write(&target, "hidden message").unwrap();

        let outcome = analyzer("cat", &[], Duration::from_secs(10))
            .analyze(&target)
            .await;
        assert_eq!(
            outcome,
            AnalyzerOutcome::Success {
                output: "hidden message".to_string()
            }
        );
    }

    #[tokio::test]
    async fn test_combines_stdout_and_stderr() {
        let dir = TempDir::new().unwrap();
        let target = dir.path().join("t.png");
        std::fs::write(&target, b"x").unwrap();

        let outcome = analyzer(
            "sh",
            &["-c", "echo out; echo err 1>&2", "sh"],
            Duration::from_secs(10),
        )
        .analyze(&target)
        .await;

        match outcome {
            AnalyzerOutcome::Success { output } => {
                assert!(output.contains("out"));
                assert!(output.contains("err"));
            }
            other => panic!("Expected success, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_missing_program() {
        let outcome = analyzer("imgprobe-no-such-tool", &[], Duration::from_secs(10))
            .analyze(Path::new("/tmp/whatever.png"))
            .await;
        assert_eq!(
            outcome,
            AnalyzerOutcome::NotFound {
                program: "imgprobe-no-such-tool".to_string()
            }
        );
        assert!(outcome
            .render("inspector")
            .contains("Error (inspector): program 'imgprobe-no-such-tool' not found"));
    }

    #[tokio::test]
    async fn test_non_zero_exit() {
        let outcome = analyzer("sh", &["-c", "echo nope; exit 3", "sh"], Duration::from_secs(10))
            .analyze(Path::new("/tmp/whatever.png"))
            .await;
        assert_eq!(
            outcome,
            AnalyzerOutcome::NonZeroExit {
                code: Some(3),
                output: "nope\n".to_string()
            }
        );
        assert_eq!(outcome.render("inspector"), "Error (inspector): exit status 3");
    }

    #[tokio::test]
    async fn test_timeout() {
        let outcome = analyzer("sh", &["-c", "sleep 5", "sh"], Duration::from_millis(200))
            .analyze(Path::new("/tmp/whatever.png"))
            .await;
        assert_eq!(outcome, AnalyzerOutcome::TimedOut { after_ms: 200 });
    }

    #[test]
    fn test_accessors() {
        let a = analyzer("zsteg", &["-a"], Duration::from_secs(1));
        assert_eq!(a.name(), "inspector");
        assert_eq!(a.program(), "zsteg");
        assert_eq!(a.args(), &["-a".to_string()]);
        assert_eq!(a.kind(), AnalyzerKind::Custom);
    }
}
