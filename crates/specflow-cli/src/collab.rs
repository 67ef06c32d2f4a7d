//! File and process backed collaborators for the phase commands.

use specflow_core::collab::{ContentGenerator, GeneratedContent, PromptContext, Researcher};
use specflow_core::config::ResearchConfig;
use specflow_core::{Result, SpecflowError};
use std::io::Read;
use std::path::PathBuf;
use std::process::{Command, Stdio};
use std::time::{Duration, Instant};

/// Reads content written ahead of time by whoever authored the phase
/// (an operator, an editor integration, a model run outside this process).
pub struct DraftFile {
    path: PathBuf,
}

impl DraftFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl ContentGenerator for DraftFile {
    fn generate(&self, ctx: &PromptContext) -> Result<GeneratedContent> {
        let raw = std::fs::read_to_string(&self.path).map_err(|e| {
            SpecflowError::Collaborator(format!(
                "no {} draft at {}: {e}",
                ctx.kind,
                self.path.display()
            ))
        })?;
        serde_yaml::from_str(&raw).map_err(|e| {
            SpecflowError::Collaborator(format!("draft {} is malformed: {e}", self.path.display()))
        })
    }
}

/// Runs the configured shell command with the query in `SPECFLOW_QUERY`;
/// stdout is the findings.
pub struct CommandResearcher {
    command: String,
    timeout: Duration,
}

const POLL: Duration = Duration::from_millis(50);

impl CommandResearcher {
    pub fn from_config(config: &ResearchConfig) -> Self {
        Self {
            command: config.command.clone(),
            timeout: Duration::from_secs(config.timeout_seconds),
        }
    }
}

impl Researcher for CommandResearcher {
    fn research(&self, query: &str) -> Result<String> {
        let mut child = Command::new("sh")
            .arg("-c")
            .arg(&self.command)
            .env("SPECFLOW_QUERY", query)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .spawn()?;

        // Drain stdout on a side thread so a chatty command cannot fill the pipe.
        let mut stdout = child.stdout.take();
        let reader = std::thread::spawn(move || {
            let mut out = String::new();
            if let Some(s) = stdout.as_mut() {
                s.read_to_string(&mut out).map(|_| out)
            } else {
                Ok(out)
            }
        });

        let started = Instant::now();
        let status = loop {
            if let Some(status) = child.try_wait()? {
                break status;
            }
            if started.elapsed() >= self.timeout {
                child.kill()?;
                child.wait()?;
                return Err(SpecflowError::Collaborator(format!(
                    "research command timed out after {}s",
                    self.timeout.as_secs()
                )));
            }
            std::thread::sleep(POLL);
        };

        let output = reader
            .join()
            .map_err(|_| SpecflowError::Collaborator("research output reader panicked".to_string()))??;
        if !status.success() {
            return Err(SpecflowError::Collaborator(format!(
                "research command exited with {status}"
            )));
        }
        let findings = output.trim();
        if findings.is_empty() {
            return Err(SpecflowError::Collaborator(
                "research command produced no findings".to_string(),
            ));
        }
        Ok(findings.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use specflow_core::types::ArtifactKind;
    use tempfile::TempDir;

    fn ctx() -> PromptContext {
        PromptContext {
            kind: ArtifactKind::Discovery,
            parent: None,
            idea: None,
        }
    }

    fn researcher(command: &str, timeout_seconds: u64) -> CommandResearcher {
        CommandResearcher::from_config(&ResearchConfig {
            command: command.to_string(),
            timeout_seconds,
        })
    }

    #[test]
    fn draft_file_reads_yaml_content() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("discovery.yaml");
        std::fs::write(
            &path,
            "title: Loyalty points\nslug: loyalty\nsections:\n  prose:\n    - heading: Problem\n      body: Churn is high.\n",
        )
        .unwrap();
        let content = DraftFile::new(&path).generate(&ctx()).unwrap();
        assert_eq!(content.title, "Loyalty points");
        assert_eq!(content.slug.as_deref(), Some("loyalty"));
        assert_eq!(content.sections.prose("Problem"), Some("Churn is high."));
    }

    #[test]
    fn missing_draft_is_a_collaborator_error() {
        let dir = TempDir::new().unwrap();
        let err = DraftFile::new(dir.path().join("nope.yaml"))
            .generate(&ctx())
            .unwrap_err();
        assert!(matches!(err, SpecflowError::Collaborator(m) if m.contains("no discovery draft")));
    }

    #[test]
    fn command_receives_query_in_env() {
        let findings = researcher("printf 'found: %s' \"$SPECFLOW_QUERY\"", 5)
            .research("rate limits")
            .unwrap();
        assert_eq!(findings, "found: rate limits");
    }

    #[test]
    fn failing_command_is_reported() {
        let err = researcher("exit 3", 5).research("x").unwrap_err();
        assert!(matches!(err, SpecflowError::Collaborator(_)));
    }

    #[test]
    fn slow_command_times_out() {
        let err = researcher("sleep 5", 0).research("x").unwrap_err();
        assert!(matches!(err, SpecflowError::Collaborator(m) if m.contains("timed out")));
    }
}
