//! Operator answering on the terminal.

use super::{
    ConflictResolution, ManualFix, ManualFixResponse, NoticeLevel, Operator, TargetChoice,
};
use crate::cli::OutputManager;
use crate::error::{Result, WorkflowError};
use crate::version::TargetRef;
use crate::workflow::WorkflowStep;
use std::io::BufRead;
use std::sync::Mutex;

/// Asks questions through [`OutputManager`] and reads answers line by line.
pub struct TerminalOperator {
    output: OutputManager,
    input: Mutex<Box<dyn BufRead + Send>>,
}

impl std::fmt::Debug for TerminalOperator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TerminalOperator")
            .field("output", &self.output)
            .finish_non_exhaustive()
    }
}

impl TerminalOperator {
    /// Operator reading from stdin
    pub fn new(output: OutputManager) -> Self {
        Self::with_input(output, std::io::BufReader::new(std::io::stdin()))
    }

    /// Operator reading from any line source
    pub fn with_input(output: OutputManager, input: impl BufRead + Send + 'static) -> Self {
        Self {
            output,
            input: Mutex::new(Box::new(input)),
        }
    }

    fn read_answer(&self, question: &str) -> Result<String> {
        self.output.prompt(question)?;
        let mut input = self.input.lock().map_err(|_| WorkflowError::OperatorUnavailable {
            reason: "input reader poisoned".to_string(),
        })?;
        let mut line = String::new();
        if input.read_line(&mut line)? == 0 {
            return Err(WorkflowError::OperatorUnavailable {
                reason: "standard input closed".to_string(),
            }
            .into());
        }
        Ok(line.trim().to_string())
    }

    /// Ask until the answer is one of `choices`; empty input picks `default`.
    fn choose(&self, question: &str, choices: &[&str], default: Option<&str>) -> Result<String> {
        loop {
            let answer = self.read_answer(question)?.to_lowercase();
            if answer.is_empty() {
                if let Some(default) = default {
                    return Ok(default.to_string());
                }
            } else if choices.contains(&answer.as_str()) {
                return Ok(answer);
            }
            let _ = self
                .output
                .warn(&format!("Please answer one of: {}", choices.join(", ")));
        }
    }

    fn named_target(&self, what: &str) -> Result<Option<String>> {
        let name = self.read_answer(&format!("{} name:", what))?;
        Ok((!name.is_empty()).then_some(name))
    }
}

impl Operator for TerminalOperator {
    fn confirm(&self, step: WorkflowStep, question: &str) -> Result<bool> {
        log::debug!("Asking for confirmation of '{}'", step);
        let answer = self.choose(
            &format!("{} [y/N]:", question),
            &["y", "yes", "n", "no"],
            Some("n"),
        )?;
        Ok(matches!(answer.as_str(), "y" | "yes"))
    }

    fn resolve_conflict(&self, branch: &str, paths: &[String]) -> Result<ConflictResolution> {
        let _ = self.output.warn(&format!(
            "Merging '{}' conflicted in {} file(s):",
            branch,
            paths.len()
        ));
        for path in paths {
            let _ = self.output.indent(path);
        }
        let _ = self.output.indent("[r] I resolved the conflicts; commit and continue");
        let _ = self.output.indent("[s] Abort the merge and continue without customizations");
        let _ = self.output.indent("[a] Abort the upgrade");

        Ok(match self.choose("Choice [r/s/a]:", &["r", "s", "a"], None)?.as_str() {
            "r" => ConflictResolution::ResolvedManually,
            "s" => ConflictResolution::SkipCustomizations,
            _ => ConflictResolution::AbortWorkflow,
        })
    }

    fn manual_fix(&self, fix: &ManualFix) -> Result<ManualFixResponse> {
        self.output.error(&format!("Build failed: {}", fix.failure));
        let _ = self.output.info("This failure is known to need a manual fix:");
        let _ = self.output.indent(&fix.remediation);

        let answer = self.choose(
            "Apply the fix in another shell, then retry the build? [r]etry/[a]bort:",
            &["r", "retry", "a", "abort"],
            None,
        )?;
        Ok(if answer.starts_with('r') {
            ManualFixResponse::Retry
        } else {
            ManualFixResponse::Abort
        })
    }

    fn choose_target(&self, detected: Option<&TargetRef>) -> Result<TargetChoice> {
        match detected {
            Some(target) => {
                let _ = self.output.info(&format!("Detected upgrade target: {}", target));
                let _ = self.output.indent("[enter] use it");
            }
            None => {
                let _ = self.output.warn("No upgrade target could be detected");
            }
        }
        let _ = self.output.indent("[t] name a tag");
        let _ = self.output.indent("[b] name an upstream branch");
        let _ = self.output.indent("[m] upstream main");
        let _ = self.output.indent("[a] abort");

        loop {
            let default = detected.map(|_| "use");
            let answer = self.choose("Choice:", &["t", "b", "m", "a"], default)?;
            let choice = match answer.as_str() {
                "use" => TargetChoice::UseDetected,
                "t" => match self.named_target("Tag")? {
                    Some(tag) => TargetChoice::Target(TargetRef::Tag(tag)),
                    None => continue,
                },
                "b" => match self.named_target("Branch")? {
                    Some(branch) => TargetChoice::Target(TargetRef::Branch(branch)),
                    None => continue,
                },
                "m" => TargetChoice::Target(TargetRef::Main),
                _ => TargetChoice::Abort,
            };
            return Ok(choice);
        }
    }

    fn provide_text(&self, prompt: &str) -> Result<Option<String>> {
        let answer = self.read_answer(&format!("{} (empty to skip):", prompt))?;
        Ok((!answer.is_empty()).then_some(answer))
    }

    fn notify(&self, level: NoticeLevel, message: &str) {
        if let Err(e) = self.output.notice(level, message) {
            log::warn!("Failed to write to terminal: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::UpgradeError;
    use std::io::Cursor;

    fn operator(input: &str) -> TerminalOperator {
        TerminalOperator::with_input(OutputManager::new(true), Cursor::new(input.to_string()))
    }

    #[test]
    fn confirmation_defaults_to_no() {
        let op = operator("\n");
        assert!(!op.confirm(WorkflowStep::Built, "Build?").unwrap());
    }

    #[test]
    fn invalid_answers_are_asked_again() {
        let op = operator("maybe\nyes\n");
        assert!(op.confirm(WorkflowStep::Built, "Build?").unwrap());
    }

    #[test]
    fn closed_input_is_operator_unavailable() {
        let op = operator("");
        let err = op.confirm(WorkflowStep::Built, "Build?").unwrap_err();
        assert!(matches!(
            err,
            UpgradeError::Workflow(WorkflowError::OperatorUnavailable { .. })
        ));
    }

    #[test]
    fn conflict_choice_maps_letters() {
        assert_eq!(
            operator("s\n").resolve_conflict("custom", &[]).unwrap(),
            ConflictResolution::SkipCustomizations
        );
    }

    #[test]
    fn target_choice_reads_tag_name() {
        let op = operator("t\nv4.2.1\n");
        assert_eq!(
            op.choose_target(None).unwrap(),
            TargetChoice::Target(TargetRef::Tag("v4.2.1".into()))
        );
        let op = operator("\n");
        let detected = TargetRef::Tag("v4.2.0".into());
        assert_eq!(op.choose_target(Some(&detected)).unwrap(), TargetChoice::UseDetected);
    }
}
