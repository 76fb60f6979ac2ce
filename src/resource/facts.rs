//! Host facts resource - local fact file classifying the host for playbooks

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use super::files;
use super::{ApplyResult, HealthStatus, HostContext, InspectionResult, Reconciler, ResourceKind};
use crate::prompt::{Prompter, required_input};
use crate::session::SessionState;
use crate::ui;

const FACTS_MODE: u32 = 0o644;
const FACTS_DIR_MODE: u32 = 0o755;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FactsDocument {
    pub role: String,
}

impl FactsDocument {
    pub fn render(&self) -> Result<String> {
        Ok(format!("{}\n", serde_json::to_string_pretty(self)?))
    }

    pub fn parse(content: &str) -> Result<Self> {
        Ok(serde_json::from_str(content)?)
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct HostFacts;

impl HostFacts {
    /// The recorded document. The inner result is the parse outcome, so a
    /// malformed file can be told apart from one that cannot be read.
    fn current(&self, ctx: &HostContext) -> Result<Option<Result<FactsDocument>>> {
        let path = &ctx.layout.facts_file;
        Ok(files::read_if_exists(path)?.map(|content| {
            FactsDocument::parse(&content)
                .with_context(|| format!("Malformed facts in {}", path.display()))
        }))
    }

    fn check_modes(&self, ctx: &HostContext) -> Result<Option<String>> {
        let layout = ctx.layout;
        for (what, path, expected) in [
            ("facts file", &layout.facts_file, FACTS_MODE),
            ("facts directory", &layout.facts_dir, FACTS_DIR_MODE),
        ] {
            match files::mode_of(path)? {
                Some(mode) if mode != expected => {
                    return Ok(Some(format!(
                        "{what} has mode {mode:04o}, expected {expected:04o}"
                    )));
                }
                _ => {}
            }
        }
        Ok(None)
    }
}

impl Reconciler for HostFacts {
    fn kind(&self) -> ResourceKind {
        ResourceKind::HostFacts
    }

    fn description(&self) -> String {
        "host role facts".to_string()
    }

    fn inspect(&self, ctx: &HostContext) -> Result<InspectionResult> {
        let Some(content) = files::read_if_exists(&ctx.layout.facts_file)? else {
            return Ok(InspectionResult::new(false));
        };
        let result = InspectionResult::new(true);
        Ok(match FactsDocument::parse(&content) {
            Ok(doc) => result.with("role", doc.role),
            Err(_) => result.with("parse", "invalid"),
        })
    }

    fn apply(
        &self,
        ctx: &HostContext,
        session: &mut SessionState,
        prompter: &mut dyn Prompter,
    ) -> Result<ApplyResult> {
        let layout = ctx.layout;
        // Malformed facts are replaced, not fatal
        let current = match self.current(ctx)? {
            Some(Ok(doc)) => Some(doc),
            Some(Err(e)) => {
                ui::warn(&format!("{e:#}"));
                None
            }
            None => None,
        };

        let default = session
            .role
            .clone()
            .or_else(|| current.as_ref().map(|doc| doc.role.clone()));
        let role = required_input(prompter, "Host role", default.as_deref())?;
        let doc = FactsDocument { role };

        let mut changed = false;
        if !files::ensure_dir(&layout.facts_dir, FACTS_DIR_MODE)?
            && files::mode_of(&layout.facts_dir)? != Some(FACTS_DIR_MODE)
        {
            files::set_mode(&layout.facts_dir, FACTS_DIR_MODE)?;
            changed = true;
        }
        let existed = files::exists(&layout.facts_file)?;
        changed |= files::write_if_changed(&layout.facts_file, &doc.render()?, FACTS_MODE)?;
        session.role = Some(doc.role.clone());

        if !changed {
            ui::info(&format!("Host role already '{}'", doc.role));
            return Ok(ApplyResult::NoChange);
        }
        ui::success(&format!(
            "Recorded role '{}' in {}",
            doc.role,
            layout.facts_file.display()
        ));
        Ok(if existed {
            ApplyResult::Modified
        } else {
            ApplyResult::Created
        })
    }

    fn verify(&self, ctx: &HostContext, _session: &SessionState) -> HealthStatus {
        match self.current(ctx) {
            Ok(None) => HealthStatus::missing(),
            Ok(Some(Err(e))) => HealthStatus::Warning(format!("{e:#}")),
            Ok(Some(Ok(doc))) if doc.role.trim().is_empty() => {
                HealthStatus::Warning("role is empty".to_string())
            }
            Ok(Some(Ok(_))) => match self.check_modes(ctx) {
                Ok(None) => HealthStatus::Ok,
                Ok(Some(problem)) => HealthStatus::Warning(problem),
                Err(e) => HealthStatus::Warning(format!("could not inspect: {e:#}")),
            },
            Err(e) => HealthStatus::Warning(format!("could not inspect: {e:#}")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{Answer, Fixture, ScriptedPrompter};
    use std::fs;

    fn apply(fixture: &Fixture, answers: Vec<Answer>) -> ApplyResult {
        HostFacts
            .apply(
                &fixture.ctx(),
                &mut SessionState::default(),
                &mut ScriptedPrompter::new(answers),
            )
            .unwrap()
    }

    #[test]
    fn test_writes_role_document() {
        let fixture = Fixture::new();
        let result = apply(&fixture, vec![Answer::text("web frontend")]);
        assert_eq!(result, ApplyResult::Created);

        let content = fs::read_to_string(&fixture.layout.facts_file).unwrap();
        let value: serde_json::Value = serde_json::from_str(&content).unwrap();
        assert_eq!(value, serde_json::json!({"role": "web frontend"}));
        assert_eq!(
            files::mode_of(&fixture.layout.facts_file).unwrap(),
            Some(0o644)
        );
        assert_eq!(
            files::mode_of(&fixture.layout.facts_dir).unwrap(),
            Some(0o755)
        );
        assert_eq!(
            HostFacts.verify(&fixture.ctx(), &SessionState::default()),
            HealthStatus::Ok
        );
    }

    #[test]
    fn test_reprompts_on_empty_role() {
        let fixture = Fixture::new();
        let mut prompter = ScriptedPrompter::new(vec![Answer::text(""), Answer::text("db")]);
        HostFacts
            .apply(&fixture.ctx(), &mut SessionState::default(), &mut prompter)
            .unwrap();
        assert_eq!(prompter.asked().len(), 2);
        assert_eq!(
            HostFacts.inspect(&fixture.ctx()).unwrap().detail("role"),
            Some("db")
        );
    }

    #[test]
    fn test_same_role_is_no_change() {
        let fixture = Fixture::new();
        apply(&fixture, vec![Answer::text("db")]);
        let first = HostFacts.inspect(&fixture.ctx()).unwrap();

        // Empty answer keeps the current role
        assert_eq!(apply(&fixture, vec![Answer::text("")]), ApplyResult::NoChange);
        assert_eq!(HostFacts.inspect(&fixture.ctx()).unwrap(), first);

        assert_eq!(apply(&fixture, vec![Answer::text("cache")]), ApplyResult::Modified);
    }

    #[test]
    fn test_malformed_facts_are_degraded() {
        let fixture = Fixture::new();
        fs::create_dir_all(&fixture.layout.facts_dir).unwrap();
        fs::write(&fixture.layout.facts_file, "role=web\n").unwrap();

        let inspection = HostFacts.inspect(&fixture.ctx()).unwrap();
        assert!(inspection.present);
        assert_eq!(inspection.detail("parse"), Some("invalid"));
        assert!(matches!(
            HostFacts.verify(&fixture.ctx(), &SessionState::default()),
            HealthStatus::Warning(_)
        ));

        assert_eq!(apply(&fixture, vec![Answer::text("web")]), ApplyResult::Modified);
    }

    #[test]
    fn test_unreadable_facts_fail_apply() {
        let fixture = Fixture::new();
        fs::create_dir_all(&fixture.layout.facts_file).unwrap();

        let mut prompter = ScriptedPrompter::new(vec![Answer::text("web")]);
        let result = HostFacts.apply(&fixture.ctx(), &mut SessionState::default(), &mut prompter);
        assert!(result.is_err());
        assert!(prompter.asked().is_empty());
    }

    #[test]
    fn test_private_facts_file_is_degraded() {
        let fixture = Fixture::new();
        apply(&fixture, vec![Answer::text("web")]);
        files::set_mode(&fixture.layout.facts_file, 0o600).unwrap();

        let session = SessionState::default();
        assert!(matches!(
            HostFacts.verify(&fixture.ctx(), &session),
            HealthStatus::Warning(ref r) if r.contains("0600")
        ));
        assert_eq!(apply(&fixture, vec![Answer::text("")]), ApplyResult::Modified);
        assert_eq!(HostFacts.verify(&fixture.ctx(), &session), HealthStatus::Ok);
    }

    #[test]
    fn test_facts_directory_mode_is_restored() {
        let fixture = Fixture::new();
        apply(&fixture, vec![Answer::text("web")]);
        files::set_mode(&fixture.layout.facts_dir, 0o700).unwrap();

        let session = SessionState::default();
        assert!(matches!(
            HostFacts.verify(&fixture.ctx(), &session),
            HealthStatus::Warning(ref r) if r.contains("directory")
        ));
        assert_eq!(apply(&fixture, vec![Answer::text("")]), ApplyResult::Modified);
        assert_eq!(
            files::mode_of(&fixture.layout.facts_dir).unwrap(),
            Some(0o755)
        );
        assert_eq!(HostFacts.verify(&fixture.ctx(), &session), HealthStatus::Ok);
    }
}
