use crate::artifact::{ArchitectureDeclarations, GateResult, GateStatus, Sections};
use crate::config::GateConfig;
use crate::error::GateViolation;

// ---------------------------------------------------------------------------
// Gate
// ---------------------------------------------------------------------------

/// Read-only input shared by every gate.
#[derive(Debug, Clone, Copy)]
pub struct GateContext<'a> {
    pub architecture: &'a ArchitectureDeclarations,
    pub config: &'a GateConfig,
}

/// A named architecture rule. `evaluate` returns findings; none means pass.
#[derive(Clone, Copy)]
pub struct Gate {
    pub id: u8,
    pub name: &'static str,
    pub description: &'static str,
    pub evaluate: fn(&GateContext) -> Vec<String>,
}

impl std::fmt::Debug for Gate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Gate")
            .field("id", &self.id)
            .field("name", &self.name)
            .finish()
    }
}

impl Gate {
    pub fn run(&self, ctx: &GateContext) -> GateResult {
        let findings = (self.evaluate)(ctx);
        GateResult {
            gate_id: self.id,
            name: self.name.to_string(),
            status: if findings.is_empty() {
                GateStatus::Pass
            } else {
                GateStatus::Fail
            },
            findings,
            justification: None,
        }
    }
}

// ---------------------------------------------------------------------------
// GateEngine
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct GateEngine {
    gates: Vec<Gate>,
    config: GateConfig,
}

impl GateEngine {
    pub fn new(gates: Vec<Gate>, config: GateConfig) -> Self {
        Self { gates, config }
    }

    /// The seven registered architecture gates.
    pub fn with_defaults(config: GateConfig) -> Self {
        Self::new(crate::gates::default_gates(), config)
    }

    pub fn gates(&self) -> &[Gate] {
        &self.gates
    }

    /// Evaluate every gate against a Design's sections.
    ///
    /// Gates run concurrently over the same snapshot and are joined before
    /// returning. Results are ordered by gate id. Author justifications are
    /// attached to failing results only.
    pub fn evaluate(&self, sections: &Sections) -> Vec<GateResult> {
        let empty = ArchitectureDeclarations::default();
        let ctx = GateContext {
            architecture: sections.architecture.as_ref().unwrap_or(&empty),
            config: &self.config,
        };

        let mut results: Vec<GateResult> = std::thread::scope(|s| {
            let handles: Vec<_> = self
                .gates
                .iter()
                .map(|gate| {
                    let ctx = &ctx;
                    s.spawn(move || gate.run(ctx))
                })
                .collect();
            handles
                .into_iter()
                .map(|h| h.join().unwrap_or_else(|p| std::panic::resume_unwind(p)))
                .collect()
        });
        results.sort_by_key(|r| r.gate_id);

        for result in results.iter_mut().filter(|r| !r.passed()) {
            result.justification = sections
                .justification_for(result.gate_id)
                .filter(|j| !j.trim().is_empty())
                .map(str::to_string);
        }
        tracing::debug!(
            failed = results.iter().filter(|r| !r.passed()).count(),
            "gates evaluated"
        );
        results
    }
}

/// Design-level verdict: pass iff every gate passes or is justified.
pub fn verdict(results: &[GateResult]) -> bool {
    results.iter().all(GateResult::is_acceptable)
}

/// Failing gates that carry no justification.
pub fn unjustified(results: &[GateResult]) -> Vec<GateViolation> {
    results
        .iter()
        .filter(|r| !r.is_acceptable())
        .map(|r| GateViolation {
            gate_id: r.gate_id,
            name: r.name.clone(),
            findings: r.findings.clone(),
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::artifact::{FunctionDecl, GateJustification};

    fn sections_with(arch: ArchitectureDeclarations) -> Sections {
        Sections {
            architecture: Some(arch),
            ..Sections::default()
        }
    }

    fn long_function() -> ArchitectureDeclarations {
        ArchitectureDeclarations {
            modules: vec!["api".to_string()],
            functions: vec![FunctionDecl {
                name: "handleLogin".to_string(),
                lines: 42,
            }],
            ..ArchitectureDeclarations::default()
        }
    }

    #[test]
    fn clean_design_passes_all_seven() {
        let engine = GateEngine::with_defaults(GateConfig::default());
        let results = engine.evaluate(&sections_with(ArchitectureDeclarations::default()));
        assert_eq!(results.len(), 7);
        let ids: Vec<u8> = results.iter().map(|r| r.gate_id).collect();
        assert_eq!(ids, vec![1, 2, 3, 4, 5, 6, 7]);
        assert!(verdict(&results));
    }

    #[test]
    fn evaluation_is_idempotent() {
        let engine = GateEngine::with_defaults(GateConfig::default());
        let sections = sections_with(long_function());
        let before = sections.clone();
        let first = engine.evaluate(&sections);
        let second = engine.evaluate(&sections);
        assert_eq!(first, second);
        assert_eq!(sections, before);
    }

    #[test]
    fn failing_gate_needs_justification() {
        let engine = GateEngine::with_defaults(GateConfig::default());
        let mut sections = sections_with(long_function());
        let results = engine.evaluate(&sections);
        assert!(!verdict(&results));
        let bad = unjustified(&results);
        assert_eq!(bad.len(), 1);
        assert_eq!(bad[0].gate_id, 3);

        sections.gate_justifications.push(GateJustification {
            gate: 3,
            justification: "generated state machine".to_string(),
        });
        let results = engine.evaluate(&sections);
        assert!(verdict(&results));
        assert_eq!(
            results[2].justification.as_deref(),
            Some("generated state machine")
        );
    }

    #[test]
    fn justification_ignored_on_passing_gate() {
        let engine = GateEngine::with_defaults(GateConfig::default());
        let mut sections = sections_with(ArchitectureDeclarations::default());
        sections.gate_justifications.push(GateJustification {
            gate: 1,
            justification: "not needed".to_string(),
        });
        let results = engine.evaluate(&sections);
        assert!(results[0].justification.is_none());
    }

    #[test]
    fn registry_is_extensible() {
        fn always_fails(_: &GateContext) -> Vec<String> {
            vec!["nope".to_string()]
        }
        let mut gates = crate::gates::default_gates();
        gates.push(Gate {
            id: 8,
            name: "extra",
            description: "always fails",
            evaluate: always_fails,
        });
        let engine = GateEngine::new(gates, GateConfig::default());
        let results = engine.evaluate(&Sections::default());
        assert_eq!(results.len(), 8);
        assert_eq!(unjustified(&results)[0].gate_id, 8);
    }
}
