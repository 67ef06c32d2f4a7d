use crate::artifact::{Artifact, DependencyScope, GateResult};
use crate::config::ValidationConfig;
use crate::gate;
use crate::task;
use crate::trace::{CoverageSummary, TraceabilityGraph};
use crate::types::{ArtifactId, RequirementKind};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

// ---------------------------------------------------------------------------
// Report types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReportStatus {
    Pass,
    Partial,
    Fail,
}

impl std::fmt::Display for ReportStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            ReportStatus::Pass => "pass",
            ReportStatus::Partial => "partial",
            ReportStatus::Fail => "fail",
        })
    }
}

/// Ordered most severe first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Critical,
    Major,
    Minor,
}

impl From<DependencyScope> for Severity {
    fn from(scope: DependencyScope) -> Self {
        match scope {
            DependencyScope::Infrastructure => Severity::Critical,
            DependencyScope::Runtime => Severity::Major,
            DependencyScope::Development => Severity::Minor,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Deviation {
    pub artifact: ArtifactId,
    pub subject: String,
    pub severity: Severity,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequirementCoverage {
    pub id: String,
    pub kind: RequirementKind,
    pub tasks: Vec<String>,
    pub files: Vec<String>,
    pub covered: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationReport {
    pub tasks: ArtifactId,
    pub status: ReportStatus,
    pub coverage: CoverageSummary,
    pub requirements: Vec<RequirementCoverage>,
    pub gates: Vec<GateResult>,
    #[serde(default)]
    pub deviations: Vec<Deviation>,
    pub task_summary: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub cycles: Vec<String>,
}

impl ValidationReport {
    pub fn passed(&self) -> bool {
        self.status == ReportStatus::Pass
    }
}

/// Everything one chain contributes to its report.
#[derive(Debug, Clone, Copy)]
pub struct ReportInput<'a> {
    pub spec: &'a Artifact,
    pub design: &'a Artifact,
    pub adrs: &'a [Artifact],
    pub plan: &'a Artifact,
    pub tasks: &'a Artifact,
    pub graph: &'a TraceabilityGraph,
}

// ---------------------------------------------------------------------------
// Generation
// ---------------------------------------------------------------------------

/// Aggregate gates, coverage and deviations. Pure: identical inputs give
/// identical reports.
pub fn generate(input: &ReportInput, config: &ValidationConfig) -> ValidationReport {
    let spec_id = input.spec.id;
    let requirements: Vec<RequirementCoverage> = input
        .spec
        .sections
        .requirements
        .iter()
        .map(|r| {
            let (tasks, files) = input.graph.requirement_links(spec_id, &r.id);
            RequirementCoverage {
                id: r.id.clone(),
                kind: r.kind,
                covered: !tasks.is_empty(),
                tasks,
                files,
            }
        })
        .collect();
    // Counted from the rows so the summary always agrees with the table.
    let coverage = CoverageSummary::of(
        requirements.iter().filter(|r| r.covered).count(),
        requirements.len(),
    );
    let gates = input.design.sections.gate_results.clone();
    let deviations = deviations(input);

    let status = if !gate::verdict(&gates)
        || deviations.iter().any(|d| d.severity == Severity::Critical)
        || coverage.ratio < config.partial_floor
    {
        ReportStatus::Fail
    } else if coverage.ratio < config.pass_coverage
        || deviations.iter().any(|d| d.severity == Severity::Major)
    {
        ReportStatus::Partial
    } else {
        ReportStatus::Pass
    };

    let cycles = input
        .graph
        .cycles()
        .into_iter()
        .map(|c| {
            let mut names: Vec<String> = c.iter().map(|n| n.to_string()).collect();
            if let Some(first) = names.first().cloned() {
                names.push(first);
            }
            names.join(" -> ")
        })
        .collect();

    ValidationReport {
        tasks: input.tasks.id,
        status,
        coverage,
        requirements,
        gates,
        deviations,
        task_summary: task::summarize(&input.tasks.sections.tasks),
        cycles,
    }
}

/// Dependencies a Plan or Tasks artifact declares that its parents never decided on.
fn deviations(input: &ReportInput) -> Vec<Deviation> {
    let mut design_choices = input.design.sections.decided_choices();
    for adr in input.adrs {
        design_choices.extend(adr.sections.decided_choices());
    }

    let mut plan_choices: HashSet<String> = input.plan.sections.decided_choices();
    plan_choices.extend(
        input
            .plan
            .sections
            .dependencies
            .iter()
            .map(|d| d.name.to_ascii_lowercase()),
    );

    let mut out = Vec::new();
    for (artifact, allowed, parent) in [
        (input.plan, &design_choices, "design decisions"),
        (input.tasks, &plan_choices, "plan dependencies and decisions"),
    ] {
        for dep in &artifact.sections.dependencies {
            if !allowed.contains(&dep.name.to_ascii_lowercase()) {
                out.push(Deviation {
                    artifact: artifact.id,
                    subject: dep.name.clone(),
                    severity: dep.scope.into(),
                    message: format!("{} depends on '{}', which the {parent} do not name", artifact.id, dep.name),
                });
            }
        }
    }
    out.sort_by(|a, b| {
        (a.severity, a.artifact, &a.subject).cmp(&(b.severity, b.artifact, &b.subject))
    });
    out
}

// ---------------------------------------------------------------------------
// Markdown rendering
// ---------------------------------------------------------------------------

impl ValidationReport {
    pub fn to_markdown(&self) -> String {
        let mut out = format!("# Validation report: {}\n\n", self.tasks);
        out.push_str(&format!("**Status:** {}\n", self.status));
        out.push_str(&format!(
            "**Coverage:** {}/{} requirements ({:.1}%)\n",
            self.coverage.covered,
            self.coverage.total,
            self.coverage.ratio * 100.0
        ));
        out.push_str(&format!("**Tasks:** {}\n\n", self.task_summary));

        out.push_str("## Requirements\n\n");
        out.push_str("| Requirement | Kind | Tasks | Files |\n|---|---|---|---|\n");
        for r in &self.requirements {
            let tasks = if r.covered { r.tasks.join(", ") } else { "none".to_string() };
            out.push_str(&format!("| {} | {} | {} | {} |\n", r.id, r.kind, tasks, r.files.join(", ")));
        }

        out.push_str("\n## Gates\n\n");
        out.push_str("| Gate | Name | Status | Notes |\n|---|---|---|---|\n");
        for g in &self.gates {
            let status = match (g.passed(), g.is_justified()) {
                (true, _) => "pass",
                (false, true) => "fail (justified)",
                (false, false) => "fail",
            };
            let notes = g
                .justification
                .clone()
                .unwrap_or_else(|| g.findings.join("; "));
            out.push_str(&format!("| {} | {} | {} | {} |\n", g.gate_id, g.name, status, notes));
        }

        if !self.deviations.is_empty() {
            out.push_str("\n## Deviations\n\n");
            for d in &self.deviations {
                out.push_str(&format!("- **{:?}** {}\n", d.severity, d.message));
            }
        }
        if !self.cycles.is_empty() {
            out.push_str("\n## Cycles\n\n");
            for c in &self.cycles {
                out.push_str(&format!("- {c}\n"));
            }
        }
        out
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::artifact::{Decision, Dependency, GateStatus, Requirement, Sections};
    use crate::task::Task;
    use crate::types::ArtifactStatus;
    use chrono::{NaiveDate, Utc};

    fn artifact(id: &str, parent: Option<&str>, sections: Sections) -> Artifact {
        Artifact {
            id: id.parse().unwrap(),
            status: ArtifactStatus::Completed,
            parent: parent.map(|p| p.parse().unwrap()),
            slug: "x".to_string(),
            title: "X".to_string(),
            created: NaiveDate::from_ymd_opt(2026, 10, 14).unwrap(),
            updated_at: Utc::now(),
            sections,
        }
    }

    fn dep(name: &str, scope: DependencyScope) -> Dependency {
        Dependency {
            name: name.to_string(),
            scope,
        }
    }

    struct Chain {
        spec: Artifact,
        design: Artifact,
        plan: Artifact,
        tasks: Artifact,
    }

    fn chain(covered: &[&str]) -> Chain {
        let mut spec = Sections::default();
        for id in ["FR-001", "FR-002"] {
            spec.requirements.push(Requirement {
                id: id.to_string(),
                kind: RequirementKind::Functional,
                text: "x".to_string(),
            });
        }
        let mut design = Sections::default();
        design.decisions.push(Decision {
            topic: "database".to_string(),
            choice: "PostgreSQL".to_string(),
            rationale: None,
        });
        design.gate_results = (1..=7)
            .map(|id| GateResult {
                gate_id: id,
                name: format!("gate-{id}"),
                status: GateStatus::Pass,
                findings: vec![],
                justification: None,
            })
            .collect();
        let mut plan = Sections::default();
        plan.dependencies.push(dep("postgresql", DependencyScope::Infrastructure));
        let mut tasks = Sections::default();
        for (i, req) in covered.iter().enumerate() {
            let mut t = Task::new(format!("T00{}", i + 1), "work");
            t.requirement_refs.insert(req.to_string());
            tasks.tasks.push(t);
        }
        Chain {
            spec: artifact("SPEC-001", Some("DISC-001"), spec),
            design: artifact("DESIGN-001", Some("SPEC-001"), design),
            plan: artifact("PLAN-001", Some("DESIGN-001"), plan),
            tasks: artifact("TASKS-001", Some("PLAN-001"), tasks),
        }
    }

    fn report(c: &Chain) -> ValidationReport {
        let all = vec![c.spec.clone(), c.design.clone(), c.plan.clone(), c.tasks.clone()];
        let graph = TraceabilityGraph::from_artifacts(&all);
        let input = ReportInput {
            spec: &c.spec,
            design: &c.design,
            adrs: &[],
            plan: &c.plan,
            tasks: &c.tasks,
            graph: &graph,
        };
        generate(&input, &ValidationConfig::default())
    }

    #[test]
    fn full_coverage_passes() {
        let r = report(&chain(&["FR-001", "FR-002"]));
        assert_eq!(r.status, ReportStatus::Pass);
        assert!(r.deviations.is_empty());
        assert!(r.requirements.iter().all(|r| r.covered));
    }

    #[test]
    fn half_coverage_is_partial_and_none_fails() {
        assert_eq!(report(&chain(&["FR-001"])).status, ReportStatus::Partial);
        assert_eq!(report(&chain(&[])).status, ReportStatus::Fail);
    }

    #[test]
    fn unjustified_gate_fails() {
        let mut c = chain(&["FR-001", "FR-002"]);
        c.design.sections.gate_results[2].status = GateStatus::Fail;
        assert_eq!(report(&c).status, ReportStatus::Fail);
        c.design.sections.gate_results[2].justification = Some("accepted".to_string());
        assert_eq!(report(&c).status, ReportStatus::Pass);
    }

    #[test]
    fn deviations_ordered_by_severity() {
        let mut c = chain(&["FR-001", "FR-002"]);
        c.plan.sections.dependencies.push(dep("redis", DependencyScope::Runtime));
        c.tasks.sections.dependencies = vec![
            dep("prettier", DependencyScope::Development),
            dep("kafka", DependencyScope::Infrastructure),
            dep("PostgreSQL", DependencyScope::Infrastructure),
        ];
        let r = report(&c);
        let got: Vec<(Severity, &str)> = r
            .deviations
            .iter()
            .map(|d| (d.severity, d.subject.as_str()))
            .collect();
        assert_eq!(
            got,
            vec![
                (Severity::Critical, "kafka"),
                (Severity::Major, "redis"),
                (Severity::Minor, "prettier"),
            ]
        );
        assert_eq!(r.status, ReportStatus::Fail);
    }

    #[test]
    fn generation_is_repeatable_and_renders() {
        let c = chain(&["FR-001"]);
        let a = report(&c);
        let b = report(&c);
        assert_eq!(a, b);
        let md = a.to_markdown();
        assert!(md.contains("# Validation report: TASKS-001"));
        assert!(md.contains("**Status:** partial"));
        assert!(md.contains("| FR-002 | functional | none |"));
    }

    #[test]
    fn coverage_summary_counts_the_rows() {
        let mut c = chain(&["FR-001"]);
        // The graph drops a superseded spec; the rows still come from its requirements.
        c.spec.status = ArtifactStatus::Superseded;
        let r = report(&c);
        let rows_covered = r.requirements.iter().filter(|r| r.covered).count();
        assert_eq!(r.coverage.total, r.requirements.len());
        assert_eq!(r.coverage.covered, rows_covered);
        assert!(r.to_markdown().contains(&format!("{rows_covered}/2 requirements")));
    }
}
