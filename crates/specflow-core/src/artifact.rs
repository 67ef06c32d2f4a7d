use crate::task::Task;
use crate::types::{ArtifactId, ArtifactKind, ArtifactStatus, Priority, RequirementKind};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashSet};

/// Open-question marker left by content generation.
pub const CLARIFICATION_MARKER: &str = "[NEEDS CLARIFICATION";

// ---------------------------------------------------------------------------
// Spec entities
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AcceptanceCriterion {
    pub given: String,
    pub when: String,
    pub then: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserStory {
    pub id: String,
    pub title: String,
    pub priority: Priority,
    #[serde(default)]
    pub acceptance_criteria: Vec<AcceptanceCriterion>,
    #[serde(default)]
    pub independent_test: String,
    #[serde(default)]
    pub requirement_refs: BTreeSet<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Requirement {
    pub id: String,
    pub kind: RequirementKind,
    pub text: String,
}

// ---------------------------------------------------------------------------
// Design entities (gate inputs)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EscapeHatch {
    pub location: String,
    pub marker: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub guard: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FunctionDecl {
    pub name: String,
    pub lines: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChecklistItem {
    pub principle: String,
    pub satisfied: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepKind {
    Test,
    Implementation,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildStep {
    pub id: String,
    pub kind: StepKind,
    pub target: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LayerRole {
    Domain,
    Application,
    Infrastructure,
    Presentation,
}

impl LayerRole {
    /// Distance from the core; references may only point to equal or lower ranks.
    pub fn rank(self) -> u8 {
        match self {
            LayerRole::Domain => 0,
            LayerRole::Application => 1,
            LayerRole::Infrastructure | LayerRole::Presentation => 2,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LayerDecl {
    pub name: String,
    pub role: LayerRole,
    #[serde(default)]
    pub references: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComponentDecl {
    pub name: String,
    #[serde(default)]
    pub references: Vec<String>,
    #[serde(default)]
    pub injected: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IdentifierKind {
    File,
    Type,
    Constant,
    Function,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdentifierDecl {
    pub name: String,
    pub kind: IdentifierKind,
}

/// Structural facts a Design declares about itself; the gates read only these.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArchitectureDeclarations {
    #[serde(default)]
    pub modules: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub speculative_features: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub escape_hatches: Vec<EscapeHatch>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub functions: Vec<FunctionDecl>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub solid_checklist: Vec<ChecklistItem>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub build_order: Vec<BuildStep>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub layers: Vec<LayerDecl>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub components: Vec<ComponentDecl>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub gateways: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub identifiers: Vec<IdentifierDecl>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GateStatus {
    Pass,
    Fail,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GateResult {
    pub gate_id: u8,
    pub name: String,
    pub status: GateStatus,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub findings: Vec<String>,
    /// Mandatory for a failing gate to be accepted.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub justification: Option<String>,
}

impl GateResult {
    pub fn passed(&self) -> bool {
        self.status == GateStatus::Pass
    }

    pub fn is_justified(&self) -> bool {
        self.justification
            .as_deref()
            .map(|j| !j.trim().is_empty())
            .unwrap_or(false)
    }

    /// Pass, or fail with a non-empty justification.
    pub fn is_acceptable(&self) -> bool {
        self.passed() || self.is_justified()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GateJustification {
    pub gate: u8,
    pub justification: String,
}

// ---------------------------------------------------------------------------
// Decisions / dependencies / research
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Decision {
    pub topic: String,
    pub choice: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rationale: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DependencyScope {
    Infrastructure,
    Runtime,
    Development,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dependency {
    pub name: String,
    pub scope: DependencyScope,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Research {
    pub query: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub findings: Option<String>,
    /// Why findings are missing, when the research collaborator failed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gap: Option<String>,
}

// ---------------------------------------------------------------------------
// Sections
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProseSection {
    pub heading: String,
    pub body: String,
}

/// Structured content of an artifact. Which fields are meaningful depends on
/// the kind; the pipeline reads only the typed fields.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sections {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub prose: Vec<ProseSection>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub user_stories: Vec<UserStory>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub requirements: Vec<Requirement>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub architecture: Option<ArchitectureDeclarations>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub decisions: Vec<Decision>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub dependencies: Vec<Dependency>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub gate_justifications: Vec<GateJustification>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub gate_results: Vec<GateResult>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tasks: Vec<Task>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub references: Vec<ArtifactId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub research: Option<Research>,
}

impl Sections {
    pub fn prose(&self, heading: &str) -> Option<&str> {
        self.prose
            .iter()
            .find(|p| p.heading == heading)
            .map(|p| p.body.as_str())
    }

    pub fn push_prose(&mut self, heading: impl Into<String>, body: impl Into<String>) {
        self.prose.push(ProseSection {
            heading: heading.into(),
            body: body.into().trim().to_string(),
        });
    }

    pub fn requirement(&self, id: &str) -> Option<&Requirement> {
        self.requirements.iter().find(|r| r.id == id)
    }

    pub fn story(&self, id: &str) -> Option<&UserStory> {
        self.user_stories.iter().find(|s| s.id == id)
    }

    pub fn justification_for(&self, gate: u8) -> Option<&str> {
        self.gate_justifications
            .iter()
            .find(|j| j.gate == gate)
            .map(|j| j.justification.as_str())
    }

    /// Choices recorded as decisions, lowercased for matching.
    pub fn decided_choices(&self) -> HashSet<String> {
        self.decisions
            .iter()
            .map(|d| d.choice.to_ascii_lowercase())
            .collect()
    }
}

// ---------------------------------------------------------------------------
// ArtifactDraft
// ---------------------------------------------------------------------------

/// Content produced by a collaborator that has not been promoted yet.
/// Drafts are never persisted; promotion is all-or-nothing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArtifactDraft {
    pub kind: ArtifactKind,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub slug: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent: Option<ArtifactId>,
    #[serde(default)]
    pub sections: Sections,
}

impl ArtifactDraft {
    pub fn new(kind: ArtifactKind, title: impl Into<String>) -> Self {
        Self {
            kind,
            title: title.into(),
            slug: None,
            parent: None,
            sections: Sections::default(),
        }
    }

    pub fn with_parent(mut self, parent: ArtifactId) -> Self {
        self.parent = Some(parent);
        self
    }

    pub fn with_sections(mut self, sections: Sections) -> Self {
        self.sections = sections;
        self
    }

    pub fn unresolved_markers(&self) -> usize {
        count_markers(&self.title, &self.sections)
    }

    pub fn slug(&self) -> String {
        self.slug
            .clone()
            .unwrap_or_else(|| crate::paths::slugify(&self.title))
    }
}

// ---------------------------------------------------------------------------
// Artifact
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Artifact {
    pub id: ArtifactId,
    pub status: ArtifactStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent: Option<ArtifactId>,
    pub slug: String,
    pub title: String,
    pub created: NaiveDate,
    pub updated_at: DateTime<Utc>,
    pub sections: Sections,
}

impl Artifact {
    pub fn kind(&self) -> ArtifactKind {
        self.id.kind
    }

    pub fn is_completed(&self) -> bool {
        self.status == ArtifactStatus::Completed
    }

    pub fn unresolved_markers(&self) -> usize {
        count_markers(&self.title, &self.sections)
    }

    pub fn file_name(&self) -> String {
        format!("{}-{}.md", self.id, self.slug)
    }
}

fn count_markers(title: &str, sections: &Sections) -> usize {
    // JSON never folds long strings, so a marker cannot be split across lines.
    let structured = serde_json::to_string(sections).unwrap_or_default();
    title.matches(CLARIFICATION_MARKER).count() + structured.matches(CLARIFICATION_MARKER).count()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
