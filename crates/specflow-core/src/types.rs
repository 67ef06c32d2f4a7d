use crate::error::SpecflowError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

// ---------------------------------------------------------------------------
// ArtifactKind
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArtifactKind {
    Discovery,
    Spec,
    Design,
    Adr,
    Plan,
    Tasks,
}

impl ArtifactKind {
    pub fn all() -> &'static [ArtifactKind] {
        &[
            ArtifactKind::Discovery,
            ArtifactKind::Spec,
            ArtifactKind::Design,
            ArtifactKind::Adr,
            ArtifactKind::Plan,
            ArtifactKind::Tasks,
        ]
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ArtifactKind::Discovery => "discovery",
            ArtifactKind::Spec => "spec",
            ArtifactKind::Design => "design",
            ArtifactKind::Adr => "adr",
            ArtifactKind::Plan => "plan",
            ArtifactKind::Tasks => "tasks",
        }
    }

    /// Identifier prefix, e.g. `SPEC` in `SPEC-014`.
    pub fn prefix(self) -> &'static str {
        match self {
            ArtifactKind::Discovery => "DISC",
            ArtifactKind::Spec => "SPEC",
            ArtifactKind::Design => "DESIGN",
            ArtifactKind::Adr => "ADR",
            ArtifactKind::Plan => "PLAN",
            ArtifactKind::Tasks => "TASKS",
        }
    }

    pub fn from_prefix(prefix: &str) -> Option<ArtifactKind> {
        Self::all().iter().copied().find(|k| k.prefix() == prefix)
    }

    pub fn padding(self) -> usize {
        match self {
            ArtifactKind::Adr => 4,
            _ => 3,
        }
    }

    /// Directory under `docs/` holding artifacts of this kind.
    pub fn dir_name(self) -> &'static str {
        match self {
            ArtifactKind::Discovery => "discovery",
            ArtifactKind::Spec => "specs",
            ArtifactKind::Design => "design",
            ArtifactKind::Adr => "adr",
            ArtifactKind::Plan => "plans",
            ArtifactKind::Tasks => "tasks",
        }
    }

    /// The kind a parent must have. `None` for Discovery, which starts a chain.
    pub fn parent_kind(self) -> Option<ArtifactKind> {
        match self {
            ArtifactKind::Discovery => None,
            ArtifactKind::Spec => Some(ArtifactKind::Discovery),
            ArtifactKind::Design => Some(ArtifactKind::Spec),
            ArtifactKind::Adr => Some(ArtifactKind::Design),
            ArtifactKind::Plan => Some(ArtifactKind::Design),
            ArtifactKind::Tasks => Some(ArtifactKind::Plan),
        }
    }

    /// Frontmatter key under which children of this kind name their parent.
    pub fn parent_key(self) -> Option<&'static str> {
        self.parent_kind().map(|p| p.as_str())
    }

    pub fn phase(self) -> Phase {
        match self {
            ArtifactKind::Discovery => Phase::Discovery,
            ArtifactKind::Spec => Phase::Spec,
            ArtifactKind::Design | ArtifactKind::Adr => Phase::Design,
            ArtifactKind::Plan => Phase::Plan,
            ArtifactKind::Tasks => Phase::Tasks,
        }
    }

    /// ADRs hang off a Design without advancing the chain.
    pub fn is_sub_artifact(self) -> bool {
        matches!(self, ArtifactKind::Adr)
    }
}

impl fmt::Display for ArtifactKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ArtifactKind {
    type Err = SpecflowError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "discovery" | "disc" => Ok(ArtifactKind::Discovery),
            "spec" | "specs" => Ok(ArtifactKind::Spec),
            "design" => Ok(ArtifactKind::Design),
            "adr" => Ok(ArtifactKind::Adr),
            "plan" | "plans" => Ok(ArtifactKind::Plan),
            "tasks" => Ok(ArtifactKind::Tasks),
            _ => Err(SpecflowError::InvalidId(s.to_string())),
        }
    }
}

// ---------------------------------------------------------------------------
// ArtifactId
// ---------------------------------------------------------------------------

/// Typed identifier `{PREFIX}-{zero-padded sequence}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ArtifactId {
    pub kind: ArtifactKind,
    pub seq: u32,
}

impl ArtifactId {
    pub fn new(kind: ArtifactKind, seq: u32) -> Self {
        Self { kind, seq }
    }
}

impl fmt::Display for ArtifactId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}-{:0width$}",
            self.kind.prefix(),
            self.seq,
            width = self.kind.padding()
        )
    }
}

impl FromStr for ArtifactId {
    type Err = SpecflowError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || SpecflowError::InvalidId(s.to_string());
        let (prefix, digits) = s.split_once('-').ok_or_else(invalid)?;
        let kind = ArtifactKind::from_prefix(prefix).ok_or_else(invalid)?;
        if digits.len() < kind.padding() || !digits.bytes().all(|b| b.is_ascii_digit()) {
            return Err(invalid());
        }
        let seq: u32 = digits.parse().map_err(|_| invalid())?;
        if seq == 0 {
            return Err(invalid());
        }
        Ok(ArtifactId { kind, seq })
    }
}

impl TryFrom<String> for ArtifactId {
    type Error = SpecflowError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<ArtifactId> for String {
    fn from(id: ArtifactId) -> Self {
        id.to_string()
    }
}

// ---------------------------------------------------------------------------
// ArtifactStatus
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArtifactStatus {
    Draft,
    Completed,
    Superseded,
    Rejected,
}

impl ArtifactStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            ArtifactStatus::Draft => "draft",
            ArtifactStatus::Completed => "completed",
            ArtifactStatus::Superseded => "superseded",
            ArtifactStatus::Rejected => "rejected",
        }
    }

    /// Status moves are acyclic: draft → completed | rejected, completed → superseded.
    pub fn can_become(self, next: ArtifactStatus) -> bool {
        matches!(
            (self, next),
            (ArtifactStatus::Draft, ArtifactStatus::Completed)
                | (ArtifactStatus::Draft, ArtifactStatus::Rejected)
                | (ArtifactStatus::Completed, ArtifactStatus::Superseded)
        )
    }
}

impl fmt::Display for ArtifactStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Phase
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Discovery,
    Spec,
    Design,
    Plan,
    Tasks,
    Validated,
    Rejected,
}

impl Phase {
    pub fn chain() -> &'static [Phase] {
        &[
            Phase::Discovery,
            Phase::Spec,
            Phase::Design,
            Phase::Plan,
            Phase::Tasks,
            Phase::Validated,
        ]
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Phase::Discovery => "discovery",
            Phase::Spec => "spec",
            Phase::Design => "design",
            Phase::Plan => "plan",
            Phase::Tasks => "tasks",
            Phase::Validated => "validated",
            Phase::Rejected => "rejected",
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, Phase::Validated | Phase::Rejected)
    }

    /// Next phase along the main chain.
    pub fn next(self) -> Option<Phase> {
        let chain = Phase::chain();
        let i = chain.iter().position(|p| *p == self)?;
        chain.get(i + 1).copied()
    }

    /// Legal moves: the single forward chain plus the Discovery → Rejected exit.
    pub fn can_advance_to(self, target: Phase) -> bool {
        (self == Phase::Discovery && target == Phase::Rejected) || self.next() == Some(target)
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// TaskStatus
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TaskStatus {
    Todo,
    InProgress,
    Done,
    Blocked,
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TaskStatus::Todo => "todo",
            TaskStatus::InProgress => "in-progress",
            TaskStatus::Done => "done",
            TaskStatus::Blocked => "blocked",
        };
        f.write_str(s)
    }
}

// ---------------------------------------------------------------------------
// Priority / RequirementKind
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Priority {
    P1,
    P2,
    P3,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequirementKind {
    Functional,
    Perf,
    Security,
    Scalability,
    Observability,
    Maintainability,
}

impl fmt::Display for RequirementKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            RequirementKind::Functional => "functional",
            RequirementKind::Perf => "perf",
            RequirementKind::Security => "security",
            RequirementKind::Scalability => "scalability",
            RequirementKind::Observability => "observability",
            RequirementKind::Maintainability => "maintainability",
        };
        f.write_str(s)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
