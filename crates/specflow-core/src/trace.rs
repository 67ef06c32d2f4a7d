use crate::artifact::Artifact;
use crate::types::{ArtifactId, ArtifactKind, ArtifactStatus};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fmt;

// ---------------------------------------------------------------------------
// Nodes and edges
// ---------------------------------------------------------------------------

/// Graph vertex. Stories and requirements are qualified by their Spec, tasks
/// by their Tasks artifact, so ids only need to be unique within a document.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Node {
    Artifact(ArtifactId),
    Story { spec: ArtifactId, id: String },
    Requirement { spec: ArtifactId, id: String },
    Task { tasks: ArtifactId, id: String },
    File(String),
}

impl fmt::Display for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Node::Artifact(id) => write!(f, "{id}"),
            Node::Story { spec, id } | Node::Requirement { spec, id } => write!(f, "{spec}/{id}"),
            Node::Task { tasks, id } => write!(f, "{tasks}/{id}"),
            Node::File(path) => write!(f, "file:{path}"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EdgeKind {
    Parent,
    References,
    Supersedes,
    StoryRequirement,
    RequirementTask,
    StoryTask,
    TaskFile,
}

/// Tasks and files reached from one user story.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoryCoverage {
    pub requirements: BTreeSet<String>,
    pub tasks: BTreeSet<String>,
    pub files: BTreeSet<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CoverageSummary {
    pub covered: usize,
    pub total: usize,
    pub ratio: f64,
}

impl CoverageSummary {
    pub(crate) fn of(covered: usize, total: usize) -> Self {
        let ratio = if total == 0 {
            0.0
        } else {
            covered as f64 / total as f64
        };
        Self {
            covered,
            total,
            ratio,
        }
    }
}

// ---------------------------------------------------------------------------
// TraceabilityGraph
// ---------------------------------------------------------------------------

/// Directed typed-edge graph from stories through requirements to tasks and
/// files, plus artifact-level parent/reference/supersede links.
///
/// Cycles are allowed and reported by [`TraceabilityGraph::cycles`].
#[derive(Debug, Clone, Default)]
pub struct TraceabilityGraph {
    adjacency: BTreeMap<Node, BTreeSet<(EdgeKind, Node)>>,
    requirements: BTreeSet<Node>,
}

impl TraceabilityGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from persisted artifacts. Entities of superseded or rejected
    /// artifacts are left out; artifact-level links are always kept.
    pub fn from_artifacts(artifacts: &[Artifact]) -> Self {
        let by_id: HashMap<ArtifactId, &Artifact> = artifacts.iter().map(|a| (a.id, a)).collect();
        let mut graph = Self::new();
        for artifact in artifacts {
            graph.record_links(artifact);
            if artifact.status == ArtifactStatus::Completed {
                let spec = chain_spec(artifact, |id| by_id.get(id).copied());
                graph.record_entities(artifact, spec);
            }
        }
        graph
    }

    /// Returns true when the edge was not present before.
    pub fn add_edge(&mut self, from: Node, to: Node, kind: EdgeKind) -> bool {
        self.adjacency
            .entry(from)
            .or_default()
            .insert((kind, to))
    }

    /// Record parent and reference edges of `artifact`. A reference to an
    /// artifact of the same kind is the one it superseded.
    pub fn record_links(&mut self, artifact: &Artifact) {
        let me = Node::Artifact(artifact.id);
        if let Some(parent) = artifact.parent {
            self.add_edge(Node::Artifact(parent), me.clone(), EdgeKind::Parent);
        }
        for target in &artifact.sections.references {
            let kind = if target.kind == artifact.kind() {
                EdgeKind::Supersedes
            } else {
                EdgeKind::References
            };
            self.add_edge(me.clone(), Node::Artifact(*target), kind);
        }
    }

    /// Record story, requirement and task edges. `spec` is the Spec at the
    /// head of the artifact's chain, needed to qualify task references.
    pub fn record_entities(&mut self, artifact: &Artifact, spec: Option<ArtifactId>) {
        let s = &artifact.sections;
        match artifact.kind() {
            ArtifactKind::Spec => {
                for req in &s.requirements {
                    self.requirements.insert(Node::Requirement {
                        spec: artifact.id,
                        id: req.id.clone(),
                    });
                }
                for story in &s.user_stories {
                    let from = Node::Story {
                        spec: artifact.id,
                        id: story.id.clone(),
                    };
                    for req in &story.requirement_refs {
                        let to = Node::Requirement {
                            spec: artifact.id,
                            id: req.clone(),
                        };
                        self.add_edge(from.clone(), to, EdgeKind::StoryRequirement);
                    }
                }
            }
            ArtifactKind::Tasks => {
                let Some(spec) = spec else { return };
                for task in &s.tasks {
                    let node = Node::Task {
                        tasks: artifact.id,
                        id: task.id.clone(),
                    };
                    for req in &task.requirement_refs {
                        let from = Node::Requirement {
                            spec,
                            id: req.clone(),
                        };
                        self.add_edge(from, node.clone(), EdgeKind::RequirementTask);
                    }
                    if let Some(story) = &task.story_ref {
                        let from = Node::Story {
                            spec,
                            id: story.clone(),
                        };
                        self.add_edge(from, node.clone(), EdgeKind::StoryTask);
                    }
                    for path in &task.file_paths {
                        self.add_edge(node.clone(), Node::File(path.clone()), EdgeKind::TaskFile);
                    }
                }
            }
            _ => {}
        }
    }

    // -----------------------------------------------------------------------
    // Queries
    // -----------------------------------------------------------------------

    pub fn edge_count(&self) -> usize {
        self.adjacency.values().map(BTreeSet::len).sum()
    }

    pub fn has_edge(&self, from: &Node, to: &Node, kind: EdgeKind) -> bool {
        self.adjacency
            .get(from)
            .map(|out| out.contains(&(kind, to.clone())))
            .unwrap_or(false)
    }

    fn targets<'a>(&'a self, from: &Node, kind: EdgeKind) -> impl Iterator<Item = &'a Node> + 'a {
        self.adjacency
            .get(from)
            .into_iter()
            .flatten()
            .filter(move |(k, _)| *k == kind)
            .map(|(_, n)| n)
    }

    /// Requirements linked to a story, and the tasks and files reached
    /// through those requirements.
    pub fn coverage(&self, spec: ArtifactId, story: &str) -> StoryCoverage {
        let mut out = StoryCoverage::default();
        let story = Node::Story {
            spec,
            id: story.to_string(),
        };
        for req in self.targets(&story, EdgeKind::StoryRequirement) {
            if let Node::Requirement { id, .. } = req {
                out.requirements.insert(id.clone());
            }
            for task in self.targets(req, EdgeKind::RequirementTask) {
                out.tasks.insert(task.to_string());
                for file in self.targets(task, EdgeKind::TaskFile) {
                    if let Node::File(path) = file {
                        out.files.insert(path.clone());
                    }
                }
            }
        }
        out
    }

    /// Tasks and files linked to one requirement.
    pub fn requirement_links(&self, spec: ArtifactId, requirement: &str) -> (Vec<String>, Vec<String>) {
        let req = Node::Requirement {
            spec,
            id: requirement.to_string(),
        };
        let mut tasks = Vec::new();
        let mut files = BTreeSet::new();
        for task in self.targets(&req, EdgeKind::RequirementTask) {
            if let Node::Task { id, .. } = task {
                tasks.push(id.clone());
            }
            for file in self.targets(task, EdgeKind::TaskFile) {
                if let Node::File(path) = file {
                    files.insert(path.clone());
                }
            }
        }
        (tasks, files.into_iter().collect())
    }

    fn is_covered(&self, req: &Node) -> bool {
        self.targets(req, EdgeKind::RequirementTask).next().is_some()
    }

    /// Share of all requirements with at least one linked task, in `[0, 1]`.
    pub fn coverage_percent(&self) -> f64 {
        self.summary_where(|_| true).ratio
    }

    /// Coverage restricted to the requirements of one Spec.
    pub fn coverage_for(&self, spec: ArtifactId) -> CoverageSummary {
        self.summary_where(|n| matches!(n, Node::Requirement { spec: s, .. } if *s == spec))
    }

    fn summary_where(&self, keep: impl Fn(&Node) -> bool) -> CoverageSummary {
        let reqs: Vec<&Node> = self.requirements.iter().filter(|n| keep(n)).collect();
        let covered = reqs.iter().filter(|r| self.is_covered(r)).count();
        CoverageSummary::of(covered, reqs.len())
    }

    /// Cycles closed by depth-first search back edges, at most one per back
    /// edge, each rotated to start at its smallest node. This is a cycle
    /// report, not an enumeration of every elementary cycle.
    pub fn cycles(&self) -> Vec<Vec<Node>> {
        #[derive(Clone, Copy, PartialEq)]
        enum Mark {
            OnStack,
            Done,
        }

        fn visit<'a>(
            graph: &'a TraceabilityGraph,
            node: &'a Node,
            marks: &mut HashMap<&'a Node, Mark>,
            stack: &mut Vec<&'a Node>,
            found: &mut BTreeSet<Vec<Node>>,
        ) {
            marks.insert(node, Mark::OnStack);
            stack.push(node);
            for (_, next) in graph.adjacency.get(node).into_iter().flatten() {
                match marks.get(next) {
                    Some(Mark::OnStack) => {
                        let start = stack.iter().position(|n| *n == next).unwrap_or(0);
                        let mut cycle: Vec<Node> = stack[start..].iter().map(|n| (*n).clone()).collect();
                        let min = cycle
                            .iter()
                            .enumerate()
                            .min_by(|a, b| a.1.cmp(b.1))
                            .map(|(i, _)| i)
                            .unwrap_or(0);
                        cycle.rotate_left(min);
                        found.insert(cycle);
                    }
                    Some(Mark::Done) => {}
                    None => visit(graph, next, marks, stack, found),
                }
            }
            stack.pop();
            marks.insert(node, Mark::Done);
        }

        let mut marks = HashMap::new();
        let mut found = BTreeSet::new();
        for node in self.adjacency.keys() {
            if !marks.contains_key(node) {
                let mut stack = Vec::new();
                visit(self, node, &mut marks, &mut stack, &mut found);
            }
        }
        found.into_iter().collect()
    }
}

/// Walk parents from `artifact` to the Spec heading its chain.
pub fn chain_spec<'a>(
    artifact: &'a Artifact,
    lookup: impl Fn(&ArtifactId) -> Option<&'a Artifact>,
) -> Option<ArtifactId> {
    let mut current = artifact;
    loop {
        if current.kind() == ArtifactKind::Spec {
            return Some(current.id);
        }
        current = lookup(&current.parent?)?;
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
