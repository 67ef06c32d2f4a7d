//! Seams to the collaborators that write content for a phase.
//!
//! The pipeline never generates prose itself. A [`ContentGenerator`] turns a
//! [`PromptContext`] into sections, an optional [`Researcher`] enriches
//! discoveries, and [`PhaseRunner`] hands the result to the engine.

use crate::artifact::{Artifact, ArtifactDraft, Research, Sections};
use crate::error::{Result, SpecflowError};
use crate::transition::TransitionEngine;
use crate::types::{ArtifactId, ArtifactKind};
use serde::{Deserialize, Serialize};

/// What a generator is asked to write.
#[derive(Debug, Clone)]
pub struct PromptContext {
    pub kind: ArtifactKind,
    /// Read-only snapshot of the parent, when it exists.
    pub parent: Option<Artifact>,
    pub idea: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeneratedContent {
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub slug: Option<String>,
    #[serde(default)]
    pub sections: Sections,
}

pub trait ContentGenerator {
    fn generate(&self, ctx: &PromptContext) -> Result<GeneratedContent>;
}

pub trait Researcher {
    fn research(&self, query: &str) -> Result<String>;
}

// ---------------------------------------------------------------------------
// PhaseRunner
// ---------------------------------------------------------------------------

pub struct PhaseRunner<'a> {
    engine: &'a TransitionEngine,
    generator: &'a dyn ContentGenerator,
    researcher: Option<&'a dyn Researcher>,
}

impl<'a> PhaseRunner<'a> {
    pub fn new(engine: &'a TransitionEngine, generator: &'a dyn ContentGenerator) -> Self {
        Self {
            engine,
            generator,
            researcher: None,
        }
    }

    pub fn with_researcher(mut self, researcher: &'a dyn Researcher) -> Self {
        self.researcher = Some(researcher);
        self
    }

    pub fn context(
        &self,
        kind: ArtifactKind,
        parent: Option<ArtifactId>,
        idea: Option<String>,
    ) -> Result<PromptContext> {
        let parent = match parent {
            Some(id) => self.engine.store().find(&id)?,
            None => None,
        };
        Ok(PromptContext { kind, parent, idea })
    }

    /// Generate (and for discoveries, research) a draft without promoting it.
    pub fn draft(
        &self,
        kind: ArtifactKind,
        parent: Option<ArtifactId>,
        idea: Option<String>,
    ) -> Result<ArtifactDraft> {
        let ctx = self.context(kind, parent, idea)?;
        let content = self.generator.generate(&ctx).map_err(|e| match e {
            SpecflowError::Collaborator(_) => e,
            other => SpecflowError::Collaborator(other.to_string()),
        })?;

        let mut draft = ArtifactDraft::new(kind, content.title).with_sections(content.sections);
        draft.slug = content.slug;
        draft.parent = parent;

        if kind == ArtifactKind::Discovery && draft.sections.research.is_none() {
            if let Some(researcher) = self.researcher {
                let query = ctx.idea.clone().unwrap_or_else(|| draft.title.clone());
                draft.sections.research = Some(research(researcher, query));
            }
        }
        Ok(draft)
    }

    /// Generate and promote.
    pub fn run(
        &self,
        kind: ArtifactKind,
        parent: Option<ArtifactId>,
        idea: Option<String>,
    ) -> Result<Artifact> {
        let draft = self.draft(kind, parent, idea)?;
        self.engine.promote(draft)
    }
}

fn research(researcher: &dyn Researcher, query: String) -> Research {
    match researcher.research(&query) {
        Ok(findings) => Research {
            query,
            findings: Some(findings),
            gap: None,
        },
        Err(e) => {
            tracing::warn!(query = %query, error = %e, "research unavailable, continuing without it");
            Research {
                query,
                findings: None,
                gap: Some(e.to_string()),
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
