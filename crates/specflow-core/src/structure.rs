use crate::artifact::{ArtifactDraft, CLARIFICATION_MARKER};
use crate::document;
use crate::task;
use crate::types::ArtifactKind;
use std::collections::HashSet;

/// Every reason `draft` is not structurally ready to be completed.
/// An empty list means it may proceed to linkage checks.
pub fn violations(draft: &ArtifactDraft) -> Vec<String> {
    let mut v = Vec::new();

    let markers = draft.unresolved_markers();
    if markers > 0 {
        v.push(format!("{markers} unresolved {CLARIFICATION_MARKER}] marker(s)"));
    }
    if draft.title.trim().is_empty() {
        v.push("title is empty".to_string());
    } else if draft.title.contains('\n') {
        v.push("title must be a single line".to_string());
    }
    v.extend(document::prose_violations(&draft.sections));

    let s = &draft.sections;
    match draft.kind {
        ArtifactKind::Discovery | ArtifactKind::Plan => {
            if s.prose.is_empty() {
                v.push("at least one prose section is required".to_string());
            }
        }
        ArtifactKind::Spec => {
            if s.user_stories.is_empty() {
                v.push("at least one user story is required".to_string());
            }
            if s.requirements.is_empty() {
                v.push("at least one requirement is required".to_string());
            }
            duplicates(s.requirements.iter().map(|r| r.id.as_str()), "requirement", &mut v);
            duplicates(s.user_stories.iter().map(|u| u.id.as_str()), "user story", &mut v);
            for story in &s.user_stories {
                if story.acceptance_criteria.is_empty() {
                    v.push(format!("user story '{}' has no acceptance criteria", story.id));
                }
                for r in &story.requirement_refs {
                    if s.requirement(r).is_none() {
                        v.push(format!(
                            "user story '{}' references unknown requirement '{r}'",
                            story.id
                        ));
                    }
                }
            }
        }
        ArtifactKind::Design => {
            if s.architecture.is_none() {
                v.push(format!("an '{}' section is required", document::ARCHITECTURE));
            }
        }
        ArtifactKind::Adr => {
            if s.decisions.is_empty() {
                v.push("at least one decision is required".to_string());
            }
        }
        ArtifactKind::Tasks => {
            if s.tasks.is_empty() {
                v.push("at least one task is required".to_string());
            }
            v.extend(task::structural_violations(&s.tasks));
        }
    }
    v
}

fn duplicates<'a>(ids: impl Iterator<Item = &'a str>, what: &str, out: &mut Vec<String>) {
    let mut seen = HashSet::new();
    for id in ids {
        if !seen.insert(id) {
            out.push(format!("duplicate {what} id '{id}'"));
        }
    }
}
