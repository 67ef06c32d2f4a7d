//! Markdown encoding of artifacts.
//!
//! A document is YAML frontmatter (`id`, the parent key, `created`, `status`),
//! a level-1 title, then `## ` sections. Headings from [`STRUCTURED_HEADINGS`]
//! hold one fenced `yaml` block each; any other heading is prose.

use crate::artifact::{Artifact, Sections};
use crate::types::{ArtifactId, ArtifactKind, ArtifactStatus};
use chrono::{DateTime, NaiveDate, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

pub const USER_STORIES: &str = "User Stories";
pub const REQUIREMENTS: &str = "Requirements";
pub const ARCHITECTURE: &str = "Architecture";
pub const DECISIONS: &str = "Decisions";
pub const DEPENDENCIES: &str = "Dependencies";
pub const GATE_JUSTIFICATIONS: &str = "Gate Justifications";
pub const GATE_RESULTS: &str = "Gate Results";
pub const TASKS: &str = "Tasks";
pub const REFERENCES: &str = "References";
pub const RESEARCH: &str = "Research";

pub const STRUCTURED_HEADINGS: &[&str] = &[
    USER_STORIES,
    REQUIREMENTS,
    ARCHITECTURE,
    DECISIONS,
    DEPENDENCIES,
    GATE_JUSTIFICATIONS,
    GATE_RESULTS,
    TASKS,
    REFERENCES,
    RESEARCH,
];

const FENCE: &str = "```";

#[derive(Debug, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
struct Frontmatter {
    id: ArtifactId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    discovery: Option<ArtifactId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    spec: Option<ArtifactId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    design: Option<ArtifactId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    plan: Option<ArtifactId>,
    created: NaiveDate,
    status: ArtifactStatus,
}

impl Frontmatter {
    fn of(artifact: &Artifact) -> Self {
        let mut fm = Frontmatter {
            id: artifact.id,
            discovery: None,
            spec: None,
            design: None,
            plan: None,
            created: artifact.created,
            status: artifact.status,
        };
        if let Some(parent) = artifact.parent {
            match parent.kind {
                ArtifactKind::Discovery => fm.discovery = Some(parent),
                ArtifactKind::Spec => fm.spec = Some(parent),
                ArtifactKind::Design => fm.design = Some(parent),
                ArtifactKind::Plan => fm.plan = Some(parent),
                // No kind has an ADR or Tasks parent; validation rejects such drafts.
                ArtifactKind::Adr | ArtifactKind::Tasks => {}
            }
        }
        fm
    }

    fn parent(&self) -> Result<Option<ArtifactId>, String> {
        let keys = [
            ("discovery", self.discovery),
            ("spec", self.spec),
            ("design", self.design),
            ("plan", self.plan),
        ];
        let present: Vec<_> = keys.iter().filter(|(_, v)| v.is_some()).collect();
        let expected = self.id.kind.parent_key();
        match (present.as_slice(), expected) {
            ([], None) => Ok(None),
            ([], Some(key)) => Err(format!("missing parent key '{key}'")),
            ([(key, value)], Some(exp)) if *key == exp => Ok(*value),
            ([(key, _)], _) => Err(format!(
                "parent key '{key}' is not valid for a {} artifact",
                self.id.kind
            )),
            _ => Err("more than one parent key".to_string()),
        }
    }
}

// ---------------------------------------------------------------------------
// Rendering
// ---------------------------------------------------------------------------

pub fn render(artifact: &Artifact) -> Result<String, serde_yaml::Error> {
    let mut out = String::new();
    out.push_str("---\n");
    out.push_str(&serde_yaml::to_string(&Frontmatter::of(artifact))?);
    out.push_str("---\n\n");
    out.push_str(&format!("# {}\n\n", artifact.title.trim()));

    let s = &artifact.sections;
    for p in &s.prose {
        out.push_str(&format!("## {}\n\n{}\n\n", p.heading.trim(), p.body.trim()));
    }
    structured(&mut out, USER_STORIES, &s.user_stories, s.user_stories.is_empty())?;
    structured(&mut out, REQUIREMENTS, &s.requirements, s.requirements.is_empty())?;
    structured(&mut out, ARCHITECTURE, &s.architecture, s.architecture.is_none())?;
    structured(&mut out, DECISIONS, &s.decisions, s.decisions.is_empty())?;
    structured(&mut out, DEPENDENCIES, &s.dependencies, s.dependencies.is_empty())?;
    structured(
        &mut out,
        GATE_JUSTIFICATIONS,
        &s.gate_justifications,
        s.gate_justifications.is_empty(),
    )?;
    structured(&mut out, GATE_RESULTS, &s.gate_results, s.gate_results.is_empty())?;
    structured(&mut out, TASKS, &s.tasks, s.tasks.is_empty())?;
    structured(&mut out, REFERENCES, &s.references, s.references.is_empty())?;
    structured(&mut out, RESEARCH, &s.research, s.research.is_none())?;

    let trimmed = out.trim_end().len();
    out.truncate(trimmed);
    out.push('\n');
    Ok(out)
}

/// [`render`], then decode the text in memory and require it to match
/// `artifact`. Prose is compared trimmed with `\n` line ends, as decoded.
pub fn encode(artifact: &Artifact) -> Result<String, String> {
    let text = render(artifact).map_err(|e| format!("cannot encode: {e}"))?;
    let decoded = parse(&text, &artifact.slug, artifact.updated_at)?;

    let mut expected = artifact.sections.clone();
    for p in &mut expected.prose {
        p.heading = p.heading.trim().to_string();
        p.body = p.body.trim().replace("\r\n", "\n");
    }
    if decoded.sections != expected {
        return Err("sections do not survive encoding; check prose for unbalanced code fences".to_string());
    }
    if decoded.title != artifact.title.trim() || decoded.parent != artifact.parent {
        return Err("title or parent does not survive encoding".to_string());
    }
    Ok(text)
}

fn structured<T: Serialize>(
    out: &mut String,
    heading: &str,
    value: &T,
    skip: bool,
) -> Result<(), serde_yaml::Error> {
    if skip {
        return Ok(());
    }
    out.push_str(&format!("## {heading}\n\n{FENCE}yaml\n"));
    out.push_str(&serde_yaml::to_string(value)?);
    out.push_str(&format!("{FENCE}\n\n"));
    Ok(())
}

// ---------------------------------------------------------------------------
// Parsing
// ---------------------------------------------------------------------------

/// Raw frontmatter text (without the `---` fences).
pub fn frontmatter_of(content: &str) -> Option<&str> {
    let rest = content.strip_prefix("---\n")?;
    let end = rest.find("\n---\n")?;
    Some(&rest[..=end])
}

/// Decode a document. `slug` comes from the file name and `updated_at` from
/// its modification time; neither is stored in the content itself.
pub fn parse(content: &str, slug: &str, updated_at: DateTime<Utc>) -> Result<Artifact, String> {
    let fm_text = frontmatter_of(content).ok_or("missing frontmatter")?;
    let fm: Frontmatter =
        serde_yaml::from_str(fm_text).map_err(|e| format!("invalid frontmatter: {e}"))?;
    let parent = fm.parent()?;

    // "---\n" + frontmatter + "---\n"
    let body = &content[4 + fm_text.len() + 4..];
    let mut lines = body.lines().skip_while(|l| l.trim().is_empty());
    let title = lines
        .next()
        .and_then(|l| l.strip_prefix("# "))
        .ok_or("missing '# ' title line")?
        .trim()
        .to_string();

    let mut sections = Sections::default();
    let mut seen = Vec::new();
    let mut heading: Option<String> = None;
    let mut buf: Vec<&str> = Vec::new();
    let mut in_fence = false;

    for line in lines {
        if line.starts_with(FENCE) {
            in_fence = !in_fence;
        }
        if !in_fence {
            if let Some(h) = line.strip_prefix("## ") {
                if let Some(prev) = heading.take() {
                    flush(&mut sections, &mut seen, prev, &buf)?;
                }
                heading = Some(h.trim().to_string());
                buf.clear();
                continue;
            }
        }
        if heading.is_none() && !line.trim().is_empty() {
            return Err(format!("content before the first section: '{line}'"));
        }
        buf.push(line);
    }
    if let Some(prev) = heading {
        flush(&mut sections, &mut seen, prev, &buf)?;
    }

    Ok(Artifact {
        id: fm.id,
        status: fm.status,
        parent,
        slug: slug.to_string(),
        title,
        created: fm.created,
        updated_at,
        sections,
    })
}

fn flush(
    sections: &mut Sections,
    seen: &mut Vec<String>,
    heading: String,
    lines: &[&str],
) -> Result<(), String> {
    let text = lines.join("\n");
    let text = text.trim();
    if !STRUCTURED_HEADINGS.contains(&heading.as_str()) {
        sections.push_prose(heading, text);
        return Ok(());
    }
    if seen.contains(&heading) {
        return Err(format!("duplicate section '{heading}'"));
    }
    let yaml = text
        .strip_prefix("```yaml\n")
        .and_then(|t| t.strip_suffix(FENCE))
        .ok_or_else(|| format!("section '{heading}' must hold a single yaml block"))?;

    match heading.as_str() {
        USER_STORIES => sections.user_stories = decode(&heading, yaml)?,
        REQUIREMENTS => sections.requirements = decode(&heading, yaml)?,
        ARCHITECTURE => sections.architecture = Some(decode(&heading, yaml)?),
        DECISIONS => sections.decisions = decode(&heading, yaml)?,
        DEPENDENCIES => sections.dependencies = decode(&heading, yaml)?,
        GATE_JUSTIFICATIONS => sections.gate_justifications = decode(&heading, yaml)?,
        GATE_RESULTS => sections.gate_results = decode(&heading, yaml)?,
        TASKS => sections.tasks = decode(&heading, yaml)?,
        REFERENCES => sections.references = decode(&heading, yaml)?,
        RESEARCH => sections.research = Some(decode(&heading, yaml)?),
        _ => unreachable!("heading checked against STRUCTURED_HEADINGS"),
    }
    seen.push(heading);
    Ok(())
}

fn decode<T: DeserializeOwned>(heading: &str, yaml: &str) -> Result<T, String> {
    serde_yaml::from_str(yaml).map_err(|e| format!("section '{heading}': {e}"))
}

/// Problems that would stop prose from surviving an encode/decode cycle.
pub fn prose_violations(sections: &Sections) -> Vec<String> {
    let mut violations = Vec::new();
    for p in &sections.prose {
        let heading = p.heading.trim();
        if heading.is_empty() || heading.contains('\n') {
            violations.push(format!("prose heading '{}' must be a single non-empty line", p.heading));
        }
        if STRUCTURED_HEADINGS.contains(&heading) {
            violations.push(format!("prose heading '{heading}' is reserved for structured content"));
        }
        let mut in_fence = false;
        for line in p.body.lines() {
            if line.starts_with(FENCE) {
                in_fence = !in_fence;
            }
            if !in_fence && (line.starts_with("## ") || line.starts_with("# ")) {
                violations.push(format!(
                    "prose section '{heading}' contains a top-level heading '{line}'"
                ));
            }
        }
        if in_fence {
            violations.push(format!("prose section '{heading}' has an unclosed code fence"));
        }
    }
    violations
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::artifact::{Requirement, UserStory, AcceptanceCriterion};
    use crate::types::{Priority, RequirementKind};

    fn spec_artifact() -> Artifact {
        let mut sections = Sections::default();
        sections.push_prose("Overview", "Users sign in.\n\n```text\n## not a heading\n```");
        sections.requirements.push(Requirement {
            id: "FR-001".to_string(),
            kind: RequirementKind::Functional,
            text: "Users can sign in with email".to_string(),
        });
        sections.user_stories.push(UserStory {
            id: "US-1".to_string(),
            title: "Sign in".to_string(),
            priority: Priority::P1,
            acceptance_criteria: vec![AcceptanceCriterion {
                given: "a registered user".to_string(),
                when: "they submit valid credentials".to_string(),
                then: "a session is created".to_string(),
            }],
            independent_test: "log in on a fresh database".to_string(),
            requirement_refs: ["FR-001".to_string()].into_iter().collect(),
        });
        Artifact {
            id: "SPEC-002".parse().unwrap(),
            status: ArtifactStatus::Completed,
            parent: Some("DISC-001".parse().unwrap()),
            slug: "user-auth".to_string(),
            title: "User auth".to_string(),
            created: NaiveDate::from_ymd_opt(2026, 10, 14).unwrap(),
            updated_at: Utc::now(),
            sections,
        }
    }

    #[test]
    fn frontmatter_uses_exact_keys() {
        let text = render(&spec_artifact()).unwrap();
        let fm = frontmatter_of(&text).unwrap();
        let keys: Vec<&str> = fm.lines().filter_map(|l| l.split(':').next()).collect();
        assert_eq!(keys, vec!["id", "discovery", "created", "status"]);
        assert!(fm.contains("SPEC-002"));
        assert!(fm.contains("DISC-001"));
        assert!(fm.contains("completed"));
    }

    #[test]
    fn render_parse_preserves_sections() {
        let original = spec_artifact();
        let text = render(&original).unwrap();
        let parsed = parse(&text, "user-auth", original.updated_at).unwrap();
        assert_eq!(parsed, original);
        assert_eq!(render(&parsed).unwrap(), text);
    }

    #[test]
    fn discovery_has_no_parent_key() {
        let mut a = spec_artifact();
        a.id = "DISC-001".parse().unwrap();
        a.parent = None;
        let text = render(&a).unwrap();
        let fm = frontmatter_of(&text).unwrap();
        assert_eq!(fm.lines().count(), 3);
        assert!(parse(&text, "x", Utc::now()).unwrap().parent.is_none());
    }

    #[test]
    fn wrong_parent_key_rejected() {
        let text = "---\nid: SPEC-001\ndesign: DESIGN-001\ncreated: 2026-10-14\nstatus: completed\n---\n\n# T\n";
        let err = parse(text, "t", Utc::now()).unwrap_err();
        assert!(err.contains("not valid"), "{err}");
    }

    #[test]
    fn unknown_frontmatter_key_rejected() {
        let text = "---\nid: DISC-001\nowner: me\ncreated: 2026-10-14\nstatus: completed\n---\n\n# T\n";
        assert!(parse(text, "t", Utc::now()).is_err());
    }

    #[test]
    fn missing_title_rejected() {
        let text = "---\nid: DISC-001\ncreated: 2026-10-14\nstatus: completed\n---\n\n## Problem\n\nx\n";
        assert!(parse(text, "t", Utc::now()).unwrap_err().contains("title"));
    }

    #[test]
    fn prose_checks() {
        let mut s = Sections::default();
        s.push_prose("Tasks", "reserved");
        s.push_prose("Notes", "intro\n## sneaky\nmore");
        s.push_prose("Code", "```md\n## fine inside fence\n```");
        let v = prose_violations(&s);
        assert_eq!(v.len(), 2, "{v:?}");
    }

    #[test]
    fn unclosed_fence_is_a_prose_violation() {
        let mut s = Sections::default();
        s.push_prose("Example", "Example:\n```js\nconst a = 1;");
        assert_eq!(
            prose_violations(&s),
            vec!["prose section 'Example' has an unclosed code fence".to_string()]
        );

        let mut balanced = Sections::default();
        balanced.push_prose("Example", "```js\nconst a = 1;\n```\n```\nplain\n```");
        assert!(prose_violations(&balanced).is_empty());
    }

    #[test]
    fn encode_refuses_text_that_swallows_sections() {
        let mut a = spec_artifact();
        a.sections.prose[0].body = "Example:\n```js\nconst a = 1;".to_string();
        let err = encode(&a).unwrap_err();
        assert!(err.contains("do not survive"), "{err}");

        // Rendering alone hides the loss: the requirements vanish on reload.
        let text = render(&a).unwrap();
        let reparsed = parse(&text, "user-auth", a.updated_at).unwrap();
        assert!(reparsed.sections.requirements.is_empty());
    }

    #[test]
    fn encode_accepts_untrimmed_prose() {
        let mut a = spec_artifact();
        a.sections.prose[0].body = "  Users sign in.\n\n".to_string();
        a.sections.prose[0].heading = " Overview ".to_string();
        let text = encode(&a).unwrap();
        assert_eq!(text, render(&a).unwrap());
    }
}
