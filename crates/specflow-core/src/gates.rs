use crate::artifact::{IdentifierKind, StepKind};
use crate::gate::{Gate, GateContext};
use std::collections::{HashMap, HashSet};

// ---------------------------------------------------------------------------
// Registry
// ---------------------------------------------------------------------------

macro_rules! gate {
    (id: $id:expr, name: $name:expr, description: $desc:expr, evaluate: $eval:expr) => {
        Gate {
            id: $id,
            name: $name,
            description: $desc,
            evaluate: $eval,
        }
    };
}

pub fn default_gates() -> Vec<Gate> {
    vec![
        gate! {
            id: 1,
            name: "simplicity",
            description: "At most the configured number of modules; no speculative features",
            evaluate: simplicity
        },
        gate! {
            id: 2,
            name: "type-safety",
            description: "Every escape hatch carries a guard annotation",
            evaluate: type_safety
        },
        gate! {
            id: 3,
            name: "clean-code",
            description: "Functions stay under the length limit; SOLID checklist satisfied",
            evaluate: clean_code
        },
        gate! {
            id: 4,
            name: "test-first",
            description: "Each implementation step is preceded by a test step for its target",
            evaluate: test_first
        },
        gate! {
            id: 5,
            name: "layered-dependency",
            description: "Inner layers never reference outer layers",
            evaluate: layered_dependency
        },
        gate! {
            id: 6,
            name: "feature-isolation",
            description: "UI components receive data-access gateways by injection",
            evaluate: feature_isolation
        },
        gate! {
            id: 7,
            name: "naming-convention",
            description: "Declared identifiers follow the configured case conventions",
            evaluate: naming_convention
        },
    ]
}

// ---------------------------------------------------------------------------
// Gate functions
// ---------------------------------------------------------------------------

fn simplicity(ctx: &GateContext) -> Vec<String> {
    let arch = ctx.architecture;
    let mut findings = Vec::new();
    let limit = ctx.config.max_modules;
    if arch.modules.len() > limit {
        findings.push(format!(
            "{} modules declared (limit {limit}): {}",
            arch.modules.len(),
            arch.modules.join(", ")
        ));
    }
    for feature in &arch.speculative_features {
        findings.push(format!("speculative feature: {feature}"));
    }
    findings
}

fn type_safety(ctx: &GateContext) -> Vec<String> {
    ctx.architecture
        .escape_hatches
        .iter()
        .filter(|h| h.guard.as_deref().map(str::trim).unwrap_or("").is_empty())
        .map(|h| format!("unguarded escape hatch '{}' at {}", h.marker, h.location))
        .collect()
}

fn clean_code(ctx: &GateContext) -> Vec<String> {
    let arch = ctx.architecture;
    let limit = ctx.config.max_function_lines;
    let long = arch
        .functions
        .iter()
        .filter(|f| f.lines > limit)
        .map(|f| format!("function '{}' is {} lines (limit {limit})", f.name, f.lines));
    let solid = arch
        .solid_checklist
        .iter()
        .filter(|c| !c.satisfied)
        .map(|c| match &c.note {
            Some(note) => format!("SOLID principle '{}' violated: {note}", c.principle),
            None => format!("SOLID principle '{}' violated", c.principle),
        });
    long.chain(solid).collect()
}

fn test_first(ctx: &GateContext) -> Vec<String> {
    let mut tested = HashSet::new();
    let mut findings = Vec::new();
    for step in &ctx.architecture.build_order {
        match step.kind {
            StepKind::Test => {
                tested.insert(step.target.as_str());
            }
            StepKind::Implementation if !tested.contains(step.target.as_str()) => {
                findings.push(format!(
                    "step '{}' implements '{}' before any test for it",
                    step.id, step.target
                ));
            }
            StepKind::Implementation => {}
        }
    }
    findings
}

fn layered_dependency(ctx: &GateContext) -> Vec<String> {
    let layers = &ctx.architecture.layers;
    let ranks: HashMap<&str, u8> = layers
        .iter()
        .map(|l| (l.name.as_str(), l.role.rank()))
        .collect();
    let mut findings = Vec::new();
    for layer in layers {
        let own = layer.role.rank();
        for target in &layer.references {
            match ranks.get(target.as_str()) {
                None => findings.push(format!(
                    "layer '{}' references undeclared layer '{target}'",
                    layer.name
                )),
                Some(&rank) if rank > own => findings.push(format!(
                    "layer '{}' references outer layer '{target}'",
                    layer.name
                )),
                Some(_) => {}
            }
        }
    }
    findings
}

fn feature_isolation(ctx: &GateContext) -> Vec<String> {
    let gateways: HashSet<&str> = ctx
        .architecture
        .gateways
        .iter()
        .map(String::as_str)
        .collect();
    let mut findings = Vec::new();
    for component in &ctx.architecture.components {
        for target in &component.references {
            if gateways.contains(target.as_str()) && !component.injected.contains(target) {
                findings.push(format!(
                    "component '{}' reaches gateway '{target}' directly instead of by injection",
                    component.name
                ));
            }
        }
    }
    findings
}

fn naming_convention(ctx: &GateContext) -> Vec<String> {
    let naming = &ctx.config.naming;
    ctx.architecture
        .identifiers
        .iter()
        .filter_map(|ident| {
            let (label, case, subject) = match ident.kind {
                IdentifierKind::File => ("file", naming.files, file_stem(&ident.name)),
                IdentifierKind::Type => ("type", naming.types, ident.name.as_str()),
                IdentifierKind::Constant => ("constant", naming.constants, ident.name.as_str()),
                IdentifierKind::Function => ("function", naming.functions, ident.name.as_str()),
            };
            (!case.matches(subject))
                .then(|| format!("{label} '{}' is not {} case", ident.name, case.as_str()))
        })
        .collect()
}

/// `src/user-service.test.ts` → `user-service`.
fn file_stem(path: &str) -> &str {
    let name = path.rsplit('/').next().unwrap_or(path);
    name.split('.').next().unwrap_or(name)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::artifact::*;
    use crate::config::{Case, GateConfig};

    fn run(id: u8, arch: &ArchitectureDeclarations, config: &GateConfig) -> Vec<String> {
        let gate = default_gates().into_iter().find(|g| g.id == id).unwrap();
        (gate.evaluate)(&GateContext {
            architecture: arch,
            config,
        })
    }

    fn names(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn simplicity_counts_modules_and_speculation() {
        let cfg = GateConfig::default();
        let mut arch = ArchitectureDeclarations {
            modules: names(&["api", "core", "web"]),
            ..Default::default()
        };
        assert!(run(1, &arch, &cfg).is_empty());
        arch.modules.push("worker".to_string());
        arch.speculative_features.push("plugin system for later".to_string());
        assert_eq!(run(1, &arch, &cfg).len(), 2);
    }

    #[test]
    fn type_safety_requires_guard() {
        let cfg = GateConfig::default();
        let arch = ArchitectureDeclarations {
            escape_hatches: vec![
                EscapeHatch {
                    location: "parser.ts:10".to_string(),
                    marker: "any".to_string(),
                    guard: Some("isToken()".to_string()),
                },
                EscapeHatch {
                    location: "api.ts:4".to_string(),
                    marker: "as unknown".to_string(),
                    guard: None,
                },
            ],
            ..Default::default()
        };
        let f = run(2, &arch, &cfg);
        assert_eq!(f.len(), 1);
        assert!(f[0].contains("api.ts:4"));
    }

    #[test]
    fn clean_code_uses_configured_limit_and_checklist() {
        let mut cfg = GateConfig::default();
        let arch = ArchitectureDeclarations {
            functions: vec![FunctionDecl {
                name: "parse".to_string(),
                lines: 25,
            }],
            solid_checklist: vec![ChecklistItem {
                principle: "single responsibility".to_string(),
                satisfied: false,
                note: Some("router also validates".to_string()),
            }],
            ..Default::default()
        };
        assert_eq!(run(3, &arch, &cfg).len(), 2);
        cfg.max_function_lines = 30;
        assert_eq!(run(3, &arch, &cfg).len(), 1);
    }

    #[test]
    fn test_first_checks_ordering() {
        let cfg = GateConfig::default();
        let step = |id: &str, kind, target: &str| BuildStep {
            id: id.to_string(),
            kind,
            target: target.to_string(),
        };
        let arch = ArchitectureDeclarations {
            build_order: vec![
                step("S1", StepKind::Test, "auth"),
                step("S2", StepKind::Implementation, "auth"),
                step("S3", StepKind::Implementation, "billing"),
                step("S4", StepKind::Test, "billing"),
            ],
            ..Default::default()
        };
        let f = run(4, &arch, &cfg);
        assert_eq!(f.len(), 1);
        assert!(f[0].contains("S3"));
    }

    #[test]
    fn layered_dependency_blocks_outward_refs() {
        let cfg = GateConfig::default();
        let layer = |name: &str, role, refs: &[&str]| LayerDecl {
            name: name.to_string(),
            role,
            references: names(refs),
        };
        let arch = ArchitectureDeclarations {
            layers: vec![
                layer("domain", LayerRole::Domain, &["db"]),
                layer("app", LayerRole::Application, &["domain"]),
                layer("db", LayerRole::Infrastructure, &["domain", "app", "cache"]),
                layer("ui", LayerRole::Presentation, &["app", "db"]),
            ],
            ..Default::default()
        };
        let f = run(5, &arch, &cfg);
        assert_eq!(f.len(), 2, "{f:?}");
        assert!(f.iter().any(|m| m.contains("'domain' references outer layer 'db'")));
        assert!(f.iter().any(|m| m.contains("undeclared layer 'cache'")));
    }

    #[test]
    fn feature_isolation_requires_injection() {
        let cfg = GateConfig::default();
        let arch = ArchitectureDeclarations {
            gateways: names(&["UserRepository"]),
            components: vec![
                ComponentDecl {
                    name: "ProfilePage".to_string(),
                    references: names(&["UserRepository"]),
                    injected: names(&["UserRepository"]),
                },
                ComponentDecl {
                    name: "AdminPage".to_string(),
                    references: names(&["UserRepository", "Button"]),
                    injected: vec![],
                },
            ],
            ..Default::default()
        };
        let f = run(6, &arch, &cfg);
        assert_eq!(f.len(), 1);
        assert!(f[0].contains("AdminPage"));
    }

    #[test]
    fn naming_convention_per_kind() {
        let mut cfg = GateConfig::default();
        let ident = |name: &str, kind| IdentifierDecl {
            name: name.to_string(),
            kind,
        };
        let arch = ArchitectureDeclarations {
            identifiers: vec![
                ident("src/user-service.test.ts", IdentifierKind::File),
                ident("UserService", IdentifierKind::Type),
                ident("MAX_RETRIES", IdentifierKind::Constant),
                ident("loadUser", IdentifierKind::Function),
                ident("user_repo", IdentifierKind::Type),
                ident("UserRepo.ts", IdentifierKind::File),
            ],
            ..Default::default()
        };
        let f = run(7, &arch, &cfg);
        assert_eq!(f.len(), 2, "{f:?}");
        assert!(f.iter().any(|m| m.contains("user_repo")));

        cfg.naming.functions = Case::Snake;
        assert_eq!(run(7, &arch, &cfg).len(), 3);
    }
}
