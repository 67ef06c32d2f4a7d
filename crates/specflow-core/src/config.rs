use crate::error::{Result, SpecflowError};
use crate::paths;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::OnceLock;
use std::time::Duration;

// ---------------------------------------------------------------------------
// ConfigWarning / WarnLevel
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigWarning {
    pub level: WarnLevel,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WarnLevel {
    Warning,
    Error,
}

impl ConfigWarning {
    fn error(message: impl Into<String>) -> Self {
        Self {
            level: WarnLevel::Error,
            message: message.into(),
        }
    }

    fn warning(message: impl Into<String>) -> Self {
        Self {
            level: WarnLevel::Warning,
            message: message.into(),
        }
    }
}

// ---------------------------------------------------------------------------
// NumberingConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NumberingConfig {
    #[serde(default = "default_lock_timeout_ms")]
    pub lock_timeout_ms: u64,
    #[serde(default = "default_stale_lock_secs")]
    pub stale_lock_secs: u64,
}

fn default_lock_timeout_ms() -> u64 {
    2000
}

fn default_stale_lock_secs() -> u64 {
    30
}

impl Default for NumberingConfig {
    fn default() -> Self {
        Self {
            lock_timeout_ms: default_lock_timeout_ms(),
            stale_lock_secs: default_stale_lock_secs(),
        }
    }
}

impl NumberingConfig {
    pub fn lock_timeout(&self) -> Duration {
        Duration::from_millis(self.lock_timeout_ms)
    }

    pub fn stale_after(&self) -> Duration {
        Duration::from_secs(self.stale_lock_secs)
    }
}

// ---------------------------------------------------------------------------
// Naming conventions
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Case {
    Kebab,
    Snake,
    Camel,
    Pascal,
    ScreamingSnake,
}

static KEBAB: OnceLock<Regex> = OnceLock::new();
static SNAKE: OnceLock<Regex> = OnceLock::new();
static CAMEL: OnceLock<Regex> = OnceLock::new();
static PASCAL: OnceLock<Regex> = OnceLock::new();
static SCREAMING: OnceLock<Regex> = OnceLock::new();

fn compiled(cell: &'static OnceLock<Regex>, pattern: &str) -> &'static Regex {
    cell.get_or_init(|| Regex::new(pattern).expect("static case pattern"))
}

impl Case {
    pub fn as_str(self) -> &'static str {
        match self {
            Case::Kebab => "kebab",
            Case::Snake => "snake",
            Case::Camel => "camel",
            Case::Pascal => "pascal",
            Case::ScreamingSnake => "screaming_snake",
        }
    }

    fn regex(self) -> &'static Regex {
        match self {
            Case::Kebab => compiled(&KEBAB, r"^[a-z][a-z0-9]*(-[a-z0-9]+)*$"),
            Case::Snake => compiled(&SNAKE, r"^[a-z][a-z0-9]*(_[a-z0-9]+)*$"),
            Case::Camel => compiled(&CAMEL, r"^[a-z][a-z0-9]*([A-Z][a-z0-9]*)*$"),
            Case::Pascal => compiled(&PASCAL, r"^([A-Z][a-z0-9]*)+$"),
            Case::ScreamingSnake => compiled(&SCREAMING, r"^[A-Z][A-Z0-9]*(_[A-Z0-9]+)*$"),
        }
    }

    /// File names are checked without their extension (`user-service.ts` → `user-service`).
    pub fn matches(self, name: &str) -> bool {
        self.regex().is_match(name)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NamingConfig {
    #[serde(default = "default_files")]
    pub files: Case,
    #[serde(default = "default_types")]
    pub types: Case,
    #[serde(default = "default_constants")]
    pub constants: Case,
    #[serde(default = "default_functions")]
    pub functions: Case,
}

fn default_files() -> Case {
    Case::Kebab
}

fn default_types() -> Case {
    Case::Pascal
}

fn default_constants() -> Case {
    Case::ScreamingSnake
}

fn default_functions() -> Case {
    Case::Camel
}

impl Default for NamingConfig {
    fn default() -> Self {
        Self {
            files: default_files(),
            types: default_types(),
            constants: default_constants(),
            functions: default_functions(),
        }
    }
}

// ---------------------------------------------------------------------------
// GateConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GateConfig {
    #[serde(default = "default_max_modules")]
    pub max_modules: usize,
    #[serde(default = "default_max_function_lines")]
    pub max_function_lines: u32,
    #[serde(default)]
    pub naming: NamingConfig,
}

fn default_max_modules() -> usize {
    3
}

fn default_max_function_lines() -> u32 {
    20
}

impl Default for GateConfig {
    fn default() -> Self {
        Self {
            max_modules: default_max_modules(),
            max_function_lines: default_max_function_lines(),
            naming: NamingConfig::default(),
        }
    }
}

// ---------------------------------------------------------------------------
// ValidationConfig / ResearchConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationConfig {
    /// Coverage at or above this ratio can pass.
    #[serde(default = "default_pass_coverage")]
    pub pass_coverage: f64,
    /// Coverage below this ratio fails outright.
    #[serde(default = "default_partial_floor")]
    pub partial_floor: f64,
}

fn default_pass_coverage() -> f64 {
    1.0
}

fn default_partial_floor() -> f64 {
    0.5
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self {
            pass_coverage: default_pass_coverage(),
            partial_floor: default_partial_floor(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResearchConfig {
    pub command: String,
    #[serde(default = "default_research_timeout")]
    pub timeout_seconds: u64,
}

fn default_research_timeout() -> u64 {
    60
}

// ---------------------------------------------------------------------------
// Config
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectConfig {
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default = "default_version")]
    pub version: u32,
    pub project: ProjectConfig,
    #[serde(default)]
    pub numbering: NumberingConfig,
    #[serde(default)]
    pub gates: GateConfig,
    #[serde(default)]
    pub validation: ValidationConfig,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub research: Option<ResearchConfig>,
}

fn default_version() -> u32 {
    1
}

impl Config {
    pub fn new(project_name: impl Into<String>) -> Self {
        Self {
            version: default_version(),
            project: ProjectConfig {
                name: project_name.into(),
            },
            numbering: NumberingConfig::default(),
            gates: GateConfig::default(),
            validation: ValidationConfig::default(),
            research: None,
        }
    }

    pub fn load(root: &Path) -> Result<Self> {
        let path = paths::config_path(root);
        if !path.exists() {
            return Err(SpecflowError::NotInitialized);
        }
        let data = std::fs::read_to_string(&path)?;
        let cfg: Config = serde_yaml::from_str(&data)?;
        Ok(cfg)
    }

    pub fn save(&self, root: &Path) -> Result<()> {
        let path = paths::config_path(root);
        let data = serde_yaml::to_string(self)?;
        crate::io::atomic_write(&path, data.as_bytes())
    }

    // -----------------------------------------------------------------------
    // Validation
    // -----------------------------------------------------------------------

    pub fn validate(&self) -> Vec<ConfigWarning> {
        let mut warnings = Vec::new();
        let v = &self.validation;

        for (key, value) in [
            ("pass_coverage", v.pass_coverage),
            ("partial_floor", v.partial_floor),
        ] {
            if !(0.0..=1.0).contains(&value) {
                warnings.push(ConfigWarning::error(format!(
                    "validation.{key} must be within [0, 1], got {value}"
                )));
            }
        }
        if v.partial_floor > v.pass_coverage {
            warnings.push(ConfigWarning::error(format!(
                "validation.partial_floor ({}) is above validation.pass_coverage ({})",
                v.partial_floor, v.pass_coverage
            )));
        }

        if self.gates.max_modules == 0 {
            warnings.push(ConfigWarning::warning(
                "gates.max_modules is 0: every design with a module fails simplicity",
            ));
        }
        if self.gates.max_function_lines == 0 {
            warnings.push(ConfigWarning::warning(
                "gates.max_function_lines is 0: every declared function fails clean-code",
            ));
        }
        if self.numbering.lock_timeout_ms == 0 {
            warnings.push(ConfigWarning::warning(
                "numbering.lock_timeout_ms is 0: contended allocations fail immediately",
            ));
        }

        if let Some(research) = &self.research {
            if research.command.trim().is_empty() {
                warnings.push(ConfigWarning::error("research.command is empty"));
            }
            if research.timeout_seconds == 0 {
                warnings.push(ConfigWarning::warning("research.timeout_seconds is 0"));
            }
        }

        warnings
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn load_missing_is_not_initialized() {
        let dir = TempDir::new().unwrap();
        assert!(matches!(
            Config::load(dir.path()),
            Err(SpecflowError::NotInitialized)
        ));
    }

    #[test]
    fn save_load_with_defaults() {
        let dir = TempDir::new().unwrap();
        let cfg = Config::new("demo");
        cfg.save(dir.path()).unwrap();
        let loaded = Config::load(dir.path()).unwrap();
        assert_eq!(loaded, cfg);
        assert_eq!(loaded.gates.max_function_lines, 20);
        assert_eq!(loaded.numbering.lock_timeout(), Duration::from_millis(2000));
    }

    #[test]
    fn minimal_yaml_fills_defaults() {
        let cfg: Config = serde_yaml::from_str(
            "project:\n  name: demo\ngates:\n  naming:\n    functions: snake\n",
        )
        .unwrap();
        assert_eq!(cfg.version, 1);
        assert_eq!(cfg.gates.max_modules, 3);
        assert_eq!(cfg.gates.naming.functions, Case::Snake);
        assert_eq!(cfg.gates.naming.files, Case::Kebab);
        assert_eq!(cfg.validation.pass_coverage, 1.0);
    }

    #[test]
    fn validate_flags_bad_coverage_bounds() {
        let mut cfg = Config::new("demo");
        assert!(cfg.validate().is_empty());

        cfg.validation.partial_floor = 0.9;
        cfg.validation.pass_coverage = 0.8;
        let w = cfg.validate();
        assert_eq!(w.len(), 1);
        assert_eq!(w[0].level, WarnLevel::Error);

        cfg.validation.pass_coverage = 1.5;
        assert!(cfg.validate().iter().any(|w| w.message.contains("pass_coverage must be")));
    }

    #[test]
    fn validate_flags_empty_research_command() {
        let mut cfg = Config::new("demo");
        cfg.research = Some(ResearchConfig {
            command: "  ".to_string(),
            timeout_seconds: 5,
        });
        assert!(cfg.validate().iter().any(|w| w.message == "research.command is empty"));
    }

    #[test]
    fn case_patterns() {
        assert!(Case::Kebab.matches("user-service"));
        assert!(!Case::Kebab.matches("UserService"));
        assert!(Case::Pascal.matches("UserService"));
        assert!(!Case::Pascal.matches("userService"));
        assert!(Case::Camel.matches("loadUser"));
        assert!(!Case::Camel.matches("load_user"));
        assert!(Case::Snake.matches("load_user"));
        assert!(Case::ScreamingSnake.matches("MAX_RETRIES"));
        assert!(!Case::ScreamingSnake.matches("MaxRetries"));
    }
}
