mod cmd;
mod collab;
mod output;
mod root;

use clap::{Parser, Subcommand};
use cmd::{config::ConfigSubcommand, phase::PhaseArgs, task::TaskSubcommand};
use specflow_core::types::ArtifactKind;
use specflow_core::SpecflowError;
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "specflow",
    about = "Specification pipeline: carry an idea from discovery through validated tasks",
    version,
    propagate_version = true
)]
struct Cli {
    /// Project root (default: auto-detect from .specflow/ or .git/)
    #[arg(long, global = true, env = "SPECFLOW_ROOT")]
    root: Option<PathBuf>,

    /// Output as JSON
    #[arg(long, global = true, short = 'j')]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize specflow in the current project
    Init,

    /// Promote a discovery (starts a new chain)
    Discover(PhaseArgs),

    /// Promote a specification under a completed discovery
    Specify(PhaseArgs),

    /// Promote a design under a completed specification (runs the architecture gates)
    Design(PhaseArgs),

    /// Promote an architecture decision record under a completed design
    Adr(PhaseArgs),

    /// Promote a plan under a completed design
    Plan(PhaseArgs),

    /// Promote a task list under a completed plan
    Tasks(PhaseArgs),

    /// Build the validation report for a completed task list
    Validate {
        /// Tasks artifact to validate (default: latest completed)
        #[arg(long)]
        tasks: Option<String>,
    },

    /// Record a no-go decision: persist the discovery draft as rejected
    Reject(PhaseArgs),

    /// Replace a completed artifact with a new revision
    Supersede {
        /// Artifact to replace (e.g. SPEC-001)
        id: String,

        #[command(flatten)]
        args: PhaseArgs,
    },

    /// List every artifact with its status and phase
    Status,

    /// Print one artifact
    Show {
        /// Artifact id (e.g. DESIGN-002)
        id: String,
    },

    /// Track implementation tasks
    Task {
        #[command(subcommand)]
        subcommand: TaskSubcommand,
    },

    /// Inspect configuration
    Config {
        #[command(subcommand)]
        subcommand: ConfigSubcommand,
    },
}

fn main() {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::WARN.into()),
        )
        .with_target(false)
        .init();

    let root = root::resolve_root(cli.root.as_deref());

    let result = match cli.command {
        Commands::Init => cmd::init::run(&root),
        Commands::Discover(args) => cmd::phase::run(&root, ArtifactKind::Discovery, args, cli.json),
        Commands::Specify(args) => cmd::phase::run(&root, ArtifactKind::Spec, args, cli.json),
        Commands::Design(args) => cmd::phase::run(&root, ArtifactKind::Design, args, cli.json),
        Commands::Adr(args) => cmd::phase::run(&root, ArtifactKind::Adr, args, cli.json),
        Commands::Plan(args) => cmd::phase::run(&root, ArtifactKind::Plan, args, cli.json),
        Commands::Tasks(args) => cmd::phase::run(&root, ArtifactKind::Tasks, args, cli.json),
        Commands::Validate { tasks } => cmd::validate::run(&root, tasks.as_deref(), cli.json),
        Commands::Reject(args) => cmd::artifact::reject(&root, args, cli.json),
        Commands::Supersede { id, args } => cmd::artifact::supersede(&root, &id, args, cli.json),
        Commands::Status => cmd::status::run(&root, cli.json),
        Commands::Show { id } => cmd::show::run(&root, &id, cli.json),
        Commands::Task { subcommand } => cmd::task::run(&root, subcommand, cli.json),
        Commands::Config { subcommand } => cmd::config::run(&root, subcommand, cli.json),
    };

    if let Err(e) = result {
        eprintln!("error: {e:#}");
        std::process::exit(exit_code(&e));
    }
}

/// 2 for broken links and illegal transitions, 1 for everything else.
fn exit_code(e: &anyhow::Error) -> i32 {
    let core = e.chain().find_map(|c| c.downcast_ref::<SpecflowError>());
    match core {
        Some(SpecflowError::Link { .. })
        | Some(SpecflowError::Transition { .. })
        | Some(SpecflowError::ArtifactNotFound(_)) => 2,
        _ => 1,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Context;

    #[test]
    fn link_errors_exit_two_through_context() {
        let err: anyhow::Result<()> = Err(SpecflowError::Link {
            subject: "SPEC".to_string(),
            violations: vec!["a spec requires a parent discovery".to_string()],
        })
        .context("promotion failed");
        assert_eq!(exit_code(&err.unwrap_err()), 2);
    }

    #[test]
    fn unknown_artifact_exits_two() {
        let err = anyhow::Error::new(SpecflowError::ArtifactNotFound("TASKS-999".to_string()))
            .context("validation failed");
        assert_eq!(exit_code(&err), 2);
    }

    #[test]
    fn gate_failures_exit_one() {
        let err = anyhow::Error::new(SpecflowError::GateFailure {
            subject: "DESIGN".to_string(),
            gates: vec![],
        });
        assert_eq!(exit_code(&err), 1);
        assert_eq!(exit_code(&anyhow::anyhow!("plain")), 1);
    }

    #[test]
    fn cli_parses_phase_flags() {
        let cli = Cli::try_parse_from([
            "specflow", "specify", "--draft", "d.yaml", "--parent", "DISC-001",
        ])
        .unwrap();
        match cli.command {
            Commands::Specify(args) => {
                assert_eq!(args.draft, Some(PathBuf::from("d.yaml")));
                assert_eq!(args.parent.as_deref(), Some("DISC-001"));
            }
            _ => panic!("expected specify"),
        }
    }
}
