//! CLI argument parsing using clap derive API
//!
//! This module defines the command-line interface structure using clap's derive macros.
//! It is purely declarative with no side effects or I/O.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

/// dockgate -- safe Nginx configuration lifecycle for container proxies.
///
/// Use `dockgate <COMMAND> --help` for subcommand details.
#[derive(Parser, Debug)]
#[command(name = "dockgate", version, about, long_about = None)]
pub struct Cli {
    /// Path to the dockgate.toml configuration file.
    #[arg(short, long, default_value = "dockgate.toml")]
    pub config: PathBuf,

    /// Override log level (trace, debug, info, warn, error).
    #[arg(long, global = true)]
    pub log_level: Option<String>,

    /// Output format.
    #[arg(long, global = true, default_value = "text")]
    pub output: OutputFormat,

    #[command(subcommand)]
    pub command: Commands,
}

/// Supported output formats.
#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable text output.
    Text,
    /// Machine-readable JSON.
    Json,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Create the active directory and bootstrap the main nginx configuration.
    Init,

    /// Print the configuration generated for a rule file (no side effects).
    Render(RenderArgs),

    /// Apply a rule file: write, test, reload, roll back on failure.
    Apply(ApplyArgs),

    /// Remove a rule's configuration and reload.
    Remove(RemoveArgs),

    /// Reconcile the active directory with a directory of rule files.
    Sync(SyncArgs),

    /// Check nginx reachability and version.
    Status(StatusArgs),

    /// Manage configuration.
    Config(ConfigArgs),
}

// ---- render ----

/// Render a rule file to nginx configuration text.
#[derive(Args, Debug)]
pub struct RenderArgs {
    /// Rule file (.toml or .json).
    pub rule_file: PathBuf,
}

// ---- apply ----

/// Apply a single rule file.
#[derive(Args, Debug)]
pub struct ApplyArgs {
    /// Rule file (.toml or .json).
    pub rule_file: PathBuf,
}

// ---- remove ----

/// Remove a rule by id.
#[derive(Args, Debug)]
pub struct RemoveArgs {
    /// Rule id.
    pub rule_id: String,
}

// ---- sync ----

/// Reconcile against a rule directory.
#[derive(Args, Debug)]
pub struct SyncArgs {
    /// Directory containing rule files (default: `nginx.rules_dir` from config).
    pub rules_dir: Option<PathBuf>,
}

// ---- status ----

/// Display nginx reachability and active rules.
#[derive(Args, Debug)]
pub struct StatusArgs {
    /// Also list the active rule ids.
    #[arg(short, long)]
    pub verbose: bool,
}

// ---- config ----

/// Manage dockgate configuration.
#[derive(Args, Debug)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub action: ConfigAction,
}

#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Validate the configuration file and report errors.
    Validate,
    /// Show the effective configuration (file + env overrides + defaults).
    Show {
        /// Show only a specific section (general, nginx).
        #[arg(long)]
        section: Option<String>,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_parse_init() {
        let args = Cli::try_parse_from(["dockgate", "init"]);
        assert!(args.is_ok(), "should parse 'init' subcommand");
        let cli = args.expect("parse succeeded");
        assert!(matches!(cli.command, Commands::Init), "expected Init command");
    }

    #[test]
    fn test_cli_parse_render() {
        let args = Cli::try_parse_from(["dockgate", "render", "rules/api.toml"]);
        assert!(args.is_ok(), "should parse 'render' subcommand");
        let cli = args.expect("parse succeeded");
        match cli.command {
            Commands::Render(render_args) => {
                assert_eq!(render_args.rule_file, PathBuf::from("rules/api.toml"));
            }
            _ => panic!("expected Render command"),
        }
    }

    #[test]
    fn test_cli_parse_render_requires_file() {
        let args = Cli::try_parse_from(["dockgate", "render"]);
        assert!(args.is_err(), "render without a rule file should fail");
    }

    #[test]
    fn test_cli_parse_apply() {
        let args = Cli::try_parse_from(["dockgate", "apply", "/etc/dockgate/rules/web.json"]);
        assert!(args.is_ok(), "should parse 'apply' subcommand");
        let cli = args.expect("parse succeeded");
        match cli.command {
            Commands::Apply(apply_args) => {
                assert_eq!(
                    apply_args.rule_file,
                    PathBuf::from("/etc/dockgate/rules/web.json")
                );
            }
            _ => panic!("expected Apply command"),
        }
    }

    #[test]
    fn test_cli_parse_remove() {
        let args = Cli::try_parse_from(["dockgate", "remove", "api"]);
        assert!(args.is_ok(), "should parse 'remove' subcommand");
        let cli = args.expect("parse succeeded");
        match cli.command {
            Commands::Remove(remove_args) => assert_eq!(remove_args.rule_id, "api"),
            _ => panic!("expected Remove command"),
        }
    }

    #[test]
    fn test_cli_parse_sync_default_dir() {
        let args = Cli::try_parse_from(["dockgate", "sync"]);
        assert!(args.is_ok(), "should parse 'sync' subcommand");
        let cli = args.expect("parse succeeded");
        match cli.command {
            Commands::Sync(sync_args) => {
                assert!(sync_args.rules_dir.is_none(), "rules_dir should be None");
            }
            _ => panic!("expected Sync command"),
        }
    }

    #[test]
    fn test_cli_parse_sync_custom_dir() {
        let args = Cli::try_parse_from(["dockgate", "sync", "/srv/rules"]);
        assert!(args.is_ok(), "should parse sync with custom dir");
        let cli = args.expect("parse succeeded");
        match cli.command {
            Commands::Sync(sync_args) => {
                assert_eq!(sync_args.rules_dir, Some(PathBuf::from("/srv/rules")));
            }
            _ => panic!("expected Sync command"),
        }
    }

    #[test]
    fn test_cli_parse_status_basic() {
        let args = Cli::try_parse_from(["dockgate", "status"]);
        assert!(args.is_ok(), "should parse 'status' subcommand");
        let cli = args.expect("parse succeeded");
        match cli.command {
            Commands::Status(status_args) => {
                assert!(!status_args.verbose, "verbose should default to false");
            }
            _ => panic!("expected Status command"),
        }
    }

    #[test]
    fn test_cli_parse_status_verbose() {
        let args = Cli::try_parse_from(["dockgate", "status", "-v"]);
        assert!(args.is_ok(), "should parse 'status -v' subcommand");
        let cli = args.expect("parse succeeded");
        match cli.command {
            Commands::Status(status_args) => {
                assert!(status_args.verbose, "verbose should be true");
            }
            _ => panic!("expected Status command"),
        }
    }

    #[test]
    fn test_cli_parse_config_validate() {
        let args = Cli::try_parse_from(["dockgate", "config", "validate"]);
        assert!(args.is_ok(), "should parse 'config validate' subcommand");
        let cli = args.expect("parse succeeded");
        match cli.command {
            Commands::Config(config_args) => match config_args.action {
                ConfigAction::Validate => {}
                _ => panic!("expected Validate action"),
            },
            _ => panic!("expected Config command"),
        }
    }

    #[test]
    fn test_cli_parse_config_show_section() {
        let args = Cli::try_parse_from(["dockgate", "config", "show", "--section", "nginx"]);
        assert!(args.is_ok(), "should parse config show with section");
        let cli = args.expect("parse succeeded");
        match cli.command {
            Commands::Config(config_args) => match config_args.action {
                ConfigAction::Show { section } => {
                    assert_eq!(section, Some("nginx".to_owned()));
                }
                _ => panic!("expected Show action"),
            },
            _ => panic!("expected Config command"),
        }
    }

    #[test]
    fn test_cli_parse_custom_config_path() {
        let args = Cli::try_parse_from(["dockgate", "-c", "/custom/config.toml", "status"]);
        assert!(args.is_ok(), "should parse with custom config path");
        let cli = args.expect("parse succeeded");
        assert_eq!(cli.config, PathBuf::from("/custom/config.toml"));
    }

    #[test]
    fn test_cli_parse_default_config_path() {
        let cli = Cli::try_parse_from(["dockgate", "status"]).expect("parse succeeded");
        assert_eq!(cli.config, PathBuf::from("dockgate.toml"));
        assert!(cli.log_level.is_none());
        assert!(matches!(cli.output, OutputFormat::Text));
    }

    #[test]
    fn test_cli_parse_global_flags_after_subcommand() {
        let args = Cli::try_parse_from([
            "dockgate",
            "apply",
            "web.toml",
            "--output",
            "json",
            "--log-level",
            "debug",
        ]);
        assert!(args.is_ok(), "global flags should be accepted after subcommand");
        let cli = args.expect("parse succeeded");
        assert!(matches!(cli.output, OutputFormat::Json));
        assert_eq!(cli.log_level, Some("debug".to_owned()));
    }

    #[test]
    fn test_cli_parse_invalid_output_format() {
        let args = Cli::try_parse_from(["dockgate", "--output", "yaml", "status"]);
        assert!(args.is_err(), "unknown output format should fail");
    }

    #[test]
    fn test_cli_parse_unknown_subcommand() {
        let args = Cli::try_parse_from(["dockgate", "start"]);
        assert!(args.is_err(), "unknown subcommand should fail");
    }

    #[test]
    fn test_cli_debug_assert() {
        Cli::command().debug_assert();
    }
}
