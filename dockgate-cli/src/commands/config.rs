//! `dockgate config` command handler

use std::io::Write;
use std::path::Path;

use serde::Serialize;
use tracing::info;

use dockgate_core::config::DockgateConfig;
use dockgate_nginx::NginxManagerConfig;

use crate::cli::{ConfigAction, ConfigArgs};
use crate::error::CliError;
use crate::output::{OutputWriter, Render};

/// Sections accepted by `config show --section`.
const SECTIONS: &[&str] = &["general", "nginx"];

/// Execute the `config` command.
pub async fn execute(
    args: ConfigArgs,
    config_path: &Path,
    writer: &OutputWriter,
) -> Result<(), CliError> {
    match args.action {
        ConfigAction::Validate => execute_validate(config_path, writer).await,
        ConfigAction::Show { section } => execute_show(config_path, section, writer).await,
    }
}

/// Execute the config validate subcommand.
///
/// Runs the file-level checks of `DockgateConfig::load` and then the
/// manager-level checks (zone names, directory layout).
///
/// # Errors
///
/// Returns `CliError::Config` if validation fails.
async fn execute_validate(config_path: &Path, writer: &OutputWriter) -> Result<(), CliError> {
    info!(path = %config_path.display(), "validating configuration");

    let errors = match DockgateConfig::load(config_path).await {
        Ok(config) => match NginxManagerConfig::from_core(&config.nginx).validate() {
            Ok(()) => Vec::new(),
            Err(e) => vec![e.to_string()],
        },
        Err(e) => vec![e.to_string()],
    };

    let report = ConfigValidationReport {
        source: config_path.display().to_string(),
        valid: errors.is_empty(),
        errors,
    };

    writer.render(&report)?;

    if !report.valid {
        return Err(CliError::Config("configuration is invalid".to_owned()));
    }

    Ok(())
}

/// Execute the config show subcommand.
///
/// Displays the effective configuration (file + env overrides + defaults).
///
/// # Errors
///
/// Returns `CliError::Config` if loading fails or `CliError::Command` if the
/// section name is unknown.
async fn execute_show(
    config_path: &Path,
    section: Option<String>,
    writer: &OutputWriter,
) -> Result<(), CliError> {
    info!(path = %config_path.display(), "loading configuration");

    let config = DockgateConfig::load(config_path).await?;
    let source = config_path.display().to_string();

    let report = match section.as_deref() {
        None => ConfigReport::new(source, None, &config)?,
        Some("general") => ConfigReport::new(source, section.clone(), &config.general)?,
        Some("nginx") => ConfigReport::new(source, section.clone(), &config.nginx)?,
        Some(other) => {
            return Err(CliError::Command(format!(
                "unknown section: {} (expected: {})",
                other,
                SECTIONS.join(", ")
            )));
        }
    };

    writer.render(&report)?;

    Ok(())
}

/// Configuration display report.
///
/// JSON output carries the configuration as a structured value;
/// text output prints it as TOML.
#[derive(Serialize)]
pub struct ConfigReport {
    /// Configuration file path
    pub source: String,
    /// Optional section name (None = full config)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub section: Option<String>,
    /// Configuration as JSON value
    pub config: serde_json::Value,
    /// Serialized TOML configuration (text rendering only)
    #[serde(skip)]
    pub config_toml: String,
}

impl ConfigReport {
    fn new<T: Serialize>(
        source: String,
        section: Option<String>,
        value: &T,
    ) -> Result<Self, CliError> {
        Ok(Self {
            source,
            section,
            config: serde_json::to_value(value)?,
            config_toml: toml::to_string_pretty(value)
                .unwrap_or_else(|e| format!("(serialization error: {})", e)),
        })
    }
}

impl Render for ConfigReport {
    fn render_text(&self, w: &mut dyn Write) -> std::io::Result<()> {
        use colored::Colorize;

        if let Some(ref section) = self.section {
            let section_label = format!("[{}]", section);
            writeln!(
                w,
                "Configuration {} (source: {})",
                section_label.bold(),
                self.source
            )?;
        } else {
            writeln!(w, "Configuration (source: {})", self.source.bold())?;
        }

        writeln!(w)?;
        write!(w, "{}", self.config_toml)?;

        Ok(())
    }
}

/// Configuration validation report.
#[derive(Serialize)]
pub struct ConfigValidationReport {
    /// Configuration file path
    pub source: String,
    /// Whether the configuration is valid
    pub valid: bool,
    /// Validation error messages (empty if valid)
    pub errors: Vec<String>,
}

impl Render for ConfigValidationReport {
    fn render_text(&self, w: &mut dyn Write) -> std::io::Result<()> {
        use colored::Colorize;

        writeln!(w, "Config Validation: {}", self.source.bold())?;

        if self.valid {
            writeln!(w, "  Result: {}", "VALID".green().bold())?;
        } else {
            writeln!(w, "  Result: {}", "INVALID".red().bold())?;
            for err in &self.errors {
                writeln!(w, "  Error: {}", err.red())?;
            }
        }

        Ok(())
    }
}
