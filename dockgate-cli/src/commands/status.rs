//! `dockgate status` command handler

use std::io::Write;
use std::path::Path;

use serde::Serialize;
use tracing::{debug, warn};

use crate::cli::StatusArgs;
use crate::error::CliError;
use crate::output::{OutputWriter, Render};

/// Execute the `status` command.
///
/// The report is always printed; an unreachable nginx then exits with code 1.
pub async fn execute(
    args: StatusArgs,
    config_path: &Path,
    writer: &OutputWriter,
) -> Result<(), CliError> {
    let (config, controller) = super::load_controller(config_path).await?;

    let status = controller.status().await;
    let rules = controller.store().list().await?;
    debug!(reachable = status.reachable, rules = rules.len(), "nginx status collected");

    let report = StatusReport {
        binary: config.nginx.binary.clone(),
        reachable: status.reachable,
        version: status.version.map(|v| v.to_string()),
        raw: status.raw,
        active_dir: controller.store().active_dir().display().to_string(),
        active_rules: rules.len(),
        rules: args.verbose.then_some(rules),
    };
    writer.render(&report)?;

    if !report.reachable {
        warn!(binary = %report.binary, "nginx is not reachable");
        return Err(CliError::Command(format!(
            "nginx is not reachable: {}",
            report.raw
        )));
    }

    Ok(())
}

#[derive(Serialize)]
pub struct StatusReport {
    pub binary: String,
    pub reachable: bool,
    /// 파싱할 수 없는 버전 문자열이면 `None`
    pub version: Option<String>,
    /// `nginx -v` 출력 원문 (또는 실패 사유)
    pub raw: String,
    pub active_dir: String,
    pub active_rules: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rules: Option<Vec<String>>,
}

impl Render for StatusReport {
    fn render_text(&self, w: &mut dyn Write) -> std::io::Result<()> {
        use colored::Colorize;

        writeln!(w, "Nginx Status")?;
        let reachable = if self.reachable {
            "reachable".green()
        } else {
            "unreachable".red()
        };
        writeln!(w, "  {:<14} {}", "Binary:", self.binary)?;
        writeln!(w, "  {:<14} {}", "State:", reachable)?;
        match self.version {
            Some(ref version) => writeln!(w, "  {:<14} {}", "Version:", version.bold())?,
            None => writeln!(w, "  {:<14} {}", "Output:", self.raw)?,
        }
        writeln!(w, "  {:<14} {}", "Active dir:", self.active_dir)?;
        writeln!(w, "  {:<14} {}", "Active rules:", self.active_rules)?;

        if let Some(ref rules) = self.rules {
            for id in rules {
                writeln!(w, "    - {}", id)?;
            }
        }
        Ok(())
    }
}
