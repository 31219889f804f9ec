//! `dockgate render` command handler

use std::io::Write;
use std::path::Path;

use serde::Serialize;
use tracing::debug;

use dockgate_core::config::DockgateConfig;
use dockgate_nginx::{ConfigContext, NginxManagerConfig, generate_with, load_rule_from_file};

use crate::cli::RenderArgs;
use crate::error::CliError;
use crate::output::{OutputWriter, Render};

/// Execute the `render` command.
///
/// Reads the configuration file only when it exists; zone names and the
/// upstream prefix otherwise fall back to defaults. Nothing is written.
pub async fn execute(
    args: RenderArgs,
    config_path: &Path,
    writer: &OutputWriter,
) -> Result<(), CliError> {
    let config = if tokio::fs::try_exists(config_path).await? {
        DockgateConfig::load(config_path).await?
    } else {
        debug!(path = %config_path.display(), "config file not found, using defaults");
        DockgateConfig::default()
    };
    let options = NginxManagerConfig::from_core(&config.nginx).generator_options();

    let rule = load_rule_from_file(&args.rule_file)?;
    let text = generate_with(&rule, &options)?;

    let report = RenderReport {
        rule_id: rule.id.clone(),
        context: rule.context(),
        config: text,
    };
    writer.render(&report)?;

    Ok(())
}

#[derive(Serialize)]
pub struct RenderReport {
    pub rule_id: String,
    pub context: ConfigContext,
    pub config: String,
}

impl Render for RenderReport {
    fn render_text(&self, w: &mut dyn Write) -> std::io::Result<()> {
        // 생성된 설정만 출력해서 파일로 바로 리다이렉트할 수 있게 합니다.
        write!(w, "{}", self.config)
    }
}
