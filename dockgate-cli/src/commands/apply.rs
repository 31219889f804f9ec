//! `dockgate apply` command handler

use std::io::Write;
use std::path::Path;

use serde::Serialize;
use tracing::info;

use dockgate_nginx::{ConfigContext, load_rule_from_file};

use crate::cli::ApplyArgs;
use crate::error::CliError;
use crate::output::{OutputWriter, Render};

/// Execute the `apply` command.
pub async fn execute(
    args: ApplyArgs,
    config_path: &Path,
    writer: &OutputWriter,
) -> Result<(), CliError> {
    let (_config, controller) = super::load_controller(config_path).await?;

    let rule = load_rule_from_file(&args.rule_file)?;
    info!(rule_id = %rule.id, file = %args.rule_file.display(), "applying rule");

    let rule = controller.apply(rule).await?;

    let report = ApplyReport {
        rule_id: rule.id.clone(),
        name: rule.name.clone(),
        context: rule.context(),
        action: if rule.enabled {
            ApplyAction::Applied
        } else {
            ApplyAction::Disabled
        },
    };
    writer.render(&report)?;

    Ok(())
}

/// 적용 결과 종류
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ApplyAction {
    /// 설정이 쓰이고 reload 됨
    Applied,
    /// 비활성 규칙이라 설정이 제거됨
    Disabled,
}

#[derive(Serialize)]
pub struct ApplyReport {
    pub rule_id: String,
    pub name: String,
    pub context: ConfigContext,
    pub action: ApplyAction,
}

impl Render for ApplyReport {
    fn render_text(&self, w: &mut dyn Write) -> std::io::Result<()> {
        use colored::Colorize;

        let label = if self.name.is_empty() {
            self.rule_id.clone()
        } else {
            format!("{} ({})", self.name, self.rule_id)
        };
        match self.action {
            ApplyAction::Applied => writeln!(
                w,
                "{} {} [{}]",
                "APPLIED".green().bold(),
                label.bold(),
                self.context
            ),
            ApplyAction::Disabled => writeln!(
                w,
                "{} {} (rule disabled, configuration removed)",
                "DISABLED".yellow().bold(),
                label.bold()
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_apply_report_render_applied() {
        let report = ApplyReport {
            rule_id: "api".to_owned(),
            name: "API".to_owned(),
            context: ConfigContext::Http,
            action: ApplyAction::Applied,
        };
        let mut buf = Vec::new();
        report.render_text(&mut buf).expect("render should succeed");
        let output = String::from_utf8(buf).expect("valid UTF-8");
        assert!(output.contains("APPLIED"));
        assert!(output.contains("API (api)"));
        assert!(output.contains("http"));
    }

    #[test]
    fn test_apply_report_json_action() {
        let report = ApplyReport {
            rule_id: "old".to_owned(),
            name: String::new(),
            context: ConfigContext::Http,
            action: ApplyAction::Disabled,
        };
        let json = serde_json::to_value(&report).expect("serialize");
        assert_eq!(json["action"], "disabled");
    }
}
