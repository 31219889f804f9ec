//! dockgate CLI -- Nginx 프록시 규칙 명령줄 도구
//!
//! 규칙 파일을 설정으로 렌더링하고, `nginx -t` 를 통과한 변경만 reload 합니다.

mod cli;
mod commands;
mod error;
mod logging;
mod output;

use std::process::ExitCode;

use clap::Parser;

use dockgate_core::config::{DockgateConfig, GeneralConfig};

use crate::cli::{Cli, Commands};
use crate::error::CliError;
use crate::output::OutputWriter;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let general = logging_config(&cli).await;
    if let Err(e) = logging::init_tracing(&general) {
        eprintln!("warning: {e}");
    }

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            use colored::Colorize;
            eprintln!("{} {}", "error:".red().bold(), e);
            ExitCode::from(u8::try_from(e.exit_code()).unwrap_or(1))
        }
    }
}

/// 로깅 설정은 설정 파일이 없거나 잘못되어도 기본값으로 진행합니다.
/// 설정 에러 자체는 명령 실행 단계에서 보고됩니다.
async fn logging_config(cli: &Cli) -> GeneralConfig {
    let mut general = match DockgateConfig::load(&cli.config).await {
        Ok(config) => config.general,
        Err(_) => GeneralConfig::default(),
    };
    if let Some(ref level) = cli.log_level {
        general.log_level = level.clone();
    }
    general
}

async fn run(cli: Cli) -> Result<(), CliError> {
    let writer = OutputWriter::new(cli.output);
    let config_path = cli.config.as_path();

    match cli.command {
        Commands::Init => commands::init::execute(config_path, &writer).await,
        Commands::Render(args) => commands::render::execute(args, config_path, &writer).await,
        Commands::Apply(args) => commands::apply::execute(args, config_path, &writer).await,
        Commands::Remove(args) => commands::remove::execute(args, config_path, &writer).await,
        Commands::Sync(args) => commands::sync::execute(args, config_path, &writer).await,
        Commands::Status(args) => commands::status::execute(args, config_path, &writer).await,
        Commands::Config(args) => commands::config::execute(args, config_path, &writer).await,
    }
}
