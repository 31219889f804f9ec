//! CLI-specific error types and exit code mapping

use dockgate_core::error::{DockgateError, NginxError};
use dockgate_nginx::NginxManagerError;

/// CLI-specific error type.
///
/// Each variant carries enough context for a user-friendly message.
/// The `exit_code()` method maps errors to process exit codes.
#[derive(Debug, thiserror::Error)]
pub enum CliError {
    /// Configuration loading or validation failure.
    #[error("configuration error: {0}")]
    Config(String),

    /// A subcommand-specific operation failed.
    #[error("{0}")]
    Command(String),

    /// The rule was rejected before reaching the live process
    /// (invalid rule or failed configuration test).
    #[error("rule rejected: {0}")]
    Rejected(String),

    /// The configuration test passed but applying it failed.
    /// Disk and the running nginx may disagree.
    #[error("apply failed: {0}")]
    Apply(String),

    /// JSON serialisation failed during output rendering.
    #[error("json output error: {0}")]
    JsonSerialize(#[from] serde_json::Error),

    /// IO error (file read, stdout write, etc.).
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl CliError {
    /// Map the error to a process exit code.
    ///
    /// | Code | Meaning                                   |
    /// |------|-------------------------------------------|
    /// | 0    | Success                                   |
    /// | 1    | General / command error                   |
    /// | 2    | Configuration error                       |
    /// | 3    | Rule rejected (validation or nginx -t)    |
    /// | 4    | Apply failure (disk and live may diverge) |
    /// | 10   | IO error                                  |
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Config(_) => 2,
            Self::Rejected(_) => 3,
            Self::Apply(_) => 4,
            Self::Io(_) => 10,
            Self::JsonSerialize(_) | Self::Command(_) => 1,
        }
    }
}

impl From<NginxManagerError> for CliError {
    fn from(err: NginxManagerError) -> Self {
        if err.is_rejection() {
            return Self::Rejected(err.to_string());
        }
        match err {
            NginxManagerError::ApplyFailed { .. } | NginxManagerError::RollbackFailed { .. } => {
                Self::Apply(err.to_string())
            }
            NginxManagerError::RuleLoad { .. } => Self::Rejected(err.to_string()),
            NginxManagerError::Config { .. } => Self::Config(err.to_string()),
            NginxManagerError::Io { source, .. } => Self::Io(source),
            _ => Self::Command(err.to_string()),
        }
    }
}

impl From<DockgateError> for CliError {
    fn from(err: DockgateError) -> Self {
        match err {
            DockgateError::Config(e) => Self::Config(e.to_string()),
            DockgateError::Io(e) => Self::Io(e),
            DockgateError::Nginx(e) => match e {
                NginxError::InvalidRule(_) | NginxError::TestFailed(_) => {
                    Self::Rejected(e.to_string())
                }
                NginxError::ApplyFailed(_) => Self::Apply(e.to_string()),
                NginxError::Compile(_) | NginxError::Storage(_) => Self::Command(e.to_string()),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dockgate_core::error::ConfigError;

    #[test]
    fn test_exit_code_config_error() {
        let err = CliError::Config("test error".to_owned());
        assert_eq!(err.exit_code(), 2, "config error should return exit code 2");
    }

    #[test]
    fn test_exit_code_rejected() {
        let err = CliError::Rejected("nginx -t failed".to_owned());
        assert_eq!(err.exit_code(), 3, "rejection should return exit code 3");
    }

    #[test]
    fn test_exit_code_apply_failure() {
        let err = CliError::Apply("reload failed".to_owned());
        assert_eq!(err.exit_code(), 4, "apply failure should return exit code 4");
    }

    #[test]
    fn test_exit_code_io_error() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err = CliError::Io(io_err);
        assert_eq!(err.exit_code(), 10, "io error should return exit code 10");
    }

    #[test]
    fn test_exit_code_command_error() {
        let err = CliError::Command("test error".to_owned());
        assert_eq!(err.exit_code(), 1, "command error should return exit code 1");
    }

    #[test]
    fn test_from_validation_error_is_rejection() {
        let err = NginxManagerError::Validation {
            rule_id: "api".to_owned(),
            field: "domain".to_owned(),
            reason: "must not be empty".to_owned(),
        };
        let cli_err: CliError = err.into();
        assert!(matches!(cli_err, CliError::Rejected(_)));
        assert!(cli_err.to_string().contains("domain"));
    }

    #[test]
    fn test_from_test_failed_is_rejection() {
        let err = NginxManagerError::TestFailed {
            message: "nginx: [emerg] unknown directive".to_owned(),
        };
        let cli_err: CliError = err.into();
        assert_eq!(cli_err.exit_code(), 3);
        assert!(cli_err.to_string().contains("[emerg]"));
    }

    #[test]
    fn test_from_apply_failed_and_rollback_failed() {
        let apply: CliError = NginxManagerError::ApplyFailed {
            message: "signal process started".to_owned(),
        }
        .into();
        assert_eq!(apply.exit_code(), 4);

        let rollback: CliError = NginxManagerError::RollbackFailed {
            cause: "test failed".to_owned(),
            reason: "permission denied".to_owned(),
        }
        .into();
        assert_eq!(rollback.exit_code(), 4);
    }

    #[test]
    fn test_from_nginx_io_error_keeps_source() {
        let err = NginxManagerError::Io {
            path: "/etc/nginx/conf.d/dockgate".to_owned(),
            source: std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied"),
        };
        match CliError::from(err) {
            CliError::Io(e) => assert_eq!(e.kind(), std::io::ErrorKind::PermissionDenied),
            other => panic!("expected Io error variant, got {other:?}"),
        }
    }

    #[test]
    fn test_from_nginx_config_and_process_errors() {
        let config: CliError = NginxManagerError::Config {
            field: "nginx.binary".to_owned(),
            reason: "must not be empty".to_owned(),
        }
        .into();
        assert_eq!(config.exit_code(), 2);

        let process: CliError = NginxManagerError::Process("spawn failed".to_owned()).into();
        assert_eq!(process.exit_code(), 1);
    }

    #[test]
    fn test_from_rule_load_error_is_rejection() {
        let err: CliError = NginxManagerError::RuleLoad {
            path: "rules/api.toml".to_owned(),
            reason: "failed to parse TOML".to_owned(),
        }
        .into();
        assert_eq!(err.exit_code(), 3);
        assert!(err.to_string().contains("rules/api.toml"));
    }

    #[test]
    fn test_from_core_config_error() {
        let core_err = DockgateError::Config(ConfigError::FileNotFound {
            path: "dockgate.toml".to_owned(),
        });
        let cli_err: CliError = core_err.into();
        assert_eq!(cli_err.exit_code(), 2);
        assert!(cli_err.to_string().contains("dockgate.toml"));
    }

    #[test]
    fn test_from_core_nginx_error() {
        let rejected: CliError =
            DockgateError::Nginx(NginxError::TestFailed("bad".to_owned())).into();
        assert_eq!(rejected.exit_code(), 3);

        let storage: CliError =
            DockgateError::Nginx(NginxError::Storage("disk full".to_owned())).into();
        assert_eq!(storage.exit_code(), 1);
    }

    #[test]
    fn test_error_display_command() {
        let err = CliError::Command("execution failed".to_owned());
        assert_eq!(err.to_string(), "execution failed");
    }
}
