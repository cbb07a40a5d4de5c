//! CLI error types with exit code handling
//!
//! Library errors are classified once, here, into the failure classes an
//! operator acts on. Each class maps to its own exit code.

use kchart_core::CoreError;
use kchart_kube::KubeError;
use miette::Diagnostic;
use thiserror::Error;

use crate::exit_codes;

/// CLI-specific error type that includes exit code information
#[derive(Error, Debug, Diagnostic, Clone)]
pub enum CliError {
    /// Something the operation depends on is absent or wrong
    #[error("{message}")]
    #[diagnostic(code(kchart::cli::precondition))]
    Precondition {
        message: String,
        #[help]
        help: Option<String>,
    },

    /// The running image belongs to another chart
    #[error("{message}")]
    #[diagnostic(
        code(kchart::cli::identity_mismatch),
        help("check the current kube context and the namespace")
    )]
    IdentityMismatch { message: String },

    /// An external command exited with an error
    #[error("{message}")]
    #[diagnostic(code(kchart::cli::external_command))]
    ExternalCommand { message: String },

    /// Input or tool output could not be parsed
    #[error("{message}")]
    #[diagnostic(code(kchart::cli::parse))]
    Parse { message: String },

    /// A required tool is not installed
    #[error("{message}")]
    #[diagnostic(code(kchart::cli::missing_dependency))]
    MissingDependency {
        message: String,
        #[help]
        help: Option<String>,
    },

    /// Invalid arguments
    #[error("{message}")]
    #[diagnostic(code(kchart::cli::usage))]
    Usage { message: String },

    /// IO error (file not found, permissions, etc.)
    #[error("IO error: {message}")]
    #[diagnostic(code(kchart::cli::io))]
    Io { message: String },

    /// Anything else
    #[error("{message}")]
    #[diagnostic(code(kchart::cli::error))]
    Other { message: String },
}

impl CliError {
    /// Get the exit code for this error
    pub fn exit_code(&self) -> i32 {
        match self {
            CliError::Precondition { .. } => exit_codes::PRECONDITION_FAILED,
            CliError::IdentityMismatch { .. } => exit_codes::IDENTITY_MISMATCH,
            CliError::ExternalCommand { .. } => exit_codes::EXTERNAL_COMMAND_FAILED,
            CliError::Parse { .. } => exit_codes::PARSE_ERROR,
            CliError::MissingDependency { .. } => exit_codes::MISSING_DEPENDENCY,
            CliError::Usage { .. } => exit_codes::USAGE_ERROR,
            CliError::Io { .. } => exit_codes::ERROR,
            CliError::Other { .. } => exit_codes::ERROR,
        }
    }

    /// Create a precondition error
    pub fn precondition(message: impl Into<String>) -> Self {
        Self::Precondition {
            message: message.into(),
            help: None,
        }
    }

    /// Create a precondition error with help text
    pub fn precondition_with_help(message: impl Into<String>, help: impl Into<String>) -> Self {
        Self::Precondition {
            message: message.into(),
            help: Some(help.into()),
        }
    }

    /// Create a usage error
    pub fn usage(message: impl Into<String>) -> Self {
        Self::Usage {
            message: message.into(),
        }
    }
}

impl From<CoreError> for CliError {
    fn from(err: CoreError) -> Self {
        let message = err.to_string();
        match err {
            CoreError::ChartMismatch { .. } => CliError::IdentityMismatch { message },

            CoreError::ChartNotFound { .. } | CoreError::NoEnvironments { .. } => {
                CliError::precondition_with_help(
                    message,
                    "run kchart from the repository root or pass --chdir",
                )
            }
            CoreError::DefaultValuesMissing
            | CoreError::UnknownEnvironment { .. }
            | CoreError::VersionNotInRegistry { .. }
            | CoreError::MissingSecrets { .. }
            | CoreError::InvalidChart { .. }
            | CoreError::InvalidConfig { .. } => CliError::precondition(message),

            CoreError::InvalidImage { .. }
            | CoreError::InvalidVersion { .. }
            | CoreError::NotEnoughTags { .. }
            | CoreError::InvalidDatabaseUri { .. }
            | CoreError::YamlParse(_)
            | CoreError::JsonParse(_) => CliError::Parse { message },

            CoreError::Io(e) => CliError::Io {
                message: e.to_string(),
            },
        }
    }
}

impl From<KubeError> for CliError {
    fn from(err: KubeError) -> Self {
        let message = err.to_string();
        match err {
            KubeError::Core(core) => core.into(),
            KubeError::CommandFailed { .. } | KubeError::Tunnel(_) => {
                CliError::ExternalCommand { message }
            }
            KubeError::MissingExecutable { program } => CliError::MissingDependency {
                message: format!("'{}' was not found on PATH", program),
                help: Some(format!("install {} or adjust PATH", program)),
            },
            KubeError::NamespaceNotFound { .. }
            | KubeError::ObjectNotFound { .. }
            | KubeError::EmptyManifest { .. }
            | KubeError::InvalidConfig(_) => CliError::precondition(message),
            KubeError::Serialization(_) => CliError::Parse { message },
            KubeError::Io(e) => CliError::Io {
                message: e.to_string(),
            },
            _ => CliError::Other { message },
        }
    }
}

impl From<std::io::Error> for CliError {
    fn from(err: std::io::Error) -> Self {
        CliError::Io {
            message: err.to_string(),
        }
    }
}

/// Result type for CLI operations
pub type Result<T> = std::result::Result<T, CliError>;
