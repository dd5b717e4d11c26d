use thiserror::Error;

#[derive(Debug, Error)]
pub enum ReenactError {
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    #[error("illegal state: {0}")]
    IllegalState(String),
    #[error("missing collaborator: {0}")]
    MissingCollaborator(String),
    #[error("data consistency: {0}")]
    DataConsistency(String),
    #[error("io error: {0}")]
    Io(String),
    #[error("config parse error: {0}")]
    ConfigParse(String),
    #[error("invalid config: {0}")]
    InvalidConfig(String),
    #[error("script error: {0}")]
    Script(String),
    #[error("cli error: {0}")]
    Cli(String),
}

impl ReenactError {
    /// Short snake_case tag used as the `kind` field of run-log payloads.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::InvalidArgument(_) => "invalid_argument",
            Self::IllegalState(_) => "illegal_state",
            Self::MissingCollaborator(_) => "missing_collaborator",
            Self::DataConsistency(_) => "data_consistency",
            Self::Io(_) => "io",
            Self::ConfigParse(_) => "config_parse",
            Self::InvalidConfig(_) => "invalid_config",
            Self::Script(_) => "script",
            Self::Cli(_) => "cli",
        }
    }
}
