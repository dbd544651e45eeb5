use thiserror::Error;

/// Why a list-valued config field (`redirects`, `sources`, `destinations`) was rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListProblem {
    /// The key is absent (or `null`).
    Missing,
    /// The key is present but not an array.
    NotASequence,
    /// The array has no entries.
    Empty,
    /// An entry at this index is neither a string nor an unsigned integer.
    BadEntry(usize),
}

impl std::fmt::Display for ListProblem {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ListProblem::Missing => write!(f, "missing"),
            ListProblem::NotASequence => write!(f, "not formatted as an array"),
            ListProblem::Empty => write!(f, "empty"),
            ListProblem::BadEntry(i) => write!(f, "entry {i} is not an id"),
        }
    }
}

/// Fatal configuration errors. Any of these aborts startup.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("the bot token is missing from the configuration")]
    MissingToken,

    #[error("redirects are {0}; the relay is useless without them")]
    NoRedirects(ListProblem),

    #[error("redirect #{rule} has invalid sources: {problem}")]
    InvalidSources { rule: usize, problem: ListProblem },

    #[error("redirect #{rule} has invalid destinations: {problem}")]
    InvalidDestinations { rule: usize, problem: ListProblem },

    #[error("a redirect has a source that is the same as a destination: {0}; this would loop forever")]
    SelfLoop(String),

    #[error("redirect #{rule} has invalid options: {reason}")]
    InvalidOptions { rule: usize, reason: String },

    #[error("echoScope is invalid: {0}")]
    InvalidEchoScope(String),

    #[error("could not read configuration: {0}")]
    Load(String),
}

impl ConfigError {
    /// Short error code for log lines.
    pub fn code(&self) -> &'static str {
        match self {
            ConfigError::MissingToken => "MISSING_TOKEN",
            ConfigError::NoRedirects(_) => "NO_REDIRECTS",
            ConfigError::InvalidSources { .. } => "INVALID_SOURCES",
            ConfigError::InvalidDestinations { .. } => "INVALID_DESTINATIONS",
            ConfigError::SelfLoop(_) => "SELF_LOOP",
            ConfigError::InvalidOptions { .. } => "INVALID_OPTIONS",
            ConfigError::InvalidEchoScope(_) => "INVALID_ECHO_SCOPE",
            ConfigError::Load(_) => "LOAD_FAILED",
        }
    }
}

pub type Result<T> = std::result::Result<T, ConfigError>;
