use thiserror::Error;

/// Browser session and navigation failures. Ambiguity and authentication
/// failures are fatal to a run; everything else is surfaced per call site.
#[derive(Error, Debug)]
pub enum SessionError {
    #[error("Navigation ambiguous: neither login nor chat detected")]
    AmbiguousNavigation,

    #[error("Authentication failed: {message}")]
    AuthenticationFailed { message: String },

    #[error("Browser error: {message}")]
    Browser { message: String },

    #[error("Element not found: {locator}")]
    ElementNotFound { locator: String },

    #[error("Missing credential: {var} is not set")]
    MissingCredential { var: String },
}

pub type SessionResult<T> = Result<T, SessionError>;

/// Tabular sink failures. Never fatal to evaluation; the run's artifacts
/// are already on disk when the sink is reached.
#[derive(Error, Debug)]
pub enum SinkError {
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Sink rejected request: {status} {message}")]
    Rejected { status: u16, message: String },

    #[error("Sink not configured")]
    NotConfigured,
}

pub type SinkResult<T> = Result<T, SinkError>;

/// Run-level failures.
#[derive(Error, Debug)]
pub enum RunError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Suite error: {0}")]
    Suite(#[from] SuiteError),

    #[error("Session error: {0}")]
    Session(#[from] SessionError),

    #[error("Scoring error: {0}")]
    Scoring(#[from] scoring::ScoringError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Artifact serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type RunResult<T> = Result<T, RunError>;

/// Configuration loading and validation failures.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Cannot read config {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Cannot parse config {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("Invalid config: {key}: {message}")]
    Invalid { key: String, message: String },
}

/// Suite loading failures.
#[derive(Error, Debug)]
pub enum SuiteError {
    #[error("Cannot read suite {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid suite item on line {line}: {source}")]
    Parse {
        line: usize,
        #[source]
        source: serde_json::Error,
    },

    #[error("Duplicate item id '{id}' on line {line}")]
    DuplicateId { id: String, line: usize },

    #[error("Suite {path} contains no items")]
    Empty { path: String },
}
