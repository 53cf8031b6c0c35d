use thiserror::Error;

/// Distinguished stop signal raised at a suspension point after `stop`.
///
/// Not a failure: workflows surface it as a `STOPPED` outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("task was stopped by user")]
pub struct TaskStopped;

/// Error classes used to decide how far an error may propagate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// Navigation / evaluate / CDP failures. Retried, then a per-unit failure.
    Transport,
    /// Bad identifier text, missing cells. Always recovered locally.
    Parse,
    /// Cooperative stop.
    Stopped,
    /// Missing parameters, unknown task, missing record. Fail fast.
    Structural,
}

/// Application error type
#[derive(Debug, Error)]
pub enum AppError {
    #[error("browser error: {0}")]
    Browser(#[from] BrowserError),
    #[error("store error: {0}")]
    Store(#[from] StoreError),
    #[error("{0}")]
    Command(#[from] CommandError),
    #[error("config error: {0}")]
    Config(#[from] ConfigError),
    #[error("parse error: {0}")]
    Parse(String),
    #[error(transparent)]
    Stopped(#[from] TaskStopped),
}

/// Browser related errors
#[derive(Debug, Error)]
pub enum BrowserError {
    #[error("failed to connect to browser at {endpoint}: {source}")]
    ConnectionFailed {
        endpoint: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
    #[error("failed to launch browser: {0}")]
    LaunchFailed(String),
    #[error("failed to open tab: {source}")]
    TabOpenFailed {
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
    #[error("navigation to {url} failed: {source}")]
    NavigationFailed {
        url: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
    #[error("script evaluation failed: {source}")]
    ScriptFailed {
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
    #[error("element query `{selector}` failed: {source}")]
    QueryFailed {
        selector: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
    #[error("tab is closed")]
    TabClosed,
    #[error("page did not reach {expected}")]
    UnexpectedPage { expected: String },
}

/// Document store errors
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("report {0} not found")]
    ReportNotFound(String),
    #[error("report id `{0}` cannot name a store document")]
    InvalidReportId(String),
    #[error("i/o error on {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("malformed document {path}: {source}")]
    Malformed {
        path: String,
        #[source]
        source: serde_json::Error,
    },
}

/// Command level errors, reported as `FAILED` without retry
#[derive(Debug, Error)]
pub enum CommandError {
    #[error("Missing required parameter: {0}")]
    MissingParameter(&'static str),
    #[error("Missing or invalid required parameter: {name}")]
    InvalidParameter { name: &'static str },
    #[error("Unknown action: {0}")]
    UnknownAction(String),
    #[error("No active task found for batch {0}")]
    TaskNotFound(String),
    #[error("Task {0} is already running")]
    TaskAlreadyRunning(String),
    #[error("Invalid JSON: {0}")]
    InvalidJson(String),
    #[error("{0}")]
    Precondition(String),
}

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("cannot parse {path}: {source}")]
    Toml {
        path: String,
        #[source]
        source: toml::de::Error,
    },
    #[error("environment variable {var_name}: value '{value}' is not a valid {expected}")]
    EnvVarParseFailed {
        var_name: String,
        value: String,
        expected: &'static str,
    },
}

impl AppError {
    pub fn class(&self) -> ErrorClass {
        match self {
            AppError::Browser(_) => ErrorClass::Transport,
            AppError::Parse(_) => ErrorClass::Parse,
            AppError::Stopped(_) => ErrorClass::Stopped,
            AppError::Store(StoreError::Io { .. }) => ErrorClass::Transport,
            AppError::Store(_) | AppError::Command(_) | AppError::Config(_) => {
                ErrorClass::Structural
            }
        }
    }

    pub fn is_stopped(&self) -> bool {
        matches!(self, AppError::Stopped(_))
    }

    pub fn is_structural(&self) -> bool {
        self.class() == ErrorClass::Structural
    }

    pub fn navigation(url: impl Into<String>, source: impl std::error::Error + Send + Sync + 'static) -> Self {
        AppError::Browser(BrowserError::NavigationFailed {
            url: url.into(),
            source: Box::new(source),
        })
    }

    pub fn script(source: impl std::error::Error + Send + Sync + 'static) -> Self {
        AppError::Browser(BrowserError::ScriptFailed {
            source: Box::new(source),
        })
    }

    pub fn query(selector: impl Into<String>, source: impl std::error::Error + Send + Sync + 'static) -> Self {
        AppError::Browser(BrowserError::QueryFailed {
            selector: selector.into(),
            source: Box::new(source),
        })
    }
}

// ========== conversions from third-party errors ==========

impl From<chromiumoxide::error::CdpError> for AppError {
    fn from(err: chromiumoxide::error::CdpError) -> Self {
        AppError::script(err)
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::Parse(err.to_string())
    }
}

pub type AppResult<T> = Result<T, AppError>;
