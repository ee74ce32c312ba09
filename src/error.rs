use thiserror::Error;

/// Error types for the lead extraction pipeline
#[derive(Error, Debug)]
pub enum LeadScrapeError {
    // Configuration errors
    #[error("Configuration error: {message}")]
    Configuration { message: String },

    #[error("Invalid configuration file: {path}: {message}")]
    InvalidConfig { path: String, message: String },

    // Batch input errors
    #[error("Input file not found: {path}")]
    InputNotFound { path: String },

    #[error("Invalid input: {message}")]
    InvalidInput { message: String },

    #[error("Invalid query: {message}")]
    InvalidQuery { message: String },

    // Browsing capability errors
    #[error("Browser initialization failed: {message}")]
    BrowserInit { message: String },

    #[error("Navigation to {url} failed: {message}")]
    Navigation { url: String, message: String },

    #[error("Session error: {message}")]
    Session { message: String },

    #[error("Invalid selector: {selector}")]
    InvalidSelector { selector: String },

    // Export errors
    #[error("Export to {path} failed: {message}")]
    Export { path: String, message: String },

    // Generic errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl LeadScrapeError {
    /// Create a configuration error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Configuration { message: message.into() }
    }

    /// Create an input validation error
    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::InvalidInput { message: message.into() }
    }

    /// Create a query validation error
    pub fn invalid_query(message: impl Into<String>) -> Self {
        Self::InvalidQuery { message: message.into() }
    }

    /// Create a browser initialization error
    pub fn browser_init(message: impl Into<String>) -> Self {
        Self::BrowserInit { message: message.into() }
    }

    /// Create a session error
    pub fn session(message: impl Into<String>) -> Self {
        Self::Session { message: message.into() }
    }

    /// Create a navigation error
    pub fn navigation(url: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Navigation { url: url.into(), message: message.into() }
    }

    /// Create an export error for the file at `path`
    pub fn export(path: impl AsRef<std::path::Path>, message: impl ToString) -> Self {
        Self::Export {
            path: path.as_ref().display().to_string(),
            message: message.to_string(),
        }
    }

    /// Whether the run can continue past this error
    pub fn is_recoverable(&self) -> bool {
        match self {
            Self::Navigation { .. }
            | Self::Session { .. }
            | Self::InvalidSelector { .. }
            | Self::InvalidQuery { .. }
            | Self::Export { .. } => true,

            Self::Configuration { .. }
            | Self::InvalidConfig { .. }
            | Self::InputNotFound { .. }
            | Self::InvalidInput { .. }
            | Self::BrowserInit { .. }
            | Self::Io(_) => false,
        }
    }

    /// Error category for logging
    pub fn category(&self) -> &'static str {
        match self {
            Self::Configuration { .. } | Self::InvalidConfig { .. } => "configuration",
            Self::InputNotFound { .. } | Self::InvalidInput { .. } | Self::InvalidQuery { .. } => "input",
            Self::BrowserInit { .. } | Self::Navigation { .. } | Self::Session { .. } | Self::InvalidSelector { .. } => "browser",
            Self::Export { .. } => "export",
            Self::Io(_) => "system",
        }
    }
}

/// Result type alias for the crate
pub type LeadScrapeResult<T> = std::result::Result<T, LeadScrapeError>;
