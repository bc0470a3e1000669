//! Error types for the card generator

use thiserror::Error;

/// Result type alias for card generator operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while generating cards
#[derive(Error, Debug)]
pub enum Error {
    /// Failed to start the browser automation engine
    #[error("Engine initialization failed: {0}")]
    InitializationError(String),

    /// Failed to navigate to an article page
    #[error("Failed to load URL: {0}")]
    LoadError(String),

    /// A required DOM target is missing from the page
    #[error("Required element `{selector}` not found on page")]
    ElementNotFound { selector: String },

    /// Failed to hide an element or capture the screenshot
    #[error("Rendering failed: {0}")]
    RenderError(String),

    /// Operation timed out
    #[error("Operation timed out after {0}ms")]
    Timeout(u64),

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    ConfigError(String),

    /// The article's front matter could not be parsed or written
    #[error("Front matter error in {path}: {message}")]
    FrontMatter { path: String, message: String },

    /// Filesystem error
    #[error("I/O error on {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// CDP-specific error
    #[cfg(feature = "cdp")]
    #[error("CDP error: {0}")]
    CdpError(String),

    /// Generic error
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Wrap an I/O error with the path it happened on
    pub fn io(path: impl AsRef<std::path::Path>, source: std::io::Error) -> Self {
        Error::Io {
            path: path.as_ref().display().to_string(),
            source,
        }
    }

    pub fn front_matter(path: impl AsRef<std::path::Path>, message: impl Into<String>) -> Self {
        Error::FrontMatter {
            path: path.as_ref().display().to_string(),
            message: message.into(),
        }
    }
}

#[cfg(feature = "cdp")]
impl From<anyhow::Error> for Error {
    fn from(err: anyhow::Error) -> Self {
        Error::CdpError(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn element_not_found_names_selector() {
        let err = Error::ElementNotFound { selector: "header".into() };
        assert_eq!(err.to_string(), "Required element `header` not found on page");
    }

    #[test]
    fn io_error_carries_path() {
        let err = Error::io("data/blog", std::io::Error::from(std::io::ErrorKind::NotFound));
        assert!(err.to_string().starts_with("I/O error on data/blog"));
    }

    #[test]
    fn front_matter_error_names_file() {
        let err = Error::front_matter("data/blog/post.md", "bad indent");
        assert_eq!(err.to_string(), "Front matter error in data/blog/post.md: bad indent");
    }
}
