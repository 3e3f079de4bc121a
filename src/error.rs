use thiserror::Error;

/// Error taxonomy for the analysis core.
///
/// Collaborator failures (map parsing, package loading, baseline parsing)
/// propagate unchanged through the pipeline; `Internal` indicates a broken
/// invariant in the core itself and is never recovered.
#[derive(Debug, Error)]
pub enum Error {
    #[error("{source_name}:{line}: {message}")]
    MapFormat {
        source_name: String,
        line: usize,
        message: String,
    },

    #[error("packages failed to load: {summary}")]
    Load { summary: String, suppressed: usize },

    #[error("unknown command: {command}")]
    UnknownCommand { command: String },

    #[error("comparison baseline unreadable: {message}")]
    ComparisonParse { message: String },

    #[error("invalid capability list {list:?}: {message}")]
    CapabilityList { list: String, message: String },

    #[error("internal error: {0}")]
    Internal(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

/// Cap on the error text carried by a Load summary; everything beyond it is
/// reported as a suppressed-error count.
pub const LOAD_ERROR_SUMMARY_LIMIT: usize = 1000;

impl Error {
    pub fn map_format(
        source_name: impl Into<String>,
        line: usize,
        message: impl Into<String>,
    ) -> Self {
        Self::MapFormat {
            source_name: source_name.into(),
            line,
            message: message.into(),
        }
    }

    pub fn comparison_parse(message: impl Into<String>) -> Self {
        Self::ComparisonParse {
            message: message.into(),
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    /// Build a Load error from individual package error messages, truncating
    /// the combined summary and counting what was cut.
    pub fn load_from_messages(messages: &[String]) -> Self {
        let mut summary = String::new();
        let mut suppressed = 0usize;
        for m in messages {
            if summary.len() > LOAD_ERROR_SUMMARY_LIMIT {
                suppressed += 1;
                continue;
            }
            if !summary.is_empty() {
                summary.push('\n');
            }
            summary.push_str(m);
        }
        if summary.len() > LOAD_ERROR_SUMMARY_LIMIT {
            summary.truncate(LOAD_ERROR_SUMMARY_LIMIT);
            summary.push_str("(...truncated)");
        }
        Self::Load { summary, suppressed }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_map_format_display() {
        let err = Error::map_format("custom.cm", 7, "duplicate func key");
        assert_eq!(err.to_string(), "custom.cm:7: duplicate func key");
    }

    #[test]
    fn test_load_summary_truncation() {
        let messages: Vec<String> = (0..100)
            .map(|i| format!("package p{i}: type error in file{i}.x"))
            .collect();
        let err = Error::load_from_messages(&messages);
        match err {
            Error::Load {
                summary,
                suppressed,
            } => {
                assert!(summary.len() <= LOAD_ERROR_SUMMARY_LIMIT + "(...truncated)".len());
                assert!(summary.ends_with("(...truncated)"));
                assert!(suppressed > 0);
            }
            other => panic!("expected Load error, got {other:?}"),
        }
    }

    #[test]
    fn test_load_small_summary_untruncated() {
        let err = Error::load_from_messages(&["one error".to_string()]);
        match err {
            Error::Load {
                summary,
                suppressed,
            } => {
                assert_eq!(summary, "one error");
                assert_eq!(suppressed, 0);
            }
            other => panic!("expected Load error, got {other:?}"),
        }
    }
}
