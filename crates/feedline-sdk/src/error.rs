use std::fmt;

#[derive(Debug)]
pub enum FeedlineSDKError {
    JsonError(String),
    Other(String),
    KvStore(String),
    Serialization(String),
    IO(String),
    Transport(String),
    Config(String),
    NotInitialized(String),
    ShuttingDown(String),
    // REST 错误 - 携带 HTTP 状态码
    Api {
        status: u16,
        message: String,
    },
}

impl fmt::Display for FeedlineSDKError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FeedlineSDKError::JsonError(e) => write!(f, "JSON error: {}", e),
            FeedlineSDKError::Other(e) => write!(f, "Other error: {}", e),
            FeedlineSDKError::KvStore(e) => write!(f, "KV store error: {}", e),
            FeedlineSDKError::Serialization(e) => write!(f, "Serialization error: {}", e),
            FeedlineSDKError::IO(e) => write!(f, "IO error: {}", e),
            FeedlineSDKError::Transport(e) => write!(f, "Transport error: {}", e),
            FeedlineSDKError::Config(e) => write!(f, "Config error: {}", e),
            FeedlineSDKError::NotInitialized(e) => write!(f, "Not initialized: {}", e),
            FeedlineSDKError::ShuttingDown(e) => write!(f, "Shutting down: {}", e),
            FeedlineSDKError::Api { status, message } => {
                write!(f, "API error [{}]: {}", status, message)
            }
        }
    }
}

impl std::error::Error for FeedlineSDKError {}

impl From<serde_json::Error> for FeedlineSDKError {
    fn from(error: serde_json::Error) -> Self {
        FeedlineSDKError::JsonError(error.to_string())
    }
}

impl From<std::io::Error> for FeedlineSDKError {
    fn from(error: std::io::Error) -> Self {
        FeedlineSDKError::IO(error.to_string())
    }
}

impl From<sled::Error> for FeedlineSDKError {
    fn from(error: sled::Error) -> Self {
        FeedlineSDKError::KvStore(error.to_string())
    }
}

impl FeedlineSDKError {
    /// 获取 HTTP 状态码（如果这是一个 API 错误）
    pub fn api_status(&self) -> Option<u16> {
        match self {
            FeedlineSDKError::Api { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// 判断是否是 API 错误
    pub fn is_api_error(&self) -> bool {
        matches!(self, FeedlineSDKError::Api { .. })
    }
}

pub type Result<T> = std::result::Result<T, FeedlineSDKError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_api_error_helpers() {
        let error = FeedlineSDKError::Api {
            status: 403,
            message: "forbidden".to_string(),
        };
        assert!(error.is_api_error());
        assert_eq!(error.api_status(), Some(403));
        assert_eq!(error.to_string(), "API error [403]: forbidden");

        let error = FeedlineSDKError::Transport("connection reset".to_string());
        assert!(!error.is_api_error());
        assert_eq!(error.api_status(), None);
    }

    #[test]
    fn test_from_impls() {
        let json_err = serde_json::from_str::<serde_json::Value>("{oops").unwrap_err();
        assert!(matches!(
            FeedlineSDKError::from(json_err),
            FeedlineSDKError::JsonError(_)
        ));

        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "missing");
        assert!(matches!(
            FeedlineSDKError::from(io_err),
            FeedlineSDKError::IO(_)
        ));
    }
}
