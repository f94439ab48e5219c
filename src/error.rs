use std::path::PathBuf;
use thiserror::Error;

/// Problems found while assembling the runtime configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{key} not set (environment or config file)")]
    Missing { key: &'static str },

    #[error("invalid value for {key}: {message}")]
    Invalid { key: &'static str, message: String },

    #[error("could not read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("could not parse {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}

/// A request that never produced an HTTP status: the underlying fault carried
/// by `ApiResult::Exception`.
#[derive(Debug, Error)]
pub enum ApiFault {
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("invalid response body: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("invalid url: {0}")]
    InvalidUrl(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_key_display() {
        let err = ConfigError::Missing { key: "FIZZY_URL" };
        assert_eq!(
            err.to_string(),
            "FIZZY_URL not set (environment or config file)"
        );
    }

    #[test]
    fn test_decode_fault_from_serde() {
        let source = serde_json::from_str::<u32>("nope").unwrap_err();
        let fault = ApiFault::from(source);
        assert!(fault.to_string().starts_with("invalid response body"));
    }
}
