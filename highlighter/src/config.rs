use std::num::NonZeroUsize;
use std::path::Path;
use std::time::Duration;

use fence::IdScheme;
use serde::Deserialize;

use crate::error::ConfigError;

/// Environment variable that overrides `api_token`.
pub const TOKEN_ENV: &str = "BATCHLIGHT_TOKEN";

/// Settings for a `HighlightClient`. Read once at construction, never
/// mutated during a render.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ClientConfig {
    /// Base URL of the service; requests go to `{endpoint}/blocks`.
    pub endpoint: String,

    #[serde(default)]
    pub api_token: Option<String>,

    /// Theme name forwarded to the service.
    #[serde(default)]
    pub theme: Option<String>,

    /// Most blocks sent in one request. Blocks past the limit are not sent
    /// and render with fallback markup.
    #[serde(default)]
    pub max_blocks: Option<NonZeroUsize>,

    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Id scheme used for each render pass.
    #[serde(default)]
    pub ids: IdScheme,
}

fn default_timeout_secs() -> u64 {
    15
}

impl ClientConfig {
    pub fn new(endpoint: impl Into<String>) -> Self {
        ClientConfig {
            endpoint: endpoint.into(),
            api_token: None,
            theme: None,
            max_blocks: None,
            timeout_secs: default_timeout_secs(),
            ids: IdScheme::default(),
        }
    }

    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.api_token = Some(token.into());
        self
    }

    pub fn with_theme(mut self, theme: impl Into<String>) -> Self {
        self.theme = Some(theme.into());
        self
    }

    pub fn with_max_blocks(mut self, max: NonZeroUsize) -> Self {
        self.max_blocks = Some(max);
        self
    }

    pub fn with_ids(mut self, ids: IdScheme) -> Self {
        self.ids = ids;
        self
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn blocks_url(&self) -> String {
        format!("{}/blocks", self.endpoint.trim_end_matches('/'))
    }

    pub fn from_toml_str(source: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(source)?)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let source = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&source)
    }

    /// Apply `BATCHLIGHT_TOKEN` when it is set and non-empty.
    pub fn with_env_overrides(self) -> Self {
        self.with_token_override(std::env::var(TOKEN_ENV).ok())
    }

    fn with_token_override(mut self, token: Option<String>) -> Self {
        if let Some(token) = token.filter(|t| !t.trim().is_empty()) {
            self.api_token = Some(token);
        }
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::io::Write;

    #[test]
    fn minimal_config_uses_defaults() {
        let config = ClientConfig::from_toml_str("endpoint = \"https://hl.local\"").unwrap();
        assert_eq!(config, ClientConfig::new("https://hl.local"));
        assert_eq!(config.timeout(), Duration::from_secs(15));
        assert_eq!(config.ids, IdScheme::Random);
    }

    #[test]
    fn full_config() {
        let config = ClientConfig::from_toml_str(
            r#"
endpoint = "https://hl.local/api/"
api_token = "secret"
theme = "nord"
max_blocks = 50
timeout_secs = 3

[ids.sequential]
prefix = "blk-"
"#,
        )
        .unwrap();
        assert_eq!(config.blocks_url(), "https://hl.local/api/blocks");
        assert_eq!(config.api_token.as_deref(), Some("secret"));
        assert_eq!(config.theme.as_deref(), Some("nord"));
        assert_eq!(config.max_blocks.map(NonZeroUsize::get), Some(50));
        assert_eq!(config.timeout(), Duration::from_secs(3));
        assert_eq!(
            config.ids,
            IdScheme::Sequential {
                prefix: "blk-".into()
            }
        );
    }

    #[test]
    fn missing_endpoint_is_a_parse_error() {
        let err = ClientConfig::from_toml_str("theme = \"nord\"").unwrap_err();
        match err {
            ConfigError::Parse { message, .. } => assert!(message.contains("endpoint"), "{message}"),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn zero_max_blocks_is_rejected_with_span() {
        let source = "endpoint = \"x\"\nmax_blocks = 0\n";
        let err = ClientConfig::from_toml_str(source).unwrap_err();
        match err {
            ConfigError::Parse { span, .. } => {
                let span = span.expect("span for bad value");
                assert!(source[span].contains('0'));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn load_reads_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "endpoint = \"http://127.0.0.1:9000\"").unwrap();
        let config = ClientConfig::load(file.path()).unwrap();
        assert_eq!(config.blocks_url(), "http://127.0.0.1:9000/blocks");
    }

    #[test]
    fn load_missing_file_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = ClientConfig::load(&dir.path().join("nope.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
        assert!(err.to_string().contains("nope.toml"));
    }

    #[test]
    fn token_override_needs_a_value() {
        let base = ClientConfig::new("x").with_token("from-file");
        assert_eq!(
            base.clone().with_token_override(Some("from-env".into())).api_token.as_deref(),
            Some("from-env")
        );
        assert_eq!(
            base.clone().with_token_override(Some("  ".into())).api_token.as_deref(),
            Some("from-file")
        );
        assert_eq!(base.with_token_override(None).api_token.as_deref(), Some("from-file"));
    }
}
