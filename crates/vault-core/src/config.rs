use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::{Result, VaultError};

/// Top-level configuration for the Audit Vault backend.
///
/// Loaded from `~/.auditvault/config.toml` by default. Each section
/// corresponds to a bounded context or cross-cutting concern.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VaultConfig {
    #[serde(default)]
    pub general: GeneralConfig,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub assistant: AssistantConfig,
}

impl Default for VaultConfig {
    fn default() -> Self {
        Self {
            general: GeneralConfig::default(),
            server: ServerConfig::default(),
            assistant: AssistantConfig::default(),
        }
    }
}

impl VaultConfig {
    /// Load configuration from a TOML file.
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: VaultConfig = toml::from_str(&content)?;
        info!("Configuration loaded from {}", path.display());
        Ok(config)
    }

    /// Load configuration from a TOML file, falling back to defaults if the
    /// file does not exist or cannot be parsed.
    pub fn load_or_default(path: &Path) -> Self {
        match Self::load(path) {
            Ok(config) => config,
            Err(e) => {
                warn!(
                    "Failed to load config from {}: {}. Using defaults.",
                    path.display(),
                    e
                );
                Self::default()
            }
        }
    }

    /// Save the current configuration to a TOML file.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content =
            toml::to_string_pretty(self).map_err(|e| VaultError::Config(e.to_string()))?;
        std::fs::write(path, content)?;
        info!("Configuration saved to {}", path.display());
        Ok(())
    }
}

/// General application settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Data directory for the SQLite database and the bootstrap token file.
    pub data_dir: String,
    /// Log level: trace, debug, info, warn, error.
    pub log_level: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            data_dir: "~/.auditvault/data".to_string(),
            log_level: "info".to_string(),
        }
    }
}

/// HTTP server settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Port the API binds on (localhost only).
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self { port: 4040 }
    }
}

/// Assistant provider settings.
///
/// The credential and model name are read once at startup and injected as an
/// immutable snapshot; nothing reads the process environment after that.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AssistantConfig {
    /// Bearer credential for the chat-completion provider. Empty means
    /// unconfigured; the `AUDITVAULT_API_KEY` environment variable overlays
    /// this at startup.
    pub api_key: String,
    /// Model name sent with every completion request.
    pub model: String,
    /// Chat-completion endpoint URL.
    pub base_url: String,
}

impl Default for AssistantConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            model: "gpt-4o-mini".to_string(),
            base_url: "https://api.openai.com/v1/chat/completions".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn create_temp_config(content: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_default_config() {
        let config = VaultConfig::default();
        assert_eq!(config.general.data_dir, "~/.auditvault/data");
        assert_eq!(config.general.log_level, "info");
        assert_eq!(config.server.port, 4040);
        assert!(config.assistant.api_key.is_empty());
        assert_eq!(config.assistant.model, "gpt-4o-mini");
        assert_eq!(
            config.assistant.base_url,
            "https://api.openai.com/v1/chat/completions"
        );
    }

    #[test]
    fn test_load_valid_config() {
        let content = r#"
[general]
data_dir = "/custom/data"
log_level = "debug"

[server]
port = 9090

[assistant]
api_key = "sk-test"
model = "gpt-4o"
base_url = "https://llm.internal/v1/chat/completions"
"#;
        let file = create_temp_config(content);
        let config = VaultConfig::load(file.path()).unwrap();
        assert_eq!(config.general.data_dir, "/custom/data");
        assert_eq!(config.general.log_level, "debug");
        assert_eq!(config.server.port, 9090);
        assert_eq!(config.assistant.api_key, "sk-test");
        assert_eq!(config.assistant.model, "gpt-4o");
        assert_eq!(
            config.assistant.base_url,
            "https://llm.internal/v1/chat/completions"
        );
    }

    #[test]
    fn test_load_partial_config_uses_defaults() {
        let content = r#"
[general]
log_level = "warn"
"#;
        let file = create_temp_config(content);
        let config = VaultConfig::load(file.path()).unwrap();
        assert_eq!(config.general.log_level, "warn");
        // Remaining fields use defaults
        assert_eq!(config.general.data_dir, "~/.auditvault/data");
        assert_eq!(config.server.port, 4040);
        assert_eq!(config.assistant.model, "gpt-4o-mini");
    }

    #[test]
    fn test_load_or_default_missing_file() {
        let config = VaultConfig::load_or_default(Path::new("/nonexistent/config.toml"));
        assert_eq!(config.general.data_dir, "~/.auditvault/data");
        assert_eq!(config.server.port, 4040);
    }

    #[test]
    fn test_save_and_reload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");

        let mut config = VaultConfig::default();
        config.assistant.api_key = "sk-roundtrip".to_string();
        config.save(&path).unwrap();

        let reloaded = VaultConfig::load(&path).unwrap();
        assert_eq!(reloaded.general.data_dir, config.general.data_dir);
        assert_eq!(reloaded.server.port, config.server.port);
        assert_eq!(reloaded.assistant.api_key, "sk-roundtrip");
    }

    #[test]
    fn test_config_save_creates_parent_dirs() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sub").join("dir").join("config.toml");

        let config = VaultConfig::default();
        config.save(&path).unwrap();

        assert!(path.exists());
        let reloaded = VaultConfig::load(&path).unwrap();
        assert_eq!(reloaded.general.log_level, "info");
    }

    #[test]
    fn test_config_load_invalid_toml() {
        let content = "this is {{ not valid TOML";
        let file = create_temp_config(content);
        let result = VaultConfig::load(file.path());
        assert!(result.is_err());
    }

    #[test]
    fn test_config_empty_toml_uses_all_defaults() {
        let content = "";
        let file = create_temp_config(content);
        let config = VaultConfig::load(file.path()).unwrap();

        assert_eq!(config.general.data_dir, "~/.auditvault/data");
        assert_eq!(config.server.port, 4040);
        assert!(config.assistant.api_key.is_empty());
    }

    #[test]
    fn test_config_serialization_roundtrip() {
        let config = VaultConfig::default();
        let toml_str = toml::to_string_pretty(&config).unwrap();
        let deserialized: VaultConfig = toml::from_str(&toml_str).unwrap();
        assert_eq!(deserialized.general.log_level, config.general.log_level);
        assert_eq!(deserialized.server.port, config.server.port);
        assert_eq!(deserialized.assistant.model, config.assistant.model);
    }

    #[test]
    fn test_sub_config_defaults() {
        let general = GeneralConfig::default();
        assert_eq!(general.data_dir, "~/.auditvault/data");
        assert_eq!(general.log_level, "info");

        let server = ServerConfig::default();
        assert_eq!(server.port, 4040);

        let assistant = AssistantConfig::default();
        assert!(assistant.api_key.is_empty());
        assert_eq!(assistant.model, "gpt-4o-mini");
        assert!(assistant.base_url.starts_with("https://"));
    }
}
