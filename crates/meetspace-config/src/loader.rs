use std::path::{Path, PathBuf};

use meetspace_common::{Error, Result};

use crate::model::AppConfig;

const STARTER_CONFIG: &str = r#"# MeetSpace configuration
gateway:
  host: "0.0.0.0"
  port: 5004

llm:
  model: "llama-3.1-8b-instant"
  base_url: "https://api.groq.com/openai/v1"
  # api_key: "gsk_..."   # or set GROQ_API_KEY
  temperature: 0.65
  max_tokens: 8000
  timeout_secs: 100

relay:
  pacing_ms: 8

database_path: "chat_history.db"
log_level: "info"
"#;

pub struct ConfigLoader {
    config_dir: PathBuf,
}

impl ConfigLoader {
    pub fn new() -> Result<Self> {
        let config_dir = Self::default_config_dir();
        Ok(Self { config_dir })
    }

    pub fn default_config_dir() -> PathBuf {
        let home_config = dirs::home_dir().map(|h| h.join(".meetspace"));
        let xdg_config = dirs::config_dir().map(|c| c.join("meetspace"));

        match (xdg_config, home_config) {
            (Some(xdg), Some(home)) => {
                if !xdg.exists() && home.exists() {
                    home
                } else {
                    xdg
                }
            }
            (Some(xdg), None) => xdg,
            (None, Some(home)) => home,
            (None, None) => PathBuf::from(".meetspace"),
        }
    }

    pub fn with_dir(config_dir: impl Into<PathBuf>) -> Self {
        Self {
            config_dir: config_dir.into(),
        }
    }

    pub fn config_dir(&self) -> &Path {
        &self.config_dir
    }

    /// Returns true if a config file (YAML or TOML) exists on disk.
    pub fn config_file_exists(&self) -> bool {
        self.config_file().is_some()
    }

    /// The file `load` reads, `config.yml` taking precedence over `config.toml`.
    pub fn config_file(&self) -> Option<PathBuf> {
        ["config.yml", "config.toml"]
            .iter()
            .map(|name| self.config_dir.join(name))
            .find(|path| path.exists())
    }

    pub fn load(&self) -> Result<AppConfig> {
        let config: AppConfig = match self.config_file() {
            Some(path) if path.extension().is_some_and(|ext| ext == "toml") => {
                let contents = std::fs::read_to_string(&path)?;
                toml::from_str(&contents)
                    .map_err(|e| Error::Config(format!("failed to parse TOML config: {e}")))?
            }
            Some(path) => {
                let contents = std::fs::read_to_string(&path)?;
                serde_yaml::from_str(&contents)
                    .map_err(|e| Error::Config(format!("failed to parse YAML config: {e}")))?
            }
            None => AppConfig::default(),
        };

        config.validate()?;
        Ok(config)
    }

    /// Create the config directory and write a starter `config.yml` unless
    /// a config file is already present. Returns true if a file was written.
    pub fn init(&self) -> Result<bool> {
        if !self.config_dir.exists() {
            std::fs::create_dir_all(&self.config_dir)?;
        }
        if self.config_file_exists() {
            return Ok(false);
        }
        std::fs::write(self.config_dir.join("config.yml"), STARTER_CONFIG)?;
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::ConfigLoader;
    use std::fs;
    use std::path::PathBuf;
    use std::time::{SystemTime, UNIX_EPOCH};

    fn temp_dir(label: &str) -> PathBuf {
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("clock should be after unix epoch")
            .as_nanos();
        std::env::temp_dir().join(format!(
            "meetspace-config-test-{}-{}-{}",
            label,
            std::process::id(),
            nanos
        ))
    }

    #[test]
    fn load_returns_default_when_no_config_exists() {
        let dir = temp_dir("default");
        fs::create_dir_all(&dir).expect("failed to create temp dir");

        let loader = ConfigLoader::with_dir(&dir);
        assert_eq!(loader.config_file(), None);
        let config = loader.load().expect("load should succeed");

        assert_eq!(config.gateway.host, "0.0.0.0");
        assert_eq!(config.gateway.port, 5004);
        assert_eq!(config.database_path, PathBuf::from("chat_history.db"));

        let _ = fs::remove_dir_all(dir);
    }

    #[test]
    fn load_prefers_yaml_over_toml_when_both_exist() {
        let dir = temp_dir("yaml-precedence");
        fs::create_dir_all(&dir).expect("failed to create temp dir");

        fs::write(
            dir.join("config.yml"),
            "gateway:\n  host: \"127.0.0.1\"\n  port: 4001\nrelay:\n  pacing_ms: 0\n",
        )
        .expect("failed to write yaml config");
        fs::write(dir.join("config.toml"), "[gateway]\nport = 4999\n")
            .expect("failed to write toml config");

        let loader = ConfigLoader::with_dir(&dir);
        assert_eq!(loader.config_file(), Some(dir.join("config.yml")));
        let config = loader.load().expect("load should succeed");

        assert_eq!(config.gateway.host, "127.0.0.1");
        assert_eq!(config.gateway.port, 4001);
        assert_eq!(config.relay.pacing_ms, 0);
        // Unset sections keep their defaults.
        assert_eq!(config.llm.max_tokens, 8000);

        let _ = fs::remove_dir_all(dir);
    }

    #[test]
    fn load_reads_toml_when_yaml_missing() {
        let dir = temp_dir("toml");
        fs::create_dir_all(&dir).expect("failed to create temp dir");

        fs::write(
            dir.join("config.toml"),
            "[llm]\nmodel = \"llama-3.3-70b-versatile\"\ntemperature = 0.2\n",
        )
        .expect("failed to write toml config");

        let loader = ConfigLoader::with_dir(&dir);
        let config = loader.load().expect("load should succeed");

        assert_eq!(config.llm.model, "llama-3.3-70b-versatile");
        assert_eq!(config.llm.temperature, 0.2);

        let _ = fs::remove_dir_all(dir);
    }

    #[test]
    fn load_rejects_invalid_base_url() {
        let dir = temp_dir("bad-url");
        fs::create_dir_all(&dir).expect("failed to create temp dir");
        fs::write(dir.join("config.yml"), "llm:\n  base_url: \"::nope\"\n")
            .expect("failed to write yaml config");

        let loader = ConfigLoader::with_dir(&dir);
        assert!(loader.load().is_err());

        let _ = fs::remove_dir_all(dir);
    }

    #[test]
    fn init_writes_starter_config_once() {
        let dir = temp_dir("init");
        let loader = ConfigLoader::with_dir(&dir);

        assert!(loader.init().expect("init should succeed"));
        assert!(loader.config_file_exists());
        assert!(!loader.init().expect("second init should succeed"));

        let config = loader.load().expect("starter config should parse");
        assert_eq!(config.gateway.port, 5004);

        let _ = fs::remove_dir_all(dir);
    }
}
