use serde::Deserialize;
use std::path::PathBuf;

#[derive(Deserialize, Debug, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_listen")]
    pub listen: String,
    /// Parent of the session temp area and the saved-snapshot area.
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
    /// Reference library copied into every fresh session root.
    #[serde(default)]
    pub template_dir: Option<PathBuf>,
    #[serde(default = "default_allow_origins")]
    pub allow_origins: Vec<String>,
}

impl ServerConfig {
    pub fn load() -> anyhow::Result<Self> {
        // Try to load from config file, fall back to defaults
        let config_path = Self::config_path();
        if config_path.exists() {
            let contents = std::fs::read_to_string(&config_path)?;
            Ok(toml::from_str(&contents)?)
        } else {
            Ok(Self::default())
        }
    }

    pub fn config_path() -> PathBuf {
        dirs_path().join("config.toml")
    }

    /// Temp area holding live session roots (and their backup slots).
    pub fn sessions_dir(&self) -> PathBuf {
        self.data_dir.join("sessions")
    }

    /// Persistent area holding named workspace snapshots.
    pub fn saved_dir(&self) -> PathBuf {
        self.data_dir.join("saved")
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen: default_listen(),
            data_dir: default_data_dir(),
            template_dir: None,
            allow_origins: default_allow_origins(),
        }
    }
}

fn dirs_path() -> PathBuf {
    if let Ok(config_dir) = std::env::var("XDG_CONFIG_HOME") {
        PathBuf::from(config_dir).join("simdock")
    } else if let Ok(home) = std::env::var("HOME") {
        PathBuf::from(home).join(".config").join("simdock")
    } else {
        PathBuf::from("/tmp/simdock")
    }
}

fn default_listen() -> String {
    "127.0.0.1:8787".to_string()
}

fn default_data_dir() -> PathBuf {
    if let Ok(data_dir) = std::env::var("XDG_DATA_HOME") {
        PathBuf::from(data_dir).join("simdock")
    } else if let Ok(home) = std::env::var("HOME") {
        PathBuf::from(home).join(".local").join("share").join("simdock")
    } else {
        PathBuf::from("/tmp/simdock-data")
    }
}

fn default_allow_origins() -> Vec<String> {
    vec!["http://localhost:3000".to_string()]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_sane() {
        let cfg = ServerConfig::default();
        assert_eq!(cfg.listen, "127.0.0.1:8787");
        assert!(cfg.template_dir.is_none());
        assert!(cfg.sessions_dir().ends_with("sessions"));
        assert!(cfg.saved_dir().ends_with("saved"));
    }

    #[test]
    fn partial_toml_fills_in_defaults() {
        let cfg: ServerConfig = toml::from_str(r#"listen = "0.0.0.0:9000""#).unwrap();
        assert_eq!(cfg.listen, "0.0.0.0:9000");
        assert_eq!(cfg.allow_origins, vec!["http://localhost:3000"]);
    }

    #[test]
    fn full_toml_parses() {
        let cfg: ServerConfig = toml::from_str(
            r#"
listen = "127.0.0.1:9100"
data_dir = "/var/lib/simdock"
template_dir = "/opt/simdock/library"
allow_origins = ["*"]
"#,
        )
        .unwrap();
        assert_eq!(cfg.data_dir, PathBuf::from("/var/lib/simdock"));
        assert_eq!(
            cfg.template_dir,
            Some(PathBuf::from("/opt/simdock/library"))
        );
        assert_eq!(cfg.allow_origins, vec!["*"]);
    }
}
