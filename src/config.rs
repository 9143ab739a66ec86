use clap::Parser;
use serde::Deserialize;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "dietlens", about = "Diet recommendations from food photos")]
pub struct Cli {
    /// Path to config file
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Host to bind to
    #[arg(long)]
    pub host: Option<String>,

    /// Port to bind to
    #[arg(short, long)]
    pub port: Option<u16>,

    /// Path to data directory
    #[arg(long)]
    pub data_dir: Option<PathBuf>,
}

#[derive(Deserialize, Debug, Clone, Default)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub storage: StorageConfig,
    pub auth: AuthConfig,
    pub detection: DetectionConfig,
}

#[derive(Deserialize, Debug, Clone)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Deserialize, Debug, Clone, Default)]
#[serde(default)]
pub struct StorageConfig {
    /// Project root holding `images_data/` and the sample pool.
    pub root: Option<PathBuf>,
    pub credentials_file: Option<PathBuf>,
}

#[derive(Deserialize, Debug, Clone)]
#[serde(default)]
pub struct AuthConfig {
    pub cookie_name: String,
    /// Idle sessions are dropped after this long.
    pub session_hours: u64,
}

#[derive(Deserialize, Debug, Clone)]
#[serde(default)]
pub struct DetectionConfig {
    /// Base URL of the inference service. Unset means detection is unavailable.
    pub endpoint: Option<String>,
    pub model: String,
    pub confidence: f32,
    pub image_size: u32,
    pub timeout_secs: u64,
    pub fallback: FallbackConfig,
}

#[derive(Deserialize, Debug, Clone)]
#[serde(default)]
pub struct FallbackConfig {
    pub endpoint: Option<String>,
    pub model: String,
    pub target_label: String,
    pub threshold: f32,
    pub crop_size: u32,
    pub candidates: Vec<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8501,
        }
    }
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            cookie_name: "dietlens_session".to_string(),
            session_hours: 12,
        }
    }
}

impl Default for DetectionConfig {
    fn default() -> Self {
        Self {
            endpoint: None,
            model: "yolov8n".to_string(),
            confidence: 0.25,
            image_size: 640,
            timeout_secs: 60,
            fallback: FallbackConfig::default(),
        }
    }
}

impl Default for FallbackConfig {
    fn default() -> Self {
        Self {
            endpoint: None,
            model: "ViT-B/32".to_string(),
            target_label: "avocado".to_string(),
            threshold: 0.35,
            crop_size: 224,
            candidates: [
                "avocado", "apple", "banana", "orange", "rice", "bread", "pasta", "egg", "tofu",
                "cheese",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
        }
    }
}

impl Config {
    pub fn load(cli: &Cli) -> anyhow::Result<Self> {
        let data_dir = Self::data_dir(cli);
        let config_path = cli
            .config
            .clone()
            .unwrap_or_else(|| data_dir.join("config.toml"));

        let mut config = if config_path.exists() {
            let content = std::fs::read_to_string(&config_path)?;
            toml::from_str(&content)?
        } else {
            Config::default()
        };

        // CLI overrides
        if let Some(ref host) = cli.host {
            config.server.host = host.clone();
        }
        if let Some(port) = cli.port {
            config.server.port = port;
        }

        config.resolve_paths(&data_dir);
        Ok(config)
    }

    /// Fill in storage paths left unset, relative to the data dir.
    pub fn resolve_paths(&mut self, data_dir: &std::path::Path) {
        if self.storage.root.is_none() {
            self.storage.root = Some(data_dir.to_path_buf());
        }
        if self.storage.credentials_file.is_none() {
            self.storage.credentials_file = Some(self.root().join("credentials.json"));
        }
    }

    pub fn data_dir(cli: &Cli) -> PathBuf {
        cli.data_dir.clone().unwrap_or_else(|| {
            dirs::home_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join(".dietlens")
        })
    }

    pub fn root(&self) -> PathBuf {
        self.storage
            .root
            .clone()
            .unwrap_or_else(|| PathBuf::from("."))
    }

    pub fn credentials_path(&self) -> PathBuf {
        self.storage
            .credentials_file
            .clone()
            .unwrap_or_else(|| self.root().join("credentials.json"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cli_for(dir: &std::path::Path) -> Cli {
        Cli {
            config: None,
            host: None,
            port: None,
            data_dir: Some(dir.to_path_buf()),
        }
    }

    #[test]
    fn default_config_has_expected_values() {
        let config = Config::default();
        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.server.port, 8501);
        assert_eq!(config.auth.cookie_name, "dietlens_session");
        assert_eq!(config.auth.session_hours, 12);
        assert_eq!(config.detection.model, "yolov8n");
        assert_eq!(config.detection.confidence, 0.25);
        assert_eq!(config.detection.image_size, 640);
        assert!(config.detection.endpoint.is_none());
        assert_eq!(config.detection.fallback.target_label, "avocado");
        assert_eq!(config.detection.fallback.threshold, 0.35);
        assert_eq!(config.detection.fallback.crop_size, 224);
        assert_eq!(config.detection.fallback.candidates.len(), 10);
        assert!(config.storage.root.is_none());
    }

    #[test]
    fn data_dir_uses_cli_override() {
        let cli = cli_for(std::path::Path::new("/tmp/test-dietlens"));
        assert_eq!(Config::data_dir(&cli), PathBuf::from("/tmp/test-dietlens"));
    }

    #[test]
    fn data_dir_defaults_to_home_dot_dietlens() {
        let cli = Cli {
            config: None,
            host: None,
            port: None,
            data_dir: None,
        };
        assert!(Config::data_dir(&cli).ends_with(".dietlens"));
    }

    #[test]
    fn load_with_no_config_file_uses_defaults() {
        let tmp = tempfile::tempdir().unwrap();
        let config = Config::load(&cli_for(tmp.path())).unwrap();
        assert_eq!(config.server.port, 8501);
        assert_eq!(config.root(), tmp.path().to_path_buf());
        assert_eq!(
            config.credentials_path(),
            tmp.path().join("credentials.json")
        );
    }

    #[test]
    fn load_reads_toml_file() {
        let tmp = tempfile::tempdir().unwrap();
        let config_path = tmp.path().join("config.toml");
        std::fs::write(
            &config_path,
            r#"
[server]
port = 9000

[detection]
endpoint = "http://127.0.0.1:7000"
model = "yolov8s"

[detection.fallback]
threshold = 0.5
"#,
        )
        .unwrap();

        let mut cli = cli_for(tmp.path());
        cli.config = Some(config_path);
        let config = Config::load(&cli).unwrap();
        assert_eq!(config.server.port, 9000);
        assert_eq!(
            config.detection.endpoint.as_deref(),
            Some("http://127.0.0.1:7000")
        );
        assert_eq!(config.detection.model, "yolov8s");
        assert_eq!(config.detection.fallback.threshold, 0.5);
        assert_eq!(config.detection.fallback.target_label, "avocado");
    }

    #[test]
    fn cli_overrides_beat_toml_values() {
        let tmp = tempfile::tempdir().unwrap();
        let config_path = tmp.path().join("config.toml");
        std::fs::write(&config_path, "[server]\nhost = \"192.168.1.1\"\nport = 9000\n").unwrap();

        let cli = Cli {
            config: Some(config_path),
            host: Some("127.0.0.1".to_string()),
            port: Some(4000),
            data_dir: Some(tmp.path().to_path_buf()),
        };
        let config = Config::load(&cli).unwrap();
        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.server.port, 4000);
    }

    #[test]
    fn explicit_storage_paths_are_kept() {
        let tmp = tempfile::tempdir().unwrap();
        let config_path = tmp.path().join("config.toml");
        std::fs::write(
            &config_path,
            "[storage]\nroot = \"/srv/food\"\ncredentials_file = \"/etc/dietlens/creds.json\"\n",
        )
        .unwrap();

        let mut cli = cli_for(tmp.path());
        cli.config = Some(config_path);
        let config = Config::load(&cli).unwrap();
        assert_eq!(config.root(), PathBuf::from("/srv/food"));
        assert_eq!(
            config.credentials_path(),
            PathBuf::from("/etc/dietlens/creds.json")
        );
    }
}
