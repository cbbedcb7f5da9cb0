use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CliConfig {
    pub data_dir: PathBuf,
    /// User ids allowed to run privileged commands. An empty list leaves
    /// the door open for local bootstrapping.
    #[serde(default)]
    pub admin_ids: Vec<i64>,
    #[serde(default)]
    pub verbose: bool,
}

impl Default for CliConfig {
    fn default() -> Self {
        Self {
            data_dir: dirs::data_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join("filmdeck"),
            admin_ids: Vec::new(),
            verbose: false,
        }
    }
}

impl CliConfig {
    /// Load `config.json` from the data directory, falling back to
    /// defaults when it does not exist.
    pub async fn load(data_dir: &Path) -> anyhow::Result<Self> {
        let path = data_dir.join("config.json");
        match tokio::fs::read_to_string(&path).await {
            Ok(raw) => {
                let mut config: CliConfig = serde_json::from_str(&raw)?;
                config.data_dir = data_dir.to_path_buf();
                Ok(config)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Self {
                data_dir: data_dir.to_path_buf(),
                ..Self::default()
            }),
            Err(e) => Err(e.into()),
        }
    }

    pub fn db_path(&self) -> PathBuf {
        self.data_dir.join("filmdeck.db")
    }
}
