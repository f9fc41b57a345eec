use anyhow::{anyhow, Result};
use std::env;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone)]
pub struct TradeboardConfig {
    pub api_port: u16,
    pub paths: TradeboardPaths,
}

impl TradeboardConfig {
    pub fn from_env() -> Result<Self> {
        let paths = TradeboardPaths::discover()?;
        let api_port = env::var("TRADEBOARD_API_PORT")
            .ok()
            .and_then(|raw| raw.parse().ok())
            .unwrap_or(8080);
        Ok(Self { api_port, paths })
    }

    pub fn new(api_port: u16, paths: TradeboardPaths) -> Self {
        Self { api_port, paths }
    }
}

#[derive(Debug, Clone)]
pub struct TradeboardPaths {
    pub base: PathBuf,
    pub data_dir: PathBuf,
    pub db_path: PathBuf,
    pub public_dir: PathBuf,
}

impl TradeboardPaths {
    /// Base directory from `TRADEBOARD_DATA_DIR`, else next to the executable.
    pub fn discover() -> Result<Self> {
        if let Ok(base) = env::var("TRADEBOARD_DATA_DIR") {
            return Self::from_base_dir(base);
        }
        let exe_path = env::current_exe()
            .map_err(|err| anyhow!("failed to resolve current executable: {err}"))?;
        let base = exe_path
            .parent()
            .ok_or_else(|| anyhow!("executable path missing parent"))?
            .to_path_buf();
        Self::from_base_dir(base)
    }

    pub fn from_base_dir<P: AsRef<Path>>(base: P) -> Result<Self> {
        let base = base.as_ref().to_path_buf();
        let data_dir = base.join("data");
        let db_path = data_dir.join("tradeboard.db");
        let public_dir = env::var("TRADEBOARD_PUBLIC_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| base.join("public"));

        Ok(Self {
            base,
            data_dir,
            db_path,
            public_dir,
        })
    }
}
