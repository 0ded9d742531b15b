use std::{env, path::PathBuf};

const DEFAULT_DATA_DIR: &str = "data";
const DEFAULT_PORT: u16 = 8080;

#[derive(Debug, Clone)]
pub struct Config {
    /// Directory holding the record file.
    pub data_dir: PathBuf,
    pub port: u16,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from(DEFAULT_DATA_DIR),
            port: DEFAULT_PORT,
        }
    }
}

impl Config {
    /// Reads `APP_DATA_PATH` and `PORT`, falling back to defaults when unset or invalid.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        let data_dir = env::var("APP_DATA_PATH")
            .ok()
            .filter(|value| !value.trim().is_empty())
            .map(PathBuf::from)
            .unwrap_or(defaults.data_dir);
        let port = env::var("PORT")
            .ok()
            .and_then(|value| value.parse::<u16>().ok())
            .unwrap_or(defaults.port);

        Self { data_dir, port }
    }
}
