use std::{fs::File, io::BufReader, path::Path};

use serde::Deserialize;

use crate::errors::Result;

#[derive(Deserialize, Debug, Clone)]
pub struct UserConfig {
    /// .osm file to read ways from, optionally xz-compressed (`.osm.xz`).
    pub data_path: String,
    #[serde(default = "default_output_dir")]
    pub output_dir: String,
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// Compile only ways tagged `highway`.
    #[serde(default = "default_highways_only")]
    pub highways_only: bool,
    /// Discard cached stage outputs before running.
    #[serde(default)]
    pub rebuild: bool,
}

fn default_output_dir() -> String {
    "output".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_highways_only() -> bool {
    true
}

impl UserConfig {
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let file = File::open(path)?;
        Ok(serde_json::from_reader(BufReader::new(file))?)
    }
}
