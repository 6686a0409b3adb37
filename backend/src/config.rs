//! Runtime settings read from the environment (and `.env`).
//!
//! | Variable              | Default                     |
//! |-----------------------|-----------------------------|
//! | `DATA_STORE_FOLDER`   | `./data-store`              |
//! | `TEMPLATES_DIR`       | `<DATA_STORE_FOLDER>/templates` |
//! | `HOOKMAP_PORT`        | `3000`                      |
//! | `LOAD_REFERENCE_DATA` | `FALSE`                     |
//! | `REFERENCE_DATA_FILE` | unset                       |

use std::env;
use std::path::PathBuf;

use crate::error::{BatchError, BatchResult};
use crate::models::ReferenceData;
use crate::parser::load_json_file;

pub const DEFAULT_DATA_STORE_FOLDER: &str = "./data-store";
pub const DEFAULT_PORT: u16 = 3000;

#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    pub data_store_folder: PathBuf,
    pub templates_dir: PathBuf,
    pub port: u16,
    /// Reference snapshot used when a request brings none.
    pub reference_data_file: Option<PathBuf>,
}

impl Default for Settings {
    fn default() -> Self {
        let data_store_folder = PathBuf::from(DEFAULT_DATA_STORE_FOLDER);
        Self {
            templates_dir: data_store_folder.join("templates"),
            data_store_folder,
            port: DEFAULT_PORT,
            reference_data_file: None,
        }
    }
}

impl Settings {
    /// Load `.env` if present, then read the process environment.
    pub fn from_env() -> BatchResult<Self> {
        let _ = dotenvy::dotenv();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build settings from any key lookup.
    pub fn from_lookup<F>(lookup: F) -> BatchResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let data_store_folder = var("DATA_STORE_FOLDER")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_DATA_STORE_FOLDER));
        let templates_dir = var("TEMPLATES_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|| data_store_folder.join("templates"));

        let port = match var("HOOKMAP_PORT") {
            Some(raw) => raw.trim().parse().map_err(|_| {
                BatchError::Configuration(format!("HOOKMAP_PORT is not a port number: {}", raw))
            })?,
            None => DEFAULT_PORT,
        };

        let load_references = var("LOAD_REFERENCE_DATA")
            .is_some_and(|v| v.trim().eq_ignore_ascii_case("true"));
        let reference_data_file = if load_references {
            let file = var("REFERENCE_DATA_FILE").ok_or_else(|| {
                BatchError::Configuration(
                    "LOAD_REFERENCE_DATA is set but REFERENCE_DATA_FILE is not".into(),
                )
            })?;
            Some(PathBuf::from(file))
        } else {
            None
        };

        Ok(Self {
            data_store_folder,
            templates_dir,
            port,
            reference_data_file,
        })
    }

    /// Default reference snapshot, empty when none is configured.
    pub fn load_references(&self) -> BatchResult<ReferenceData> {
        match self.reference_data_file {
            Some(ref path) => serde_json::from_value(load_json_file(path)?)
                .map_err(|e| BatchError::InvalidInput(format!("reference data: {}", e))),
            None => Ok(ReferenceData::default()),
        }
    }
}
