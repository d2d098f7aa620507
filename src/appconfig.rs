use std::path::Path;

use anyhow::{anyhow, bail, ensure, Context, Result};
use tracing::{debug, error, info, trace, warn};

use serde::{Deserialize, Serialize};

use crate::ui::options::Options;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppSettings {
    pub inference_endpoint: String,
    pub backend_url: String,
    pub backend_api_key: String,
    pub author_id: i64,
    pub author_email: String,
    pub confidence_threshold: f32,
    pub random_sample_size: usize,
}

impl Default for AppSettings {
    fn default() -> Self {
        AppSettings {
            inference_endpoint: "https://api.ltlab.site".to_string(),
            backend_url: "".to_string(),
            backend_api_key: "".to_string(),
            author_id: 0,
            author_email: "".to_string(),
            confidence_threshold: 0.5,
            random_sample_size: 6,
        }
    }
}

impl AppSettings {
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let s = toml::to_string_pretty(self).context("Failed to serialize AppSettings to TOML")?;
        std::fs::write(path, s)?;
        Ok(())
    }
}

pub fn read_options_from_file<P: AsRef<Path>>(path: P, options: &mut Options) -> Result<()> {
    let appsettings: AppSettings = toml::from_str(&std::fs::read_to_string(&path)?)?;

    options.inference_endpoint = appsettings.inference_endpoint;
    options.backend_url = appsettings.backend_url;
    options.backend_api_key = appsettings.backend_api_key;
    options.author_id = appsettings.author_id;
    options.author_email = appsettings.author_email;
    options.confidence_threshold = appsettings.confidence_threshold;
    options.random_sample_size = appsettings.random_sample_size;

    Ok(())
}
