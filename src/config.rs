use camino::Utf8PathBuf;
use serde::{Deserialize, Serialize};

use crate::domain::Host;
use crate::error::VizError;

/// Optional `parviz.json` in the working directory: a default job URL for
/// the interactive prompt, the host override, and the API endpoint.
#[derive(Debug, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub job_url: Option<String>,
    #[serde(default)]
    pub host: Option<Host>,
    #[serde(default)]
    pub api_base_url: Option<String>,
}

pub struct ConfigLoader;

impl ConfigLoader {
    /// Loads the config at `path`, or `parviz.json` when unset. A missing
    /// default config is not an error; everything has a fallback.
    pub fn resolve(path: Option<&str>) -> Result<Config, VizError> {
        let config_path = match path {
            Some(path) => Utf8PathBuf::from(path),
            None => Utf8PathBuf::from("parviz.json"),
        };

        if path.is_none() && !config_path.as_std_path().exists() {
            return Ok(Config::default());
        }

        let content = std::fs::read_to_string(config_path.as_std_path())
            .map_err(|_| VizError::ConfigRead(config_path.clone()))?;
        serde_json::from_str(&content).map_err(|err| VizError::ConfigParse(err.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_default_config_is_empty() {
        let config = ConfigLoader::resolve(None).unwrap();
        assert!(config.job_url.is_none());
        assert!(config.host.is_none());
    }

    #[test]
    fn parse_config() {
        let temp = tempfile::tempdir().unwrap();
        let path = temp.path().join("parviz.json");
        std::fs::write(
            &path,
            br#"{"job_url": "https://host/o/projects/p/jobs/j", "host": "rhino"}"#,
        )
        .unwrap();
        let config = ConfigLoader::resolve(path.to_str()).unwrap();
        assert_eq!(config.host, Some(Host::Rhino));
        assert!(config.job_url.unwrap().ends_with("jobs/j"));
    }
}
