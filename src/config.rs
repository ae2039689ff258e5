//! Runtime configuration recognized by the core: the host directory to mount, the
//! memory-to-temp-file promotion threshold, and whether to auto-mount nested archives on
//! startup.

use serde::Deserialize;
use std::path::PathBuf;

fn default_temp_stream_threshold_bytes() -> u64 {
    crate::stream::DEFAULT_THRESHOLD_BYTES
}

fn default_enable_auto_scan() -> bool {
    true
}

/// Parsed from a TOML file via [`Config::from_toml_str`]; `root_path` is the only required field.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub root_path: PathBuf,
    #[serde(default = "default_temp_stream_threshold_bytes")]
    pub temp_stream_threshold_bytes: u64,
    #[serde(default = "default_enable_auto_scan")]
    pub enable_auto_scan: bool,
}

impl Config {
    pub fn from_toml_str(text: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_fill_in_when_omitted() {
        let config = Config::from_toml_str(r#"root_path = "/data""#).unwrap();
        assert_eq!(config.root_path, PathBuf::from("/data"));
        assert_eq!(config.temp_stream_threshold_bytes, 32 * 1024 * 1024);
        assert!(config.enable_auto_scan);
    }

    #[test]
    fn explicit_values_override_defaults() {
        let config = Config::from_toml_str(
            "root_path = \"/data\"\ntemp_stream_threshold_bytes = 1024\nenable_auto_scan = false\n",
        )
        .unwrap();
        assert_eq!(config.temp_stream_threshold_bytes, 1024);
        assert!(!config.enable_auto_scan);
    }

    #[test]
    fn missing_root_path_fails_to_parse() {
        assert!(Config::from_toml_str("enable_auto_scan = true").is_err());
    }
}
