//! Credential profiles
//!
//! Credentials come from a cloudmonkey-style INI file with one section per
//! zone/profile:
//!
//! ```text
//! [zone-ams1]
//! url = https://cloud.example.com/client/api
//! apikey = ...
//! secretkey = ...
//! timeout = 60
//! verifysslcert = false
//! ```

use ini::Ini;
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::debug;

use crate::error::{DrainError, Result};

/// Default credentials file
pub const DEFAULT_CONFIG_PATH: &str = "~/.cloudmonkey/config";

/// Default per-request HTTP timeout (seconds)
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

/// API endpoint and keys for one profile
#[derive(Clone)]
pub struct Credentials {
    /// API endpoint URL
    pub url: String,

    /// API key
    pub api_key: String,

    /// Secret key used for request signing
    pub secret_key: String,

    /// Per-request HTTP timeout
    pub timeout: Duration,

    /// Verify the endpoint's TLS certificate
    pub verify_tls: bool,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("url", &self.url)
            .field("api_key", &self.api_key)
            .field("secret_key", &"<redacted>")
            .field("timeout", &self.timeout)
            .field("verify_tls", &self.verify_tls)
            .finish()
    }
}

impl Credentials {
    /// Load `profile` from the INI file at `path` (`~` is expanded)
    pub fn load(path: impl AsRef<str>, profile: &str) -> Result<Self> {
        let path = expand_path(path.as_ref());
        debug!(path = %path.display(), profile = %profile, "Loading credentials");

        if !path.exists() {
            return Err(DrainError::config(format!(
                "config file {} does not exist",
                path.display()
            )));
        }

        let ini = Ini::load_from_file_noescape(&path)
            .map_err(|e| DrainError::config(format!("failed to read {}: {}", path.display(), e)))?;

        Self::from_ini(&ini, profile, &path)
    }

    fn from_ini(ini: &Ini, profile: &str, path: &Path) -> Result<Self> {
        let section = ini.section(Some(profile)).ok_or_else(|| {
            DrainError::config(format!(
                "profile [{}] not found in {}",
                profile,
                path.display()
            ))
        })?;

        let required = |key: &str| -> Result<String> {
            section
                .get(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
                .ok_or_else(|| {
                    DrainError::config(format!("profile [{}] is missing '{}'", profile, key))
                })
        };

        let timeout = match section.get("timeout") {
            Some(raw) => raw.trim().parse::<u64>().map_err(|_| {
                DrainError::config(format!(
                    "profile [{}] has invalid timeout '{}'",
                    profile, raw
                ))
            })?,
            None => DEFAULT_REQUEST_TIMEOUT_SECS,
        };

        let verify_tls = match section.get("verifysslcert") {
            Some(raw) => parse_bool(raw).ok_or_else(|| {
                DrainError::config(format!(
                    "profile [{}] has invalid verifysslcert '{}'",
                    profile, raw
                ))
            })?,
            None => false,
        };

        Ok(Self {
            url: required("url")?,
            api_key: required("apikey")?,
            secret_key: required("secretkey")?,
            timeout: Duration::from_secs(timeout),
            verify_tls,
        })
    }
}

fn expand_path(raw: &str) -> PathBuf {
    PathBuf::from(shellexpand::tilde(raw).into_owned())
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "true" | "yes" | "1" | "on" => Some(true),
        "false" | "no" | "0" | "off" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_config(contents: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    fn path_of(file: &tempfile::NamedTempFile) -> String {
        file.path().to_string_lossy().into_owned()
    }

    #[test]
    fn test_load_profile() {
        let file = write_config(
            "[core]\nprofile = ams1\n\n[ams1]\nurl = https://cloud.example.com/client/api\napikey = KEY\nsecretkey = SECRET/+=\n",
        );

        let creds = Credentials::load(path_of(&file), "ams1").unwrap();
        assert_eq!(creds.url, "https://cloud.example.com/client/api");
        assert_eq!(creds.api_key, "KEY");
        assert_eq!(creds.secret_key, "SECRET/+=");
        assert_eq!(creds.timeout, Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS));
        assert!(!creds.verify_tls);
    }

    #[test]
    fn test_optional_keys() {
        let file = write_config(
            "[ams1]\nurl = https://x\napikey = k\nsecretkey = s\ntimeout = 90\nverifysslcert = true\n",
        );

        let creds = Credentials::load(path_of(&file), "ams1").unwrap();
        assert_eq!(creds.timeout, Duration::from_secs(90));
        assert!(creds.verify_tls);
    }

    #[test]
    fn test_missing_profile() {
        let file = write_config("[ams1]\nurl = https://x\napikey = k\nsecretkey = s\n");

        let err = Credentials::load(path_of(&file), "fra2").unwrap_err();
        assert!(err.is_startup_error());
        assert!(err.to_string().contains("profile [fra2] not found"));
    }

    #[test]
    fn test_missing_key() {
        let file = write_config("[ams1]\nurl = https://x\napikey = k\n");

        let err = Credentials::load(path_of(&file), "ams1").unwrap_err();
        assert!(err.to_string().contains("missing 'secretkey'"));
    }

    #[test]
    fn test_missing_file() {
        let err = Credentials::load("/nonexistent/host-drain/config", "ams1").unwrap_err();
        assert!(matches!(err, DrainError::Config(_)));
    }

    #[test]
    fn test_invalid_timeout() {
        let file = write_config("[ams1]\nurl = https://x\napikey = k\nsecretkey = s\ntimeout = soon\n");

        let err = Credentials::load(path_of(&file), "ams1").unwrap_err();
        assert!(err.to_string().contains("invalid timeout"));
    }

    #[test]
    fn test_debug_redacts_secret() {
        let file = write_config("[ams1]\nurl = https://x\napikey = k\nsecretkey = hunter2\n");

        let creds = Credentials::load(path_of(&file), "ams1").unwrap();
        let debug = format!("{:?}", creds);
        assert!(!debug.contains("hunter2"));
    }

    #[test]
    fn test_expand_path_keeps_absolute() {
        assert_eq!(expand_path("/etc/cloudmonkey"), PathBuf::from("/etc/cloudmonkey"));
    }
}
