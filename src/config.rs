//! Configuration management for ocmgmt

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use crate::error::{OcError, OcResult};

/// Main ocmgmt configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OcservConfig {
    /// File system locations
    #[serde(default)]
    pub paths: ConfigPaths,
    /// External tool command lines
    #[serde(default)]
    pub commands: CommandSettings,
    /// Default timeouts
    #[serde(default)]
    pub timeouts: TimeoutSettings,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigPaths {
    /// Directory holding one file per group
    #[serde(default = "default_group_dir")]
    pub group_dir: PathBuf,
    /// Profile applied when no group is assigned
    #[serde(default = "default_default_group")]
    pub default_group: PathBuf,
    /// ocpasswd credential database
    #[serde(default = "default_passwd_file")]
    pub passwd_file: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommandSettings {
    /// occtl invocation, subcommands are appended
    #[serde(default = "default_occtl")]
    pub occtl: String,
    /// ocpasswd binary
    #[serde(default = "default_ocpasswd")]
    pub ocpasswd: String,
    /// Shell used to run composed command lines
    #[serde(default = "default_shell")]
    pub shell: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimeoutSettings {
    /// Default per-operation timeout (seconds)
    #[serde(default = "default_timeout_secs")]
    pub default_secs: u64,
}

fn default_group_dir() -> PathBuf {
    PathBuf::from("/etc/ocserv/groups")
}

fn default_default_group() -> PathBuf {
    PathBuf::from("/etc/ocserv/defaults/group.conf")
}

fn default_passwd_file() -> PathBuf {
    PathBuf::from("/etc/ocserv/ocpasswd")
}

fn default_occtl() -> String {
    "sudo /usr/bin/occtl".to_string()
}

fn default_ocpasswd() -> String {
    "/usr/bin/ocpasswd".to_string()
}

fn default_shell() -> String {
    "sh".to_string()
}

fn default_timeout_secs() -> u64 {
    30
}

impl Default for ConfigPaths {
    fn default() -> Self {
        Self {
            group_dir: default_group_dir(),
            default_group: default_default_group(),
            passwd_file: default_passwd_file(),
        }
    }
}

impl Default for CommandSettings {
    fn default() -> Self {
        Self {
            occtl: default_occtl(),
            ocpasswd: default_ocpasswd(),
            shell: default_shell(),
        }
    }
}

impl Default for TimeoutSettings {
    fn default() -> Self {
        Self {
            default_secs: default_timeout_secs(),
        }
    }
}

impl TimeoutSettings {
    pub fn default_timeout(&self) -> Duration {
        Duration::from_secs(self.default_secs)
    }
}

impl OcservConfig {
    /// Load configuration from file
    pub fn load<P: AsRef<Path>>(path: P) -> OcResult<Self> {
        let content = std::fs::read_to_string(path.as_ref())
            .map_err(|e| OcError::Config(format!("Failed to read config: {}", e)))?;

        Self::from_toml(&content)
    }

    /// Parse configuration from TOML text
    pub fn from_toml(content: &str) -> OcResult<Self> {
        toml::from_str(content)
            .map_err(|e| OcError::Config(format!("Failed to parse config: {}", e)))
    }

    /// Save configuration to file
    pub fn save<P: AsRef<Path>>(&self, path: P) -> OcResult<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| OcError::Config(format!("Failed to serialize config: {}", e)))?;

        std::fs::write(path.as_ref(), content)
            .map_err(|e| OcError::Config(format!("Failed to write config: {}", e)))?;

        Ok(())
    }
}
