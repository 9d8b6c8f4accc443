//! Configuration file parsing for logrot
//!
//! A configuration file is an ordered list of rotation groups. Supported formats:
//! - YAML (.yaml, .yml): a top-level list, or a mapping with a `groups` list
//! - JSON (.json): same shapes as YAML
//! - TOML (.toml): `[[groups]]` tables
//!
//! Every key is optional and falls back to the defaults in [`crate::constants`].

use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::constants::*;
use crate::error::{Error, Result};
use crate::fs::{resolve_group, resolve_user};
use crate::naming::{validate_strftime, FilenameTemplate};
use crate::types::{
    Compression, CopyRule, NamingTemplates, Ownership, QueueSettings, RemoteConfig, RotationGroup,
};

/// Supported configuration file formats
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigFormat {
    Toml,
    Yaml,
    Json,
}

impl ConfigFormat {
    /// Detect format from file extension
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_lowercase().as_str() {
            "toml" => Some(ConfigFormat::Toml),
            "yaml" | "yml" => Some(ConfigFormat::Yaml),
            "json" => Some(ConfigFormat::Json),
            _ => None,
        }
    }

    /// Detect format from file path
    pub fn from_path(path: &Path) -> Option<Self> {
        path.extension()
            .and_then(|e| e.to_str())
            .and_then(Self::from_extension)
    }
}

/// A value written either as a single item or as a list
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(untagged)]
pub enum OneOrMany<T> {
    Many(Vec<T>),
    One(T),
}

impl<T> Default for OneOrMany<T> {
    fn default() -> Self {
        OneOrMany::Many(Vec::new())
    }
}

impl<T> OneOrMany<T> {
    pub fn into_vec(self) -> Vec<T> {
        match self {
            OneOrMany::One(item) => vec![item],
            OneOrMany::Many(items) => items,
        }
    }
}

/// Permission mode as written in the config file.
///
/// Only quoted octal strings (`"0o644"`, `"0644"`) are accepted. YAML and TOML
/// turn an unquoted `0o644` into the integer 420, so the original spelling is
/// lost by the time a number reaches us and numbers are rejected.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(untagged)]
pub enum ModeValue {
    Text(String),
    Number(i64),
}

impl Default for ModeValue {
    fn default() -> Self {
        ModeValue::Text(DEFAULT_MODE.to_string())
    }
}

impl ModeValue {
    /// Interpret the value as an octal permission mode
    pub fn to_mode(&self) -> Result<u32> {
        match self {
            ModeValue::Text(s) => parse_mode(s),
            ModeValue::Number(n) => Err(Error::InvalidMode(format!(
                "{} (quote the mode as an octal string, e.g. mode: \"0o644\")",
                n
            ))),
        }
    }
}

/// Parse an octal permission string
pub fn parse_mode(s: &str) -> Result<u32> {
    let trimmed = s.trim();
    let digits = trimmed
        .strip_prefix("0o")
        .or_else(|| trimmed.strip_prefix("0O"))
        .unwrap_or(trimmed);
    let mode = u32::from_str_radix(digits, 8).map_err(|_| Error::InvalidMode(s.to_string()))?;
    if digits.is_empty() || mode > 0o7777 {
        return Err(Error::InvalidMode(s.to_string()));
    }
    Ok(mode)
}

/// Remote (WebHDFS) section; an empty section disables uploads
#[derive(Debug, Clone, Deserialize, Default, PartialEq, Eq)]
pub struct RemoteSection {
    pub url: Option<String>,
    pub user: Option<String>,
    pub timeout_secs: Option<u64>,
}

impl RemoteSection {
    /// Convert to RemoteConfig, `None` when no URL is set
    pub fn into_remote(self) -> Option<RemoteConfig> {
        let url = self.url.filter(|u| !u.trim().is_empty())?;
        Some(RemoteConfig {
            url: url.trim_end_matches('/').to_string(),
            user: self.user,
            timeout_secs: self.timeout_secs.unwrap_or(DEFAULT_REMOTE_TIMEOUT_SECS),
        })
    }
}

/// Configuration file structure
#[derive(Debug, Default)]
pub struct ConfigFile {
    pub groups: Vec<GroupConfig>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawConfig {
    List(Vec<GroupConfig>),
    Wrapped {
        #[serde(default)]
        groups: Vec<GroupConfig>,
    },
}

impl From<RawConfig> for ConfigFile {
    fn from(raw: RawConfig) -> Self {
        match raw {
            RawConfig::List(groups) | RawConfig::Wrapped { groups } => ConfigFile { groups },
        }
    }
}

/// Single rotation group as written in the config file
#[derive(Debug, Clone, Deserialize)]
pub struct GroupConfig {
    /// Name used in logs and to tag queue records
    pub name: Option<String>,
    /// Glob patterns of files to rotate
    #[serde(default)]
    pub paths: Vec<String>,
    #[serde(default)]
    pub mode: ModeValue,
    #[serde(default = "default_user")]
    pub user: String,
    #[serde(default = "default_group")]
    pub group: String,
    #[serde(default = "default_true")]
    pub compress: bool,
    #[serde(default = "default_compress_cmd")]
    pub compresscmd: String,
    #[serde(default = "default_compress_ext")]
    pub compressext: String,
    /// Local mirror rules
    #[serde(default)]
    pub copy: OneOrMany<CopyRule>,
    /// Remote upload rules
    #[serde(default)]
    pub copytohdfs: OneOrMany<CopyRule>,
    /// Remote client settings
    #[serde(default)]
    pub hdfs: Option<RemoteSection>,
    #[serde(default = "default_dateformat")]
    pub dateformat: String,
    #[serde(default = "default_destext")]
    pub destext: String,
    #[serde(default = "default_fnformat")]
    pub fnformat: String,
    #[serde(default = "default_true")]
    pub sharedscripts: bool,
    #[serde(default)]
    pub prerotate: OneOrMany<String>,
    #[serde(default)]
    pub postrotate: OneOrMany<String>,
    #[serde(default = "default_queue_path")]
    pub queuepath: PathBuf,
    #[serde(default = "default_queue_chunksize")]
    pub queuechunksize: usize,
    #[serde(default = "default_queue_timeout")]
    pub queuetimeout: u64,
    /// Number of rotated copies to keep
    pub rotate: Option<usize>,
}

fn default_user() -> String {
    DEFAULT_USER.to_string()
}

fn default_group() -> String {
    DEFAULT_GROUP.to_string()
}

fn default_true() -> bool {
    true
}

fn default_compress_cmd() -> String {
    DEFAULT_COMPRESS_CMD.to_string()
}

fn default_compress_ext() -> String {
    DEFAULT_COMPRESS_EXT.to_string()
}

fn default_dateformat() -> String {
    DEFAULT_DATEFORMAT.to_string()
}

fn default_destext() -> String {
    DEFAULT_DESTEXT.to_string()
}

fn default_fnformat() -> String {
    DEFAULT_FNFORMAT.to_string()
}

fn default_queue_path() -> PathBuf {
    PathBuf::from(DEFAULT_QUEUE_PATH)
}

fn default_queue_chunksize() -> usize {
    DEFAULT_QUEUE_CHUNKSIZE
}

fn default_queue_timeout() -> u64 {
    DEFAULT_QUEUE_TIMEOUT_SECS
}

impl Default for GroupConfig {
    fn default() -> Self {
        Self {
            name: None,
            paths: Vec::new(),
            mode: ModeValue::default(),
            user: default_user(),
            group: default_group(),
            compress: true,
            compresscmd: default_compress_cmd(),
            compressext: default_compress_ext(),
            copy: OneOrMany::default(),
            copytohdfs: OneOrMany::default(),
            hdfs: None,
            dateformat: default_dateformat(),
            destext: default_destext(),
            fnformat: default_fnformat(),
            sharedscripts: true,
            prerotate: OneOrMany::default(),
            postrotate: OneOrMany::default(),
            queuepath: default_queue_path(),
            queuechunksize: default_queue_chunksize(),
            queuetimeout: default_queue_timeout(),
            rotate: None,
        }
    }
}

impl ConfigFile {
    /// Load config from file, automatically detecting format from extension
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(Error::ConfigNotFound(path.to_path_buf()));
        }

        let format = ConfigFormat::from_path(path).ok_or_else(|| {
            Error::ConfigError(format!(
                "Unsupported config file extension: {}. Expected .toml, .yaml, .yml, or .json",
                path.display()
            ))
        })?;

        let content = std::fs::read_to_string(path)?;
        Self::parse(&content, format)
    }

    /// Parse config content with specified format
    pub fn parse(content: &str, format: ConfigFormat) -> Result<Self> {
        match format {
            ConfigFormat::Toml => Self::from_toml(content),
            ConfigFormat::Yaml => Self::from_yaml(content),
            ConfigFormat::Json => Self::from_json(content),
        }
    }

    /// Parse TOML config content
    pub fn from_toml(content: &str) -> Result<Self> {
        let raw: RawConfig = toml::from_str(content)?;
        Ok(raw.into())
    }

    /// Parse YAML config content
    pub fn from_yaml(content: &str) -> Result<Self> {
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        let raw: RawConfig = serde_yaml::from_str(content)?;
        Ok(raw.into())
    }

    /// Parse JSON config content
    pub fn from_json(content: &str) -> Result<Self> {
        let raw: RawConfig = serde_json::from_str(content)?;
        Ok(raw.into())
    }
}

impl GroupConfig {
    /// Validate and resolve into a RotationGroup.
    ///
    /// `index` is the group's position in the file, used to name unnamed groups
    /// without paths.
    pub fn into_group(self, index: usize) -> Result<RotationGroup> {
        if self.fnformat.is_empty() {
            return Err(Error::config("'fnformat' cannot be empty"));
        }
        FilenameTemplate::parse(&self.fnformat)?;
        validate_strftime("dateformat", &self.dateformat)?;
        validate_strftime("destext", &self.destext)?;

        for pattern in &self.paths {
            glob::Pattern::new(pattern).map_err(|e| {
                Error::config(format!("Invalid path pattern '{}': {}", pattern, e))
            })?;
        }

        let mode = self.mode.to_mode()?;
        let ownership = Ownership::new(resolve_user(&self.user)?, resolve_group(&self.group)?);

        if self.queuechunksize == 0 {
            return Err(Error::config("'queuechunksize' must be greater than zero"));
        }
        if self.compress && self.compresscmd.trim().is_empty() {
            return Err(Error::config("'compresscmd' cannot be empty when 'compress' is set"));
        }

        let name = self
            .name
            .filter(|n| !n.is_empty())
            .or_else(|| self.paths.first().cloned())
            .unwrap_or_else(|| format!("group-{}", index));

        Ok(RotationGroup {
            name,
            paths: self.paths,
            mode,
            user: self.user,
            group: self.group,
            ownership,
            compress: self.compress,
            compression: Compression {
                command: self.compresscmd,
                extension: self.compressext,
            },
            copy: self.copy.into_vec(),
            copy_to_remote: self.copytohdfs.into_vec(),
            remote: self.hdfs.and_then(RemoteSection::into_remote),
            naming: NamingTemplates {
                dateformat: self.dateformat,
                destext: self.destext,
                fnformat: self.fnformat,
            },
            shared_scripts: self.sharedscripts,
            prerotate: self.prerotate.into_vec(),
            postrotate: self.postrotate.into_vec(),
            queue: QueueSettings {
                path: self.queuepath,
                chunk_size: self.queuechunksize,
                block_timeout: Duration::from_secs(self.queuetimeout),
            },
            keep: self.rotate,
        })
    }
}
