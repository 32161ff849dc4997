//! Policy document loading.
//!
//! The document is JSON with an `options` block (connection, target
//! directory, loggers) and a `pathes` list of declared entries. Entries are
//! kept raw here; turning them into [`BackupEntry`] values, including the
//! mandatory-key checks, belongs to the job controller.

use crate::error::{ConfigError, JobError};
use crate::logging::{HandlerConfig, LogLevel};
use crate::model::{BackupEntry, EntryKind, EntryOptions};
use crate::remote::Credentials;
use serde::Deserialize;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Deserialize)]
pub struct PolicyDocument {
    pub options: JobSettings,
    pub pathes: Vec<RawEntry>,
}

impl PolicyDocument {
    pub fn from_json(text: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(text)?)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json(&text)
    }
}

/// The document's `options` block.
#[derive(Clone, Deserialize)]
pub struct JobSettings {
    pub name: String,
    pub host: String,
    pub user: String,
    #[serde(default)]
    pub password: Option<String>,
    #[serde(default)]
    pub keyfile: Option<PathBuf>,
    pub targetdir: PathBuf,
    #[serde(default)]
    pub copystats: bool,
    /// Comma separated list out of `dir`, `file`, `all`
    #[serde(default)]
    pub processonly_types: Option<String>,
    #[serde(default)]
    pub loggers: Option<Vec<LoggerSpec>>,
}

impl fmt::Debug for JobSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JobSettings")
            .field("name", &self.name)
            .field("host", &self.host)
            .field("user", &self.user)
            .field("keyfile", &self.keyfile)
            .field("targetdir", &self.targetdir)
            .field("copystats", &self.copystats)
            .field("processonly_types", &self.processonly_types)
            .finish_non_exhaustive()
    }
}

impl fmt::Display for JobSettings {
    /// One `key: value` line per setting; the password is never printed.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "name: {}", self.name)?;
        writeln!(f, "host: {}", self.host)?;
        writeln!(f, "user: {}", self.user)?;
        if let Some(keyfile) = &self.keyfile {
            writeln!(f, "keyfile: {}", keyfile.display())?;
        }
        writeln!(f, "targetdir: {}", self.targetdir.display())?;
        writeln!(f, "copystats: {}", self.copystats)?;
        if let Some(types) = &self.processonly_types {
            writeln!(f, "processonly_types: {}", types)?;
        }
        Ok(())
    }
}

impl JobSettings {
    /// A key file selects public-key auth; the password then unlocks the key.
    pub fn credentials(&self) -> Credentials {
        let password = self.password.clone().unwrap_or_default();
        match &self.keyfile {
            Some(path) => Credentials::KeyFile {
                path: path.clone(),
                passphrase: Some(password).filter(|p| !p.is_empty()),
            },
            None => Credentials::Password(password),
        }
    }

    /// Logger handlers for this job. Without a `loggers` block, or with an
    /// empty one, everything goes to the console.
    pub fn handler_configs(&self) -> Result<Vec<HandlerConfig>, ConfigError> {
        match self.loggers.as_deref() {
            Some(specs) if !specs.is_empty() => specs.iter().map(LoggerSpec::to_handler).collect(),
            _ => Ok(vec![HandlerConfig::console(LogLevel::All)]),
        }
    }

    /// Which entry kinds this run processes, as `(dirs, files)`.
    ///
    /// # Errors
    /// Returns `JobError::InvalidProcessOnlyTypes` (code 6) if the setting is
    /// present but names neither kind.
    pub fn processed_kinds(&self) -> Result<(bool, bool), JobError> {
        let Some(value) = &self.processonly_types else {
            return Ok((true, true));
        };

        let types: Vec<&str> = value.split(',').map(str::trim).collect();
        if types.contains(&"all") {
            return Ok((true, true));
        }

        let dirs = types.contains(&"dir");
        let files = types.contains(&"file");
        if !dirs && !files {
            return Err(JobError::InvalidProcessOnlyTypes {
                value: value.clone(),
            });
        }
        Ok((dirs, files))
    }
}

/// One element of the `loggers` list.
#[derive(Debug, Clone, Deserialize)]
pub struct LoggerSpec {
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub level: Option<String>,
    pub folder: Option<PathBuf>,
}

impl LoggerSpec {
    pub fn to_handler(&self) -> Result<HandlerConfig, ConfigError> {
        let kind = self.kind.as_deref().ok_or(ConfigError::LoggerWithoutType)?;
        let level = match self.level.as_deref() {
            Some("all") => LogLevel::All,
            Some("errors") => LogLevel::Errors,
            other => return Err(ConfigError::LoggerLevel(other.unwrap_or("").to_string())),
        };

        match kind {
            "console" => Ok(HandlerConfig::console(level)),
            "file" => match &self.folder {
                Some(folder) if !folder.as_os_str().is_empty() => {
                    Ok(HandlerConfig::file(level, folder.clone()))
                }
                _ => Err(ConfigError::LoggerWithoutFolder),
            },
            other => Err(ConfigError::LoggerType(other.to_string())),
        }
    }
}

/// A declared entry as written in the document. `type` and `path` are
/// optional here so their absence can be reported with the right job code.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawEntry {
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub path: Option<String>,
    pub name: Option<String>,
    pub filter: Option<String>,
    pub options: Option<EntryOptions>,
}

impl RawEntry {
    /// Build the entry, enforcing the mandatory `type` and `path` keys.
    ///
    /// # Errors
    /// `JobError::MissingType` (code 2) or `JobError::MissingPath` (code 3).
    pub fn into_entry(self, index: usize) -> Result<BackupEntry, JobError> {
        let declared = self.kind.ok_or(JobError::MissingType { index })?;
        let path = self.path.ok_or(JobError::MissingPath { index })?;
        let name = self.name.unwrap_or_else(|| declared.clone());

        Ok(BackupEntry::new(
            EntryKind::from_declared(&declared),
            name,
            path,
            self.filter,
            self.options,
        ))
    }
}
