//! Remote-file-access contract.
//!
//! The walker never talks to SSH directly. It goes through [`RemoteFs`], which
//! the SFTP adapter implements for real runs and test doubles implement over a
//! local directory. A [`Connector`] opens an authenticated `RemoteFs`.

use crate::error::RemoteError;
use std::ffi::OsString;
use std::path::{Path, PathBuf};

const S_IFMT: u32 = 0o170_000;
const S_IFDIR: u32 = 0o040_000;
const S_IFLNK: u32 = 0o120_000;

/// Status of a remote node as reported by `stat`/`lstat`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RemoteStat {
    pub size: Option<u64>,
    /// Full POSIX mode, file type bits included
    pub mode: Option<u32>,
    /// Seconds since the Unix epoch
    pub atime: Option<u64>,
    /// Seconds since the Unix epoch
    pub mtime: Option<u64>,
}

impl RemoteStat {
    fn file_type(&self) -> Option<u32> {
        self.mode.map(|m| m & S_IFMT)
    }

    pub fn is_dir(&self) -> bool {
        self.file_type() == Some(S_IFDIR)
    }

    pub fn is_symlink(&self) -> bool {
        self.file_type() == Some(S_IFLNK)
    }
}

/// Blocking access to a remote file hierarchy.
pub trait RemoteFs {
    /// Status of `path`, following symbolic links.
    fn stat(&self, path: &Path) -> Result<RemoteStat, RemoteError>;

    /// Status of `path` itself; symbolic links are not followed.
    fn lstat(&self, path: &Path) -> Result<RemoteStat, RemoteError>;

    /// Names of the children of `path`, without `.` and `..`, as sent by the
    /// server (not necessarily UTF-8).
    fn listdir(&self, path: &Path) -> Result<Vec<OsString>, RemoteError>;

    /// Copy the whole remote file to `local`, returning the bytes written.
    fn get(&self, remote: &Path, local: &Path) -> Result<u64, RemoteError>;

    /// Release the session. Calling it twice is harmless.
    fn close(&mut self);
}

/// Where to connect.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    pub host: String,
    pub port: u16,
    pub user: String,
}

impl Endpoint {
    pub const DEFAULT_PORT: u16 = 22;

    /// Accepts `host` or `host:port`.
    pub fn parse(host_with_port: &str, user: &str) -> Result<Self, RemoteError> {
        let (host, port) = match host_with_port.rsplit_once(':') {
            Some((h, p)) => {
                let port: u16 = p.parse().map_err(|_| RemoteError::Protocol {
                    message: format!("invalid port in host: {host_with_port}"),
                })?;
                (h.to_string(), port)
            }
            None => (host_with_port.to_string(), Self::DEFAULT_PORT),
        };
        Ok(Endpoint {
            host,
            port,
            user: user.to_string(),
        })
    }

    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// How to authenticate.
#[derive(Clone, PartialEq, Eq)]
pub enum Credentials {
    Password(String),
    KeyFile {
        path: PathBuf,
        passphrase: Option<String>,
    },
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Credentials::Password(_) => write!(f, "Password(***)"),
            Credentials::KeyFile { path, .. } => {
                write!(f, "KeyFile({})", path.display())
            }
        }
    }
}

/// Opens authenticated sessions.
pub trait Connector {
    fn connect(
        &self,
        endpoint: &Endpoint,
        credentials: &Credentials,
    ) -> Result<Box<dyn RemoteFs>, RemoteError>;
}
