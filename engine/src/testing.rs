//! Test doubles for the remote side: a `RemoteFs` that serves a local
//! directory as if it were the remote root, and a matching `Connector`.

use crate::error::RemoteError;
use crate::remote::{Connector, Credentials, Endpoint, RemoteFs, RemoteStat};
use std::cell::{Cell, RefCell};
use std::collections::HashSet;
use std::ffi::OsString;
use std::fs;
use std::io;
use std::os::unix::fs::MetadataExt;
use std::path::{Path, PathBuf};
use std::rc::Rc;

/// Call counters and fault injection shared between a remote and its test.
#[derive(Default)]
pub(crate) struct RemoteProbe {
    pub stat_calls: Cell<usize>,
    pub get_calls: Cell<usize>,
    pub closed: Cell<bool>,
    pub denied: RefCell<HashSet<PathBuf>>,
    pub broken: RefCell<HashSet<PathBuf>>,
}

impl RemoteProbe {
    /// `listdir` on `path` fails with a permission error.
    pub fn deny(&self, path: &str) {
        self.denied.borrow_mut().insert(PathBuf::from(path));
    }

    /// Any call on `path` fails with a protocol error.
    pub fn break_path(&self, path: &str) {
        self.broken.borrow_mut().insert(PathBuf::from(path));
    }
}

pub(crate) struct LocalRemote {
    root: PathBuf,
    probe: Rc<RemoteProbe>,
}

impl LocalRemote {
    pub fn new(root: &Path) -> (Self, Rc<RemoteProbe>) {
        let probe = Rc::new(RemoteProbe::default());
        (
            LocalRemote {
                root: root.to_path_buf(),
                probe: probe.clone(),
            },
            probe,
        )
    }

    fn with_probe(root: &Path, probe: Rc<RemoteProbe>) -> Self {
        LocalRemote {
            root: root.to_path_buf(),
            probe,
        }
    }

    fn resolve(&self, path: &Path) -> Result<PathBuf, RemoteError> {
        if self.probe.broken.borrow().contains(path) {
            return Err(RemoteError::Protocol {
                message: format!("channel closed while accessing {}", path.display()),
            });
        }
        Ok(self.root.join(path.strip_prefix("/").unwrap_or(path)))
    }

    fn map_io(path: &Path, err: io::Error) -> RemoteError {
        match err.kind() {
            io::ErrorKind::NotFound => RemoteError::NotFound {
                path: path.to_path_buf(),
            },
            io::ErrorKind::PermissionDenied => RemoteError::PermissionDenied {
                path: path.to_path_buf(),
            },
            _ => RemoteError::Io {
                path: path.to_path_buf(),
                source: err,
            },
        }
    }

    fn to_stat(metadata: &fs::Metadata) -> RemoteStat {
        RemoteStat {
            size: Some(metadata.size()),
            mode: Some(metadata.mode()),
            atime: Some(metadata.atime().max(0) as u64),
            mtime: Some(metadata.mtime().max(0) as u64),
        }
    }
}

impl RemoteFs for LocalRemote {
    fn stat(&self, path: &Path) -> Result<RemoteStat, RemoteError> {
        self.probe.stat_calls.set(self.probe.stat_calls.get() + 1);
        let local = self.resolve(path)?;
        let metadata = fs::metadata(local).map_err(|e| Self::map_io(path, e))?;
        Ok(Self::to_stat(&metadata))
    }

    fn lstat(&self, path: &Path) -> Result<RemoteStat, RemoteError> {
        self.probe.stat_calls.set(self.probe.stat_calls.get() + 1);
        let local = self.resolve(path)?;
        let metadata = fs::symlink_metadata(local).map_err(|e| Self::map_io(path, e))?;
        Ok(Self::to_stat(&metadata))
    }

    fn listdir(&self, path: &Path) -> Result<Vec<OsString>, RemoteError> {
        if self.probe.denied.borrow().contains(path) {
            return Err(RemoteError::PermissionDenied {
                path: path.to_path_buf(),
            });
        }
        let local = self.resolve(path)?;
        let mut names = Vec::new();
        for entry in fs::read_dir(local).map_err(|e| Self::map_io(path, e))? {
            let entry = entry.map_err(|e| Self::map_io(path, e))?;
            names.push(entry.file_name());
        }
        names.sort();
        Ok(names)
    }

    fn get(&self, remote: &Path, local: &Path) -> Result<u64, RemoteError> {
        self.probe.get_calls.set(self.probe.get_calls.get() + 1);
        let source = self.resolve(remote)?;
        fs::copy(source, local).map_err(|e| RemoteError::Io {
            path: local.to_path_buf(),
            source: e,
        })
    }

    fn close(&mut self) {
        self.probe.closed.set(true);
    }
}

/// What a [`LocalConnector`] does when asked to connect.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ConnectOutcome {
    Connect,
    RejectCredentials,
    ProtocolFailure,
}

pub(crate) struct LocalConnector {
    root: PathBuf,
    outcome: ConnectOutcome,
    pub probe: Rc<RemoteProbe>,
    pub connects: Cell<usize>,
}

impl LocalConnector {
    pub fn new(root: &Path, outcome: ConnectOutcome) -> Self {
        LocalConnector {
            root: root.to_path_buf(),
            outcome,
            probe: Rc::new(RemoteProbe::default()),
            connects: Cell::new(0),
        }
    }
}

impl Connector for LocalConnector {
    fn connect(
        &self,
        endpoint: &Endpoint,
        _credentials: &Credentials,
    ) -> Result<Box<dyn RemoteFs>, RemoteError> {
        self.connects.set(self.connects.get() + 1);
        match self.outcome {
            ConnectOutcome::Connect => Ok(Box::new(LocalRemote::with_probe(
                &self.root,
                self.probe.clone(),
            ))),
            ConnectOutcome::RejectCredentials => Err(RemoteError::AuthenticationFailed {
                user: endpoint.user.clone(),
            }),
            ConnectOutcome::ProtocolFailure => Err(RemoteError::Protocol {
                message: "kex exchange failed".to_string(),
            }),
        }
    }
}
