//! SFTP transport built on libssh2.
//!
//! Everything here is blocking; the walker is single-threaded and suspends
//! only inside these calls.

use crate::error::RemoteError;
use crate::remote::{Connector, Credentials, Endpoint, RemoteFs, RemoteStat};
use ssh2::{ErrorCode, FileStat, Session, Sftp};
use std::ffi::OsString;
use std::fs;
use std::io;
use std::net::TcpStream;
use std::path::{Path, PathBuf};

// libssh2 SFTP status codes
const FX_NO_SUCH_FILE: i32 = 2;
const FX_PERMISSION_DENIED: i32 = 3;

/// Opens [`SftpRemote`] sessions over TCP.
#[derive(Debug, Default, Clone, Copy)]
pub struct SftpConnector;

impl Connector for SftpConnector {
    fn connect(
        &self,
        endpoint: &Endpoint,
        credentials: &Credentials,
    ) -> Result<Box<dyn RemoteFs>, RemoteError> {
        Ok(Box::new(SftpRemote::connect(endpoint, credentials)?))
    }
}

/// An authenticated SFTP session.
pub struct SftpRemote {
    session: Session,
    sftp: Option<Sftp>,
}

impl SftpRemote {
    pub fn connect(endpoint: &Endpoint, credentials: &Credentials) -> Result<Self, RemoteError> {
        let address = endpoint.address();
        let tcp = TcpStream::connect(&address).map_err(|e| RemoteError::Protocol {
            message: format!("TCP connection to {address} failed: {e}"),
        })?;

        let mut session = Session::new().map_err(|e| protocol("creating SSH session", &e))?;
        session.set_tcp_stream(tcp);
        session
            .handshake()
            .map_err(|e| protocol(&format!("SSH handshake with {address}"), &e))?;

        let auth = match credentials {
            Credentials::Password(password) => session.userauth_password(&endpoint.user, password),
            Credentials::KeyFile { path, passphrase } => session.userauth_pubkey_file(
                &endpoint.user,
                None,
                path,
                passphrase.as_deref(),
            ),
        };
        if let Err(e) = auth {
            tracing::debug!("authentication as {} failed: {}", endpoint.user, e);
        }
        if !session.authenticated() {
            return Err(RemoteError::AuthenticationFailed {
                user: endpoint.user.clone(),
            });
        }

        let sftp = session
            .sftp()
            .map_err(|e| protocol("opening SFTP subsystem", &e))?;

        Ok(SftpRemote {
            session,
            sftp: Some(sftp),
        })
    }

    fn sftp(&self) -> Result<&Sftp, RemoteError> {
        self.sftp.as_ref().ok_or_else(|| RemoteError::Protocol {
            message: "SFTP session is closed".to_string(),
        })
    }
}

fn protocol(context: &str, err: &ssh2::Error) -> RemoteError {
    RemoteError::Protocol {
        message: format!("{context}: {err}"),
    }
}

fn classify(path: &Path, err: ssh2::Error) -> RemoteError {
    match err.code() {
        ErrorCode::SFTP(FX_NO_SUCH_FILE) => RemoteError::NotFound {
            path: path.to_path_buf(),
        },
        ErrorCode::SFTP(FX_PERMISSION_DENIED) => RemoteError::PermissionDenied {
            path: path.to_path_buf(),
        },
        _ => RemoteError::Protocol {
            message: format!("{}: {}", path.display(), err),
        },
    }
}

fn to_remote_stat(stat: &FileStat) -> RemoteStat {
    RemoteStat {
        size: stat.size,
        mode: stat.perm,
        atime: stat.atime,
        mtime: stat.mtime,
    }
}

impl RemoteFs for SftpRemote {
    fn stat(&self, path: &Path) -> Result<RemoteStat, RemoteError> {
        let stat = self.sftp()?.stat(path).map_err(|e| classify(path, e))?;
        Ok(to_remote_stat(&stat))
    }

    fn lstat(&self, path: &Path) -> Result<RemoteStat, RemoteError> {
        let stat = self.sftp()?.lstat(path).map_err(|e| classify(path, e))?;
        Ok(to_remote_stat(&stat))
    }

    fn listdir(&self, path: &Path) -> Result<Vec<OsString>, RemoteError> {
        let entries = self.sftp()?.readdir(path).map_err(|e| classify(path, e))?;
        let mut names: Vec<OsString> = entries
            .into_iter()
            .filter_map(|(child, _)| child.file_name().map(|n| n.to_os_string()))
            .collect();
        names.sort();
        Ok(names)
    }

    fn get(&self, remote: &Path, local: &Path) -> Result<u64, RemoteError> {
        let mut remote_file = self.sftp()?.open(remote).map_err(|e| classify(remote, e))?;
        let mut local_file = fs::File::create(local).map_err(|e| local_io(local, e))?;
        io::copy(&mut remote_file, &mut local_file).map_err(|e| local_io(local, e))
    }

    fn close(&mut self) {
        if self.sftp.take().is_some() {
            let _ = self.session.disconnect(None, "backup finished", None);
        }
    }
}

impl Drop for SftpRemote {
    fn drop(&mut self) {
        self.close();
    }
}

fn local_io(path: &Path, source: io::Error) -> RemoteError {
    RemoteError::Io {
        path: PathBuf::from(path),
        source,
    }
}
