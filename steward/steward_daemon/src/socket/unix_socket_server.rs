use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use log::{debug, error, info, warn};
use thiserror::Error;
use tokio::net::{UnixListener, UnixStream};
use tokio::{select, task::JoinSet};
use tokio_util::sync::CancellationToken;

use crate::client_handler::client_command_handler::Client;
use crate::managers::steward::Steward;

#[derive(Error, Debug)]
pub enum UnixSocketServerError {
    #[error("Failed to remove stale steward socket {path:?}: {source}")]
    StaleSocketFail {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("Failed to bind steward socket {path:?}: {source}")]
    BindFail {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("Failed to accept a steward client: {0}")]
    AcceptFail(#[source] io::Error),
}

/// Control socket of the steward daemon. Every client connection gets its
/// own task sharing one [`Steward`].
pub struct UnixSocketServer {
    listener: UnixListener,
    path: PathBuf,
}

impl UnixSocketServer {
    /// Binds `socket`, replacing a file left behind by a previous daemon.
    pub fn new(socket: &Path) -> Result<Self, UnixSocketServerError> {
        if socket.exists() {
            warn!("Replacing stale steward socket {socket:?}");
            std::fs::remove_file(socket).map_err(|source| {
                UnixSocketServerError::StaleSocketFail {
                    path: socket.to_path_buf(),
                    source,
                }
            })?;
        }
        let listener =
            UnixListener::bind(socket).map_err(|source| UnixSocketServerError::BindFail {
                path: socket.to_path_buf(),
                source,
            })?;
        Ok(Self {
            listener,
            path: socket.to_path_buf(),
        })
    }

    /// Serves clients until `token` is cancelled, then waits for every open
    /// client session to finish.
    pub async fn listen<T: Client>(
        &self,
        steward: Arc<dyn Steward + Send + Sync>,
        token: Arc<CancellationToken>,
    ) -> Result<(), UnixSocketServerError> {
        info!("Steward is listening on {:?}", self.path);
        let mut sessions = JoinSet::new();
        loop {
            select! {
                accepted = self.listener.accept() => {
                    let (stream, _) = accepted.map_err(UnixSocketServerError::AcceptFail)?;
                    Self::spawn_session::<T>(&mut sessions, stream, steward.clone(), token.clone());
                    debug!("Steward client connected, {} sessions open.", sessions.len());
                }
                finished = sessions.join_next(), if !sessions.is_empty() => {
                    if let Some(Err(err)) = finished {
                        error!("Steward client session panicked: {err}");
                    }
                }
                _ = token.cancelled() => {
                    break;
                }
            }
        }

        let remaining = sessions.len();
        while sessions.join_next().await.is_some() {}
        info!("Steward socket closed after draining {remaining} sessions.");
        Ok(())
    }

    fn spawn_session<T: Client>(
        sessions: &mut JoinSet<()>,
        stream: UnixStream,
        steward: Arc<dyn Steward + Send + Sync>,
        token: Arc<CancellationToken>,
    ) {
        sessions.spawn(async move {
            match T::handle_connection(steward, stream, token).await {
                Ok(()) => debug!("Steward client session ended."),
                Err(err) => error!("Steward client session failed: {err}"),
            }
        });
    }
}
