use std::{io, path::PathBuf};

use steward_client::steward::{StewardDaemonError, StewardResponse};
use thiserror::Error;
use utils::serde::json_framed::JsonFramedError;

#[derive(Debug, Error)]
pub enum StewardClientError {
    #[error(
        "Failed to connect to Steward's socket at path: {socket_path}. More details: {details}"
    )]
    ConnectionFailed {
        socket_path: PathBuf,
        #[source]
        details: io::Error,
    },
    #[error("Steward operation failed: {0}")]
    StewardOperationFail(#[from] StewardDaemonError),
    #[error("Failed to communicate with Steward: {0}")]
    CommunicationFail(#[from] JsonFramedError),
    #[error("Invalid response: {response:#?}")]
    InvalidResponse { response: Box<StewardResponse> },
}
