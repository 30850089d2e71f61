use futures::SinkExt;
use futures_util::stream::TryStreamExt;
use serde::{de::DeserializeOwned, Serialize};
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio_serde::formats::Json;
use tokio_util::codec::LengthDelimitedCodec;

/// Container logs can be requested in full, so frames are allowed to be large.
pub const MAX_FRAME_LENGTH: usize = 16 * 1024 * 1024;

#[derive(Debug, Error)]
pub enum JsonFramedError {
    #[error("Failed to read a frame: {0}")]
    SerdeReadError(#[source] std::io::Error),

    #[error("Failed to write a frame: {0}")]
    SerdeWriteError(#[source] std::io::Error),

    #[error("Stream is closed")]
    StreamIsClosed(),
}

type LengthFramed<Transport> = tokio_util::codec::Framed<Transport, LengthDelimitedCodec>;

/// Bidirectional JSON message stream where every message is one length prefixed frame.
pub struct JsonFramed<
    Transport: AsyncRead + AsyncWrite + Unpin,
    RecvItem: DeserializeOwned + Unpin,
    SendItem: Serialize + Unpin,
> {
    frame: tokio_serde::Framed<LengthFramed<Transport>, RecvItem, SendItem, Json<RecvItem, SendItem>>,
}

impl<
        Transport: AsyncRead + AsyncWrite + Unpin,
        RecvItem: DeserializeOwned + Unpin,
        SendItem: Serialize + Unpin,
    > JsonFramed<Transport, RecvItem, SendItem>
{
    pub fn new(stream: Transport) -> Self {
        let codec = LengthDelimitedCodec::builder()
            .max_frame_length(MAX_FRAME_LENGTH)
            .new_codec();
        let length_framed = tokio_util::codec::Framed::new(stream, codec);

        Self {
            frame: tokio_serde::Framed::new(length_framed, Json::default()),
        }
    }

    pub async fn recv(&mut self) -> Result<RecvItem, JsonFramedError> {
        self.frame
            .try_next()
            .await
            .map_err(JsonFramedError::SerdeReadError)?
            .ok_or(JsonFramedError::StreamIsClosed())
    }

    pub async fn send(&mut self, item: SendItem) -> Result<(), JsonFramedError> {
        self.frame
            .send(item)
            .await
            .map_err(JsonFramedError::SerdeWriteError)
    }

    /// Sends a request and waits for the single frame answering it.
    pub async fn exchange(&mut self, request: SendItem) -> Result<RecvItem, JsonFramedError> {
        self.send(request).await?;
        self.recv().await
    }
}

#[cfg(test)]
mod test {
    use serde::{Deserialize, Serialize};
    use tokio::{net::UnixStream, task::JoinHandle};

    use super::{JsonFramed, JsonFramedError};

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    enum Request {
        Ping { payload: String },
    }

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    enum Response {
        Pong { payload: String },
    }

    #[tokio::test]
    async fn exchange_request_and_response() {
        let (client_stream, server_stream) = UnixStream::pair().unwrap();
        let mut client = JsonFramed::<UnixStream, Response, Request>::new(client_stream);
        let mut server = JsonFramed::<UnixStream, Request, Response>::new(server_stream);
        let server_task: JoinHandle<Result<Request, JsonFramedError>> = tokio::spawn(async move {
            let request = server.recv().await?;
            let Request::Ping { payload } = request.clone();
            server.send(Response::Pong { payload }).await?;
            Ok(request)
        });

        let response = client
            .exchange(Request::Ping {
                payload: String::from("steward"),
            })
            .await
            .unwrap();

        assert_eq!(
            response,
            Response::Pong {
                payload: String::from("steward")
            }
        );
        assert_eq!(
            server_task.await.unwrap().unwrap(),
            Request::Ping {
                payload: String::from("steward")
            }
        );
    }

    #[tokio::test]
    async fn recv_on_closed_stream() {
        let (client_stream, server_stream) = UnixStream::pair().unwrap();
        let mut server = JsonFramed::<UnixStream, Request, Response>::new(server_stream);
        drop(client_stream);

        assert!(matches!(
            server.recv().await,
            Err(JsonFramedError::StreamIsClosed())
        ));
    }

    #[tokio::test]
    async fn large_frame_is_transferred() {
        let (client_stream, server_stream) = UnixStream::pair().unwrap();
        let mut client = JsonFramed::<UnixStream, Response, Request>::new(client_stream);
        let mut server = JsonFramed::<UnixStream, Request, Response>::new(server_stream);
        let payload = "x".repeat(4 * 1024 * 1024);
        let expected = payload.clone();
        let server_task = tokio::spawn(async move { server.recv().await.unwrap() });

        client.send(Request::Ping { payload }).await.unwrap();

        assert_eq!(
            server_task.await.unwrap(),
            Request::Ping { payload: expected }
        );
    }
}
