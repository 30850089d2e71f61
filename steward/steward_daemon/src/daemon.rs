use super::cli::Cli;
use super::client_handler::client_command_handler::ClientHandler;
use super::fabric::steward_fabric::{StewardFabric, StewardFabricConfig};
use super::managers::steward::Steward;
use super::socket::unix_socket_server::{UnixSocketServer, UnixSocketServerError};
use anyhow::Error;
use log::{debug, error, info};
use std::sync::Arc;
use std::time::Duration;
use tokio::select;
use tokio::signal::unix::{signal, SignalKind};
use tokio::spawn;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

const DATA_ROOT_DIR_NAME: &str = ".data";

pub struct DaemonBuilder;

impl DaemonBuilder {
    pub async fn build(cli: Cli) -> anyhow::Result<Daemon, Error> {
        let data_root = cli
            .data_root
            .unwrap_or_else(|| cli.workdir.join(DATA_ROOT_DIR_NAME));
        let steward = StewardFabric::new(StewardFabricConfig {
            workdir: cli.workdir,
            data_root,
            docker_path: cli.docker_path,
            docker_host: cli.docker_host,
            command_timeout: Duration::from_secs(cli.command_timeout_secs),
            tunnel_image: cli.tunnel_image,
            probe_url: cli.probe_url,
            probe_timeout: Duration::from_secs(cli.probe_timeout_secs),
            manifests_path: cli.manifests_path,
            auto_deploy_configured: cli.auto_deploy,
        })
        .await?
        .create_steward()
        .await?;
        match steward.refresh_statuses().await {
            Ok(changed) => debug!("Refreshed {changed} instance statuses."),
            Err(err) => error!("Failed to refresh instance statuses: {err}"),
        }
        let usock_server = UnixSocketServer::new(&cli.unix_sock_path)?;
        Ok(Daemon {
            usock_server,
            steward,
            cancellation_token: Arc::new(CancellationToken::new()),
        })
    }
}

pub struct Daemon {
    usock_server: UnixSocketServer,
    steward: Arc<dyn Steward + Send + Sync>,
    cancellation_token: Arc<CancellationToken>,
}

impl Daemon {
    pub async fn run(self) -> anyhow::Result<JoinHandle<Result<(), Error>>, Error> {
        info!("Starting application.");
        let mut usock_thread = Self::spawn_unix_socket_server_thread(
            self.usock_server,
            self.steward,
            self.cancellation_token.clone(),
        );
        let mut sigint = signal(SignalKind::interrupt())?;
        let mut sigterm = signal(SignalKind::terminate())?;

        Ok(spawn(async move {
            select! {
                _ = sigint.recv() => {
                    info!("SIGINT received shutting down");
                }

                _ = sigterm.recv() => {
                    info!("SIGTERM received shutting down");
                }

                v = &mut usock_thread => {
                    error!("Error while listening on unixsocket: {:?}", v);
                }
            }
            info!("Shutting down application.");
            self.cancellation_token.cancel();

            if !usock_thread.is_finished() {
                debug!("UnixSocketServer result: {:#?}", usock_thread.await);
            }

            info!("Application successfully shutdown.");
            Ok(())
        }))
    }

    fn spawn_unix_socket_server_thread(
        usock_server: UnixSocketServer,
        steward: Arc<dyn Steward + Send + Sync>,
        token: Arc<CancellationToken>,
    ) -> JoinHandle<Result<(), UnixSocketServerError>> {
        tokio::spawn(async move { usock_server.listen::<ClientHandler>(steward, token).await })
    }
}
