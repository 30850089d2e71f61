use anyhow::Error;
use clap::Parser;
use log::error;
use steward_daemon::{cli::Cli, daemon::DaemonBuilder};

#[tokio::main(flavor = "multi_thread")]
async fn main() -> anyhow::Result<(), Error> {
    env_logger::init();
    let cli = Cli::parse();

    match DaemonBuilder::build(cli).await {
        Ok(app) => {
            let app_thread_handle = app.run().await?;
            app_thread_handle.await?
        }
        Err(err) => {
            error!("{}", err);
            Err(err)
        }
    }
}
