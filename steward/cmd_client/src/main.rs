use clap::Parser;
use client_lib::StewardConnection;
use cmd_handler::CommandHanlder;
use log::{error, info};
use std::path::PathBuf;
use utils::read_command_line;

mod cmd_handler;
mod cmd_parser;
mod commands;
mod utils;

#[derive(Parser)]
#[command(version, about)]
struct Args {
    #[arg(short, long)]
    unix_socket_path: PathBuf,
}

#[tokio::main]
async fn main() -> Result<(), anyhow::Error> {
    env_logger::init();
    info!("Starting Steward cmd client! Press Ctrl^C to exit.");
    let cli_args = Args::parse();
    let steward_connection = StewardConnection::connect(cli_args.unix_socket_path).await?;
    let mut handler = CommandHanlder::new(steward_connection);
    loop {
        info!("Insert new command:");
        match read_command_line() {
            Ok(None) => break,
            Ok(Some(cmd)) => match handler.handle_command(cmd.command).await {
                Err(err) => error!("Error occured while handling command: {:#?}!", err),
                Ok(_) => info!("Command handled successfully."),
            },
            Err(err) => error!("{err}"),
        }
    }
    info!("Input closed, exiting.");
    Ok(())
}
