use std::path::PathBuf;

use clap::Parser;

use crate::managers::deployment_planner::DEFAULT_TUNNEL_IMAGE;
use crate::probe::http_probe::DEFAULT_PROBE_URL;

#[derive(Parser)]
#[command(version, about)]
pub struct Cli {
    #[arg(short, long)]
    pub unix_sock_path: PathBuf,
    /// Holds the credentials file
    #[arg(short, long)]
    pub workdir: PathBuf,
    /// Root of app data volumes, defaults to <WORKDIR>/.data
    #[arg(short = 'r', long)]
    pub data_root: Option<PathBuf>,
    #[arg(short, long, default_value = "docker")]
    pub docker_path: PathBuf,
    /// Passed to the docker binary as --host
    #[arg(short = 'H', long)]
    pub docker_host: Option<String>,
    #[arg(short, long, default_value_t = String::from(DEFAULT_TUNNEL_IMAGE))]
    pub tunnel_image: String,
    #[arg(short, long, default_value_t = String::from(DEFAULT_PROBE_URL))]
    pub probe_url: String,
    #[arg(long, value_parser=clap::value_parser!(u64).range(1..=10), default_value_t = 10)]
    pub probe_timeout_secs: u64,
    #[arg(long, value_parser=clap::value_parser!(u64).range(1..), default_value_t = 120)]
    pub command_timeout_secs: u64,
    /// YAML file overriding or extending the builtin app manifests
    #[arg(short, long)]
    pub manifests_path: Option<PathBuf>,
    /// Deploy every configured app on proxies added without an explicit app selection
    #[arg(short, long, default_value_t = false)]
    pub auto_deploy: bool,
}
