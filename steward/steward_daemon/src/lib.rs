mod client_handler;
mod docker;
mod fabric;
mod managers;
mod probe;
mod socket;
mod storage;
mod utils;

pub mod cli;
pub mod daemon;
