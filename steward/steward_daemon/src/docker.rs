pub mod docker_cli;
pub mod docker_output;
