pub mod container;
pub mod dashboard;
pub mod deployment;
pub mod instance;
pub mod manifest;
pub mod proxy;
pub mod steward;
