pub mod cleanup;
pub mod credentials;
pub mod deployment;
pub mod deployment_planner;
pub mod environment;
pub mod instance;
pub mod instance_registry;
pub mod manifest;
pub mod manifest_catalog;
pub mod naming;
pub mod ports;
pub mod proxy;
pub mod proxy_registry;
pub mod runtime;
pub mod steward;
pub mod steward_manager;
pub mod teardown;
pub mod teardown_manager;
