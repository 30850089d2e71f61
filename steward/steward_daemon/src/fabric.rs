pub mod steward_fabric;
