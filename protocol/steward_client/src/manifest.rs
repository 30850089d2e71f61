use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, PartialOrd)]
pub struct ManifestDescription {
    pub app_id: String,
    pub name: String,
    pub image: String,
    pub dashboard: String,
    pub link: String,
    pub required_fields: Vec<String>,
    pub ports: Vec<String>,
}
