use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};
use serde_json::Value;
use utoipa::ToSchema;

/// Response envelope shared by every `/api` route.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ApiResponse {
    pub success: bool,
    /// Route specific fields such as `data`, `result`, `info` or `reason`.
    #[serde(flatten)]
    pub fields: HashMap<String, Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct InstallRequest {
    /// Git URL of the widget repository
    pub url: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct UpdateConfigRequest {
    /// Complete host configuration document
    #[schema(value_type = Object)]
    pub config: Value,
}

/// Interface addresses keyed by interface name.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct IpAddressesResponse {
    pub success: bool,
    pub data: BTreeMap<String, Vec<String>>,
}
