//! Wire structures for the ArcGIS REST JSON (`f=json`) payloads we consume

use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer};
use serde_json::{Map, Value};

use crate::error::{ArcGisError, Result};

/// Error block ArcGIS returns (with HTTP 200) when it refuses a request
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct ServiceErrorBody {
    #[serde(default, deserialize_with = "null_as_default")]
    pub code: i64,
    #[serde(default, deserialize_with = "null_as_default")]
    pub message: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub details: Vec<String>,
}

/// Some server versions send `null` instead of omitting a member
fn null_as_default<'de, D, T>(deserializer: D) -> std::result::Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de> + Default,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// `GET {service}?f=json`
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct ServiceInfo {
    #[serde(default)]
    pub layers: Vec<LayerInfo>,
    pub max_record_count: Option<u32>,
    pub current_version: Option<f64>,
    pub service_description: Option<String>,
}

/// One entry of `layers[]` in the service listing
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct LayerInfo {
    pub id: u32,
    pub name: String,
    pub geometry_type: Option<String>,
}

/// `GET {service}/{layer}?f=json`
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct LayerDetail {
    pub geometry_type: Option<String>,
    pub fields: Option<Vec<FieldInfo>>,
    pub max_record_count: Option<u32>,
    pub object_id_field: Option<String>,
    pub advanced_query_capabilities: Option<AdvancedQueryCapabilities>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct AdvancedQueryCapabilities {
    pub supports_pagination: Option<bool>,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct FieldInfo {
    pub name: String,
    #[serde(rename = "type")]
    pub field_type: String,
    pub alias: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct SpatialReferenceInfo {
    pub wkid: Option<i32>,
    #[serde(rename = "latestWkid")]
    pub latest_wkid: Option<i32>,
}

/// `GET {service}/{layer}/query?f=json`
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct QueryResponse {
    pub geometry_type: Option<String>,
    pub spatial_reference: Option<SpatialReferenceInfo>,
    #[serde(default)]
    pub features: Vec<FeatureJson>,
    #[serde(default)]
    pub exceeded_transfer_limit: bool,
}

#[derive(Debug, Deserialize)]
pub(crate) struct FeatureJson {
    #[serde(default)]
    pub attributes: Map<String, Value>,
    pub geometry: Option<Value>,
}

/// Parse a JSON body, separating the service's own error block from a payload
///
/// The outer `Result` is a transport/schema failure, the inner one is the
/// error ArcGIS reported for the request.
pub(crate) fn parse_body<T: DeserializeOwned>(
    url: &str,
    body: &[u8],
) -> Result<std::result::Result<T, ServiceErrorBody>> {
    let value: Value = serde_json::from_slice(body)
        .map_err(|e| ArcGisError::malformed(url, format!("response is not JSON: {}", e)))?;

    if let Some(error) = value.get("error") {
        let error: ServiceErrorBody = serde_json::from_value(error.clone())
            .map_err(|e| ArcGisError::malformed(url, format!("unreadable error block: {}", e)))?;
        return Ok(Err(error));
    }

    serde_json::from_value(value)
        .map(Ok)
        .map_err(|e| ArcGisError::malformed(url, e.to_string()))
}
