use std::fmt;
use std::sync::Arc;

use serde::de::DeserializeOwned;
use tracing::{debug, info};
use url::Url;

use crate::collect::arcgis::layer::{fetch_layer_metadata, LayerHandle};
use crate::collect::arcgis::lazy::LazyMetadata;
use crate::collect::arcgis::response::{parse_body, ServiceErrorBody, ServiceInfo};
use crate::collect::config::ClientConfig;
use crate::collect::http::{redact_token, HttpClient, ReqwestClient};
use crate::error::{ArcGisError, Result};
use crate::geometric::geometry::GeometryType;

/// Entry of the service's layer listing
#[derive(Debug, Clone, PartialEq)]
pub struct LayerDescriptor {
    pub id: u32,
    pub name: String,
    /// `None` when the listing omits it or uses a type this crate does not read
    pub geometry_type: Option<GeometryType>,
}

/// Service-level metadata from `GET {service}?f=json`
#[derive(Debug, Clone, PartialEq)]
pub struct ServiceMetadata {
    pub layers: Vec<LayerDescriptor>,
    pub max_record_count: Option<u32>,
    pub current_version: Option<f64>,
    pub description: Option<String>,
}

/// Descriptor of a remote FeatureServer / MapServer endpoint
///
/// Opening a handle performs no I/O; the layer listing is fetched on the
/// first call that needs it and cached for the handle's lifetime. The handle
/// is `Send + Sync` and can be shared between threads querying different layers.
pub struct ServiceHandle {
    base_url: Url,
    default_layer: Option<u32>,
    config: ClientConfig,
    client: Arc<dyn HttpClient>,
    metadata: LazyMetadata<ServiceMetadata>,
}

impl ServiceHandle {
    /// Open a service with the default configuration and a reqwest transport
    ///
    /// # Example
    ///
    /// ```no_run
    /// use rsarcgis::ServiceHandle;
    ///
    /// let service = ServiceHandle::open(
    ///     "https://services.arcgis.com/org/arcgis/rest/services/Storms/FeatureServer",
    ///     None,
    /// )?;
    /// for layer in service.list_layers()? {
    ///     println!("{} {}", layer.id, layer.name);
    /// }
    /// # Ok::<(), rsarcgis::ArcGisError>(())
    /// ```
    pub fn open(url: &str, token: Option<&str>) -> Result<Self> {
        let mut config = ClientConfig::default();
        if let Some(token) = token {
            config.token = Some(token.to_string());
        }
        let client = ReqwestClient::new(&config)
            .map_err(|e| ArcGisError::Config(e.to_string()))?;
        Self::open_with(url, config, Arc::new(client))
    }

    /// Open a service with an explicit configuration and transport
    ///
    /// A layer URL (`.../FeatureServer/0`) opens its service and is kept as
    /// [`ServiceHandle::default_layer`].
    pub fn open_with(url: &str, config: ClientConfig, client: Arc<dyn HttpClient>) -> Result<Self> {
        let (base_url, default_layer) = normalize_endpoint(url)?;
        debug!(url = %base_url, ?default_layer, "service handle opened");
        Ok(ServiceHandle {
            base_url,
            default_layer,
            config,
            client,
            metadata: LazyMetadata::new(),
        })
    }

    pub fn url(&self) -> &Url {
        &self.base_url
    }

    /// Layer id given in the opened URL, if any
    pub fn default_layer(&self) -> Option<u32> {
        self.default_layer
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Service metadata, fetched once
    pub fn metadata(&self) -> Result<&ServiceMetadata> {
        self.metadata.get_or_try_init(|| self.fetch_service_metadata())
    }

    pub fn list_layers(&self) -> Result<&[LayerDescriptor]> {
        Ok(&self.metadata()?.layers)
    }

    /// Resolve a layer by id
    pub fn layer(&self, id: u32) -> Result<LayerHandle<'_>> {
        let layers = self.list_layers()?;
        let descriptor = layers
            .iter()
            .find(|l| l.id == id)
            .ok_or_else(|| ArcGisError::LayerNotFound {
                layer: id.to_string(),
                available: layers.iter().map(|l| l.id).collect(),
            })?;
        self.resolve_layer(descriptor)
    }

    /// Resolve a layer by its (case-insensitive) name
    pub fn layer_by_name(&self, name: &str) -> Result<LayerHandle<'_>> {
        let layers = self.list_layers()?;
        let descriptor = layers
            .iter()
            .find(|l| l.name.eq_ignore_ascii_case(name.trim()))
            .ok_or_else(|| ArcGisError::LayerNotFound {
                layer: format!("'{}'", name),
                available: layers.iter().map(|l| l.id).collect(),
            })?;
        self.resolve_layer(descriptor)
    }

    fn resolve_layer(&self, descriptor: &LayerDescriptor) -> Result<LayerHandle<'_>> {
        if let Some(geometry_type) = descriptor.geometry_type {
            return Ok(LayerHandle::new(
                self,
                descriptor.id,
                descriptor.name.clone(),
                geometry_type,
                LazyMetadata::new(),
            ));
        }

        // The listing did not say; the layer document always does for feature layers
        let (geometry_type, metadata) = fetch_layer_metadata(self, descriptor.id)?;
        let geometry_type = geometry_type.ok_or_else(|| {
            ArcGisError::malformed(
                redact_token(&self.endpoint(&[descriptor.id.to_string().as_str()], &[])),
                format!("layer {} has no supported geometry type", descriptor.id),
            )
        })?;
        Ok(LayerHandle::new(
            self,
            descriptor.id,
            descriptor.name.clone(),
            geometry_type,
            LazyMetadata::with_value(metadata),
        ))
    }

    fn fetch_service_metadata(&self) -> Result<ServiceMetadata> {
        let url = self.endpoint(&[], &[]);
        let shown = redact_token(&url);
        let info: ServiceInfo = self.fetch_metadata(&url)?;

        let mut layers: Vec<LayerDescriptor> = Vec::with_capacity(info.layers.len());
        for layer in info.layers {
            if layers.iter().any(|l| l.id == layer.id) {
                return Err(ArcGisError::malformed(
                    shown,
                    format!("layer id {} listed twice", layer.id),
                ));
            }
            let geometry_type = layer.geometry_type.as_deref().and_then(GeometryType::from_esri);
            if geometry_type.is_none() {
                debug!(layer = layer.id, raw = ?layer.geometry_type, "layer geometry type not listed");
            }
            layers.push(LayerDescriptor {
                id: layer.id,
                name: layer.name,
                geometry_type,
            });
        }

        info!(url = %shown, layers = layers.len(), "service metadata loaded");
        Ok(ServiceMetadata {
            layers,
            max_record_count: info.max_record_count,
            current_version: info.current_version,
            description: info.service_description.filter(|d| !d.is_empty()),
        })
    }

    /// `{base}/{segments..}?f=json&{params}&token=..`
    pub(crate) fn endpoint(&self, segments: &[&str], params: &[(&str, String)]) -> Url {
        let mut url = self.base_url.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.extend(segments);
        }
        {
            let mut query = url.query_pairs_mut();
            query.append_pair("f", "json");
            for (key, value) in params {
                query.append_pair(key, value);
            }
            if let Some(token) = &self.config.token {
                query.append_pair("token", token);
            }
        }
        url
    }

    /// GET and parse, keeping the service's own error block separate
    pub(crate) fn fetch<T: DeserializeOwned>(
        &self,
        url: &Url,
    ) -> Result<std::result::Result<T, ServiceErrorBody>> {
        let shown = redact_token(url);
        debug!(url = %shown, "ArcGIS request");
        let body = self
            .client
            .get(url)
            .map_err(|e| ArcGisError::unavailable(shown.clone(), e))?;
        parse_body(&shown, &body)
    }

    /// GET a metadata document; a service error block means the service is unavailable to us
    pub(crate) fn fetch_metadata<T: DeserializeOwned>(&self, url: &Url) -> Result<T> {
        self.fetch(url)?.map_err(|e| ArcGisError::ServiceUnavailable {
            url: redact_token(url),
            message: format!("service error {}: {}", e.code, e.message),
        })
    }
}

impl fmt::Debug for ServiceHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceHandle")
            .field("base_url", &self.base_url.as_str())
            .field("default_layer", &self.default_layer)
            .field("config", &self.config)
            .field("metadata_loaded", &self.metadata.get().is_some())
            .finish()
    }
}

/// Validate a service URL and reduce it to `scheme://host/.../FeatureServer`
///
/// A trailing numeric segment (a layer URL) is split off and returned.
fn normalize_endpoint(raw: &str) -> Result<(Url, Option<u32>)> {
    let invalid = |reason: String| ArcGisError::InvalidEndpoint {
        url: raw.to_string(),
        reason,
    };

    let mut url = Url::parse(raw.trim()).map_err(|e| invalid(e.to_string()))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(invalid(format!("unsupported scheme '{}'", url.scheme())));
    }
    if url.host_str().map_or(true, str::is_empty) {
        return Err(invalid("missing host".to_string()));
    }

    url.set_query(None);
    url.set_fragment(None);
    let mut path = url.path().trim_end_matches('/').to_string();

    let mut layer = None;
    if let Some((service, last)) = path.rsplit_once('/') {
        if let Ok(id) = last.parse::<u32>() {
            layer = Some(id);
            path = service.trim_end_matches('/').to_string();
        }
    }

    let last = path.rsplit('/').next().unwrap_or_default();
    if !(last.eq_ignore_ascii_case("FeatureServer") || last.eq_ignore_ascii_case("MapServer")) {
        return Err(invalid(
            "path must end with /FeatureServer or /MapServer, optionally followed by a layer id"
                .to_string(),
        ));
    }
    url.set_path(&path);
    Ok((url, layer))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_strips_query_and_slash() {
        let (url, layer) = normalize_endpoint(
            "https://services.arcgis.com/org/arcgis/rest/services/Storms/FeatureServer/?f=pjson",
        )
        .unwrap();
        assert_eq!(
            url.as_str(),
            "https://services.arcgis.com/org/arcgis/rest/services/Storms/FeatureServer"
        );
        assert_eq!(layer, None);
    }

    #[test]
    fn test_normalize_splits_layer_url() {
        let (url, layer) = normalize_endpoint(
            "https://services.arcgis.com/org/arcgis/rest/services/Storms/FeatureServer/0/",
        )
        .unwrap();
        assert_eq!(
            url.as_str(),
            "https://services.arcgis.com/org/arcgis/rest/services/Storms/FeatureServer"
        );
        assert_eq!(layer, Some(0));

        let (_, layer) = normalize_endpoint("http://host/arcgis/rest/services/Parcels/MapServer/12?f=json").unwrap();
        assert_eq!(layer, Some(12));
    }

    #[test]
    fn test_normalize_accepts_mapserver_any_case() {
        assert!(normalize_endpoint("http://host/arcgis/rest/services/Parcels/mapserver").is_ok());
    }

    #[test]
    fn test_normalize_rejects_bad_urls() {
        for raw in [
            "not a url",
            "ftp://host/arcgis/rest/services/Storms/FeatureServer",
            "https://host/arcgis/rest/services/Storms",
            "https://host/arcgis/rest/services/Storms/FeatureServer/0/query",
            "https://host/arcgis/rest/services/Storms/7",
            "",
        ] {
            assert!(
                matches!(normalize_endpoint(raw), Err(ArcGisError::InvalidEndpoint { .. })),
                "{raw} should be rejected"
            );
        }
    }
}
