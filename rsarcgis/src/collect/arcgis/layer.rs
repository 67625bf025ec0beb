use tracing::debug;

use crate::collect::arcgis::field::FieldCatalog;
use crate::collect::arcgis::lazy::LazyMetadata;
use crate::collect::arcgis::query::Query;
use crate::collect::arcgis::response::LayerDetail;
use crate::collect::arcgis::service::ServiceHandle;
use crate::collect::http::redact_token;
use crate::error::{ArcGisError, Result};
use crate::geometric::geometry::GeometryType;
use crate::geometric::record::QueryResult;

/// Layer document from `GET {service}/{layer}?f=json`
#[derive(Debug, Clone, PartialEq)]
pub struct LayerMetadata {
    pub catalog: FieldCatalog,
    pub max_record_count: Option<u32>,
    pub object_id_field: Option<String>,
    /// `advancedQueryCapabilities.supportsPagination`; `None` when not advertised
    pub supports_pagination: Option<bool>,
}

/// One typed layer of a service, borrowed from its `ServiceHandle`
#[derive(Debug)]
pub struct LayerHandle<'a> {
    service: &'a ServiceHandle,
    id: u32,
    name: String,
    geometry_type: GeometryType,
    metadata: LazyMetadata<LayerMetadata>,
}

impl<'a> LayerHandle<'a> {
    pub(crate) fn new(
        service: &'a ServiceHandle,
        id: u32,
        name: String,
        geometry_type: GeometryType,
        metadata: LazyMetadata<LayerMetadata>,
    ) -> Self {
        LayerHandle {
            service,
            id,
            name,
            geometry_type,
            metadata,
        }
    }

    pub fn id(&self) -> u32 {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn geometry_type(&self) -> GeometryType {
        self.geometry_type
    }

    pub fn service(&self) -> &'a ServiceHandle {
        self.service
    }

    /// Layer document (field catalog, record limit, object id field), fetched once
    pub fn metadata(&self) -> Result<&LayerMetadata> {
        self.metadata.get_or_try_init(|| {
            fetch_layer_metadata(self.service, self.id).map(|(_, metadata)| metadata)
        })
    }

    /// Attribute schema of the layer, in service order
    pub fn fields(&self) -> Result<&FieldCatalog> {
        Ok(&self.metadata()?.catalog)
    }

    /// Start a query with more options than [`LayerHandle::select`]
    pub fn query(&self) -> Query<'_> {
        Query::new(self)
    }

    /// Fetch records with the given fields (all when `None`) matching `filter`
    /// (all records when `None`)
    ///
    /// The filter is a SQL-like `where` clause passed to the service as is,
    /// e.g. `STORMNAME = 'Djoungou'`.
    pub fn select(&self, fields: Option<&[&str]>, filter: Option<&str>) -> Result<QueryResult> {
        let mut query = self.query();
        if let Some(fields) = fields {
            query = query.fields(fields.iter().copied());
        }
        if let Some(filter) = filter {
            query = query.filter(filter);
        }
        query.execute()
    }
}

/// Fetch and parse a layer document
///
/// Also returns the declared geometry type, which the service listing may omit.
pub(crate) fn fetch_layer_metadata(
    service: &ServiceHandle,
    id: u32,
) -> Result<(Option<GeometryType>, LayerMetadata)> {
    let url = service.endpoint(&[id.to_string().as_str()], &[]);
    let shown = redact_token(&url);
    let detail: LayerDetail = service.fetch_metadata(&url)?;

    let fields = detail
        .fields
        .ok_or_else(|| ArcGisError::malformed(shown.clone(), format!("layer {} has no field list", id)))?;
    let catalog = FieldCatalog::from_wire(&shown, fields)?;
    debug!(layer = id, fields = catalog.len(), "field catalog loaded");

    let geometry_type = detail.geometry_type.as_deref().and_then(GeometryType::from_esri);
    Ok((
        geometry_type,
        LayerMetadata {
            catalog,
            max_record_count: detail.max_record_count,
            object_id_field: detail.object_id_field,
            supports_pagination: detail
                .advanced_query_capabilities
                .and_then(|c| c.supports_pagination),
        },
    ))
}
