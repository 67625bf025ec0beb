use std::collections::{HashMap, HashSet};

use serde_json::{Map, Value};
use tracing::{debug, info, warn};

use crate::collect::arcgis::field::FieldDescriptor;
use crate::collect::arcgis::layer::LayerHandle;
use crate::collect::arcgis::response::{FeatureJson, QueryResponse};
use crate::collect::global_variables::MATCH_ALL_WHERE;
use crate::collect::http::redact_token;
use crate::commons::basic_functions::join_field_names;
use crate::error::{ArcGisError, Result};
use crate::geo_core::{BoundingBox, SpatialReference};
use crate::geometric::geometry::{parse_esri_geometry, GeometryType};
use crate::geometric::record::{QueryResult, Record};
use crate::geometric::value::AttributeValue;

/// Builder for a `{layer}/query` request
///
/// Requested field names are checked against the layer's catalog before the
/// query is sent; the filter is passed through untouched.
#[derive(Debug, Clone)]
pub struct Query<'a> {
    layer: &'a LayerHandle<'a>,
    fields: Vec<String>,
    filter: Option<String>,
    bbox: Option<(BoundingBox, SpatialReference)>,
    out_sr: Option<SpatialReference>,
    order_by: Vec<String>,
    return_geometry: bool,
    page_size: Option<u32>,
}

/// One response worth of converted records
struct Page {
    records: Vec<Record>,
    /// Raw object id of each record, before projection
    object_ids: Vec<Option<i64>>,
    spatial_reference: Option<SpatialReference>,
    exceeded_transfer_limit: bool,
}

impl<'a> Query<'a> {
    pub(crate) fn new(layer: &'a LayerHandle<'a>) -> Self {
        Query {
            layer,
            fields: Vec::new(),
            filter: None,
            bbox: None,
            out_sr: None,
            order_by: Vec::new(),
            return_geometry: true,
            page_size: None,
        }
    }

    /// Fields to return; an empty list means all fields
    pub fn fields<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.fields = fields.into_iter().map(Into::into).collect();
        self
    }

    /// `where` clause evaluated by the service
    pub fn filter(mut self, filter: impl Into<String>) -> Self {
        self.filter = Some(filter.into());
        self
    }

    /// Keep only records intersecting `bbox`, expressed in `sr`
    pub fn bbox(mut self, bbox: BoundingBox, sr: SpatialReference) -> Self {
        self.bbox = Some((bbox, sr));
        self
    }

    /// Spatial reference of returned geometries (overrides the client config)
    pub fn out_sr(mut self, sr: SpatialReference) -> Self {
        self.out_sr = Some(sr);
        self
    }

    /// Sort clause such as `"INTENSITY DESC"`; may be repeated
    pub fn order_by(mut self, clause: impl Into<String>) -> Self {
        self.order_by.push(clause.into());
        self
    }

    pub fn return_geometry(mut self, return_geometry: bool) -> Self {
        self.return_geometry = return_geometry;
        self
    }

    /// Follow truncated responses with `resultOffset` paging
    pub fn paged(mut self, page_size: u32) -> Self {
        self.page_size = Some(page_size.max(1));
        self
    }

    pub fn execute(self) -> Result<QueryResult> {
        let layer = self.layer;
        let metadata = layer.metadata()?;
        let catalog = &metadata.catalog;

        let columns: Vec<FieldDescriptor> = if self.fields.is_empty() {
            catalog.as_slice().to_vec()
        } else {
            catalog.resolve(&self.fields, layer.id())?
        };

        let mut order_by = Vec::with_capacity(self.order_by.len());
        for clause in &self.order_by {
            let mut words = clause.split_whitespace();
            let name = words.next().unwrap_or_default();
            let field = catalog
                .get(name)
                .ok_or_else(|| ArcGisError::InvalidFieldName {
                    field: name.to_string(),
                    layer_id: layer.id(),
                })?;
            let direction: Vec<&str> = words.collect();
            if direction.is_empty() {
                order_by.push(field.name.clone());
            } else {
                order_by.push(format!("{} {}", field.name, direction.join(" ")));
            }
        }

        if let Some((bbox, _)) = &self.bbox {
            if !bbox.is_valid() {
                return Err(ArcGisError::InvalidBoundingBox(*bbox));
            }
        }

        let config = layer.service().config();
        let mut page_size = self.page_size.or(config.page_size);
        if page_size.is_some() && metadata.supports_pagination == Some(false) {
            warn!(layer = layer.id(), "layer does not support pagination, sending a single request");
            page_size = None;
        }
        let out_sr = self.out_sr.or(config.out_sr);

        let where_clause = self
            .filter
            .as_deref()
            .map(str::trim)
            .filter(|f| !f.is_empty())
            .unwrap_or(MATCH_ALL_WHERE)
            .to_string();
        let out_fields = if self.fields.is_empty() {
            "*".to_string()
        } else {
            join_field_names(&columns.iter().map(|f| f.name.as_str()).collect::<Vec<_>>())
        };

        let mut params: Vec<(&str, String)> = vec![
            ("where", where_clause),
            ("outFields", out_fields),
            ("returnGeometry", self.return_geometry.to_string()),
        ];
        if let Some(sr) = out_sr {
            params.push(("outSR", sr.wkid.to_string()));
        }
        if let Some((bbox, sr)) = &self.bbox {
            params.push(("geometry", bbox.to_envelope_param()));
            params.push(("geometryType", "esriGeometryEnvelope".to_string()));
            params.push(("spatialRel", "esriSpatialRelIntersects".to_string()));
            params.push(("inSR", sr.wkid.to_string()));
        }
        if order_by.is_empty() && page_size.is_some() {
            // Stable order across pages
            if let Some(oid) = &metadata.object_id_field {
                order_by.push(oid.clone());
            }
        }
        if !order_by.is_empty() {
            params.push(("orderByFields", order_by.join(",")));
        }

        let object_id_field = metadata.object_id_field.as_deref();
        let mut records: Vec<Record> = Vec::new();
        let mut seen_ids: HashSet<i64> = HashSet::new();
        let mut previous_page_start = 0;
        let mut spatial_reference = None;
        let mut exceeded_transfer_limit = false;
        let mut offset: u64 = 0;

        loop {
            let mut page_params = params.clone();
            if let Some(size) = page_size {
                page_params.push(("resultOffset", offset.to_string()));
                page_params.push(("resultRecordCount", size.to_string()));
            }

            let page = self.fetch_page(&page_params, &columns, object_id_field)?;
            let count = page.records.len();
            spatial_reference = spatial_reference.or(page.spatial_reference);

            // Services that ignore resultOffset send the same page again
            if offset > 0 && page.repeats(&records[previous_page_start..], &seen_ids) {
                warn!(
                    layer = layer.id(),
                    offset,
                    "server ignored resultOffset and repeated a page, stopping"
                );
                exceeded_transfer_limit = true;
                break;
            }
            seen_ids.extend(page.object_ids.iter().flatten());
            previous_page_start = records.len();
            records.extend(page.records);

            match page_size {
                Some(_) if page.exceeded_transfer_limit && count > 0 => {
                    offset += count as u64;
                    debug!(layer = layer.id(), offset, "fetching next page");
                }
                Some(_) => break,
                None => {
                    exceeded_transfer_limit = page.exceeded_transfer_limit;
                    break;
                }
            }
        }

        if exceeded_transfer_limit {
            warn!(
                layer = layer.id(),
                records = records.len(),
                "server truncated the result (exceededTransferLimit)"
            );
        }
        info!(layer = layer.id(), records = records.len(), "query complete");

        Ok(QueryResult {
            layer_id: layer.id(),
            geometry_type: layer.geometry_type(),
            fields: columns,
            records,
            spatial_reference,
            exceeded_transfer_limit,
        })
    }

    fn fetch_page(
        &self,
        params: &[(&str, String)],
        columns: &[FieldDescriptor],
        object_id_field: Option<&str>,
    ) -> Result<Page> {
        let layer = self.layer;
        let service = layer.service();
        let url = service.endpoint(&[layer.id().to_string().as_str(), "query"], params);
        let shown = redact_token(&url);

        let response: QueryResponse = service.fetch(&url)?.map_err(|e| {
            ArcGisError::QueryRejected {
                code: e.code,
                message: e.message,
                details: e.details,
            }
        })?;

        if self.return_geometry {
            if let Some(raw) = &response.geometry_type {
                if GeometryType::from_esri(raw) != Some(layer.geometry_type()) {
                    return Err(ArcGisError::malformed(
                        shown,
                        format!(
                            "layer {} is {} but the query returned {}",
                            layer.id(),
                            layer.geometry_type().as_esri(),
                            raw
                        ),
                    ));
                }
            }
        }

        let object_ids = response
            .features
            .iter()
            .map(|feature| {
                object_id_field
                    .and_then(|name| attribute(&feature.attributes, name))
                    .and_then(Value::as_i64)
            })
            .collect();

        let records = response
            .features
            .into_iter()
            .enumerate()
            .map(|(i, feature)| {
                convert_feature(feature, columns, layer.geometry_type(), self.return_geometry)
                    .map_err(|msg| ArcGisError::malformed(shown.clone(), format!("feature {}: {}", i, msg)))
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Page {
            records,
            object_ids,
            spatial_reference: response
                .spatial_reference
                .and_then(|sr| sr.latest_wkid.or(sr.wkid))
                .map(SpatialReference::new),
            exceeded_transfer_limit: response.exceeded_transfer_limit,
        })
    }
}

impl Page {
    /// Whether this page brings nothing new: every object id was already
    /// fetched or, without ids, the records equal the previous page
    fn repeats(&self, previous: &[Record], seen_ids: &HashSet<i64>) -> bool {
        if self.records.is_empty() {
            return false;
        }
        if self.object_ids.iter().all(Option::is_some) {
            self.object_ids.iter().flatten().all(|id| seen_ids.contains(id))
        } else {
            self.records.as_slice() == previous
        }
    }
}

/// Attribute by name, falling back to a case-insensitive match
fn attribute<'a>(attributes: &'a Map<String, Value>, name: &str) -> Option<&'a Value> {
    attributes.get(name).or_else(|| {
        attributes
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v)
    })
}

/// Project a feature onto `columns` and convert its geometry
///
/// Attributes not in `columns` are dropped; columns the service left out are `Null`.
fn convert_feature(
    feature: FeatureJson,
    columns: &[FieldDescriptor],
    geometry_type: GeometryType,
    return_geometry: bool,
) -> std::result::Result<Record, String> {
    let mut attributes = HashMap::with_capacity(columns.len());
    for field in columns {
        let value = attribute(&feature.attributes, &field.name)
            .map(|v| AttributeValue::from_json(v, &field.field_type))
            .unwrap_or(AttributeValue::Null);
        attributes.insert(field.name.clone(), value);
    }

    let geometry = match (return_geometry, &feature.geometry) {
        (true, Some(value)) => parse_esri_geometry(value, geometry_type)?,
        _ => None,
    };

    Ok(Record {
        attributes,
        geometry,
    })
}
