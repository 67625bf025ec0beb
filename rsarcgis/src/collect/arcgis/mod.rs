//! ArcGIS REST feature-service access
//!
//! `ServiceHandle` (endpoint + cached layer listing) → `LayerHandle`
//! (typed layer + cached field catalog) → `Query` / `select` (records and
//! geometries of one layer).

pub mod field;
pub mod layer;
mod lazy;
pub mod query;
pub(crate) mod response;
pub mod service;


pub use field::{FieldCatalog, FieldDescriptor, FieldType};
pub use layer::{LayerHandle, LayerMetadata};
pub use query::Query;
pub use service::{LayerDescriptor, ServiceHandle, ServiceMetadata};
