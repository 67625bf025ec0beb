//! Typed client for ArcGIS FeatureServer / MapServer layers.
//!
//! Open a service, pick a layer, and fetch records (attributes + geometry)
//! filtered by a `where` clause. Results convert to GeoJSON or CSV for
//! tables and maps.
//!
//! ```no_run
//! use rsarcgis::ServiceHandle;
//!
//! let service = ServiceHandle::open(
//!     "https://services.arcgis.com/org/arcgis/rest/services/Storms/FeatureServer",
//!     None,
//! )?;
//! let positions = service.layer(0)?;
//! let result = positions.select(
//!     Some(&["STORMNAME", "INTENSITY", "YEAR", "MONTH", "DAY", "HHMM"]),
//!     Some("STORMNAME = 'Djoungou'"),
//! )?;
//! println!("{} positions", result.len());
//! # Ok::<(), rsarcgis::ArcGisError>(())
//! ```

pub mod collect;
pub mod commons;
pub mod error;
pub mod geo_core;
pub mod geometric;

pub use collect::arcgis::{
    FieldCatalog, FieldDescriptor, FieldType, LayerDescriptor, LayerHandle, LayerMetadata, Query,
    ServiceHandle, ServiceMetadata,
};
pub use collect::config::ClientConfig;
pub use collect::http::{HttpClient, ReqwestClient, TransportError};
pub use error::{ArcGisError, Result};
pub use geo_core::{BoundingBox, SpatialReference};
pub use geometric::geometry::GeometryType;
pub use geometric::record::{QueryResult, Record};
pub use geometric::value::AttributeValue;
