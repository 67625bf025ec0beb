use serde::{Deserialize, Serialize};

/// Spatial reference of a service, identified by its well-known id (EPSG code)
/// Services answer `outSR` / `inSR` parameters with this id
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpatialReference {
    pub wkid: i32,
}

impl SpatialReference {
    pub const WGS84: SpatialReference = SpatialReference { wkid: 4326 };
    pub const WEB_MERCATOR: SpatialReference = SpatialReference { wkid: 3857 };

    pub fn new(wkid: i32) -> Self {
        SpatialReference { wkid }
    }

    pub fn get_wkid(&self) -> i32 {
        self.wkid
    }
}

impl Default for SpatialReference {
    fn default() -> Self {
        SpatialReference::WGS84
    }
}

/// Bounding box structure
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingBox {
    pub min_x: f64, // min longitude
    pub min_y: f64, // min latitude
    pub max_x: f64, // max longitude
    pub max_y: f64, // max latitude
}

impl BoundingBox {
    pub fn new(min_x: f64, min_y: f64, max_x: f64, max_y: f64) -> Self {
        BoundingBox {
            min_x,
            min_y,
            max_x,
            max_y,
        }
    }

    /// Envelope in the `xmin,ymin,xmax,ymax` form expected by the `geometry`
    /// query parameter (with `geometryType=esriGeometryEnvelope`)
    pub fn to_envelope_param(&self) -> String {
        format!(
            "{},{},{},{}",
            self.min_x, self.min_y, self.max_x, self.max_y
        )
    }

    pub fn is_valid(&self) -> bool {
        [self.min_x, self.min_y, self.max_x, self.max_y]
            .iter()
            .all(|v| v.is_finite())
            && self.min_x <= self.max_x
            && self.min_y <= self.max_y
    }
}

impl From<BoundingBox> for geo::Rect<f64> {
    fn from(bbox: BoundingBox) -> Self {
        geo::Rect::new(
            geo::coord! { x: bbox.min_x, y: bbox.min_y },
            geo::coord! { x: bbox.max_x, y: bbox.max_y },
        )
    }
}
