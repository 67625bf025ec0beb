//! Esri JSON geometries to `geo` types
//!
//! Layers declare one of four geometry types; each record's geometry is
//! checked against it and converted to the matching multi-part `geo` type
//! (points stay single points).

use std::fmt;

use geo::{Contains, Coord, Geometry, LineString, MultiLineString, MultiPoint, MultiPolygon, Point, Polygon, Winding};
use serde::Serialize;
use serde_json::Value;

/// Geometry type of a layer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum GeometryType {
    Point,
    Multipoint,
    Polyline,
    Polygon,
}

impl GeometryType {
    pub fn from_esri(raw: &str) -> Option<Self> {
        match raw {
            "esriGeometryPoint" => Some(GeometryType::Point),
            "esriGeometryMultipoint" => Some(GeometryType::Multipoint),
            "esriGeometryPolyline" => Some(GeometryType::Polyline),
            "esriGeometryPolygon" => Some(GeometryType::Polygon),
            _ => None,
        }
    }

    pub fn as_esri(&self) -> &'static str {
        match self {
            GeometryType::Point => "esriGeometryPoint",
            GeometryType::Multipoint => "esriGeometryMultipoint",
            GeometryType::Polyline => "esriGeometryPolyline",
            GeometryType::Polygon => "esriGeometryPolygon",
        }
    }
}

impl fmt::Display for GeometryType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            GeometryType::Point => "Point",
            GeometryType::Multipoint => "Multipoint",
            GeometryType::Polyline => "Polyline",
            GeometryType::Polygon => "Polygon",
        };
        write!(f, "{}", name)
    }
}

/// Convert one Esri JSON geometry
///
/// `Ok(None)` is an empty geometry (null, NaN point, no parts). Anything
/// present but not shaped like `geometry_type` is an error.
pub fn parse_esri_geometry(
    value: &Value,
    geometry_type: GeometryType,
) -> Result<Option<Geometry<f64>>, String> {
    if value.is_null() {
        return Ok(None);
    }
    let obj = value
        .as_object()
        .ok_or_else(|| "geometry is not an object".to_string())?;

    match geometry_type {
        GeometryType::Point => {
            let (Some(x), Some(y)) = (obj.get("x"), obj.get("y")) else {
                return Err("point geometry without x/y".to_string());
            };
            // Empty points come back as {"x": null} or {"x": "NaN"}
            match (x.as_f64(), y.as_f64()) {
                (Some(x), Some(y)) if x.is_finite() && y.is_finite() => {
                    Ok(Some(Geometry::Point(Point::new(x, y))))
                }
                _ if is_empty_ordinate(x) => Ok(None),
                _ => Err(format!("invalid point coordinates ({}, {})", x, y)),
            }
        }
        GeometryType::Multipoint => {
            let points = coord_list(member(obj, "points")?)?;
            if points.is_empty() {
                return Ok(None);
            }
            Ok(Some(Geometry::MultiPoint(MultiPoint::new(
                points.into_iter().map(Point::from).collect(),
            ))))
        }
        GeometryType::Polyline => {
            let mut lines = Vec::new();
            for path in parts(member(obj, "paths")?)? {
                let coords = coord_list(path)?;
                if coords.len() < 2 {
                    return Err(format!("path with {} vertex", coords.len()));
                }
                lines.push(LineString::new(coords));
            }
            if lines.is_empty() {
                return Ok(None);
            }
            Ok(Some(Geometry::MultiLineString(MultiLineString::new(lines))))
        }
        GeometryType::Polygon => {
            let mut rings = Vec::new();
            for ring in parts(member(obj, "rings")?)? {
                let coords = coord_list(ring)?;
                if coords.len() < 3 {
                    return Err(format!("ring with {} vertices", coords.len()));
                }
                let mut ring = LineString::new(coords);
                ring.close();
                rings.push(ring);
            }
            if rings.is_empty() {
                return Ok(None);
            }
            Ok(Some(Geometry::MultiPolygon(assemble_polygons(rings))))
        }
    }
}

fn is_empty_ordinate(value: &Value) -> bool {
    value.is_null() || value.as_str() == Some("NaN") || value.as_f64().is_some_and(f64::is_nan)
}

fn member<'a>(obj: &'a serde_json::Map<String, Value>, key: &str) -> Result<&'a Value, String> {
    obj.get(key)
        .ok_or_else(|| format!("geometry has no '{}' member", key))
}

fn parts(value: &Value) -> Result<&Vec<Value>, String> {
    value
        .as_array()
        .ok_or_else(|| "geometry parts are not an array".to_string())
}

/// `[[x, y(, z, m)], ...]`; extra ordinates are dropped
fn coord_list(value: &Value) -> Result<Vec<Coord<f64>>, String> {
    parts(value)?
        .iter()
        .map(|pair| {
            let ordinates = pair
                .as_array()
                .ok_or_else(|| "vertex is not an array".to_string())?;
            match (
                ordinates.first().and_then(Value::as_f64),
                ordinates.get(1).and_then(Value::as_f64),
            ) {
                (Some(x), Some(y)) if x.is_finite() && y.is_finite() => Ok(Coord { x, y }),
                _ => Err(format!("invalid vertex {}", pair)),
            }
        })
        .collect()
}

/// Group Esri rings into polygons
///
/// Exterior rings are clockwise, holes counter-clockwise. A hole belongs to
/// the first exterior containing its first vertex; orphan holes are kept as
/// exteriors so no coordinates are lost.
fn assemble_polygons(rings: Vec<LineString<f64>>) -> MultiPolygon<f64> {
    let (exteriors, holes): (Vec<_>, Vec<_>) = rings.into_iter().partition(|r| !r.is_ccw());

    let mut polygons: Vec<Polygon<f64>> = exteriors
        .into_iter()
        .map(|ring| Polygon::new(ring, Vec::new()))
        .collect();

    for hole in holes {
        let vertex = hole.0.first().copied().map(Point::from);
        let owner = vertex.and_then(|p| {
            polygons
                .iter_mut()
                .find(|poly| Polygon::new(poly.exterior().clone(), Vec::new()).contains(&p))
        });
        match owner {
            Some(polygon) => polygon.interiors_push(hole),
            None => polygons.push(Polygon::new(hole, Vec::new())),
        }
    }

    MultiPolygon::new(polygons)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_geometry_type_from_esri() {
        assert_eq!(GeometryType::from_esri("esriGeometryPoint"), Some(GeometryType::Point));
        assert_eq!(GeometryType::from_esri("esriGeometryEnvelope"), None);
        assert_eq!(GeometryType::Polygon.as_esri(), "esriGeometryPolygon");
    }

    #[test]
    fn test_point() {
        let geom = parse_esri_geometry(&json!({"x": 57.3, "y": -15.2}), GeometryType::Point)
            .unwrap()
            .unwrap();
        assert_eq!(geom, Geometry::Point(Point::new(57.3, -15.2)));
    }

    #[test]
    fn test_empty_point_is_none() {
        assert_eq!(parse_esri_geometry(&json!({"x": "NaN", "y": "NaN"}), GeometryType::Point), Ok(None));
        assert_eq!(parse_esri_geometry(&json!({"x": null, "y": null}), GeometryType::Point), Ok(None));
        assert_eq!(parse_esri_geometry(&Value::Null, GeometryType::Point), Ok(None));
    }

    #[test]
    fn test_wrong_shape_is_error() {
        assert!(parse_esri_geometry(&json!({"paths": [[[0, 0], [1, 1]]]}), GeometryType::Point).is_err());
        assert!(parse_esri_geometry(&json!({"x": 1.0, "y": 2.0}), GeometryType::Polyline).is_err());
        assert!(parse_esri_geometry(&json!({"paths": [[[0, 0]]]}), GeometryType::Polyline).is_err());
        assert!(parse_esri_geometry(&json!({"points": [[0]]}), GeometryType::Multipoint).is_err());
    }

    #[test]
    fn test_polyline_drops_z() {
        let geom = parse_esri_geometry(
            &json!({"hasZ": true, "paths": [[[0, 0, 5], [1, 1, 6], [2, 0, 7]]]}),
            GeometryType::Polyline,
        )
        .unwrap()
        .unwrap();
        match geom {
            Geometry::MultiLineString(mls) => {
                assert_eq!(mls.0.len(), 1);
                assert_eq!(mls.0[0].0.len(), 3);
                assert_eq!(mls.0[0].0[2], Coord { x: 2.0, y: 0.0 });
            }
            other => panic!("unexpected geometry {:?}", other),
        }
    }

    #[test]
    fn test_polygon_with_hole() {
        // Clockwise exterior, counter-clockwise hole
        let geom = parse_esri_geometry(
            &json!({"rings": [
                [[0, 0], [0, 10], [10, 10], [10, 0], [0, 0]],
                [[2, 2], [4, 2], [4, 4], [2, 4], [2, 2]]
            ]}),
            GeometryType::Polygon,
        )
        .unwrap()
        .unwrap();
        match geom {
            Geometry::MultiPolygon(mp) => {
                assert_eq!(mp.0.len(), 1);
                assert_eq!(mp.0[0].interiors().len(), 1);
            }
            other => panic!("unexpected geometry {:?}", other),
        }
    }

    #[test]
    fn test_two_exteriors_and_unclosed_ring() {
        let geom = parse_esri_geometry(
            &json!({"rings": [
                [[0, 0], [0, 1], [1, 1], [1, 0]],
                [[5, 5], [5, 6], [6, 6], [6, 5], [5, 5]]
            ]}),
            GeometryType::Polygon,
        )
        .unwrap()
        .unwrap();
        match geom {
            Geometry::MultiPolygon(mp) => {
                assert_eq!(mp.0.len(), 2);
                assert!(mp.0[0].exterior().is_closed());
            }
            other => panic!("unexpected geometry {:?}", other),
        }
    }

    #[test]
    fn test_empty_parts_are_none() {
        assert_eq!(parse_esri_geometry(&json!({"rings": []}), GeometryType::Polygon), Ok(None));
        assert_eq!(parse_esri_geometry(&json!({"points": []}), GeometryType::Multipoint), Ok(None));
    }
}
