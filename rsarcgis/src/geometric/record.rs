use std::collections::HashMap;
use std::path::Path;

use geojson::{Feature, FeatureCollection, GeoJson};
use serde_json::Map;
use tracing::info;

use crate::collect::arcgis::field::FieldDescriptor;
use crate::error::Result;
use crate::geo_core::SpatialReference;
use crate::geometric::geometry::GeometryType;
use crate::geometric::value::AttributeValue;

static NULL: AttributeValue = AttributeValue::Null;

/// One feature returned by a query: its attributes and (optional) geometry
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    pub attributes: HashMap<String, AttributeValue>,
    pub geometry: Option<geo::Geometry<f64>>,
}

impl Record {
    /// Attribute by canonical field name (`Null` and absent both read as `None`)
    pub fn get(&self, field: &str) -> Option<&AttributeValue> {
        self.attributes.get(field).filter(|v| !v.is_null())
    }

    pub fn point(&self) -> Option<geo::Point<f64>> {
        match self.geometry {
            Some(geo::Geometry::Point(p)) => Some(p),
            _ => None,
        }
    }
}

/// Records of one query, with the ordered column list for tabular output
#[derive(Debug, Clone, PartialEq)]
pub struct QueryResult {
    pub layer_id: u32,
    pub geometry_type: GeometryType,
    /// Columns in request order (catalog order when all fields were requested)
    pub fields: Vec<FieldDescriptor>,
    pub records: Vec<Record>,
    pub spatial_reference: Option<SpatialReference>,
    /// The server truncated the result and paging was not enabled
    pub exceeded_transfer_limit: bool,
}

impl QueryResult {
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Record> {
        self.records.iter()
    }

    pub fn column_names(&self) -> Vec<&str> {
        self.fields.iter().map(|f| f.name.as_str()).collect()
    }

    /// One column's values in record order, `None` if the column was not requested
    pub fn column(&self, name: &str) -> Option<Vec<&AttributeValue>> {
        let field = self
            .fields
            .iter()
            .find(|f| f.name.eq_ignore_ascii_case(name))?;
        Some(
            self.records
                .iter()
                .map(|r| r.attributes.get(&field.name).unwrap_or(&NULL))
                .collect(),
        )
    }

    /// Convert to a GeoJSON FeatureCollection
    pub fn to_feature_collection(&self) -> FeatureCollection {
        let features = self
            .records
            .iter()
            .map(|record| {
                let mut properties = Map::new();
                for field in &self.fields {
                    let value = record
                        .attributes
                        .get(&field.name)
                        .map(AttributeValue::to_json)
                        .unwrap_or(serde_json::Value::Null);
                    properties.insert(field.name.clone(), value);
                }
                Feature {
                    bbox: None,
                    geometry: record
                        .geometry
                        .as_ref()
                        .map(|g| geojson::Geometry::new(geojson::Value::from(g))),
                    id: None,
                    properties: Some(properties),
                    foreign_members: None,
                }
            })
            .collect();

        FeatureCollection {
            bbox: None,
            features,
            foreign_members: None,
        }
    }

    /// Save to a GeoJSON file
    pub fn to_geojson(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let geojson = GeoJson::from(self.to_feature_collection());
        std::fs::write(path, geojson.to_string())?;
        info!(path = %path.display(), records = self.records.len(), "GeoJSON saved");
        Ok(())
    }

    /// Write the table: one header row of column names, one row per record.
    /// Point layers get trailing `x`,`y` columns (`geom_x`,`geom_y` when the
    /// layer already has such attributes).
    #[cfg(feature = "csv")]
    pub fn write_csv<W: std::io::Write>(&self, writer: W) -> Result<()> {
        let with_xy = self.geometry_type == GeometryType::Point;
        let mut wtr = csv::Writer::from_writer(writer);

        let mut header: Vec<String> = self.fields.iter().map(|f| f.name.clone()).collect();
        if with_xy {
            let (x, y) = self.coordinate_headers();
            header.extend([x, y]);
        }
        wtr.write_record(&header)?;

        for record in &self.records {
            let mut row: Vec<String> = self
                .fields
                .iter()
                .map(|f| {
                    record
                        .attributes
                        .get(&f.name)
                        .map(|v| v.to_string())
                        .unwrap_or_default()
                })
                .collect();
            if with_xy {
                match record.point() {
                    Some(p) => row.extend([p.x().to_string(), p.y().to_string()]),
                    None => row.extend([String::new(), String::new()]),
                }
            }
            wtr.write_record(&row)?;
        }

        wtr.flush()?;
        Ok(())
    }

    /// Names for the coordinate columns that no attribute column already uses
    #[cfg(feature = "csv")]
    fn coordinate_headers(&self) -> (String, String) {
        let taken = |name: &str| self.fields.iter().any(|f| f.name.eq_ignore_ascii_case(name));
        let (mut x, mut y) = ("x".to_string(), "y".to_string());
        while taken(&x) || taken(&y) {
            x = format!("geom_{}", x);
            y = format!("geom_{}", y);
        }
        (x, y)
    }

    /// Save the table to a CSV file
    #[cfg(feature = "csv")]
    pub fn to_csv(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let file = std::fs::File::create(path)?;
        self.write_csv(std::io::BufWriter::new(file))?;
        info!(path = %path.display(), records = self.records.len(), "CSV saved");
        Ok(())
    }
}

impl<'a> IntoIterator for &'a QueryResult {
    type Item = &'a Record;
    type IntoIter = std::slice::Iter<'a, Record>;

    fn into_iter(self) -> Self::IntoIter {
        self.records.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collect::arcgis::field::FieldType;

    fn sample() -> QueryResult {
        let mut a = HashMap::new();
        a.insert("STORMNAME".to_string(), AttributeValue::from("Djoungou"));
        a.insert("INTENSITY".to_string(), AttributeValue::Integer(65));
        let mut b = HashMap::new();
        b.insert("STORMNAME".to_string(), AttributeValue::from("Djoungou, \"late\""));
        b.insert("INTENSITY".to_string(), AttributeValue::Null);

        QueryResult {
            layer_id: 0,
            geometry_type: GeometryType::Point,
            fields: vec![
                FieldDescriptor::new("STORMNAME", FieldType::String),
                FieldDescriptor::new("INTENSITY", FieldType::Integer),
            ],
            records: vec![
                Record {
                    attributes: a,
                    geometry: Some(geo::Geometry::Point(geo::Point::new(57.5, -15.0))),
                },
                Record {
                    attributes: b,
                    geometry: None,
                },
            ],
            spatial_reference: Some(SpatialReference::WGS84),
            exceeded_transfer_limit: false,
        }
    }

    #[test]
    fn test_column() {
        let result = sample();
        let column = result.column("intensity").unwrap();
        assert_eq!(column, vec![&AttributeValue::Integer(65), &AttributeValue::Null]);
        assert!(result.column("YEAR").is_none());
        assert_eq!(result.records[1].get("INTENSITY"), None);
    }

    #[test]
    fn test_feature_collection() {
        let fc = sample().to_feature_collection();
        assert_eq!(fc.features.len(), 2);
        let first = &fc.features[0];
        let props = first.properties.as_ref().unwrap();
        assert_eq!(props.len(), 2);
        assert_eq!(props["INTENSITY"], serde_json::json!(65));
        match &first.geometry.as_ref().unwrap().value {
            geojson::Value::Point(coords) => assert_eq!(coords, &vec![57.5, -15.0]),
            other => panic!("unexpected geometry {:?}", other),
        }
        assert!(fc.features[1].geometry.is_none());
    }

    #[test]
    fn test_to_geojson_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out").join("positions.geojson");
        sample().to_geojson(&path).unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        let parsed: GeoJson = text.parse().unwrap();
        match parsed {
            GeoJson::FeatureCollection(fc) => assert_eq!(fc.features.len(), 2),
            other => panic!("unexpected GeoJSON {:?}", other),
        }
    }

    #[cfg(feature = "csv")]
    #[test]
    fn test_write_csv() {
        let mut buffer = Vec::new();
        sample().write_csv(&mut buffer).unwrap();
        let text = String::from_utf8(buffer).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "STORMNAME,INTENSITY,x,y");
        assert_eq!(lines[1], "Djoungou,65,57.5,-15");
        assert_eq!(lines[2], "\"Djoungou, \"\"late\"\"\",,,");
    }

    #[cfg(feature = "csv")]
    #[test]
    fn test_csv_coordinates_do_not_shadow_attributes() {
        let mut result = sample();
        result.fields.push(FieldDescriptor::new("X", FieldType::Double));
        result.fields.push(FieldDescriptor::new("geom_y", FieldType::Double));
        result.records[0]
            .attributes
            .insert("X".to_string(), AttributeValue::Double(1.5));

        let mut buffer = Vec::new();
        result.write_csv(&mut buffer).unwrap();
        let text = String::from_utf8(buffer).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "STORMNAME,INTENSITY,X,geom_y,geom_geom_x,geom_geom_y");
        assert_eq!(lines[1], "Djoungou,65,1.5,,57.5,-15");
    }

    #[cfg(feature = "csv")]
    #[test]
    fn test_to_csv_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("positions.csv");
        sample().to_csv(&path).unwrap();
        assert!(std::fs::read_to_string(&path).unwrap().starts_with("STORMNAME"));
    }
}
