use std::fmt;

use serde::Serialize;

use crate::collect::arcgis::response::FieldInfo;
use crate::error::{ArcGisError, Result};

/// Attribute column type, collapsed from the `esriFieldType*` names
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum FieldType {
    ObjectId,
    Integer,
    Double,
    String,
    Date,
    Guid,
    /// Geometry, Blob, Raster, XML and anything newer than this crate
    Other(String),
}

impl FieldType {
    pub fn from_esri(raw: &str) -> Self {
        match raw {
            "esriFieldTypeOID" => FieldType::ObjectId,
            "esriFieldTypeSmallInteger" | "esriFieldTypeInteger" | "esriFieldTypeBigInteger" => {
                FieldType::Integer
            }
            "esriFieldTypeSingle" | "esriFieldTypeDouble" => FieldType::Double,
            "esriFieldTypeString" => FieldType::String,
            "esriFieldTypeDate" | "esriFieldTypeDateOnly" | "esriFieldTypeTimestampOffset" => {
                FieldType::Date
            }
            "esriFieldTypeGUID" | "esriFieldTypeGlobalID" => FieldType::Guid,
            other => FieldType::Other(other.to_string()),
        }
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldType::ObjectId => write!(f, "ObjectId"),
            FieldType::Integer => write!(f, "Integer"),
            FieldType::Double => write!(f, "Double"),
            FieldType::String => write!(f, "String"),
            FieldType::Date => write!(f, "Date"),
            FieldType::Guid => write!(f, "Guid"),
            FieldType::Other(raw) => write!(f, "{}", raw),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FieldDescriptor {
    pub name: String,
    pub field_type: FieldType,
    pub alias: Option<String>,
}

impl FieldDescriptor {
    pub fn new(name: impl Into<String>, field_type: FieldType) -> Self {
        FieldDescriptor {
            name: name.into(),
            field_type,
            alias: None,
        }
    }
}

/// Ordered attribute schema of a layer, unique by (case-insensitive) name
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct FieldCatalog {
    fields: Vec<FieldDescriptor>,
}

impl FieldCatalog {
    pub fn new(fields: Vec<FieldDescriptor>) -> std::result::Result<Self, String> {
        for (i, field) in fields.iter().enumerate() {
            if fields[..i]
                .iter()
                .any(|f| f.name.eq_ignore_ascii_case(&field.name))
            {
                return Err(format!("duplicate field name '{}'", field.name));
            }
        }
        Ok(FieldCatalog { fields })
    }

    pub(crate) fn from_wire(url: &str, infos: Vec<FieldInfo>) -> Result<Self> {
        let fields = infos
            .into_iter()
            .map(|info| FieldDescriptor {
                field_type: FieldType::from_esri(&info.field_type),
                name: info.name,
                alias: info.alias.filter(|a| !a.is_empty()),
            })
            .collect();
        FieldCatalog::new(fields).map_err(|msg| ArcGisError::malformed(url, msg))
    }

    /// Case-insensitive lookup, as the service itself matches field names
    pub fn get(&self, name: &str) -> Option<&FieldDescriptor> {
        self.fields
            .iter()
            .find(|f| f.name.eq_ignore_ascii_case(name))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Resolve requested names to their descriptors, in request order
    ///
    /// Duplicate requests collapse to the first occurrence.
    pub fn resolve<S: AsRef<str>>(&self, names: &[S], layer_id: u32) -> Result<Vec<FieldDescriptor>> {
        let mut resolved: Vec<FieldDescriptor> = Vec::with_capacity(names.len());
        for name in names {
            let name = name.as_ref().trim();
            let field = self.get(name).ok_or_else(|| ArcGisError::InvalidFieldName {
                field: name.to_string(),
                layer_id,
            })?;
            if !resolved.iter().any(|f| f.name == field.name) {
                resolved.push(field.clone());
            }
        }
        Ok(resolved)
    }

    pub fn names(&self) -> Vec<&str> {
        self.fields.iter().map(|f| f.name.as_str()).collect()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, FieldDescriptor> {
        self.fields.iter()
    }

    pub fn as_slice(&self) -> &[FieldDescriptor] {
        &self.fields
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

impl<'a> IntoIterator for &'a FieldCatalog {
    type Item = &'a FieldDescriptor;
    type IntoIter = std::slice::Iter<'a, FieldDescriptor>;

    fn into_iter(self) -> Self::IntoIter {
        self.fields.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn storm_catalog() -> FieldCatalog {
        FieldCatalog::new(vec![
            FieldDescriptor::new("OBJECTID", FieldType::ObjectId),
            FieldDescriptor::new("STORMNAME", FieldType::String),
            FieldDescriptor::new("INTENSITY", FieldType::Integer),
            FieldDescriptor::new("DTG", FieldType::Date),
        ])
        .unwrap()
    }

    #[test]
    fn test_field_type_mapping() {
        assert_eq!(FieldType::from_esri("esriFieldTypeOID"), FieldType::ObjectId);
        assert_eq!(FieldType::from_esri("esriFieldTypeSmallInteger"), FieldType::Integer);
        assert_eq!(FieldType::from_esri("esriFieldTypeSingle"), FieldType::Double);
        assert_eq!(FieldType::from_esri("esriFieldTypeDateOnly"), FieldType::Date);
        assert_eq!(FieldType::from_esri("esriFieldTypeGlobalID"), FieldType::Guid);
        assert_eq!(
            FieldType::from_esri("esriFieldTypeBlob"),
            FieldType::Other("esriFieldTypeBlob".to_string())
        );
    }

    #[test]
    fn test_duplicate_names_rejected() {
        let result = FieldCatalog::new(vec![
            FieldDescriptor::new("NAME", FieldType::String),
            FieldDescriptor::new("name", FieldType::String),
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn test_case_insensitive_lookup() {
        let catalog = storm_catalog();
        assert_eq!(catalog.get("stormname").unwrap().name, "STORMNAME");
        assert!(!catalog.contains("WIND"));
    }

    #[test]
    fn test_resolve_keeps_request_order() {
        let catalog = storm_catalog();
        let resolved = catalog.resolve(&["intensity", "STORMNAME", "Intensity"], 0).unwrap();
        let names: Vec<_> = resolved.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, vec!["INTENSITY", "STORMNAME"]);
    }

    #[test]
    fn test_resolve_unknown_field() {
        let err = storm_catalog().resolve(&["WIND"], 3).unwrap_err();
        match err {
            ArcGisError::InvalidFieldName { field, layer_id } => {
                assert_eq!(field, "WIND");
                assert_eq!(layer_id, 3);
            }
            other => panic!("unexpected error: {other}"),
        }
    }
}
