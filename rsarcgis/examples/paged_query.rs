use anyhow::{Context, Result};
use rsarcgis::{BoundingBox, ServiceHandle, SpatialReference};
use tracing_subscriber::EnvFilter;

/// Example: bounding-box query paged past the server's record limit
///
/// FEATURE_SERVICE_URL=https://.../rest/services/<name>/FeatureServer \
///     cargo run --example paged_query -- [layer-id]
fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    println!("=== Example: paged bounding-box query ===\n");

    let url = std::env::var("FEATURE_SERVICE_URL")
        .context("set FEATURE_SERVICE_URL to a .../FeatureServer endpoint")?;
    let layer_id: u32 = match std::env::args().nth(1) {
        Some(raw) => raw.parse().context("layer id must be a number")?,
        None => 0,
    };

    let service = ServiceHandle::open(&url, std::env::var("ARCGIS_TOKEN").ok().as_deref())?;
    let layer = service.layer(layer_id)?;
    let metadata = layer.metadata()?;
    println!(
        "Layer '{}' ({}), server limit {} records per request",
        layer.name(),
        layer.geometry_type(),
        metadata
            .max_record_count
            .map(|n| n.to_string())
            .unwrap_or_else(|| "unknown".to_string())
    );

    // South-west Indian Ocean
    let bbox = BoundingBox::new(30.0, -40.0, 90.0, 0.0);
    println!("Bounding box: {:?}", bbox);

    let result = layer
        .query()
        .bbox(bbox, SpatialReference::WGS84)
        .out_sr(SpatialReference::WGS84)
        .paged(500)
        .execute()?;

    println!("\n{} records in {} columns", result.len(), result.fields.len());
    println!("Columns: {}", result.column_names().join(", "));

    let with_geometry = result.iter().filter(|r| r.geometry.is_some()).count();
    println!("Records with geometry: {}", with_geometry);

    let collection = result.to_feature_collection();
    println!("GeoJSON features: {}", collection.features.len());

    Ok(())
}
