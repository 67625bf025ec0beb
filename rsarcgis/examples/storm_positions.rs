use std::sync::Arc;

use anyhow::{Context, Result};
use rsarcgis::collect::global_variables::get_temp_path;
use rsarcgis::{ClientConfig, ReqwestClient, ServiceHandle};
use tracing_subscriber::EnvFilter;

/// Example: observed positions of one storm from a FeatureServer
///
/// FEATURE_SERVICE_URL=https://.../rest/services/<name>/FeatureServer \
///     cargo run --example storm_positions
fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    println!("=== Example: storm positions from an ArcGIS FeatureServer ===\n");

    let url = std::env::var("FEATURE_SERVICE_URL")
        .context("set FEATURE_SERVICE_URL to a .../FeatureServer endpoint")?;

    // ARCGIS_TOKEN / ARCGIS_TIMEOUT_SECS / ARCGIS_OUT_SR are picked up here
    let config = ClientConfig::from_env()?;
    let client = ReqwestClient::new(&config)?;
    let service = ServiceHandle::open_with(&url, config, Arc::new(client))?;

    println!("Layers:");
    for layer in service.list_layers()? {
        let geometry = layer
            .geometry_type
            .map(|g| g.to_string())
            .unwrap_or_else(|| "?".to_string());
        println!("  - [{}] {} ({})", layer.id, layer.name, geometry);
    }

    let positions = service.layer(0)?;
    println!("\nFields of '{}':", positions.name());
    for field in positions.fields()? {
        println!("  - {} ({})", field.name, field.field_type);
    }

    let result = positions.select(
        Some(&["STORMNAME", "INTENSITY", "YEAR", "MONTH", "DAY", "HHMM"]),
        Some("STORMNAME = 'Djoungou'"),
    )?;

    println!("\n{} positions for Djoungou", result.len());
    for record in result.iter().take(5) {
        let when = ["YEAR", "MONTH", "DAY", "HHMM"]
            .iter()
            .map(|f| record.attributes[*f].to_string())
            .collect::<Vec<_>>()
            .join("-");
        match record.point() {
            Some(p) => println!(
                "  {}  intensity {}  at ({:.2}, {:.2})",
                when, record.attributes["INTENSITY"], p.x(), p.y()
            ),
            None => println!("  {}  intensity {}  (no position)", when, record.attributes["INTENSITY"]),
        }
    }
    if result.exceeded_transfer_limit {
        println!("  (the server truncated the result; see the paged_query example)");
    }

    let output = get_temp_path();
    result.to_geojson(output.join("djoungou.geojson"))?;
    result.to_csv(output.join("djoungou.csv"))?;

    println!("\n✅ Saved to {}", output.display());
    Ok(())
}
