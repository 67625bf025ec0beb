use std::path::PathBuf;

/// Default directory for exported GeoJSON / CSV files
pub const TEMP_PATH: &str = "./temp";

/// Request timeout applied when none is configured
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Some ArcGIS Online front ends reject requests without a User-Agent
pub const DEFAULT_USER_AGENT: &str = concat!("rsarcgis/", env!("CARGO_PKG_VERSION"));

/// Filter sent when the caller does not supply one
pub const MATCH_ALL_WHERE: &str = "1=1";

/// Environment variables read by `ClientConfig::from_env`
pub const ENV_TOKEN: &str = "ARCGIS_TOKEN";
pub const ENV_TIMEOUT_SECS: &str = "ARCGIS_TIMEOUT_SECS";
pub const ENV_OUT_SR: &str = "ARCGIS_OUT_SR";

pub fn get_temp_path() -> PathBuf {
    PathBuf::from(TEMP_PATH)
}
