use chrono::{DateTime, TimeZone, Utc};

/// Convert an ArcGIS date value (milliseconds since the Unix epoch, UTC) to a `DateTime`
/// Returns `None` when the value is outside chrono's representable range
pub fn datetime_from_epoch_millis(millis: i64) -> Option<DateTime<Utc>> {
    Utc.timestamp_millis_opt(millis).single()
}

/// Join field names the way the `outFields` parameter expects them
pub fn join_field_names<S: AsRef<str>>(names: &[S]) -> String {
    if names.is_empty() {
        return "*".to_string();
    }
    names
        .iter()
        .map(|n| n.as_ref())
        .collect::<Vec<_>>()
        .join(",")
}
