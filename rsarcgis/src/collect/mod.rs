pub mod arcgis;
pub mod config;
pub mod global_variables;
pub mod http;
