pub mod geometry;
pub mod record;
pub mod value;
