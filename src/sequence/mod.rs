pub mod curve;
pub mod multi;
