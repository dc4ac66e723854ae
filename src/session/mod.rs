pub mod bender;
pub mod mask;
