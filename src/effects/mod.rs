pub mod chain;
pub mod engine;
pub mod mulaw;
pub mod native;
pub mod registry;
pub mod sox;
