pub mod diag;
pub mod error;
pub mod naming;
