//! # dp-types
//!
//! Core types shared across the DOE pipeline: factors and the factor space,
//! response specifications, design and response sheets, round results,
//! designer configuration and the error taxonomy.

pub mod config;
pub mod errors;
pub mod factor;
pub mod response;
pub mod result;
pub mod sheet;

pub use config::*;
pub use errors::*;
pub use factor::*;
pub use response::*;
pub use result::*;
pub use sheet::*;
