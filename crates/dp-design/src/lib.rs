//! # dp-design
//!
//! Experimental design generation for the DOE pipeline.
//!
//! Provides the coded design families used during optimization (two- and
//! three-level factorials, Plackett–Burman, Box–Behnken and the central
//! composite variants), generalized subset designs for screening, and a
//! [`DesignGenerator`] that scales either kind to a factor space.

mod families;
mod generator;
mod gsd;

pub use families::{
    box_behnken, full_factorial, plackett_burman, two_level_factorial, CodedMatrix,
    DesignFamily, MatrixDesigner,
};
pub use generator::{screening_levels, Design, DesignGenerator, DesignMatrix};
pub use gsd::gsd;
