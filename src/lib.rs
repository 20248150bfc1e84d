//! Cerebellar granule cell models for compartmental simulators.
//!
//! [`builder`] lays out the granule cell morphology, [`models`] holds the
//! conductance tables of its firing variants and [`parameters`] applies them
//! to a built cell.

pub mod builder;
pub mod channels;
pub mod compartments;
pub mod config;
pub mod error;
pub mod models;
pub mod parameters;
pub mod swc;

#[cfg(feature = "python")]
mod python;

pub use builder::{GranuleMorphology, build, build_with};
pub use compartments::{AttachEnd, Cell, Point3, Section, SectionId, SectionList};
pub use config::{GranuleGeometry, load_geometry};
pub use error::{MorphologyError, Result};
pub use models::{GranuleVariant, basket_cell};
pub use parameters::ResolvedSection;
