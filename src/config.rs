//! Geometry constants of the granule cell morphology.
//!
//! Defaults reproduce the reference granule cell. A TOML file may override
//! any subset of them:
//!
//! ```toml
//! parallel_fiber_length = 1000.0
//! fiber_section_length = 25.0
//! ```

use std::fs;
use std::path::Path;

use log::info;
use serde::Deserialize;

use crate::error::{MorphologyError, Result};

/// All lengths and diameters are in micrometers.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct GranuleGeometry {
    pub soma_length: f64,
    pub soma_diameter: f64,

    pub dendrite_count: usize,
    pub dendrite_length: f64,
    pub dendrite_diameter: f64,
    /// X distance between neighbouring dendrites, keeps them out of a shared voxel
    pub dendrite_spacing: f64,
    pub dendrite_points: usize,

    pub hillock_length: f64,
    pub hillock_diameter: f64,
    pub initial_segment_length: f64,
    pub initial_segment_diameter: f64,

    pub ascending_axon_length: f64,
    pub ascending_axon_diameter: f64,
    /// Length of one ascending axon segment; sets its segment count
    pub fiber_segment_length: f64,
    /// Number of 3-D points laid along the ascending axon
    pub ascending_axon_points: usize,

    pub parallel_fiber_length: f64,
    pub parallel_fiber_diameter: f64,
    /// Length of one parallel fiber section; sets the section count
    pub fiber_section_length: f64,
}

impl Default for GranuleGeometry {
    fn default() -> Self {
        GranuleGeometry {
            soma_length: 5.62232,
            soma_diameter: 5.8,
            dendrite_count: 4,
            dendrite_length: 15.0,
            dendrite_diameter: 0.75,
            dendrite_spacing: 2.0,
            dendrite_points: 10,
            hillock_length: 1.0,
            hillock_diameter: 1.5,
            initial_segment_length: 10.0,
            initial_segment_diameter: 0.7,
            ascending_axon_length: 126.0,
            ascending_axon_diameter: 0.3,
            fiber_segment_length: 7.0,
            ascending_axon_points: 11,
            parallel_fiber_length: 2000.0,
            parallel_fiber_diameter: 0.3,
            fiber_section_length: 20.0,
        }
    }
}

impl GranuleGeometry {
    /// Y offset of the top of the initial segment, where the ascending axon starts.
    pub fn ascending_axon_origin(&self) -> f64 {
        self.soma_length + self.hillock_length + self.initial_segment_length
    }

    /// Rejects non-finite or non-positive lengths and diameters.
    ///
    /// The builder accepts anything; this is the gate for user supplied files.
    pub fn validate(&self) -> Result<()> {
        let positive = [
            ("soma_length", self.soma_length),
            ("soma_diameter", self.soma_diameter),
            ("dendrite_length", self.dendrite_length),
            ("dendrite_diameter", self.dendrite_diameter),
            ("hillock_length", self.hillock_length),
            ("hillock_diameter", self.hillock_diameter),
            ("initial_segment_length", self.initial_segment_length),
            ("initial_segment_diameter", self.initial_segment_diameter),
            ("ascending_axon_length", self.ascending_axon_length),
            ("ascending_axon_diameter", self.ascending_axon_diameter),
            ("fiber_segment_length", self.fiber_segment_length),
            ("parallel_fiber_length", self.parallel_fiber_length),
            ("parallel_fiber_diameter", self.parallel_fiber_diameter),
            ("fiber_section_length", self.fiber_section_length),
        ];
        for (field, value) in positive {
            if !value.is_finite() || value <= 0.0 {
                return Err(MorphologyError::InvalidValue {
                    field: field.to_owned(),
                    reason: format!("must be a positive finite length, got {}", value),
                });
            }
        }

        if !self.dendrite_spacing.is_finite() {
            return Err(MorphologyError::InvalidValue {
                field: "dendrite_spacing".to_owned(),
                reason: "must be finite".to_owned(),
            });
        }
        if self.ascending_axon_points < 2 {
            return Err(MorphologyError::InvalidValue {
                field: "ascending_axon_points".to_owned(),
                reason: "needs at least both end points".to_owned(),
            });
        }
        if self.dendrite_points == 0 {
            return Err(MorphologyError::InvalidValue {
                field: "dendrite_points".to_owned(),
                reason: "needs at least one point".to_owned(),
            });
        }
        Ok(())
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        let geometry: GranuleGeometry = toml::from_str(content)?;
        geometry.validate()?;
        Ok(geometry)
    }
}

/// Reads and validates a geometry file; missing keys keep their defaults.
pub fn load_geometry(path: impl AsRef<Path>) -> Result<GranuleGeometry> {
    let path = path.as_ref();
    let content = fs::read_to_string(path)?;
    let geometry = GranuleGeometry::from_toml_str(&content)?;
    info!("Loaded granule geometry from {}", path.display());
    Ok(geometry)
}
