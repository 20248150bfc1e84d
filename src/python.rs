use pyo3::exceptions::{PyIOError, PyValueError};
use pyo3::prelude::*;

use crate::error::MorphologyError;

impl From<MorphologyError> for PyErr {
    fn from(err: MorphologyError) -> PyErr {
        match err {
            MorphologyError::Io(e) => PyIOError::new_err(e.to_string()),
            other => PyValueError::new_err(other.to_string()),
        }
    }
}

/// A Python module implemented in Rust.
#[pymodule]
mod granule_rs {
    use pyo3::prelude::*;

    use crate::builder::build;
    use crate::compartments::Point3;
    use crate::models::GranuleVariant;
    use crate::swc::write_swc;

    /// One built and parameterized section, flattened for Python.
    #[pyclass(get_all, frozen)]
    #[derive(Clone)]
    struct SectionRecord {
        name: String,
        labels: Vec<String>,
        length: f64,
        diameter: f64,
        nseg: usize,
        points: Vec<[f64; 3]>,
        parent: Option<usize>,
        parent_end: Option<u8>,
        mechanisms: Vec<String>,
        synapses: Vec<String>,
    }

    /// Builds a granule cell at `position` and resolves the tables of `variant`.
    #[pyfunction]
    #[pyo3(signature = (position, variant = "GranuleCell"))]
    fn build_granule_cell(position: [f64; 3], variant: &str) -> PyResult<Vec<SectionRecord>> {
        let variant: GranuleVariant = variant.parse()?;
        let granule = build(Point3::from(position));
        let cell = granule.cell();
        let resolved = variant.definition().resolve(cell)?;

        Ok(resolved
            .into_iter()
            .map(|r| {
                let section = cell.section(r.section);
                SectionRecord {
                    name: r.name,
                    labels: r.labels,
                    length: r.length,
                    diameter: r.diameter,
                    nseg: r.nseg,
                    points: section.points().iter().map(|p| p.to_array()).collect(),
                    parent: section.parent().map(|c| c.parent.0),
                    parent_end: section.parent().map(|c| c.end.as_x()),
                    mechanisms: r.mechanisms.iter().map(ToString::to_string).collect(),
                    synapses: r.synapses.iter().map(|s| s.to_string()).collect(),
                }
            })
            .collect())
    }

    /// Writes the morphology of a granule cell at `position` as SWC.
    #[pyfunction]
    fn write_granule_swc(position: [f64; 3], path: &str) -> PyResult<()> {
        write_swc(build(Point3::from(position)).cell(), path)?;
        Ok(())
    }

    #[pyfunction]
    fn variants() -> Vec<&'static str> {
        GranuleVariant::ALL.iter().map(|v| v.name()).collect()
    }
}
