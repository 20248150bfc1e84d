//! Procedural granule cell morphology.
//!
//! The cell is laid out along +Y from its placement position: soma, hillock,
//! initial segment and ascending axon stack upwards, the dendrites hang below
//! the soma, and the parallel fiber runs along Z at the top of the ascending
//! axon in both directions.

use log::{debug, info, warn};

use crate::compartments::{AttachEnd, Cell, CellBuilder, Point3, Section, SectionId, SectionList};
use crate::config::GranuleGeometry;

/// A built granule cell together with handles to its axonal landmarks.
#[derive(Debug, Clone, PartialEq)]
pub struct GranuleMorphology {
    cell: Cell,
    axon_hillock: SectionId,
    axon_initial_segment: SectionId,
    ascending_axon: SectionId,
    parallel_fiber: Vec<SectionId>,
    y_pf: f64,
}

impl GranuleMorphology {
    pub fn cell(&self) -> &Cell {
        &self.cell
    }

    pub fn into_cell(self) -> Cell {
        self.cell
    }

    pub fn axon_hillock(&self) -> SectionId {
        self.axon_hillock
    }

    pub fn axon_initial_segment(&self) -> SectionId {
        self.axon_initial_segment
    }

    pub fn ascending_axon(&self) -> SectionId {
        self.ascending_axon
    }

    pub fn parallel_fiber(&self) -> &[SectionId] {
        &self.parallel_fiber
    }

    /// Y offset (relative to the position) the parallel fiber runs at.
    pub fn y_pf(&self) -> f64 {
        self.y_pf
    }
}

impl AsRef<Cell> for GranuleMorphology {
    fn as_ref(&self) -> &Cell {
        &self.cell
    }
}

/// Builds the reference granule cell at `position`.
pub fn build(position: Point3) -> GranuleMorphology {
    build_with(position, &GranuleGeometry::default())
}

/// Builds a granule cell with custom geometry.
///
/// Never fails: degenerate lengths give empty or truncated structures rather
/// than errors. Run [`GranuleGeometry::validate`] first to reject them.
pub fn build_with(position: Point3, geometry: &GranuleGeometry) -> GranuleMorphology {
    let mut builder = CellBuilder::new(position);

    let soma = build_soma(&mut builder, geometry);
    build_dendrites(&mut builder, geometry, soma);
    let (axon_hillock, axon_initial_segment) = build_hillock(&mut builder, geometry, soma);
    let (ascending_axon, y_pf) = build_ascending_axon(&mut builder, geometry, axon_initial_segment);
    let parallel_fiber = build_parallel_fiber(&mut builder, geometry, ascending_axon, y_pf);

    let cell = builder.finish();
    info!(
        "Built granule cell at ({:.2}, {:.2}, {:.2}): {} sections, {} parallel fiber sections",
        position.x,
        position.y,
        position.z,
        cell.len(),
        parallel_fiber.len()
    );

    GranuleMorphology {
        cell,
        axon_hillock,
        axon_initial_segment,
        ascending_axon,
        parallel_fiber,
        y_pf,
    }
}

/// Number of whole `piece`s in `total`; the remainder is dropped.
///
/// Non-positive pieces and infinite or NaN ratios count as zero, and so do
/// negative ratios since `as` saturates.
pub fn section_count(total: f64, piece: f64) -> usize {
    let ratio = total / piece;
    if piece <= 0.0 || !ratio.is_finite() {
        warn!("{} / {} is not a usable section count", total, piece);
        return 0;
    }
    let n = ratio as usize;
    if n == 0 {
        warn!("{} / {} yields no sections", total, piece);
    } else if ratio.fract() != 0.0 {
        debug!(
            "{} / {} leaves {:.3} µm uncovered",
            total,
            piece,
            total - piece * n as f64
        );
    }
    n
}

fn build_soma(builder: &mut CellBuilder, geometry: &GranuleGeometry) -> SectionId {
    let position = builder.position();
    let soma = Section::new("soma", geometry.soma_length, geometry.soma_diameter)
        .with_segments(1)
        .with_points(vec![
            position,
            position + Point3::new(0.0, geometry.soma_length, 0.0),
        ]);
    debug!("Soma: L={} diam={}", geometry.soma_length, geometry.soma_diameter);
    builder.push(soma, SectionList::Soma)
}

fn build_dendrites(
    builder: &mut CellBuilder,
    geometry: &GranuleGeometry,
    soma: SectionId,
) -> Vec<SectionId> {
    let position = builder.position();
    let center = (geometry.dendrite_count as f64 - 1.0) / 2.0;
    let length = geometry.dendrite_length;

    let dendrites = (0..geometry.dendrite_count)
        .map(|i| {
            // Shifted in X so the dendrites don't share a voxel
            let origin = position + Point3::new((i as f64 - center) * geometry.dendrite_spacing, 0.0, 0.0);
            let points = (0..geometry.dendrite_points)
                .map(|j| {
                    origin - Point3::new(0.0, length * j as f64 / geometry.dendrite_points as f64, 0.0)
                })
                .collect();
            let dendrite = Section::new(format!("dend_{}", i), length, geometry.dendrite_diameter)
                .with_points(points)
                .connected_to(soma, AttachEnd::Proximal);
            builder.push(dendrite, SectionList::Dendrites)
        })
        .collect::<Vec<_>>();
    debug!("Dendrites: {}", dendrites.len());
    dendrites
}

fn build_hillock(
    builder: &mut CellBuilder,
    geometry: &GranuleGeometry,
    soma: SectionId,
) -> (SectionId, SectionId) {
    let position = builder.position();
    let hillock_base = geometry.soma_length;
    let ais_base = hillock_base + geometry.hillock_length;
    let ais_top = ais_base + geometry.initial_segment_length;

    let hillock = Section::new("axon_hillock", geometry.hillock_length, geometry.hillock_diameter)
        .with_segments(1)
        .with_points(vec![
            position + Point3::new(0.0, hillock_base, 0.0),
            position + Point3::new(0.0, ais_base, 0.0),
        ])
        .with_label("axon_hillock")
        .connected_to(soma, AttachEnd::Proximal);
    let hillock = builder.push(hillock, SectionList::Axon);

    let ais = Section::new(
        "axon_initial_segment",
        geometry.initial_segment_length,
        geometry.initial_segment_diameter,
    )
    .with_segments(1)
    .with_points(vec![
        position + Point3::new(0.0, ais_base, 0.0),
        position + Point3::new(0.0, ais_top, 0.0),
    ])
    .with_label("axon_initial_segment")
    .connected_to(hillock, AttachEnd::Distal);
    let ais = builder.push(ais, SectionList::Axon);

    debug!("Hillock {} and initial segment {}", hillock, ais);
    (hillock, ais)
}

/// Returns the ascending axon and the Y offset its fiber segments end at.
fn build_ascending_axon(
    builder: &mut CellBuilder,
    geometry: &GranuleGeometry,
    initial_segment: SectionId,
) -> (SectionId, f64) {
    let position = builder.position();
    let seg_length = geometry.fiber_segment_length;
    let n = section_count(geometry.ascending_axon_length, seg_length);
    let y = geometry.ascending_axon_origin();

    // Intermediate points between both ends improve voxelization
    let last = geometry.ascending_axon_points.saturating_sub(1).max(1) as f64;
    let points = (0..geometry.ascending_axon_points)
        .map(|k| {
            let fraction = k as f64 / last;
            position + Point3::new(0.0, y + fraction * geometry.ascending_axon_length, 0.0)
        })
        .collect();

    let ascending_axon = Section::new(
        "ascending_axon",
        geometry.ascending_axon_length,
        geometry.ascending_axon_diameter,
    )
    .with_segments(n)
    .with_points(points)
    .with_label("ascending_axon")
    .connected_to(initial_segment, AttachEnd::Distal);
    let ascending_axon = builder.push(ascending_axon, SectionList::Axon);

    let y_pf = y + seg_length * n as f64;
    debug!("Ascending axon: nseg={} y_pf={:.5}", n, y_pf);
    (ascending_axon, y_pf)
}

/// Two chains grow from the ascending axon tip: even ids towards +Z, odd ids
/// towards -Z, each section wired to the one two ids before it.
fn build_parallel_fiber(
    builder: &mut CellBuilder,
    geometry: &GranuleGeometry,
    ascending_axon: SectionId,
    y_pf: f64,
) -> Vec<SectionId> {
    let position = builder.position();
    let section_length = geometry.fiber_section_length;
    let n = section_count(geometry.parallel_fiber_length, section_length);
    let center = position.z;

    let mut fiber: Vec<SectionId> = Vec::new();
    for id in 0..n {
        let sign = 1.0 - ((id % 2) * 2) as f64;
        let z = (id / 2) as f64 * section_length;
        let parent = if id < 2 { ascending_axon } else { fiber[id - 2] };
        let section = Section::new(
            format!("parallel_fiber_{}", id),
            section_length,
            geometry.parallel_fiber_diameter,
        )
        .with_points(vec![
            Point3::new(position.x, position.y + y_pf, center + sign * z),
            Point3::new(position.x, position.y + y_pf, center + sign * (z + section_length)),
        ])
        .with_label("parallel_fiber")
        .connected_to(parent, AttachEnd::Distal);
        fiber.push(builder.push(section, SectionList::Axon));
    }
    debug!("Parallel fiber: {} sections", fiber.len());
    fiber
}
