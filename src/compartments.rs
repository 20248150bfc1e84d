use std::fmt;
use std::ops::{Add, Sub};

use itertools::Itertools;

use crate::error::{MorphologyError, Result};

/// A point in 3-D space, in micrometers.
#[derive(Debug, Default, Clone, Copy, PartialEq)]
pub struct Point3 {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Point3 {
    pub const fn new(x: f64, y: f64, z: f64) -> Self {
        Point3 { x, y, z }
    }

    pub fn to_array(self) -> [f64; 3] {
        [self.x, self.y, self.z]
    }

    /// Assumes simple direct path between the points
    pub fn distance(&self, other: &Point3) -> f64 {
        let d = *self - *other;
        (d.x * d.x + d.y * d.y + d.z * d.z).sqrt()
    }
}

impl From<[f64; 3]> for Point3 {
    fn from(v: [f64; 3]) -> Self {
        Point3::new(v[0], v[1], v[2])
    }
}

impl Add for Point3 {
    type Output = Point3;

    fn add(self, rhs: Point3) -> Point3 {
        Point3::new(self.x + rhs.x, self.y + rhs.y, self.z + rhs.z)
    }
}

impl Sub for Point3 {
    type Output = Point3;

    fn sub(self, rhs: Point3) -> Point3 {
        Point3::new(self.x - rhs.x, self.y - rhs.y, self.z - rhs.z)
    }
}

/// Index into the section arena of a [`Cell`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SectionId(pub usize);

impl fmt::Display for SectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Which end of the parent a child section hangs off.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AttachEnd {
    /// x = 0
    Proximal,
    /// x = 1
    Distal,
}

impl AttachEnd {
    pub fn as_x(self) -> u8 {
        match self {
            AttachEnd::Proximal => 0,
            AttachEnd::Distal => 1,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Connection {
    pub parent: SectionId,
    pub end: AttachEnd,
}

/// The list of the cell a section belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SectionList {
    Soma,
    Dendrites,
    Axon,
}

impl SectionList {
    /// The role label every section of this list carries before its own labels.
    pub fn label(self) -> &'static str {
        match self {
            SectionList::Soma => "soma",
            SectionList::Dendrites => "dendrites",
            SectionList::Axon => "axon",
        }
    }
}

/// A single cylindrical cable compartment.
#[derive(Debug, Clone, PartialEq)]
pub struct Section {
    pub(crate) name: String,
    pub(crate) length: f64,
    pub(crate) diameter: f64,
    pub(crate) nseg: usize,
    pub(crate) points: Vec<Point3>,
    pub(crate) labels: Vec<String>,
    pub(crate) parent: Option<Connection>,
}

impl Section {
    pub fn new(name: impl Into<String>, length: f64, diameter: f64) -> Self {
        Section {
            name: name.into(),
            length,
            diameter,
            nseg: 1,
            points: Vec::new(),
            labels: Vec::new(),
            parent: None,
        }
    }

    pub fn with_segments(mut self, nseg: usize) -> Self {
        self.nseg = nseg;
        self
    }

    pub fn with_points(mut self, points: Vec<Point3>) -> Self {
        self.points = points;
        self
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        let label = label.into();
        if !self.labels.contains(&label) {
            self.labels.push(label);
        }
        self
    }

    pub fn connected_to(mut self, parent: SectionId, end: AttachEnd) -> Self {
        self.parent = Some(Connection { parent, end });
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn length(&self) -> f64 {
        self.length
    }

    pub fn diameter(&self) -> f64 {
        self.diameter
    }

    pub fn nseg(&self) -> usize {
        self.nseg
    }

    pub fn points(&self) -> &[Point3] {
        &self.points
    }

    pub fn labels(&self) -> &[String] {
        &self.labels
    }

    pub fn has_label(&self, label: &str) -> bool {
        self.labels.iter().any(|l| l == label)
    }

    pub fn parent(&self) -> Option<Connection> {
        self.parent
    }

    pub fn proximal_point(&self) -> Option<Point3> {
        self.points.first().copied()
    }

    pub fn distal_point(&self) -> Option<Point3> {
        self.points.last().copied()
    }

    /// Point of this section at the given attachment end.
    pub fn point_at(&self, end: AttachEnd) -> Option<Point3> {
        match end {
            AttachEnd::Proximal => self.proximal_point(),
            AttachEnd::Distal => self.distal_point(),
        }
    }
}

/// A compartment tree rooted at `soma[0]`.
///
/// Sections live in one arena in construction order; the soma, dendrite and
/// axon lists hold ids into it.
#[derive(Debug, Clone, PartialEq)]
pub struct Cell {
    pub(crate) position: Point3,
    pub(crate) sections: Vec<Section>,
    pub(crate) soma: Vec<SectionId>,
    pub(crate) dendrites: Vec<SectionId>,
    pub(crate) axon: Vec<SectionId>,
}

impl Cell {
    pub fn position(&self) -> Point3 {
        self.position
    }

    pub fn sections(&self) -> &[Section] {
        &self.sections
    }

    pub fn len(&self) -> usize {
        self.sections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sections.is_empty()
    }

    pub fn section(&self, id: SectionId) -> &Section {
        &self.sections[id.0]
    }

    pub fn get(&self, id: SectionId) -> Option<&Section> {
        self.sections.get(id.0)
    }

    pub fn soma(&self) -> &[SectionId] {
        &self.soma
    }

    pub fn dendrites(&self) -> &[SectionId] {
        &self.dendrites
    }

    pub fn axon(&self) -> &[SectionId] {
        &self.axon
    }

    pub fn root(&self) -> Option<SectionId> {
        self.soma.first().copied()
    }

    /// The list a section was placed in.
    pub fn list_of(&self, id: SectionId) -> Option<SectionList> {
        if self.soma.contains(&id) {
            Some(SectionList::Soma)
        } else if self.dendrites.contains(&id) {
            Some(SectionList::Dendrites)
        } else if self.axon.contains(&id) {
            Some(SectionList::Axon)
        } else {
            None
        }
    }

    pub fn children(&self, id: SectionId) -> Vec<SectionId> {
        self.sections
            .iter()
            .enumerate()
            .filter(|(_, s)| s.parent.is_some_and(|c| c.parent == id))
            .map(|(i, _)| SectionId(i))
            .collect()
    }

    pub fn labeled<'a>(&'a self, label: &'a str) -> impl Iterator<Item = SectionId> + 'a {
        self.sections
            .iter()
            .enumerate()
            .filter(move |(_, s)| s.has_label(label))
            .map(|(i, _)| SectionId(i))
    }

    /// Labels in application order: the list role first, then the section's own.
    pub fn effective_labels(&self, id: SectionId) -> Vec<&str> {
        self.list_of(id)
            .map(SectionList::label)
            .into_iter()
            .chain(self.section(id).labels.iter().map(String::as_str))
            .unique()
            .collect()
    }

    /// Path from a section back to the root, starting with the section itself.
    pub fn path_to_root(&self, id: SectionId) -> Vec<SectionId> {
        let mut path = vec![id];
        let mut current = id;
        while let Some(conn) = self.section(current).parent {
            path.push(conn.parent);
            current = conn.parent;
        }
        path
    }

    /// Checks the tree invariants: a single parentless root at `soma[0]`,
    /// every other section wired to a section built before it, and every
    /// section filed in exactly one list.
    pub fn validate(&self) -> Result<()> {
        let root = self.root().ok_or_else(|| MorphologyError::BrokenTree {
            section: "<none>".to_owned(),
            reason: "cell has no soma".to_owned(),
        })?;

        for (i, section) in self.sections.iter().enumerate() {
            let id = SectionId(i);
            match section.parent {
                None if id == root => {}
                None => {
                    return Err(MorphologyError::BrokenTree {
                        section: section.name.clone(),
                        reason: "second root; section has no parent".to_owned(),
                    });
                }
                Some(_) if id == root => {
                    return Err(MorphologyError::BrokenTree {
                        section: section.name.clone(),
                        reason: "root soma has a parent".to_owned(),
                    });
                }
                Some(conn) if conn.parent.0 >= i => {
                    return Err(MorphologyError::BrokenTree {
                        section: section.name.clone(),
                        reason: format!("parent {} is not built before {}", conn.parent, id),
                    });
                }
                Some(_) => {}
            }

            let listed = [&self.soma, &self.dendrites, &self.axon]
                .iter()
                .filter(|list| list.contains(&id))
                .count();
            if listed != 1 {
                return Err(MorphologyError::BrokenTree {
                    section: section.name.clone(),
                    reason: format!("listed {} times, expected once", listed),
                });
            }
        }
        Ok(())
    }
}

/// Arena the construction steps push finished sections into.
#[derive(Debug)]
pub(crate) struct CellBuilder {
    position: Point3,
    sections: Vec<Section>,
    soma: Vec<SectionId>,
    dendrites: Vec<SectionId>,
    axon: Vec<SectionId>,
}

impl CellBuilder {
    pub fn new(position: Point3) -> Self {
        CellBuilder {
            position,
            sections: Vec::new(),
            soma: Vec::new(),
            dendrites: Vec::new(),
            axon: Vec::new(),
        }
    }

    pub fn position(&self) -> Point3 {
        self.position
    }

    pub fn section(&self, id: SectionId) -> &Section {
        &self.sections[id.0]
    }

    pub fn push(&mut self, section: Section, list: SectionList) -> SectionId {
        let id = SectionId(self.sections.len());
        debug_assert!(
            section.parent.is_none_or(|c| c.parent < id),
            "section {} wired to a section that does not exist yet",
            section.name
        );
        self.sections.push(section);
        match list {
            SectionList::Soma => self.soma.push(id),
            SectionList::Dendrites => self.dendrites.push(id),
            SectionList::Axon => self.axon.push(id),
        }
        id
    }

    pub fn finish(self) -> Cell {
        Cell {
            position: self.position,
            sections: self.sections,
            soma: self.soma,
            dendrites: self.dendrites,
            axon: self.axon,
        }
    }
}
