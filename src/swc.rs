use itertools::Itertools;
use log::{info, warn};
use std::collections::{HashMap, HashSet, VecDeque};
use std::fs;
use std::path::Path;

use crate::compartments::{AttachEnd, Cell, CellBuilder, Point3, Section, SectionId, SectionList};
use crate::error::{MorphologyError, Result};

/// We use the CNIC spec, as per: http://www.neuronland.org/NLMorphologyConverter/MorphologyFormats/SWC/Spec.html
#[derive(Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Copy, Clone)]
pub enum StructureIdentifier {
    Undefined,
    Soma,
    Axon,
    BasalDendrite,
    ApicalDendrite,
    ForkPoint,
    EndPoint,
    Custom,
}

impl From<u8> for StructureIdentifier {
    fn from(v: u8) -> Self {
        match v {
            0 => StructureIdentifier::Undefined,
            1 => StructureIdentifier::Soma,
            2 => StructureIdentifier::Axon,
            3 => StructureIdentifier::BasalDendrite,
            4 => StructureIdentifier::ApicalDendrite,
            5 => StructureIdentifier::ForkPoint,
            6 => StructureIdentifier::EndPoint,
            _ => StructureIdentifier::Custom,
        }
    }
}

impl StructureIdentifier {
    pub fn code(self) -> u8 {
        match self {
            StructureIdentifier::Undefined => 0,
            StructureIdentifier::Soma => 1,
            StructureIdentifier::Axon => 2,
            StructureIdentifier::BasalDendrite => 3,
            StructureIdentifier::ApicalDendrite => 4,
            StructureIdentifier::ForkPoint => 5,
            StructureIdentifier::EndPoint => 6,
            StructureIdentifier::Custom => 7,
        }
    }

    /// The cell list a node of this type is filed under, if the type says so.
    fn list(self) -> Option<SectionList> {
        match self {
            StructureIdentifier::Soma => Some(SectionList::Soma),
            StructureIdentifier::Axon => Some(SectionList::Axon),
            StructureIdentifier::BasalDendrite | StructureIdentifier::ApicalDendrite => {
                Some(SectionList::Dendrites)
            }
            _ => None,
        }
    }

    fn from_list(list: SectionList) -> Self {
        match list {
            SectionList::Soma => StructureIdentifier::Soma,
            SectionList::Dendrites => StructureIdentifier::BasalDendrite,
            SectionList::Axon => StructureIdentifier::Axon,
        }
    }
}

#[derive(Debug, Copy, Clone, PartialEq)]
pub struct SwcNode {
    pub node_id: u64,
    pub structure: StructureIdentifier,
    pub position: Point3,
    pub radius: f64,
    /// `None` for the root
    pub parent_id: Option<u64>,
}

/// Nodes in breadth first order, renumbered from 0, so every parent precedes its children.
#[derive(Debug, Clone, Default)]
pub struct SwcMorphology {
    pub nodes: Vec<SwcNode>,
    pub parent_child_map: HashMap<u64, Vec<u64>>,
}

impl SwcMorphology {
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn root(&self) -> Option<&SwcNode> {
        self.nodes.first()
    }

    /// Writes the nodes back out with 1-based ids; the root's parent is -1.
    pub fn to_swc_string(&self) -> String {
        let mut output = String::new();
        output.push_str("# Processed SWC file\n");
        for node in &self.nodes {
            let parent_id = node.parent_id.map_or(-1i64, |p| p as i64 + 1);
            output.push_str(&format!(
                "{} {} {:.5} {:.5} {:.5} {} {}\n",
                node.node_id + 1,
                node.structure.code(),
                node.position.x,
                node.position.y,
                node.position.z,
                node.radius,
                parent_id
            ));
        }
        output
    }
}

fn parse_line(line_no: usize, line: &str) -> Result<SwcNode> {
    let err = |reason: String| MorphologyError::Swc {
        line: line_no,
        reason,
    };
    let fields: Vec<&str> = line.split_whitespace().collect();
    if fields.len() < 7 {
        return Err(err(format!("expected 7 columns, found {}", fields.len())));
    }

    let float = |i: usize| {
        fields[i]
            .parse::<f64>()
            .map_err(|e| err(format!("column {} ({}): {}", i + 1, fields[i], e)))
    };
    let node_id = fields[0]
        .parse::<u64>()
        .map_err(|e| err(format!("node id {}: {}", fields[0], e)))?;
    let structure: StructureIdentifier = fields[1]
        .parse::<u8>()
        .map_err(|e| err(format!("structure type {}: {}", fields[1], e)))?
        .into();
    let position = Point3::new(float(2)?, float(3)?, float(4)?);
    let radius = float(5)?;
    let parent_raw = fields[6]
        .parse::<i64>()
        .map_err(|e| err(format!("parent id {}: {}", fields[6], e)))?;
    // Anything negative marks the root
    let parent_id = u64::try_from(parent_raw).ok();

    Ok(SwcNode {
        node_id,
        structure,
        position,
        radius,
        parent_id,
    })
}

/// Reads in swc from `read_path` and returns the sorted node list.
/// Optionally emits warnings for:
///   - zero-radius points
/// Strict mode:
///   - if any of the above warnings are hit on a non-endpoint, we terminate immediately
pub fn read_swc(
    read_path: impl AsRef<Path>,
    emit_warnings: Option<bool>,
    strict: Option<bool>,
) -> Result<SwcMorphology> {
    let content = fs::read_to_string(read_path)?;
    parse_swc(&content, emit_warnings, strict)
}

/// Parses SWC text and orders the nodes breadth first from the root.
///
/// Nodes not reachable from the first root are dropped with a warning.
/// Flywire.ai skeletons only mark 0 = undefined, 1 = soma, 5 = fork point and
/// 6 = end point; those nodes inherit their list in [`Cell::from_swc`].
pub fn parse_swc(
    content: &str,
    emit_warnings: Option<bool>,
    strict: Option<bool>,
) -> Result<SwcMorphology> {
    let nodes_vec: Vec<SwcNode> = content
        .lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty() && !line.trim_start().starts_with('#'))
        .map(|(i, line)| {
            let node = parse_line(i + 1, line)?;
            if node.radius == 0.0 && emit_warnings.unwrap_or(true) {
                warn!(
                    "Zero-radius for section ID: {} of type: {:?}",
                    node.node_id, node.structure
                );
                if node.structure != StructureIdentifier::EndPoint && strict.unwrap_or(false) {
                    return Err(MorphologyError::Swc {
                        line: i + 1,
                        reason: "Zero-radius for non-endpoint".to_owned(),
                    });
                }
            }
            Ok(node)
        })
        .collect::<Result<Vec<SwcNode>>>()?;

    let accum_types: HashMap<StructureIdentifier, usize> =
        nodes_vec.iter().map(|node| node.structure).counts();
    for (structure, count) in accum_types.iter().sorted() {
        info!("{:?} - #{:?}", structure, count);
    }

    let nodes_by_id: HashMap<u64, SwcNode> = nodes_vec.iter().map(|n| (n.node_id, *n)).collect();

    ////////////////////////
    // BFS traversal for topological order
    ////////////////////////
    let mut children: HashMap<u64, Vec<u64>> = HashMap::new();
    for n in &nodes_vec {
        if let Some(parent) = n.parent_id {
            children.entry(parent).or_default().push(n.node_id);
        }
    }

    let root = nodes_vec
        .iter()
        .find(|n| n.parent_id.is_none())
        .ok_or(MorphologyError::NoRoot)?;

    let mut sorted_node_ids: Vec<u64> = Vec::new();
    let mut queue: VecDeque<u64> = VecDeque::new();
    queue.push_back(root.node_id);
    let mut visited: HashSet<u64> = HashSet::new();

    while let Some(node_id) = queue.pop_front() {
        if !visited.insert(node_id) {
            warn!("Cycle detected at {}", node_id);
            continue;
        }
        sorted_node_ids.push(node_id);

        if let Some(child_ids) = children.get(&node_id) {
            for &child_id in child_ids {
                if !visited.contains(&child_id) {
                    queue.push_back(child_id);
                }
            }
        }
    }

    if sorted_node_ids.len() < nodes_vec.len() {
        warn!(
            "Dropped {} nodes not reachable from root {}",
            nodes_vec.len() - sorted_node_ids.len(),
            root.node_id
        );
    }

    // old_id -> new_id, sequential starting at 0
    let old_to_new_id: HashMap<u64, u64> = sorted_node_ids
        .iter()
        .enumerate()
        .map(|(new_id, old_id)| (*old_id, new_id as u64))
        .collect();

    let mut zero_radius_count: HashMap<StructureIdentifier, usize> = HashMap::new();
    let mut parent_child_map: HashMap<u64, Vec<u64>> = HashMap::new();

    let remapped_nodes: Vec<SwcNode> = sorted_node_ids
        .iter()
        .map(|old_id| {
            let mut node = nodes_by_id[old_id];
            node.node_id = old_to_new_id[old_id];
            node.parent_id = node.parent_id.and_then(|p| old_to_new_id.get(&p).copied());

            if node.radius == 0.0 {
                *zero_radius_count.entry(node.structure).or_insert(0) += 1;
                node.radius = 1.0;
            }

            if let Some(parent) = node.parent_id {
                parent_child_map.entry(parent).or_default().push(node.node_id);
            }
            node
        })
        .collect();

    info!("Processed {} nodes", remapped_nodes.len());
    if !zero_radius_count.is_empty() {
        info!(
            "SWC Label Convention: 0=undefined, 1=soma, 2=axon, 3=basal dendrite, 4=apical dendrite, 5=fork, 6=end"
        );
        info!("Fixed zero-radius points by type: {:?}", zero_radius_count);
    }

    Ok(SwcMorphology {
        nodes: remapped_nodes,
        parent_child_map,
    })
}

/// Flattens a cell into SWC nodes: one node per 3-D point, each section's
/// first point hanging off the node at its parent's attachment end.
///
/// Fails on cells that break the tree invariants of [`Cell::validate`].
pub fn cell_to_swc(cell: &Cell) -> Result<SwcMorphology> {
    cell.validate()?;
    let mut nodes: Vec<SwcNode> = Vec::new();
    let mut parent_child_map: HashMap<u64, Vec<u64>> = HashMap::new();
    // (proximal node, distal node) of every section
    let mut ends: Vec<Option<(u64, u64)>> = Vec::with_capacity(cell.len());

    for (i, section) in cell.sections().iter().enumerate() {
        let structure = cell
            .list_of(SectionId(i))
            .map_or(StructureIdentifier::Undefined, StructureIdentifier::from_list);
        let attach = section.parent().and_then(|conn| {
            ends[conn.parent.0].map(|(proximal, distal)| match conn.end {
                AttachEnd::Proximal => proximal,
                AttachEnd::Distal => distal,
            })
        });

        let mut previous = attach;
        let mut first = None;
        for point in section.points() {
            let node_id = nodes.len() as u64;
            nodes.push(SwcNode {
                node_id,
                structure,
                position: *point,
                radius: section.diameter() / 2.0,
                parent_id: previous,
            });
            if let Some(parent) = previous {
                parent_child_map.entry(parent).or_default().push(node_id);
            }
            first.get_or_insert(node_id);
            previous = Some(node_id);
        }

        ends.push(match (first, previous) {
            (Some(first), Some(last)) => Some((first, last)),
            // Sections without points pass their attachment node on
            _ => attach.map(|node| (node, node)),
        });
    }

    Ok(SwcMorphology {
        nodes,
        parent_child_map,
    })
}

pub fn to_swc_string(cell: &Cell) -> Result<String> {
    Ok(cell_to_swc(cell)?.to_swc_string())
}

pub fn write_swc(cell: &Cell, write_path: impl AsRef<Path>) -> Result<()> {
    let write_path = write_path.as_ref();
    let morphology = cell_to_swc(cell)?;
    fs::write(write_path, morphology.to_swc_string())?;
    info!("Wrote {} nodes to {}", morphology.len(), write_path.display());
    Ok(())
}

impl Cell {
    /// Builds a cell from reconstructed nodes: the root becomes the soma and
    /// every other node a section from its parent's point to its own.
    ///
    /// Nodes of an unspecific type (fork, end, undefined) join their parent's list.
    pub fn from_swc(morphology: &SwcMorphology) -> Result<Cell> {
        let root = morphology.root().ok_or(MorphologyError::NoRoot)?;
        let mut builder = CellBuilder::new(root.position);
        let mut section_of: HashMap<u64, (SectionId, SectionList)> = HashMap::new();
        let mut list_counts: HashMap<SectionList, usize> = HashMap::new();

        let diameter = root.radius * 2.0;
        let soma = builder.push(
            Section::new("soma_0", diameter, diameter).with_points(vec![
                root.position - Point3::new(0.0, root.radius, 0.0),
                root.position + Point3::new(0.0, root.radius, 0.0),
            ]),
            SectionList::Soma,
        );
        list_counts.insert(SectionList::Soma, 1);
        section_of.insert(root.node_id, (soma, SectionList::Soma));

        let by_id: HashMap<u64, &SwcNode> = morphology.nodes.iter().map(|n| (n.node_id, n)).collect();

        for node in morphology.nodes.iter().skip(1) {
            let parent_id = node.parent_id.ok_or_else(|| MorphologyError::BrokenTree {
                section: format!("node {}", node.node_id),
                reason: "second root in SWC morphology".to_owned(),
            })?;
            let Some(&(parent_section, parent_list)) = section_of.get(&parent_id) else {
                return Err(MorphologyError::BrokenTree {
                    section: format!("node {}", node.node_id),
                    reason: format!("parent node {} not seen before its child", parent_id),
                });
            };
            let parent = by_id[&parent_id];

            let list = node.structure.list().unwrap_or(parent_list);
            let count = list_counts.entry(list).or_insert(0);
            let name = format!(
                "{}_{}",
                match list {
                    SectionList::Soma => "soma",
                    SectionList::Dendrites => "dend",
                    SectionList::Axon => "axon",
                },
                *count
            );
            *count += 1;

            let section = Section::new(
                name,
                node.position.distance(&parent.position),
                node.radius * 2.0,
            )
            .with_points(vec![parent.position, node.position])
            .connected_to(parent_section, AttachEnd::Distal);
            let id = builder.push(section, list);
            section_of.insert(node.node_id, (id, list));
        }

        let cell = builder.finish();
        cell.validate()?;
        Ok(cell)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::build;

    fn basic_path() -> String {
        format!("{}/data/basic.swc", env!("CARGO_MANIFEST_DIR"))
    }

    #[test]
    fn test_swc_reader_basic() {
        let result = read_swc(basic_path(), Some(true), Some(true));
        assert!(result.is_ok());

        let morphology = result.unwrap();
        let nodes = &morphology.nodes;
        // basic.swc has 5 nodes
        assert_eq!(nodes.len(), 5);

        for (i, node) in nodes.iter().enumerate() {
            assert_eq!(node.node_id, i as u64);
        }
        assert_eq!(nodes[0].parent_id, None);
        assert_eq!(nodes[0].structure, StructureIdentifier::Soma);

        // old id 2, 3, 4 (new 1, 2, 3) -> old id 1 (new 0)
        // old id 5 (new 4) -> old id 4 (new 3)
        assert_eq!(nodes[1].parent_id, Some(0));
        assert_eq!(nodes[2].parent_id, Some(0));
        assert_eq!(nodes[3].parent_id, Some(0));
        assert_eq!(nodes[4].parent_id, Some(3));

        assert_eq!(morphology.parent_child_map[&0], vec![1, 2, 3]);
        assert_eq!(morphology.parent_child_map[&3], vec![4]);
    }

    #[test]
    fn test_out_of_order_file_is_sorted() {
        let content = "\
# child listed before its parent
3 3 0 -2 0 0.5 2
2 3 0 -1 0 0.5 1
1 1 0 0 0 3.0 -1
";
        let morphology = parse_swc(content, Some(true), Some(false)).unwrap();
        let ids: Vec<_> = morphology.nodes.iter().map(|n| n.parent_id).collect();
        assert_eq!(ids, vec![None, Some(0), Some(1)]);
        assert_eq!(morphology.nodes[2].position, Point3::new(0.0, -2.0, 0.0));
    }

    #[test]
    fn test_zero_radius_strict_mode() {
        let content = "1 1 0 0 0 3.0 -1\n2 3 0 -1 0 0 1\n";
        let err = parse_swc(content, Some(true), Some(true)).unwrap_err();
        assert!(matches!(err, MorphologyError::Swc { line: 2, .. }));

        let morphology = parse_swc(content, Some(true), Some(false)).unwrap();
        assert_eq!(morphology.nodes[1].radius, 1.0);
    }

    #[test]
    fn test_malformed_line() {
        let err = parse_swc("1 1 0 0 0 3.0 -1\n2 3 zero 0 0 1 1\n", None, None).unwrap_err();
        assert!(matches!(err, MorphologyError::Swc { line: 2, .. }));
        let err = parse_swc("1 1 0 0\n", None, None).unwrap_err();
        assert!(matches!(err, MorphologyError::Swc { line: 1, .. }));
    }

    #[test]
    fn test_no_root() {
        let err = parse_swc("1 1 0 0 0 3.0 2\n2 3 0 -1 0 1 1\n", None, None).unwrap_err();
        assert!(matches!(err, MorphologyError::NoRoot));
    }

    #[test]
    fn test_granule_export_round_trip() {
        let granule = build(Point3::new(5.0, 0.0, -5.0));
        let cell = granule.cell();
        let point_count: usize = cell.sections().iter().map(|s| s.points().len()).sum();

        let file = tempfile::NamedTempFile::new().unwrap();
        write_swc(cell, file.path()).unwrap();
        let morphology = read_swc(file.path(), Some(false), Some(true)).unwrap();

        assert_eq!(morphology.len(), point_count);
        assert_eq!(morphology.root().unwrap().position, Point3::new(5.0, 0.0, -5.0));
        assert_eq!(morphology.root().unwrap().structure, StructureIdentifier::Soma);
        let axon_nodes = morphology
            .nodes
            .iter()
            .filter(|n| n.structure == StructureIdentifier::Axon)
            .count();
        // hillock 2 + ais 2 + ascending axon 11 + 100 fiber sections of 2
        assert_eq!(axon_nodes, 215);
    }

    #[test]
    fn test_export_attaches_to_parent_end() {
        let granule = build(Point3::default());
        let morphology = cell_to_swc(granule.cell()).unwrap();
        // soma: nodes 0, 1; dendrite 0 starts at node 2 and hangs off the soma's proximal end
        assert_eq!(morphology.nodes[2].parent_id, Some(0));
        assert_eq!(morphology.nodes[3].parent_id, Some(2));
    }

    #[test]
    fn test_export_rejects_forward_parent() {
        let mut builder = CellBuilder::new(Point3::default());
        builder.push(
            Section::new("soma", 1.0, 1.0).with_points(vec![Point3::default(), Point3::new(0.0, 1.0, 0.0)]),
            SectionList::Soma,
        );
        builder.push(
            Section::new("dend", 1.0, 1.0).with_points(vec![Point3::default(), Point3::new(0.0, -1.0, 0.0)]),
            SectionList::Dendrites,
        );
        let mut cell = builder.finish();
        cell.sections[1].parent = Some(crate::compartments::Connection {
            parent: SectionId(7),
            end: AttachEnd::Proximal,
        });

        assert!(matches!(cell_to_swc(&cell), Err(MorphologyError::BrokenTree { .. })));
        assert!(to_swc_string(&cell).is_err());
        let file = tempfile::NamedTempFile::new().unwrap();
        assert!(write_swc(&cell, file.path()).is_err());
    }

    #[test]
    fn test_cell_from_swc() {
        let morphology = read_swc(basic_path(), None, None).unwrap();
        let cell = Cell::from_swc(&morphology).unwrap();
        assert_eq!(cell.len(), 5);
        assert_eq!(cell.soma().len(), 1);
        assert!(cell.validate().is_ok());

        let tip = cell.section(SectionId(4));
        let parent = tip.parent().unwrap();
        assert_eq!(parent.parent, SectionId(3));
        assert_eq!(parent.end, AttachEnd::Distal);
        assert_eq!(tip.length(), morphology.nodes[4].position.distance(&morphology.nodes[3].position));
    }
}
