//! Applies a model's role tables to the sections of a cell.
//!
//! A section collects the tables of all its labels in order: the role of the
//! list it lives in first, then its own labels, then labels added by the
//! model's label rules. Later tables override attributes of earlier ones.

use std::collections::BTreeMap;

use itertools::Itertools;
use log::debug;

use crate::channels::{AttributeKey, Mechanism, ModelDefinition};
use crate::compartments::{Cell, SectionId, SectionList};
use crate::error::{MorphologyError, Result};

/// Everything the simulator has to set on one section.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedSection {
    pub section: SectionId,
    pub name: String,
    pub labels: Vec<String>,
    pub length: f64,
    pub diameter: f64,
    pub nseg: usize,
    pub mechanisms: Vec<Mechanism>,
    pub attributes: BTreeMap<AttributeKey, f64>,
    pub synapses: Vec<&'static str>,
}

impl ResolvedSection {
    pub fn attribute(&self, key: AttributeKey) -> Option<f64> {
        self.attributes.get(&key).copied()
    }

    pub fn global(&self, name: &'static str) -> Option<f64> {
        self.attribute(AttributeKey::Global(name))
    }

    pub fn on(&self, attribute: &'static str, mechanism: &'static str) -> Option<f64> {
        self.attribute(AttributeKey::Mechanism {
            attribute,
            mechanism,
        })
    }
}

impl ModelDefinition {
    /// The labels a section is parameterized by, in application order.
    pub fn labels_for(&self, cell: &Cell, id: SectionId) -> Vec<String> {
        let ruled = self.label_rules.iter().filter(|rule| {
            let list = match rule.from {
                SectionList::Soma => cell.soma(),
                SectionList::Dendrites => cell.dendrites(),
                SectionList::Axon => cell.axon(),
            };
            list.get(rule.index) == Some(&id)
        });

        cell.effective_labels(id)
            .into_iter()
            .map(str::to_owned)
            .chain(ruled.map(|rule| rule.label.to_owned()))
            .unique()
            .collect()
    }

    pub fn resolve_section(&self, cell: &Cell, id: SectionId) -> Result<ResolvedSection> {
        let section = cell.section(id);
        let labels = self.labels_for(cell, id);

        let mut mechanisms: Vec<Mechanism> = Vec::new();
        let mut attributes: BTreeMap<AttributeKey, f64> = BTreeMap::new();
        let mut synapses: Vec<&'static str> = Vec::new();

        for label in &labels {
            let Some(table) = self.section_type(label) else {
                debug!("{}: section {} has no table for label {}", self.name, section.name(), label);
                continue;
            };
            for mechanism in &table.mechanisms {
                if !mechanisms.contains(mechanism) {
                    mechanisms.push(*mechanism);
                }
            }
            for synapse in &table.synapses {
                if !synapses.contains(synapse) {
                    synapses.push(*synapse);
                }
            }
            attributes.extend(table.attributes.iter().copied());
        }

        for key in attributes.keys() {
            if let AttributeKey::Mechanism {
                attribute,
                mechanism,
            } = key
            {
                if !mechanisms.iter().any(|m| m.name == *mechanism) {
                    return Err(MorphologyError::MissingMechanism {
                        section: section.name().to_owned(),
                        attribute: (*attribute).to_owned(),
                        mechanism: (*mechanism).to_owned(),
                    });
                }
            }
        }

        let length = attributes
            .get(&AttributeKey::Global("L"))
            .copied()
            .unwrap_or(section.length());
        let diameter = attributes
            .get(&AttributeKey::Global("diam"))
            .copied()
            .unwrap_or(section.diameter());

        Ok(ResolvedSection {
            section: id,
            name: section.name().to_owned(),
            labels,
            length,
            diameter,
            nseg: section.nseg(),
            mechanisms,
            attributes,
            synapses,
        })
    }

    /// Resolves every section of the cell, in arena order.
    pub fn resolve(&self, cell: &Cell) -> Result<Vec<ResolvedSection>> {
        (0..cell.len())
            .map(|i| self.resolve_section(cell, SectionId(i)))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::build;
    use crate::channels::SectionType;
    use crate::compartments::{AttachEnd, CellBuilder, Point3, Section};
    use crate::models::{GranuleVariant, basket_cell};

    #[test]
    fn test_every_variant_resolves() {
        let granule = build(Point3::default());
        for variant in GranuleVariant::ALL {
            let resolved = variant.definition().resolve(granule.cell()).unwrap();
            assert_eq!(resolved.len(), granule.cell().len());
        }
    }

    #[test]
    fn test_soma_and_dendrites() {
        let granule = build(Point3::default());
        let model = GranuleVariant::Regular.definition();
        let cell = granule.cell();

        let soma = model.resolve_section(cell, cell.soma()[0]).unwrap();
        assert_eq!(soma.labels, vec!["soma"]);
        assert_eq!(soma.mechanisms.len(), 9);
        assert_eq!(soma.global("cm"), Some(2.0));
        assert!(soma.synapses.is_empty());

        let dend = model.resolve_section(cell, cell.dendrites()[0]).unwrap();
        assert_eq!(dend.synapses, vec!["NMDA", "AMPA", "GABA"]);
        assert!(dend.mechanisms.contains(&Mechanism::tagged("Leak", "GABA")));
        assert!(dend.mechanisms.contains(&Mechanism::new("Leak")));
        assert_eq!(dend.global("cm"), Some(2.5));
    }

    #[test]
    fn test_axonal_roles() {
        let granule = build(Point3::default());
        let model = GranuleVariant::Adapting.definition();
        let cell = granule.cell();

        let hillock = model.resolve_section(cell, granule.axon_hillock()).unwrap();
        assert_eq!(hillock.labels, vec!["axon", "axon_hillock"]);
        assert_eq!(hillock.on("gnabar", "Na"), Some(0.020910983616370001));

        let aa = model.resolve_section(cell, granule.ascending_axon()).unwrap();
        assert_eq!(aa.nseg, 18);
        assert_eq!(aa.mechanisms[0], Mechanism::tagged("Na", "granule_cell"));
    }

    #[test]
    fn test_fiber_table_overrides_diameter() {
        let granule = build(Point3::default());
        let model = GranuleVariant::Regular.definition();
        let pf = model
            .resolve_section(granule.cell(), granule.parallel_fiber()[7])
            .unwrap();
        assert_eq!(pf.diameter, 0.15);
        assert_eq!(pf.length, 20.0);
        assert_eq!(granule.cell().section(pf.section).diameter(), 0.3);
    }

    #[test]
    fn test_later_label_overrides_attribute() {
        let mut model = ModelDefinition::new("test");
        model.section_types.insert("soma", SectionType::new().set("cm", 1.0));
        model.section_types.insert("big", SectionType::new().set("cm", 3.0));

        let mut builder = CellBuilder::new(Point3::default());
        builder.push(Section::new("soma", 1.0, 1.0).with_label("big"), SectionList::Soma);
        let cell = builder.finish();

        let soma = model.resolve_section(&cell, SectionId(0)).unwrap();
        assert_eq!(soma.global("cm"), Some(3.0));
    }

    #[test]
    fn test_attribute_without_mechanism_is_rejected() {
        let mut model = ModelDefinition::new("broken");
        model.section_types.insert(
            "soma",
            SectionType::new()
                .mechanisms([Mechanism::new("Leak")])
                .set_on("gbar", "Kv1_1", 0.1),
        );
        let mut builder = CellBuilder::new(Point3::default());
        builder.push(Section::new("soma", 1.0, 1.0), SectionList::Soma);
        let err = model.resolve(&builder.finish()).unwrap_err();
        assert!(matches!(err, MorphologyError::MissingMechanism { .. }));
    }

    #[test]
    fn test_label_rule_marks_first_axon_section() {
        let mut builder = CellBuilder::new(Point3::default());
        let soma = builder.push(Section::new("soma", 1.0, 1.0), SectionList::Soma);
        let first = builder.push(
            Section::new("axon_0", 1.0, 1.0).connected_to(soma, AttachEnd::Distal),
            SectionList::Axon,
        );
        builder.push(
            Section::new("axon_1", 1.0, 1.0).connected_to(first, AttachEnd::Distal),
            SectionList::Axon,
        );
        let cell = builder.finish();
        let model = basket_cell();

        let resolved = model.resolve(&cell).unwrap();
        assert_eq!(resolved[1].labels, vec!["axon", "axon_initial_segment"]);
        assert_eq!(resolved[1].on("gbar", "Nav1_6"), Some(0.5724695612));
        assert_eq!(resolved[2].labels, vec!["axon"]);
        assert_eq!(resolved[2].on("gbar", "Nav1_6"), Some(0.0072983226));
    }
}
