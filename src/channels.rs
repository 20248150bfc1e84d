//! The channels define the dynamics that take place within a compartment.
//! Their implementations live in the simulator; here we only name them and
//! describe how each compartment role is parameterized.
//! Based on: https://nrn.readthedocs.io/en/9.0.0/tutorials/scripting-neuron-basics.html#Biophysical-mechanisms

use std::collections::BTreeMap;
use std::fmt;

use crate::compartments::SectionList;

/// An ion channel, pump or point process, optionally narrowed to a variant
/// of its implementation (`Na` vs `Na` tagged `granule_cell_FHF`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Mechanism {
    pub name: &'static str,
    pub variant: Option<&'static str>,
}

impl Mechanism {
    pub const fn new(name: &'static str) -> Self {
        Mechanism { name, variant: None }
    }

    pub const fn tagged(name: &'static str, variant: &'static str) -> Self {
        Mechanism {
            name,
            variant: Some(variant),
        }
    }
}

impl fmt::Display for Mechanism {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.variant {
            Some(variant) => write!(f, "{}[{}]", self.name, variant),
            None => write!(f, "{}", self.name),
        }
    }
}

/// A section attribute, either a plain section property (`Ra`, `cm`, `ek`)
/// or a range variable of one mechanism (`gmax` of `Leak`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum AttributeKey {
    Global(&'static str),
    Mechanism {
        attribute: &'static str,
        mechanism: &'static str,
    },
}

impl fmt::Display for AttributeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AttributeKey::Global(name) => write!(f, "{}", name),
            AttributeKey::Mechanism {
                attribute,
                mechanism,
            } => write!(f, "{}_{}", attribute, mechanism),
        }
    }
}

/// Mechanisms, attributes and synapses applied to every section carrying a role label.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SectionType {
    pub mechanisms: Vec<Mechanism>,
    pub attributes: Vec<(AttributeKey, f64)>,
    pub synapses: Vec<&'static str>,
}

impl SectionType {
    pub fn new() -> Self {
        SectionType::default()
    }

    pub fn mechanisms(mut self, mechanisms: impl IntoIterator<Item = Mechanism>) -> Self {
        self.mechanisms.extend(mechanisms);
        self
    }

    pub fn synapses(mut self, synapses: impl IntoIterator<Item = &'static str>) -> Self {
        self.synapses.extend(synapses);
        self
    }

    pub fn set(mut self, name: &'static str, value: f64) -> Self {
        self.attributes.push((AttributeKey::Global(name), value));
        self
    }

    pub fn set_on(mut self, attribute: &'static str, mechanism: &'static str, value: f64) -> Self {
        self.attributes.push((
            AttributeKey::Mechanism {
                attribute,
                mechanism,
            },
            value,
        ));
        self
    }

    pub fn attribute(&self, key: AttributeKey) -> Option<f64> {
        self.attributes
            .iter()
            .rev()
            .find(|(k, _)| *k == key)
            .map(|(_, v)| *v)
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

    pub fn has_mechanism(&self, name: &str) -> bool {
        self.mechanisms.iter().any(|m| m.name == name)
    }
}

/// A synapse model: the point process it instantiates and its kinetics.
#[derive(Debug, Clone, PartialEq)]
pub struct SynapseType {
    pub point_process: Mechanism,
    pub attributes: Vec<(&'static str, f64)>,
}

impl SynapseType {
    pub fn attribute(&self, name: &str) -> Option<f64> {
        self.attributes
            .iter()
            .find(|(k, _)| *k == name)
            .map(|(_, v)| *v)
    }
}

/// Adds `label` to the `index`-th section of a list, for morphologies that
/// arrive without fine grained labels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LabelRule {
    pub label: &'static str,
    pub from: SectionList,
    pub index: usize,
}

/// Everything needed to parameterize one cell model.
#[derive(Debug, Clone, PartialEq)]
pub struct ModelDefinition {
    pub name: &'static str,
    pub section_types: BTreeMap<&'static str, SectionType>,
    pub synapse_types: BTreeMap<&'static str, SynapseType>,
    pub label_rules: Vec<LabelRule>,
}

impl ModelDefinition {
    pub fn new(name: &'static str) -> Self {
        ModelDefinition {
            name,
            section_types: BTreeMap::new(),
            synapse_types: BTreeMap::new(),
            label_rules: Vec::new(),
        }
    }

    pub fn section_type(&self, role: &str) -> Option<&SectionType> {
        self.section_types.get(role)
    }

    pub fn synapse_type(&self, name: &str) -> Option<&SynapseType> {
        self.synapse_types.get(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_attribute_lookup() {
        let table = SectionType::new()
            .mechanisms([Mechanism::new("Leak"), Mechanism::tagged("Na", "granule_cell")])
            .set("Ra", 100.0)
            .set_on("gmax", "Leak", 0.5);
        assert_eq!(table.global("Ra"), Some(100.0));
        assert_eq!(table.on("gmax", "Leak"), Some(0.5));
        assert_eq!(table.on("gmax", "Na"), None);
        assert!(table.has_mechanism("Na"));
        assert!(!table.has_mechanism("Km"));
    }

    #[test]
    fn test_display() {
        assert_eq!(Mechanism::tagged("cdp5", "CR").to_string(), "cdp5[CR]");
        assert_eq!(Mechanism::new("Leak").to_string(), "Leak");
        let key = AttributeKey::Mechanism {
            attribute: "gkbar",
            mechanism: "Kv3_4",
        };
        assert_eq!(key.to_string(), "gkbar_Kv3_4");
    }
}
