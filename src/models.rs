//! Parameter tables of the cerebellar cell models.
//!
//! The four granule cell variants share one table layout; only their
//! conductances and the calcium buffer of `cdp5` differ.

#![allow(clippy::excessive_precision)]

use std::fmt;
use std::path::Path;
use std::str::FromStr;

use crate::channels::{LabelRule, Mechanism, ModelDefinition, SectionType, SynapseType};
use crate::compartments::{Cell, SectionList};
use crate::error::{MorphologyError, Result as MorphologyResult};
use crate::swc::read_swc;

/// Calcium buffer flavour of the `cdp5` pump.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CalciumBuffer {
    /// Calretinin
    Cr,
    /// Calmodulin
    Cam,
}

impl CalciumBuffer {
    pub fn tag(self) -> &'static str {
        match self {
            CalciumBuffer::Cr => "CR",
            CalciumBuffer::Cam => "CAM",
        }
    }

    fn mechanism(self) -> Mechanism {
        Mechanism::tagged("cdp5", self.tag())
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SomaConductances {
    pub leak: f64,
    pub kv3_4: f64,
    pub kv4_3: f64,
    pub kir2_3: f64,
    pub ca: f64,
    pub kv1_1: f64,
    pub kv1_5: f64,
    pub kv2_2: f64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DendriteConductances {
    pub leak: f64,
    pub ca: f64,
    pub kca1_1: f64,
    pub kv1_1: f64,
}

/// Shared by the ascending axon and the parallel fiber.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FiberConductances {
    pub na: f64,
    pub kv3_4: f64,
    pub leak: f64,
    pub ca: f64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct InitialSegmentConductances {
    pub na: f64,
    pub kv3_4: f64,
    pub leak: f64,
    pub ca: f64,
    pub km: f64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HillockConductances {
    pub leak: f64,
    pub na: f64,
    pub kv3_4: f64,
    pub ca: f64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GranuleConductances {
    pub soma: SomaConductances,
    pub dendrites: DendriteConductances,
    pub ascending_axon: FiberConductances,
    pub parallel_fiber: FiberConductances,
    pub axon_initial_segment: InitialSegmentConductances,
    pub axon_hillock: HillockConductances,
}

static REGULAR: GranuleConductances = GranuleConductances {
    soma: SomaConductances {
        leak: 0.00029038073716,
        kv3_4: 0.00076192450951999995,
        kv4_3: 0.0028149683906099998,
        kir2_3: 0.00074725514701999996,
        ca: 0.00060938071783999998,
        kv1_1: 0.0056973826455499997,
        kv1_5: 0.00083407556713999999,
        kv2_2: 1.203410852e-05,
    },
    dendrites: DendriteConductances {
        leak: 0.00025029700736999997,
        ca: 0.0050012800845900002,
        kca1_1: 0.010018074546510001,
        kv1_1: 0.00381819207934,
    },
    ascending_axon: FiberConductances {
        na: 0.026301636815019999,
        kv3_4: 0.00237386061632,
        leak: 9.3640921249999996e-05,
        ca: 0.00068197420273000001,
    },
    parallel_fiber: FiberConductances {
        na: 0.017718484492610001,
        kv3_4: 0.0081756804703699993,
        leak: 3.5301616000000001e-07,
        ca: 0.00020856833529999999,
    },
    axon_initial_segment: InitialSegmentConductances {
        na: 1.28725006737226,
        kv3_4: 0.0064959534065400001,
        leak: 0.00029276697557000002,
        ca: 0.00031198539471999999,
        km: 0.00056671971737000002,
    },
    axon_hillock: HillockConductances {
        leak: 0.00036958189720000001,
        na: 0.0092880585146199995,
        kv3_4: 0.020373463109149999,
        ca: 0.00057726155447,
    },
};

static MILD_ADAPTING: GranuleConductances = GranuleConductances {
    soma: SomaConductances {
        leak: 0.00020821612897999999,
        kv3_4: 0.00053837153610999998,
        kv4_3: 0.0032501728450999999,
        kir2_3: 0.00080747403035999997,
        ca: 0.00066384354030999998,
        kv1_1: 0.0046520692281700003,
        kv1_5: 0.00106988075956,
        kv2_2: 2.5949576899999998e-05,
    },
    dendrites: DendriteConductances {
        leak: 0.00020424219215,
        ca: 0.01841833779253,
        kca1_1: 0.02998872868395,
        kv1_1: 0.00010675447184,
    },
    ascending_axon: FiberConductances {
        na: 0.029973709719629999,
        kv3_4: 0.0046029972380800003,
        leak: 7.8963697590000003e-05,
        ca: 0.00059214434259999998,
    },
    parallel_fiber: FiberConductances {
        na: 0.01896618618573,
        kv3_4: 0.0094015060525799998,
        leak: 4.1272473000000001e-07,
        ca: 0.00064742320254000001,
    },
    axon_initial_segment: InitialSegmentConductances {
        na: 1.06883116205825,
        kv3_4: 0.034592458064240002,
        leak: 0.00025011065810000001,
        ca: 0.00011630629281,
        km: 0.00044764153078999998,
    },
    axon_hillock: HillockConductances {
        leak: 0.00025295417368000002,
        na: 0.011082499796400001,
        kv3_4: 0.050732563882920002,
        ca: 0.00028797253573000002,
    },
};

static ADAPTING: GranuleConductances = GranuleConductances {
    soma: SomaConductances {
        leak: 0.00027672909671000001,
        kv3_4: 0.00373151328841,
        kv4_3: 0.0027313162972600002,
        kir2_3: 0.00094360184424999995,
        ca: 0.00029165028328999998,
        kv1_1: 0.0031675812802999998,
        kv1_5: 0.00107176612352,
        kv2_2: 6.710092624e-05,
    },
    dendrites: DendriteConductances {
        leak: 0.00029871180381000001,
        ca: 0.024687091736070001,
        kca1_1: 0.01185742892862,
        kv1_1: 0.00015853886699000001,
    },
    ascending_axon: FiberConductances {
        na: 0.025441894508310001,
        kv3_4: 0.0046504514953399998,
        leak: 5.3037170669999997e-05,
        ca: 0.00031374692347000001,
    },
    parallel_fiber: FiberConductances {
        na: 0.0142518259615,
        kv3_4: 0.0098649550733799999,
        leak: 1.4118927999999999e-07,
        ca: 0.00024821458382999999,
    },
    axon_initial_segment: InitialSegmentConductances {
        na: 1.5810107836409499,
        kv3_4: 0.039582385081389997,
        leak: 0.00025512657995000002,
        ca: 0.00038160760886000002,
        km: 0.00049717923887,
    },
    axon_hillock: HillockConductances {
        leak: 0.00031475453130000002,
        na: 0.020910983616370001,
        kv3_4: 0.03097630887484,
        ca: 0.00019803691988000001,
    },
};

/// The granule cell firing patterns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GranuleVariant {
    Regular,
    MildAdapting,
    Adapting,
    Accelerating,
}

impl GranuleVariant {
    pub const ALL: [GranuleVariant; 4] = [
        GranuleVariant::Regular,
        GranuleVariant::MildAdapting,
        GranuleVariant::Adapting,
        GranuleVariant::Accelerating,
    ];

    pub fn name(self) -> &'static str {
        match self {
            GranuleVariant::Regular => "GranuleCell",
            GranuleVariant::MildAdapting => "GranuleCellMildAdapting",
            GranuleVariant::Adapting => "GranuleCellAdapting",
            GranuleVariant::Accelerating => "GranuleCellAccelerate",
        }
    }

    /// The accelerating cell keeps the regular conductances and swaps the buffer.
    pub fn conductances(self) -> &'static GranuleConductances {
        match self {
            GranuleVariant::Regular | GranuleVariant::Accelerating => &REGULAR,
            GranuleVariant::MildAdapting => &MILD_ADAPTING,
            GranuleVariant::Adapting => &ADAPTING,
        }
    }

    pub fn calcium_buffer(self) -> CalciumBuffer {
        match self {
            GranuleVariant::Accelerating => CalciumBuffer::Cam,
            _ => CalciumBuffer::Cr,
        }
    }

    pub fn definition(self) -> ModelDefinition {
        granule_definition(self.name(), self.conductances(), self.calcium_buffer())
    }
}

impl fmt::Display for GranuleVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for GranuleVariant {
    type Err = MorphologyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        GranuleVariant::ALL
            .into_iter()
            .find(|v| v.name() == s)
            .ok_or_else(|| MorphologyError::UnknownVariant(s.to_owned()))
    }
}

fn granule_synapses() -> Vec<(&'static str, SynapseType)> {
    let kinetics = |gmax: f64| {
        vec![
            ("tau_facil", 5.0),
            ("tau_rec", 8.0),
            ("tau_1", 1.0),
            ("gmax", gmax),
            ("U", 0.43),
        ]
    };
    vec![
        (
            "AMPA",
            SynapseType {
                point_process: Mechanism::tagged("AMPA", "granule"),
                attributes: kinetics(1400.0),
            },
        ),
        (
            "NMDA",
            SynapseType {
                point_process: Mechanism::tagged("NMDA", "granule"),
                attributes: kinetics(23500.0),
            },
        ),
        (
            "GABA",
            SynapseType {
                point_process: Mechanism::tagged("GABA", "granule"),
                attributes: vec![("U", 0.35)],
            },
        ),
    ]
}

fn granule_definition(
    name: &'static str,
    g: &GranuleConductances,
    buffer: CalciumBuffer,
) -> ModelDefinition {
    let cdp5 = buffer.mechanism();
    let na = Mechanism::tagged("Na", "granule_cell");
    let na_fhf = Mechanism::tagged("Na", "granule_cell_FHF");
    let m = Mechanism::new;

    let soma = SectionType::new()
        .mechanisms([
            m("Leak"),
            m("Kv3_4"),
            m("Kv4_3"),
            m("Kir2_3"),
            m("Ca"),
            m("Kv1_1"),
            m("Kv1_5"),
            m("Kv2_2"),
            cdp5,
        ])
        .set("Ra", 100.0)
        .set("cm", 2.0)
        .set_on("e", "Leak", -60.0)
        .set("ek", -88.0)
        .set("eca", 137.5)
        .set_on("gmax", "Leak", g.soma.leak)
        .set_on("gkbar", "Kv3_4", g.soma.kv3_4)
        .set_on("gkbar", "Kv4_3", g.soma.kv4_3)
        .set_on("gkbar", "Kir2_3", g.soma.kir2_3)
        .set_on("gcabar", "Ca", g.soma.ca)
        .set_on("gbar", "Kv1_1", g.soma.kv1_1)
        .set_on("gKur", "Kv1_5", g.soma.kv1_5)
        .set_on("gKv2_2bar", "Kv2_2", g.soma.kv2_2);

    let dendrites = SectionType::new()
        .synapses(["NMDA", "AMPA", "GABA"])
        .mechanisms([
            m("Leak"),
            Mechanism::tagged("Leak", "GABA"),
            m("Ca"),
            m("Kca1_1"),
            m("Kv1_1"),
            cdp5,
        ])
        .set("Ra", 100.0)
        .set("cm", 2.5)
        .set_on("e", "Leak", -60.0)
        .set("ek", -88.0)
        .set("eca", 137.5)
        .set_on("gmax", "Leak", g.dendrites.leak)
        .set_on("gcabar", "Ca", g.dendrites.ca)
        .set_on("gbar", "Kca1_1", g.dendrites.kca1_1)
        .set_on("gbar", "Kv1_1", g.dendrites.kv1_1);

    let fiber = |c: &FiberConductances| {
        SectionType::new()
            .mechanisms([na, m("Kv3_4"), m("Leak"), m("Ca"), cdp5])
            .set("Ra", 100.0)
            .set("cm", 1.0)
            .set("ena", 87.39)
            .set("ek", -88.0)
            .set_on("e", "Leak", -60.0)
            .set("eca", 137.5)
            .set_on("gnabar", "Na", c.na)
            .set_on("gkbar", "Kv3_4", c.kv3_4)
            .set_on("gmax", "Leak", c.leak)
            .set_on("gcabar", "Ca", c.ca)
    };
    let ascending_axon = fiber(&g.ascending_axon);

    // The fiber table also narrows the sections below their built diameter
    let mut parallel_fiber = SectionType::new().set("L", 20.0).set("diam", 0.15);
    let pf_rest = fiber(&g.parallel_fiber);
    parallel_fiber.mechanisms = pf_rest.mechanisms;
    parallel_fiber.attributes.extend(pf_rest.attributes);

    let ais = &g.axon_initial_segment;
    let axon_initial_segment = SectionType::new()
        .mechanisms([na_fhf, m("Kv3_4"), m("Leak"), m("Ca"), m("Km"), cdp5])
        .set("Ra", 100.0)
        .set("cm", 1.0)
        .set("ena", 87.39)
        .set("ek", -88.0)
        .set("eca", 137.5)
        .set_on("e", "Leak", -60.0)
        .set_on("gnabar", "Na", ais.na)
        .set_on("gkbar", "Kv3_4", ais.kv3_4)
        .set_on("gmax", "Leak", ais.leak)
        .set_on("gcabar", "Ca", ais.ca)
        .set_on("gkbar", "Km", ais.km);

    let hillock = &g.axon_hillock;
    let axon_hillock = SectionType::new()
        .mechanisms([m("Leak"), na_fhf, m("Kv3_4"), m("Ca"), cdp5])
        .set("Ra", 100.0)
        .set("cm", 2.0)
        .set_on("e", "Leak", -60.0)
        .set("ena", 87.39)
        .set("ek", -88.0)
        .set("eca", 137.5)
        .set_on("gmax", "Leak", hillock.leak)
        .set_on("gnabar", "Na", hillock.na)
        .set_on("gkbar", "Kv3_4", hillock.kv3_4)
        .set_on("gcabar", "Ca", hillock.ca);

    let mut model = ModelDefinition::new(name);
    model.section_types.extend([
        ("soma", soma),
        ("dendrites", dendrites),
        ("axon", SectionType::new()),
        ("ascending_axon", ascending_axon),
        ("parallel_fiber", parallel_fiber),
        ("axon_initial_segment", axon_initial_segment),
        ("axon_hillock", axon_hillock),
    ]);
    model.synapse_types.extend(granule_synapses());
    model
}

/// File name of the basket cell reconstruction the table was tuned on.
pub const BASKET_MORPHOLOGY: &str = "01bc.swc";

/// The basket cell has no builder; its morphology is read from a
/// reconstruction and the first axon section becomes the initial segment.
pub fn basket_cell() -> ModelDefinition {
    let m = Mechanism::new;
    let common = |ty: SectionType| {
        ty.set("Ra", 122.0)
            .set("cm", 1.0)
            .set("ena", 60.0)
            .set("ek", -80.0)
    };

    let soma = common(SectionType::new().mechanisms([
        m("Leak"),
        m("Nav1_1"),
        m("Cav3_2"),
        m("Cav3_3"),
        m("CaL13"),
        m("Kir2_3"),
        m("Kv3_4"),
        m("Kca1_1"),
        m("Cav2_1"),
        m("HCN1"),
        m("cdp5"),
    ]))
    .set("eca", 137.5)
    .set("eh", -34.0)
    .set_on("e", "Leak", -60.0)
    .set_on("gmax", "Leak", 0.00003)
    .set_on("gbar", "Nav1_1", 0.10946415489712)
    .set_on("gcabar", "Cav3_2", 0.0006295539)
    .set_on("pcabar", "Cav3_3", 0.0007543986)
    .set_on("pmax", "CaL13", 0.0002593795)
    .set_on("gkbar", "Kir2_3", 0.0012770833)
    .set_on("gkbar", "Kv3_4", 0.0277114781)
    .set_on("gbar", "Kca1_1", 0.0044251081)
    .set_on("pcabar", "Cav2_1", 0.000846789)
    .set_on("gbar", "HCN1", 0.0006902196)
    .set_on("TotalPump", "cdp5", 1e-9);

    let dendrites = common(SectionType::new().mechanisms([
        m("Leak"),
        m("Cav2_1"),
        m("Kca1_1"),
        m("Kv1_1"),
        m("cdp5"),
    ]))
    .set("eh", -34.0)
    .set_on("e", "Leak", -60.0)
    .set_on("gmax", "Leak", 0.00003)
    .set_on("pcabar", "Cav2_1", 0.0004965596)
    .set_on("gbar", "Kca1_1", 0.0020575902)
    .set_on("gbar", "Kv1_1", 0.0285137286);

    let axon = common(SectionType::new().mechanisms([
        m("Leak"),
        m("Kv1_1"),
        m("Nav1_6"),
        m("Kv3_4"),
        m("HCN1"),
        m("cdp5"),
    ]))
    .set("eh", -34.0)
    .set_on("e", "Leak", -60.0)
    .set_on("gmax", "Leak", 0.00003)
    .set_on("gbar", "Kv1_1", 0.0069654709)
    .set_on("gbar", "Nav1_6", 0.0072983226)
    .set_on("gkbar", "Kv3_4", 0.0151487764)
    .set_on("gbar", "HCN1", 0.0034633208);

    let axon_initial_segment = common(SectionType::new().mechanisms([
        m("Leak"),
        m("HCN1"),
        m("Nav1_6"),
        m("Kv1_1"),
        m("Kv3_4"),
        m("cdp5"),
    ]))
    .set("eh", -34.0)
    .set_on("e", "Leak", -60.0)
    .set_on("gmax", "Leak", 0.00003)
    .set_on("gbar", "HCN1", 0.0048096086)
    .set_on("gbar", "Nav1_6", 0.5724695612)
    .set_on("gbar", "Kv1_1", 0.0827297077)
    .set_on("gkbar", "Kv3_4", 0.0300388404);

    let mut model = ModelDefinition::new("BasketCell");
    model.section_types.extend([
        ("soma", soma),
        ("dendrites", dendrites),
        ("axon", axon),
        ("axon_initial_segment", axon_initial_segment),
    ]);
    model.label_rules.push(LabelRule {
        label: "axon_initial_segment",
        from: SectionList::Axon,
        index: 0,
    });
    model
}

/// Loads a reconstructed basket cell; zero radii are patched, not rejected.
pub fn load_basket_morphology(path: impl AsRef<Path>) -> MorphologyResult<Cell> {
    let morphology = read_swc(path, Some(true), Some(false))?;
    Cell::from_swc(&morphology)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_variant_names_round_trip() {
        for variant in GranuleVariant::ALL {
            assert_eq!(variant.name().parse::<GranuleVariant>().unwrap(), variant);
        }
        assert!(matches!(
            "PurkinjeCell".parse::<GranuleVariant>(),
            Err(MorphologyError::UnknownVariant(_))
        ));
    }

    #[test]
    fn test_granule_roles() {
        let model = GranuleVariant::Regular.definition();
        let roles: Vec<_> = model.section_types.keys().copied().collect();
        assert_eq!(
            roles,
            vec![
                "ascending_axon",
                "axon",
                "axon_hillock",
                "axon_initial_segment",
                "dendrites",
                "parallel_fiber",
                "soma"
            ]
        );
        assert!(model.section_type("axon").unwrap().mechanisms.is_empty());
        assert_eq!(
            model.section_type("dendrites").unwrap().synapses,
            vec!["NMDA", "AMPA", "GABA"]
        );
    }

    #[test]
    fn test_regular_soma_values() {
        let model = GranuleVariant::Regular.definition();
        let soma = model.section_type("soma").unwrap();
        assert_eq!(soma.global("cm"), Some(2.0));
        assert_eq!(soma.on("e", "Leak"), Some(-60.0));
        assert_eq!(soma.on("gmax", "Leak"), Some(0.00029038073716));
        assert_eq!(soma.on("gKv2_2bar", "Kv2_2"), Some(1.203410852e-05));
        assert_eq!(soma.mechanisms.last(), Some(&Mechanism::tagged("cdp5", "CR")));
    }

    #[test]
    fn test_initial_segment_uses_fhf_sodium() {
        let model = GranuleVariant::Adapting.definition();
        let ais = model.section_type("axon_initial_segment").unwrap();
        assert_eq!(ais.mechanisms[0], Mechanism::tagged("Na", "granule_cell_FHF"));
        assert_eq!(ais.on("gnabar", "Na"), Some(1.5810107836409499));
        assert_eq!(ais.on("gkbar", "Km"), Some(0.00049717923887));
    }

    #[test]
    fn test_parallel_fiber_overrides_geometry() {
        let model = GranuleVariant::MildAdapting.definition();
        let pf = model.section_type("parallel_fiber").unwrap();
        assert_eq!(pf.global("L"), Some(20.0));
        assert_eq!(pf.global("diam"), Some(0.15));
        assert_eq!(pf.on("gmax", "Leak"), Some(4.1272473000000001e-07));
        assert_eq!(pf.mechanisms[0], Mechanism::tagged("Na", "granule_cell"));
    }

    #[test]
    fn test_accelerating_only_swaps_buffer() {
        let regular = GranuleVariant::Regular.definition();
        let accelerating = GranuleVariant::Accelerating.definition();
        for (role, table) in &regular.section_types {
            let other = &accelerating.section_types[role];
            assert_eq!(table.attributes, other.attributes, "role {}", role);
            for (a, b) in table.mechanisms.iter().zip(&other.mechanisms) {
                if a.name == "cdp5" {
                    assert_eq!(a.variant, Some("CR"));
                    assert_eq!(b.variant, Some("CAM"));
                } else {
                    assert_eq!(a, b);
                }
            }
        }
        assert_eq!(regular.synapse_types, accelerating.synapse_types);
    }

    #[test]
    fn test_variants_share_structure() {
        let regular = GranuleVariant::Regular.definition();
        for variant in GranuleVariant::ALL {
            let model = variant.definition();
            for (role, table) in &model.section_types {
                let keys: Vec<_> = table.attributes.iter().map(|(k, _)| *k).collect();
                let expected: Vec<_> = regular.section_types[role]
                    .attributes
                    .iter()
                    .map(|(k, _)| *k)
                    .collect();
                assert_eq!(keys, expected);
            }
        }
    }

    #[test]
    fn test_synapse_kinetics() {
        let model = GranuleVariant::Regular.definition();
        let ampa = model.synapse_type("AMPA").unwrap();
        let nmda = model.synapse_type("NMDA").unwrap();
        let gaba = model.synapse_type("GABA").unwrap();
        assert_eq!(ampa.point_process, Mechanism::tagged("AMPA", "granule"));
        assert_eq!(ampa.attribute("gmax"), Some(1400.0));
        assert_eq!(nmda.attribute("gmax"), Some(23500.0));
        assert_eq!(nmda.attribute("U"), Some(0.43));
        assert_eq!(gaba.attributes, vec![("U", 0.35)]);
    }

    #[test]
    fn test_basket_cell_table() {
        let model = basket_cell();
        assert_eq!(model.name, "BasketCell");
        let axon = model.section_type("axon").unwrap();
        assert!(axon.has_mechanism("HCN1"));
        assert!(axon.has_mechanism("cdp5"));
        assert_eq!(model.section_type("soma").unwrap().on("TotalPump", "cdp5"), Some(1e-9));
        assert_eq!(model.label_rules.len(), 1);
        assert!(model.synapse_types.is_empty());
    }

    #[test]
    fn test_basket_cell_on_reconstruction() {
        let path = format!("{}/data/basic.swc", env!("CARGO_MANIFEST_DIR"));
        let cell = load_basket_morphology(path).unwrap();
        let resolved = basket_cell().resolve(&cell).unwrap();

        let ais: Vec<_> = resolved
            .iter()
            .filter(|s| s.labels.iter().any(|l| l == "axon_initial_segment"))
            .collect();
        assert_eq!(ais.len(), 1);
        assert_eq!(ais[0].section, cell.axon()[0]);
        assert_eq!(resolved[0].global("eh"), Some(-34.0));
    }
}
