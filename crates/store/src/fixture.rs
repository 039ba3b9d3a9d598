//! JSON description of a network node used to seed the in-memory authority.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use fibermesh_core::{
    Cable, CableId, ComponentType, ComponentTypeId, Fiber, FiberId, SpliceError, SpliceResult,
    Structure, fiber_color,
};

const SAMPLE_NODE_JSON: &str = include_str!("../fixtures/sample_node.json");

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct NodeFixture {
    pub name: String,
    pub component_types: Vec<ComponentTypeFixture>,
    pub structures: Vec<Structure>,
    #[serde(default)]
    pub cables: Vec<CableFixture>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ComponentTypeFixture {
    pub id: ComponentTypeId,
    pub name: String,
    pub in_ports: u32,
    pub out_ports: u32,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CableFixture {
    pub id: CableId,
    pub name: String,
    pub bundles: Vec<BundleFixture>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct BundleFixture {
    pub bundle_number: u32,
    pub fiber_count: u32,
}

impl NodeFixture {
    /// The sample node shipped with the crate.
    pub fn embedded() -> SpliceResult<Self> {
        Self::from_json_str(SAMPLE_NODE_JSON)
    }

    pub fn from_json_str(raw: &str) -> SpliceResult<Self> {
        serde_json::from_str(raw)
            .map_err(|err| SpliceError::validation(format!("node fixture parse: {err}")))
    }

    pub fn from_path(path: &Path) -> SpliceResult<Self> {
        let raw = fs::read_to_string(path).map_err(|err| {
            SpliceError::storage(format!("read fixture {}: {err}", path.display()))
        })?;
        Self::from_json_str(&raw)
    }

    /// Structures ordered by slot start.
    pub fn structures_in_slot_order(&self) -> Vec<Structure> {
        let mut structures = self.structures.clone();
        structures.sort_by_key(|structure| structure.slot_start);
        structures
    }
}

impl ComponentTypeFixture {
    pub fn build(&self) -> ComponentType {
        ComponentType::with_port_counts(self.id, self.name.clone(), self.in_ports, self.out_ports)
    }
}

impl CableFixture {
    /// Expand bundles into fibers numbered consecutively across the cable.
    pub fn build(&self) -> Cable {
        let mut bundles = self.bundles.clone();
        bundles.sort_by_key(|bundle| bundle.bundle_number);
        let mut absolute = 0;
        let mut fibers = Vec::new();
        for bundle in &bundles {
            for in_bundle in 1..=bundle.fiber_count {
                absolute += 1;
                fibers.push(Fiber {
                    id: FiberId::new(),
                    cable_id: self.id,
                    fiber_number_absolute: absolute,
                    fiber_number_in_bundle: in_bundle,
                    bundle_number: bundle.bundle_number,
                    color: fiber_color(in_bundle).to_string(),
                });
            }
        }
        Cable {
            id: self.id,
            name: self.name.clone(),
            fibers,
        }
    }
}
