use std::fmt;

use serde::{Deserialize, Serialize};

use crate::{CableId, ComponentTypeId, FiberId, StructureId};

/// Physical direction of a port on a component type.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PortDirection {
    In,
    Out,
}

/// Side of a splice row. Side A is the `in` ports, side B the `out` ports.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    A,
    B,
}

impl Side {
    pub fn direction(self) -> PortDirection {
        match self {
            Side::A => PortDirection::In,
            Side::B => PortDirection::Out,
        }
    }

    pub fn from_direction(direction: PortDirection) -> Self {
        match direction {
            PortDirection::In => Side::A,
            PortDirection::Out => Side::B,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Side::A => "a",
            Side::B => "b",
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct Port {
    pub port_number: u32,
    pub direction: PortDirection,
    #[serde(default)]
    pub label: Option<String>,
}

impl Port {
    pub fn new(port_number: u32, direction: PortDirection) -> Self {
        Self {
            port_number,
            direction,
            label: None,
        }
    }

    pub fn side(&self) -> Side {
        Side::from_direction(self.direction)
    }
}

#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct ComponentType {
    pub id: ComponentTypeId,
    pub name: String,
    pub ports: Vec<Port>,
}

impl ComponentType {
    /// Component with `in_ports` side-A ports and `out_ports` side-B ports,
    /// each numbered from 1.
    pub fn with_port_counts(
        id: ComponentTypeId,
        name: impl Into<String>,
        in_ports: u32,
        out_ports: u32,
    ) -> Self {
        let ports = (1..=in_ports)
            .map(|number| Port::new(number, PortDirection::In))
            .chain((1..=out_ports).map(|number| Port::new(number, PortDirection::Out)))
            .collect();
        Self {
            id,
            name: name.into(),
            ports,
        }
    }
}

/// A physical component instance mounted in a node.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct Structure {
    pub id: StructureId,
    pub name: String,
    pub slot_start: u32,
    pub slot_end: u32,
    pub component_type: Option<ComponentTypeId>,
}

impl Structure {
    pub fn exposes_ports(&self) -> bool {
        self.component_type.is_some()
    }
}

#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct Fiber {
    pub id: FiberId,
    pub cable_id: CableId,
    pub fiber_number_absolute: u32,
    pub fiber_number_in_bundle: u32,
    pub bundle_number: u32,
    pub color: String,
}

#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct Bundle {
    pub cable_id: CableId,
    pub cable_name: String,
    pub bundle_number: u32,
    pub color: String,
    pub fibers: Vec<Fiber>,
}

#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct Cable {
    pub id: CableId,
    pub name: String,
    /// May be empty when the cable arrives by reference only.
    #[serde(default)]
    pub fibers: Vec<Fiber>,
}

impl Cable {
    /// Group the cable's fibers by bundle number, bundles ascending.
    pub fn bundles(&self) -> Vec<Bundle> {
        let mut numbers: Vec<u32> = self.fibers.iter().map(|f| f.bundle_number).collect();
        numbers.sort_unstable();
        numbers.dedup();
        numbers
            .into_iter()
            .map(|bundle_number| {
                let mut fibers: Vec<Fiber> = self
                    .fibers
                    .iter()
                    .filter(|fiber| fiber.bundle_number == bundle_number)
                    .cloned()
                    .collect();
                fibers.sort_by_key(|fiber| fiber.fiber_number_absolute);
                Bundle {
                    cable_id: self.id,
                    cable_name: self.name.clone(),
                    bundle_number,
                    color: fiber_color(bundle_number).to_string(),
                    fibers,
                }
            })
            .collect()
    }
}

const TIA_598_COLORS: [&str; 12] = [
    "blue", "orange", "green", "brown", "slate", "white", "red", "black", "yellow", "violet",
    "rose", "aqua",
];

/// TIA-598 color for a 1-based position within a bundle (or bundle within a cable).
pub fn fiber_color(position: u32) -> &'static str {
    let index = (position.max(1) - 1) as usize % TIA_598_COLORS.len();
    TIA_598_COLORS[index]
}
