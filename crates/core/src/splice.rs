use serde::{Deserialize, Serialize};

use crate::{CableId, Fiber, FiberId, MergeGroupId, Side, SpliceId, StructureId};

/// Denormalized view of the fiber terminating on one side of a port.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct FiberSummary {
    pub fiber_id: FiberId,
    pub cable_id: CableId,
    pub fiber_number_absolute: u32,
    pub bundle_number: u32,
    pub color: String,
    pub cable_name: String,
}

impl FiberSummary {
    pub fn from_fiber(fiber: &Fiber, cable_name: impl Into<String>) -> Self {
        Self {
            fiber_id: fiber.id,
            cable_id: fiber.cable_id,
            fiber_number_absolute: fiber.fiber_number_absolute,
            bundle_number: fiber.bundle_number,
            color: fiber.color.clone(),
            cable_name: cable_name.into(),
        }
    }
}

#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct MergeGroupInfo {
    pub port_numbers: Vec<u32>,
    pub size: usize,
}

impl MergeGroupInfo {
    pub fn new(mut port_numbers: Vec<u32>) -> Self {
        port_numbers.sort_unstable();
        let size = port_numbers.len();
        Self { port_numbers, size }
    }

    pub fn first_port(&self) -> Option<u32> {
        self.port_numbers.first().copied()
    }

    pub fn contains(&self, port_number: u32) -> bool {
        self.port_numbers.contains(&port_number)
    }

    /// Human label for the group, e.g. `"1-3"`.
    pub fn port_range(&self) -> String {
        match (self.port_numbers.first(), self.port_numbers.last()) {
            (Some(first), Some(last)) if first != last => format!("{first}-{last}"),
            (Some(first), _) => first.to_string(),
            _ => String::new(),
        }
    }
}

/// Everything recorded for one side of a splice row.
#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
pub struct SideEndpoint {
    pub fiber: Option<FiberSummary>,
    pub merge_group: Option<MergeGroupId>,
    pub merge_info: Option<MergeGroupInfo>,
}

impl SideEndpoint {
    pub fn is_vacant(&self) -> bool {
        self.fiber.is_none() && self.merge_group.is_none()
    }
}

/// Connection record for one port number of one structure.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct Splice {
    pub id: SpliceId,
    pub structure_id: StructureId,
    pub port_number: u32,
    pub endpoint_a: SideEndpoint,
    pub endpoint_b: SideEndpoint,
}

impl Splice {
    pub fn new(id: SpliceId, structure_id: StructureId, port_number: u32) -> Self {
        Self {
            id,
            structure_id,
            port_number,
            endpoint_a: SideEndpoint::default(),
            endpoint_b: SideEndpoint::default(),
        }
    }

    pub fn endpoint(&self, side: Side) -> &SideEndpoint {
        match side {
            Side::A => &self.endpoint_a,
            Side::B => &self.endpoint_b,
        }
    }

    pub fn endpoint_mut(&mut self, side: Side) -> &mut SideEndpoint {
        match side {
            Side::A => &mut self.endpoint_a,
            Side::B => &mut self.endpoint_b,
        }
    }

    pub fn fiber(&self, side: Side) -> Option<&FiberSummary> {
        self.endpoint(side).fiber.as_ref()
    }

    pub fn merge_group(&self, side: Side) -> Option<MergeGroupId> {
        self.endpoint(side).merge_group
    }

    /// No fiber and no merge membership on either side.
    pub fn is_empty(&self) -> bool {
        self.endpoint_a.is_vacant() && self.endpoint_b.is_vacant()
    }
}

/// A contiguous run of same-side ports sharing one logical fiber endpoint.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct MergeGroup {
    pub id: MergeGroupId,
    pub structure_id: StructureId,
    pub side: Side,
    pub port_numbers: Vec<u32>,
    /// Fibers uploaded through a merged-splice assignment, in upload order.
    #[serde(default)]
    pub fibers: Vec<FiberSummary>,
}

impl MergeGroup {
    pub fn info(&self) -> MergeGroupInfo {
        MergeGroupInfo::new(self.port_numbers.clone())
    }
}
