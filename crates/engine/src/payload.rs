//! Things a user can drop onto a port.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use fibermesh_core::{
    Bundle, Cable, ComponentTypeId, Fiber, FiberSummary, SpliceError, SpliceResult, StructureId,
};

#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct DroppedFiber {
    pub fiber: Fiber,
    pub cable_name: String,
}

impl DroppedFiber {
    pub fn new(fiber: Fiber, cable_name: impl Into<String>) -> Self {
        Self {
            fiber,
            cable_name: cable_name.into(),
        }
    }

    pub fn summary(&self) -> FiberSummary {
        FiberSummary::from_fiber(&self.fiber, self.cable_name.clone())
    }
}

#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DropPayload {
    Fiber(DroppedFiber),
    Bundle(Bundle),
    Cable(Cable),
    /// Moving a structure between slots; not a port operation.
    ExistingStructure { structure_id: StructureId },
    /// Placing a new component into a slot; not a port operation.
    ComponentType { component_type_id: ComponentTypeId },
}

impl DropPayload {
    /// Parse a raw drag payload. Unknown `type` tags are rejected.
    pub fn from_json(raw: &Value) -> SpliceResult<Self> {
        serde_json::from_value(raw.clone())
            .map_err(|err| SpliceError::validation(format!("unsupported drop payload: {err}")))
    }

    pub fn kind(&self) -> &'static str {
        match self {
            DropPayload::Fiber(_) => "fiber",
            DropPayload::Bundle(_) => "bundle",
            DropPayload::Cable(_) => "cable",
            DropPayload::ExistingStructure { .. } => "existing_structure",
            DropPayload::ComponentType { .. } => "component_type",
        }
    }

    /// Whether the payload places fibers onto ports.
    pub fn targets_ports(&self) -> bool {
        matches!(
            self,
            DropPayload::Fiber(_) | DropPayload::Bundle(_) | DropPayload::Cable(_)
        )
    }
}
