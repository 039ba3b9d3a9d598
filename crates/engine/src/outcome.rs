use serde::{Deserialize, Serialize};

use fibermesh_core::{MergeGroupId, SpliceError, StructureId};

/// How far a bundle or cable fill got.
#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
pub struct FillReport {
    pub placed: usize,
    pub total: usize,
    /// Structures that received at least one fiber, in fill order.
    pub structures: Vec<StructureId>,
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub enum FillOutcome {
    Connected(FillReport),
    PartiallyConnected(FillReport),
    Failed { error: SpliceError, report: FillReport },
    /// Refused before any mutation.
    Rejected { reason: String },
}

impl FillOutcome {
    pub fn is_success(&self) -> bool {
        matches!(
            self,
            FillOutcome::Connected(_) | FillOutcome::PartiallyConnected(_)
        )
    }

    pub fn report(&self) -> Option<&FillReport> {
        match self {
            FillOutcome::Connected(report)
            | FillOutcome::PartiallyConnected(report)
            | FillOutcome::Failed { report, .. } => Some(report),
            FillOutcome::Rejected { .. } => None,
        }
    }
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub enum DropOutcome {
    Fiber(bool),
    Fill(FillOutcome),
    Rejected { reason: String },
}

impl DropOutcome {
    pub fn is_success(&self) -> bool {
        match self {
            DropOutcome::Fiber(ok) => *ok,
            DropOutcome::Fill(outcome) => outcome.is_success(),
            DropOutcome::Rejected { .. } => false,
        }
    }
}

#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct MergeInfoView {
    pub merge_group_id: MergeGroupId,
    pub port_numbers: Vec<u32>,
    pub size: usize,
    pub port_range: String,
}
