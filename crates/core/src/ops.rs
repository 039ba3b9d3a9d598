use serde::{Deserialize, Serialize};

use crate::{CableId, Fiber, FiberId, Side, SpliceError, SpliceResult, StructureId};

/// Terminate one fiber on one side of a port.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct UpsertFiberSpliceInput {
    pub structure_id: StructureId,
    pub port_number: u32,
    pub side: Side,
    pub fiber_id: FiberId,
    pub cable_id: CableId,
}

/// Fiber reference carried by a merged-group upload.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct MergedFiber {
    pub fiber_id: FiberId,
    pub cable_id: CableId,
}

impl From<&Fiber> for MergedFiber {
    fn from(fiber: &Fiber) -> Self {
        Self {
            fiber_id: fiber.id,
            cable_id: fiber.cable_id,
        }
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct ClearSpliceOutcome {
    /// The splice row no longer exists on the authority.
    pub deleted: bool,
}

/// Validate a candidate merge-group port list and return it sorted.
///
/// A group needs at least two ports, no duplicates, and a contiguous run.
pub fn validate_merge_ports(
    port_numbers: &[u32],
    max_size: Option<usize>,
) -> SpliceResult<Vec<u32>> {
    if port_numbers.len() < 2 {
        return Err(SpliceError::validation(
            "a merge group needs at least two ports",
        ));
    }
    if let Some(max) = max_size.filter(|max| port_numbers.len() > *max) {
        return Err(SpliceError::validation(format!(
            "a merge group holds at most {max} ports"
        )));
    }
    let mut sorted = port_numbers.to_vec();
    sorted.sort_unstable();
    if !is_contiguous(&sorted) {
        return Err(SpliceError::validation(
            "merged ports must form a contiguous run",
        ));
    }
    Ok(sorted)
}

/// `p[i] == p[i-1] + 1` for every neighbour pair of an ascending list.
pub fn is_contiguous(sorted: &[u32]) -> bool {
    sorted
        .windows(2)
        .all(|pair| pair[0].checked_add(1) == Some(pair[1]))
}
