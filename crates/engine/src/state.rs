//! Editor state and its reducer.
//!
//! `EditorState` is the only mutable surface of the engine. Every change goes
//! through [`reduce`], which never touches the network; the async operations
//! compute actions and hand them to the reducer before and after each remote
//! call.

use serde::{Deserialize, Serialize};

use crate::occupancy;
use fibermesh_core::{FiberSummary, Port, Side, Splice, SpliceId, Structure, StructureId};

#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub struct PortSelection {
    pub port_number: u32,
    pub side: Side,
}

#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct SelectedStructure {
    pub structure: Structure,
    pub ports: Vec<Port>,
}

#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
pub struct EditorState {
    pub selected: Option<SelectedStructure>,
    pub splices: Vec<Splice>,
    pub merge_mode: bool,
    pub selection: Vec<PortSelection>,
}

impl EditorState {
    pub fn structure_id(&self) -> Option<StructureId> {
        self.selected.as_ref().map(|selected| selected.structure.id)
    }

    pub fn is_selected(&self, structure_id: StructureId) -> bool {
        self.structure_id() == Some(structure_id)
    }

    pub fn ports(&self) -> &[Port] {
        self.selected
            .as_ref()
            .map(|selected| selected.ports.as_slice())
            .unwrap_or_default()
    }

    pub fn splice(&self, port_number: u32) -> Option<&Splice> {
        occupancy::row(&self.splices, port_number)
    }
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub enum EditorAction {
    StructureLoaded {
        structure: Structure,
        ports: Vec<Port>,
        splices: Vec<Splice>,
    },
    StructureCleared,
    /// Replace every row of the structure (refetch or rollback).
    SplicesReplaced {
        structure_id: StructureId,
        splices: Vec<Splice>,
    },
    /// Put a fiber on a port, or on every port of its merge group.
    FiberAssigned {
        structure_id: StructureId,
        port_number: u32,
        side: Side,
        fiber: FiberSummary,
    },
    /// Remove the fiber from a port, or from every port of its merge group.
    PortCleared {
        structure_id: StructureId,
        port_number: u32,
        side: Side,
    },
    /// Swap in the authority's version of one row.
    RowConfirmed {
        structure_id: StructureId,
        splice: Splice,
    },
    EmptyRowsPruned {
        structure_id: StructureId,
    },
    MergeModeToggled,
    PortSelectionToggled(PortSelection),
    SelectionCleared,
}

impl EditorAction {
    /// Structure the action is scoped to; scoped actions are dropped when a
    /// different structure is selected by the time they apply.
    pub fn structure_id(&self) -> Option<StructureId> {
        match self {
            EditorAction::SplicesReplaced { structure_id, .. }
            | EditorAction::FiberAssigned { structure_id, .. }
            | EditorAction::PortCleared { structure_id, .. }
            | EditorAction::RowConfirmed { structure_id, .. }
            | EditorAction::EmptyRowsPruned { structure_id } => Some(*structure_id),
            _ => None,
        }
    }
}

pub fn reduce(state: &EditorState, action: EditorAction) -> EditorState {
    if let Some(structure_id) = action.structure_id() {
        if !state.is_selected(structure_id) {
            return state.clone();
        }
    }
    let mut next = state.clone();
    match action {
        EditorAction::StructureLoaded {
            structure,
            ports,
            splices,
        } => {
            next = EditorState {
                selected: Some(SelectedStructure { structure, ports }),
                splices: sorted(splices),
                merge_mode: false,
                selection: Vec::new(),
            };
        }
        EditorAction::StructureCleared => next = EditorState::default(),
        EditorAction::SplicesReplaced { splices, .. } => next.splices = sorted(splices),
        EditorAction::FiberAssigned {
            structure_id,
            port_number,
            side,
            fiber,
        } => {
            let targets = fan_out(&next.splices, port_number, side);
            for target in targets {
                match next
                    .splices
                    .iter_mut()
                    .find(|splice| splice.port_number == target)
                {
                    Some(splice) => splice.endpoint_mut(side).fiber = Some(fiber.clone()),
                    None => {
                        let mut splice = Splice::new(SpliceId::temporary(), structure_id, target);
                        splice.endpoint_mut(side).fiber = Some(fiber.clone());
                        next.splices.push(splice);
                    }
                }
            }
            next.splices = sorted(next.splices);
        }
        EditorAction::PortCleared {
            port_number, side, ..
        } => {
            let targets = fan_out(&next.splices, port_number, side);
            for splice in next
                .splices
                .iter_mut()
                .filter(|splice| targets.contains(&splice.port_number))
            {
                splice.endpoint_mut(side).fiber = None;
            }
        }
        EditorAction::RowConfirmed { splice, .. } => {
            match next
                .splices
                .iter_mut()
                .find(|row| row.port_number == splice.port_number)
            {
                Some(row) => *row = splice,
                None => next.splices.push(splice),
            }
            next.splices = sorted(next.splices);
        }
        EditorAction::EmptyRowsPruned { .. } => next.splices.retain(|splice| !splice.is_empty()),
        EditorAction::MergeModeToggled => {
            next.merge_mode = !next.merge_mode;
            next.selection.clear();
        }
        EditorAction::PortSelectionToggled(selection) => {
            if next.merge_mode {
                match next.selection.iter().position(|item| *item == selection) {
                    Some(index) => {
                        next.selection.remove(index);
                    }
                    None => next.selection.push(selection),
                }
            }
        }
        EditorAction::SelectionCleared => {
            next.merge_mode = false;
            next.selection.clear();
        }
    }
    next
}

fn fan_out(splices: &[Splice], port_number: u32, side: Side) -> Vec<u32> {
    match occupancy::merge_group_of(splices, port_number, side) {
        Some(group) => occupancy::group_ports(splices, group, side),
        None => vec![port_number],
    }
}

fn sorted(mut splices: Vec<Splice>) -> Vec<Splice> {
    splices.sort_by_key(|splice| splice.port_number);
    splices
}
