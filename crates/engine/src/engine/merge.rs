//! Merge group selection, creation, dissolution and merged drops.

use log::{debug, info, warn};

use super::assign::require_port;
use super::{CrossConnectEngine, Reconcile};
use crate::notice::Notice;
use crate::occupancy;
use crate::outcome::MergeInfoView;
use crate::payload::DropPayload;
use crate::state::{EditorAction, EditorState, PortSelection};
use fibermesh_core::{
    Cable, CrossConnectApi, Fiber, FiberSummary, MergeGroupId, MergeGroupInfo, MergedFiber, Side,
    Splice, SpliceError, SpliceResult, StructureId, validate_merge_ports,
};

impl<A: CrossConnectApi> CrossConnectEngine<A> {
    /// Flip merge-selection mode. Returns the new mode.
    pub async fn toggle_merge_selection_mode(&self) -> bool {
        let mut inner = self.lock().await;
        inner.apply(EditorAction::MergeModeToggled);
        inner.editor.merge_mode
    }

    /// Add or remove a port from the merge selection. Returns whether the
    /// port is selected afterwards; always false outside merge mode.
    pub async fn toggle_port_selection(&self, port_number: u32, side: Side) -> bool {
        let selection = PortSelection { port_number, side };
        let mut inner = self.lock().await;
        inner.apply(EditorAction::PortSelectionToggled(selection));
        inner.editor.selection.contains(&selection)
    }

    /// Merge the selected ports into one group.
    ///
    /// The selection is checked locally first and nothing is sent when it
    /// fails. After a successful merge the rows are refetched and merge mode
    /// ends.
    pub async fn merge_selected_ports(&self) -> bool {
        let checked = {
            let inner = self.lock().await;
            validate_selection(&inner.editor, self.config.max_merge_group_size())
        };
        let (structure_id, side, port_numbers) = match checked {
            Ok(checked) => checked,
            Err(err) => {
                debug!("engine: merge selection refused error={err}");
                self.notify(Notice::from_error("Cannot merge ports", &err))
                    .await;
                return false;
            }
        };
        match self
            .remote_merge(structure_id, port_numbers.clone(), side)
            .await
        {
            Ok(splices) => {
                let label = MergeGroupInfo::new(port_numbers).port_range();
                info!("engine: merged structure={structure_id} side={side} ports={label}");
                let mut inner = self.lock().await;
                inner.apply(EditorAction::SplicesReplaced {
                    structure_id,
                    splices,
                });
                inner.apply(EditorAction::SelectionCleared);
                inner.notify(Notice::success(format!("Ports {label}{side} merged")));
                true
            }
            Err(err) => {
                warn!("engine: merge_ports failed structure={structure_id} error={err}");
                self.notify(Notice::from_error("Could not merge ports", &err))
                    .await;
                false
            }
        }
    }

    /// Dissolve a merge group. Without explicit ports, the group's ports are
    /// read from the local rows; an unknown group is a silent no-op.
    pub async fn unmerge_ports(
        &self,
        merge_group_id: MergeGroupId,
        port_numbers: Option<Vec<u32>>,
    ) -> bool {
        let resolved = {
            let inner = self.lock().await;
            inner.editor.structure_id().map(|structure_id| {
                let ports = port_numbers
                    .filter(|ports| !ports.is_empty())
                    .unwrap_or_else(|| resolve_group_ports(&inner.editor, merge_group_id));
                (structure_id, ports)
            })
        };
        let Some((structure_id, ports)) = resolved.filter(|(_, ports)| !ports.is_empty()) else {
            debug!("engine: unmerge ignored, group={merge_group_id} not resolved");
            return false;
        };
        match self
            .remote_unmerge(structure_id, merge_group_id, ports.clone())
            .await
        {
            Ok(splices) => {
                let label = MergeGroupInfo::new(ports).port_range();
                info!("engine: unmerged group={merge_group_id} ports={label}");
                let mut inner = self.lock().await;
                inner.apply(EditorAction::SplicesReplaced {
                    structure_id,
                    splices,
                });
                inner.notify(Notice::success(format!("Ports {label} unmerged")));
                true
            }
            Err(err) => {
                warn!("engine: unmerge_ports failed group={merge_group_id} error={err}");
                self.notify(Notice::from_error("Could not unmerge ports", &err))
                    .await;
                false
            }
        }
    }

    /// Drop onto a merge group. A single fiber lands on the group's first
    /// port; bundles and cables are uploaded in one call, truncated to the
    /// group size.
    pub async fn handle_merged_port_drop(
        &self,
        merge_group_id: MergeGroupId,
        side: Side,
        payload: &DropPayload,
    ) -> bool {
        let resolved = {
            let inner = self.lock().await;
            inner.editor.structure_id().map(|structure_id| {
                (
                    structure_id,
                    occupancy::group_ports(&inner.editor.splices, merge_group_id, side),
                )
            })
        };
        let Some((structure_id, ports)) = resolved else {
            return false;
        };
        let Some(first_port) = ports.first().copied() else {
            self.notify(Notice::warning(format!(
                "Merge group not found on side {side}"
            )))
            .await;
            return false;
        };
        let (fibers, cable_name) = match payload {
            DropPayload::Fiber(fiber) => {
                return self.handle_single_fiber_drop(first_port, side, fiber).await;
            }
            DropPayload::Bundle(bundle) => {
                let mut fibers = bundle.fibers.clone();
                fibers.sort_by_key(|fiber| fiber.fiber_number_absolute);
                (fibers, bundle.cable_name.clone())
            }
            DropPayload::Cable(cable) => match self.cable_fibers(cable).await {
                Ok(fibers) => (fibers, cable.name.clone()),
                Err(err) => {
                    self.notify(Notice::from_error("Could not load cable fibers", &err))
                        .await;
                    return false;
                }
            },
            DropPayload::ExistingStructure { .. } | DropPayload::ComponentType { .. } => {
                self.notify(Notice::warning(format!(
                    "A {} cannot be dropped on a port",
                    payload.kind()
                )))
                .await;
                return false;
            }
        };
        let fibers: Vec<Fiber> = fibers.into_iter().take(ports.len()).collect();
        match self
            .assign_merged(structure_id, merge_group_id, first_port, side, &fibers, &cable_name)
            .await
        {
            Ok(()) => {
                let label = MergeGroupInfo::new(ports).port_range();
                info!(
                    "engine: merged upload group={merge_group_id} fibers={} ports={label}",
                    fibers.len()
                );
                self.notify(Notice::success(format!(
                    "{} fibers assigned to ports {label}{side}",
                    fibers.len()
                )))
                .await;
                true
            }
            Err(err) => {
                self.notify(Notice::from_error("Could not assign merged fibers", &err))
                    .await;
                false
            }
        }
    }

    /// Merge details for one port side, or `None` when it is not merged.
    pub async fn merge_info(&self, port_number: u32, side: Side) -> Option<MergeInfoView> {
        let inner = self.lock().await;
        let row = inner.editor.splice(port_number)?;
        let merge_group_id = row.merge_group(side)?;
        let info = row
            .endpoint(side)
            .merge_info
            .clone()
            .unwrap_or_else(|| {
                MergeGroupInfo::new(occupancy::group_ports(
                    &inner.editor.splices,
                    merge_group_id,
                    side,
                ))
            });
        Some(MergeInfoView {
            merge_group_id,
            port_range: info.port_range(),
            size: info.size,
            port_numbers: info.port_numbers,
        })
    }

    async fn assign_merged(
        &self,
        structure_id: StructureId,
        merge_group_id: MergeGroupId,
        first_port: u32,
        side: Side,
        fibers: &[Fiber],
        cable_name: &str,
    ) -> SpliceResult<()> {
        let Some(first) = fibers.first() else {
            return Err(SpliceError::validation("no fibers to assign"));
        };
        let upload: Vec<MergedFiber> = fibers.iter().map(MergedFiber::from).collect();
        self.with_optimistic_update(
            structure_id,
            EditorAction::FiberAssigned {
                structure_id,
                port_number: first_port,
                side,
                fiber: FiberSummary::from_fiber(first, cable_name),
            },
            self.remote_merged_upload(structure_id, merge_group_id, side, upload),
        )
        .await
    }

    async fn remote_merged_upload(
        &self,
        structure_id: StructureId,
        merge_group_id: MergeGroupId,
        side: Side,
        upload: Vec<MergedFiber>,
    ) -> SpliceResult<Reconcile> {
        self.api
            .upsert_merged_splice(merge_group_id, side, upload)
            .await?;
        let splices = self.api.get_fiber_splices(structure_id).await?;
        Ok(Reconcile::Reload(splices))
    }

    async fn remote_merge(
        &self,
        structure_id: StructureId,
        port_numbers: Vec<u32>,
        side: Side,
    ) -> SpliceResult<Vec<Splice>> {
        self.api.merge_ports(structure_id, port_numbers, side).await?;
        self.api.get_fiber_splices(structure_id).await
    }

    async fn remote_unmerge(
        &self,
        structure_id: StructureId,
        merge_group_id: MergeGroupId,
        port_numbers: Vec<u32>,
    ) -> SpliceResult<Vec<Splice>> {
        self.api.unmerge_ports(merge_group_id, port_numbers).await?;
        self.api.get_fiber_splices(structure_id).await
    }

    /// The payload's fibers, fetched when it carries none, ordered by bundle
    /// then absolute number.
    pub(crate) async fn cable_fibers(&self, cable: &Cable) -> SpliceResult<Vec<Fiber>> {
        let mut fibers = if cable.fibers.is_empty() {
            self.api.get_fibers_for_cable(cable.id).await?
        } else {
            cable.fibers.clone()
        };
        fibers.sort_by_key(|fiber| (fiber.bundle_number, fiber.fiber_number_absolute));
        Ok(fibers)
    }
}

/// Ports of `group` on whichever side references it.
fn resolve_group_ports(editor: &EditorState, group: MergeGroupId) -> Vec<u32> {
    occupancy::group_side(&editor.splices, group)
        .map(|side| occupancy::group_ports(&editor.splices, group, side))
        .unwrap_or_default()
}

fn validate_selection(
    editor: &EditorState,
    max_size: Option<usize>,
) -> SpliceResult<(StructureId, Side, Vec<u32>)> {
    let structure_id = editor
        .structure_id()
        .ok_or_else(|| SpliceError::validation("no structure selected"))?;
    let Some(side) = editor.selection.first().map(|selection| selection.side) else {
        return Err(SpliceError::validation("a merge group needs at least two ports"));
    };
    if editor.selection.iter().any(|selection| selection.side != side) {
        return Err(SpliceError::validation(
            "merged ports must all be on the same side",
        ));
    }
    let numbers: Vec<u32> = editor
        .selection
        .iter()
        .map(|selection| selection.port_number)
        .collect();
    let ports = validate_merge_ports(&numbers, max_size)?;
    for port_number in &ports {
        require_port(editor, *port_number, side)?;
        if occupancy::merge_group_of(&editor.splices, *port_number, side).is_some() {
            return Err(SpliceError::validation(format!(
                "port {port_number}{side} is already merged"
            )));
        }
    }
    Ok((structure_id, side, ports))
}
