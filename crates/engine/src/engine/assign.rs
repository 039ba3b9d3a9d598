//! Single-fiber assign, clear and move.

use log::{debug, info, warn};

use super::{CrossConnectEngine, Reconcile};
use crate::notice::Notice;
use crate::occupancy;
use crate::payload::DroppedFiber;
use crate::state::{EditorAction, EditorState};
use fibermesh_core::{
    CrossConnectApi, Side, SpliceError, SpliceResult, StructureId, UpsertFiberSpliceInput,
};

impl<A: CrossConnectApi> CrossConnectEngine<A> {
    /// Terminate one fiber on a port. On a merged port every member port gets
    /// the fiber and the rows are refetched afterwards.
    pub async fn handle_single_fiber_drop(
        &self,
        port_number: u32,
        side: Side,
        fiber: &DroppedFiber,
    ) -> bool {
        let Some(structure_id) = self.selected_structure_id().await else {
            debug!("engine: fiber drop ignored, no structure selected");
            return false;
        };
        match self.assign_fiber(structure_id, port_number, side, fiber).await {
            Ok(()) => {
                info!(
                    "engine: assigned fiber={} structure={structure_id} port={port_number} side={side}",
                    fiber.fiber.id
                );
                self.notify(Notice::success(format!(
                    "Fiber {} connected to port {port_number}{side}",
                    fiber.fiber.fiber_number_absolute
                )))
                .await;
                true
            }
            Err(err) => {
                self.notify(Notice::from_error("Could not connect fiber", &err))
                    .await;
                false
            }
        }
    }

    /// Remove whatever fiber sits on a port (or its whole merge group).
    pub async fn handle_clear_port(&self, port_number: u32, side: Side) -> bool {
        let Some(structure_id) = self.selected_structure_id().await else {
            debug!("engine: clear ignored, no structure selected");
            return false;
        };
        match self.clear_port(structure_id, port_number, side).await {
            Ok(()) => {
                info!("engine: cleared structure={structure_id} port={port_number} side={side}");
                self.notify(Notice::success(format!("Port {port_number}{side} cleared")))
                    .await;
                true
            }
            Err(err) => {
                self.notify(Notice::from_error("Could not clear port", &err))
                    .await;
                false
            }
        }
    }

    /// Move a fiber by placing it on the target first and then clearing the
    /// source. A failed clear leaves the fiber on both ports.
    pub async fn handle_fiber_move(
        &self,
        source_port: u32,
        source_side: Side,
        target_port: u32,
        target_side: Side,
        fiber: &DroppedFiber,
    ) -> bool {
        if source_port == target_port && source_side == target_side {
            debug!("engine: move onto its own port ignored port={source_port} side={source_side}");
            return false;
        }
        let Some(structure_id) = self.selected_structure_id().await else {
            return false;
        };
        if let Err(err) = self
            .assign_fiber(structure_id, target_port, target_side, fiber)
            .await
        {
            self.notify(Notice::from_error("Could not move fiber", &err))
                .await;
            return false;
        }
        if let Err(err) = self.clear_port(structure_id, source_port, source_side).await {
            warn!(
                "engine: move left fiber={} on both ports source={source_port}{source_side} target={target_port}{target_side} error={err}",
                fiber.fiber.id
            );
            self.notify(Notice::warning(format!(
                "Fiber {} is now on both port {source_port}{source_side} and port {target_port}{target_side}: {}",
                fiber.fiber.fiber_number_absolute,
                err.message()
            )))
            .await;
            return false;
        }
        self.notify(Notice::success(format!(
            "Fiber {} moved to port {target_port}{target_side}",
            fiber.fiber.fiber_number_absolute
        )))
        .await;
        true
    }

    pub(crate) async fn assign_fiber(
        &self,
        structure_id: StructureId,
        port_number: u32,
        side: Side,
        fiber: &DroppedFiber,
    ) -> SpliceResult<()> {
        let merged = {
            let inner = self.lock().await;
            require_port(&inner.editor, port_number, side)?;
            occupancy::merge_group_of(&inner.editor.splices, port_number, side).is_some()
        };
        let input = UpsertFiberSpliceInput {
            structure_id,
            port_number,
            side,
            fiber_id: fiber.fiber.id,
            cable_id: fiber.fiber.cable_id,
        };
        self.with_optimistic_update(
            structure_id,
            EditorAction::FiberAssigned {
                structure_id,
                port_number,
                side,
                fiber: fiber.summary(),
            },
            self.remote_upsert(input, merged),
        )
        .await
    }

    pub(crate) async fn clear_port(
        &self,
        structure_id: StructureId,
        port_number: u32,
        side: Side,
    ) -> SpliceResult<()> {
        let merged = {
            let inner = self.lock().await;
            require_port(&inner.editor, port_number, side)?;
            occupancy::merge_group_of(&inner.editor.splices, port_number, side).is_some()
        };
        self.with_optimistic_update(
            structure_id,
            EditorAction::PortCleared {
                structure_id,
                port_number,
                side,
            },
            self.remote_clear(structure_id, port_number, side, merged),
        )
        .await
    }

    async fn remote_upsert(
        &self,
        input: UpsertFiberSpliceInput,
        merged: bool,
    ) -> SpliceResult<Reconcile> {
        let structure_id = input.structure_id;
        let row = self.api.upsert_fiber_splice(input).await?;
        if merged {
            let splices = self.api.get_fiber_splices(structure_id).await?;
            return Ok(Reconcile::Reload(splices));
        }
        Ok(Reconcile::Row(row))
    }

    async fn remote_clear(
        &self,
        structure_id: StructureId,
        port_number: u32,
        side: Side,
        merged: bool,
    ) -> SpliceResult<Reconcile> {
        let outcome = self
            .api
            .clear_fiber_splice(structure_id, port_number, side)
            .await?;
        debug!(
            "engine: clear structure={structure_id} port={port_number} deleted={}",
            outcome.deleted
        );
        if merged {
            let splices = self.api.get_fiber_splices(structure_id).await?;
            return Ok(Reconcile::Reload(splices));
        }
        Ok(Reconcile::Prune)
    }
}

pub(crate) fn require_port(editor: &EditorState, port_number: u32, side: Side) -> SpliceResult<()> {
    if occupancy::side_ports(editor.ports(), side).contains(&port_number) {
        Ok(())
    } else {
        Err(SpliceError::validation(format!(
            "port {port_number}{side} does not exist on this structure"
        )))
    }
}
