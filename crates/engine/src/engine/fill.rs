//! Sequential bundle and cable fills.
//!
//! Fibers go onto free ports one remote call at a time, in port order, and
//! the fill stops at the first failure. Placements confirmed before a failure
//! are kept; the failing placement is rolled back on its own. Cable fills
//! continue into later structures in slot order once the selected structure
//! runs out of free ports.

use std::collections::HashSet;

use log::{debug, info, warn};

use super::CrossConnectEngine;
use crate::notice::Notice;
use crate::occupancy;
use crate::outcome::{FillOutcome, FillReport};
use crate::payload::DroppedFiber;
use fibermesh_core::{
    Bundle, Cable, CrossConnectApi, Side, Splice, SpliceError, SpliceResult, Structure,
    StructureId, UpsertFiberSpliceInput,
};

/// Free ports of one structure reserved for the current pass.
struct FillTarget {
    structure_id: StructureId,
    /// Whether the structure is the selected one and mirrors into local state.
    local: bool,
    ports: Vec<u32>,
    splices: Vec<Splice>,
}

impl<A: CrossConnectApi> CrossConnectEngine<A> {
    /// Connect a bundle's fibers, lowest absolute number first, to the free
    /// ports from `start_port` on the selected structure.
    pub async fn handle_bundle_drop(
        &self,
        start_port: u32,
        side: Side,
        bundle: &Bundle,
    ) -> FillOutcome {
        let Some(_permit) = self.bulk.try_begin() else {
            return self.reject_fill("Another fill or structure switch is still running").await;
        };
        let Some(target) = self.local_target(start_port, side).await else {
            return self.reject_fill("No structure selected").await;
        };
        if target.ports.is_empty() {
            return self
                .reject_fill(format!("No free ports from port {start_port}{side}"))
                .await;
        }
        if bundle.fibers.is_empty() {
            return self.reject_fill("The bundle has no fibers").await;
        }
        let mut fibers = bundle.fibers.clone();
        fibers.sort_by_key(|fiber| fiber.fiber_number_absolute);
        let fibers: Vec<DroppedFiber> = fibers
            .into_iter()
            .map(|fiber| DroppedFiber::new(fiber, bundle.cable_name.clone()))
            .collect();
        info!(
            "engine: bundle fill cable={} bundle={} fibers={} ports={}",
            bundle.cable_name,
            bundle.bundle_number,
            fibers.len(),
            target.ports.len()
        );
        let mut report = FillReport {
            total: fibers.len(),
            ..FillReport::default()
        };
        let result = self
            .fill_target(&target, side, &fibers, &mut report)
            .await
            .map(|_| ());
        self.finish_fill("bundle", result, report).await
    }

    /// Connect a cable's fibers, ordered by bundle then absolute number,
    /// starting on the selected structure and spilling into later structures
    /// of `structures` by slot order.
    pub async fn handle_cable_drop(
        &self,
        start_port: u32,
        side: Side,
        cable: &Cable,
        structures: &[Structure],
    ) -> FillOutcome {
        let Some(_permit) = self.bulk.try_begin() else {
            return self.reject_fill("Another fill or structure switch is still running").await;
        };
        let selected = self
            .lock()
            .await
            .editor
            .selected
            .as_ref()
            .map(|selected| selected.structure.clone());
        let Some(selected) = selected else {
            return self.reject_fill("No structure selected").await;
        };
        let Some(target) = self.local_target(start_port, side).await else {
            return self.reject_fill("No structure selected").await;
        };
        if target.ports.is_empty() {
            return self
                .reject_fill(format!("No free ports from port {start_port}{side}"))
                .await;
        }
        let fibers = match self.cable_fibers(cable).await {
            Ok(fibers) => fibers,
            Err(err) => {
                return self
                    .finish_fill("cable", Err(err), FillReport::default())
                    .await;
            }
        };
        if fibers.is_empty() {
            return self
                .reject_fill(format!("Cable {} has no fibers", cable.name))
                .await;
        }
        let fibers: Vec<DroppedFiber> = fibers
            .into_iter()
            .map(|fiber| DroppedFiber::new(fiber, cable.name.clone()))
            .collect();
        let later = self.later_structures(&selected, structures);
        info!(
            "engine: cable fill cable={} fibers={} start={} later_structures={}",
            cable.name,
            fibers.len(),
            selected.id,
            later.len()
        );
        let mut report = FillReport {
            total: fibers.len(),
            ..FillReport::default()
        };
        let result = self
            .fill_cable(target, &later, side, &fibers, &mut report)
            .await;
        self.finish_fill("cable", result, report).await
    }

    async fn fill_cable(
        &self,
        first: FillTarget,
        later: &[Structure],
        side: Side,
        fibers: &[DroppedFiber],
        report: &mut FillReport,
    ) -> SpliceResult<()> {
        let mut remaining = fibers;
        let consumed = self.fill_target(&first, side, remaining, report).await?;
        remaining = &remaining[consumed..];
        for structure in later {
            if remaining.is_empty() {
                break;
            }
            let target = self.remote_target(structure, side).await?;
            if target.ports.is_empty() {
                debug!(
                    "engine: cable fill stops at structure={} no free ports",
                    structure.id
                );
                break;
            }
            let consumed = self.fill_target(&target, side, remaining, report).await?;
            remaining = &remaining[consumed..];
        }
        Ok(())
    }

    /// Place fibers onto the target's ports in order. Follower ports of a
    /// merge group filled in this pass are skipped. Returns how many fibers
    /// were placed.
    async fn fill_target(
        &self,
        target: &FillTarget,
        side: Side,
        fibers: &[DroppedFiber],
        report: &mut FillReport,
    ) -> SpliceResult<usize> {
        let mut filled_groups = HashSet::new();
        let mut placed = 0;
        for port_number in &target.ports {
            let Some(fiber) = fibers.get(placed) else {
                break;
            };
            if let Some(group) = occupancy::merge_group_of(&target.splices, *port_number, side)
                && !filled_groups.insert(group)
            {
                continue;
            }
            if target.local {
                self.assign_fiber(target.structure_id, *port_number, side, fiber)
                    .await?;
            } else {
                self.api
                    .upsert_fiber_splice(UpsertFiberSpliceInput {
                        structure_id: target.structure_id,
                        port_number: *port_number,
                        side,
                        fiber_id: fiber.fiber.id,
                        cable_id: fiber.fiber.cable_id,
                    })
                    .await?;
            }
            placed += 1;
            report.placed += 1;
            if report.structures.last() != Some(&target.structure_id) {
                report.structures.push(target.structure_id);
            }
        }
        Ok(placed)
    }

    async fn local_target(&self, start_port: u32, side: Side) -> Option<FillTarget> {
        let inner = self.lock().await;
        let structure_id = inner.editor.structure_id()?;
        let ports = occupancy::available_ports(
            inner.editor.ports(),
            &inner.editor.splices,
            side,
            start_port,
        );
        Some(FillTarget {
            structure_id,
            local: true,
            ports,
            splices: inner.editor.splices.clone(),
        })
    }

    /// Fetch a non-selected structure and reserve its free ports from its
    /// lowest port on `side`.
    async fn remote_target(&self, structure: &Structure, side: Side) -> SpliceResult<FillTarget> {
        let component_type = structure.component_type.ok_or_else(|| {
            SpliceError::validation(format!("structure {} exposes no ports", structure.name))
        })?;
        let ports = self.api.get_component_ports(component_type).await?;
        let splices = self.api.get_fiber_splices(structure.id).await?;
        let available = occupancy::side_ports(&ports, side)
            .first()
            .map(|lowest| occupancy::available_ports(&ports, &splices, side, *lowest))
            .unwrap_or_default();
        Ok(FillTarget {
            structure_id: structure.id,
            local: false,
            ports: available,
            splices,
        })
    }

    /// Structures after `selected` in slot order that expose ports, capped by
    /// the fill configuration.
    fn later_structures(&self, selected: &Structure, structures: &[Structure]) -> Vec<Structure> {
        if !self.config.spill_into_next_structures() {
            return Vec::new();
        }
        let mut later: Vec<Structure> = structures
            .iter()
            .filter(|structure| {
                structure.exposes_ports()
                    && structure.id != selected.id
                    && structure.slot_start > selected.slot_start
            })
            .cloned()
            .collect();
        later.sort_by_key(|structure| structure.slot_start);
        if let Some(max) = self.config.max_structures() {
            later.truncate(max.saturating_sub(1));
        }
        later
    }

    async fn reject_fill(&self, reason: impl Into<String>) -> FillOutcome {
        let reason = reason.into();
        warn!("engine: fill rejected reason={reason}");
        self.notify(Notice::warning(reason.clone())).await;
        FillOutcome::Rejected { reason }
    }

    async fn finish_fill(
        &self,
        kind: &str,
        result: SpliceResult<()>,
        report: FillReport,
    ) -> FillOutcome {
        let FillReport { placed, total, .. } = report;
        match result {
            Err(error) if placed == 0 => {
                warn!("engine: {kind} fill failed error={error}");
                self.notify(Notice::from_error(&format!("Could not connect {kind}"), &error))
                    .await;
                FillOutcome::Failed { error, report }
            }
            Err(error) => {
                warn!("engine: {kind} fill stopped placed={placed} total={total} error={error}");
                self.notify(Notice::from_error(
                    &format!("{kind} fill stopped after {placed} of {total} fibers"),
                    &error,
                ))
                .await;
                FillOutcome::PartiallyConnected(report)
            }
            Ok(()) if placed == total => {
                info!("engine: {kind} fill connected placed={placed}");
                self.notify(Notice::success(format!("{placed} fibers connected")))
                    .await;
                FillOutcome::Connected(report)
            }
            Ok(()) => {
                info!("engine: {kind} fill partial placed={placed} total={total}");
                self.notify(Notice::info(format!(
                    "{placed} of {total} fibers connected, not enough free ports"
                )))
                .await;
                FillOutcome::PartiallyConnected(report)
            }
        }
    }
}
