use log::{debug, warn};
use serde_json::Value;

use super::CrossConnectEngine;
use crate::notice::Notice;
use crate::outcome::DropOutcome;
use crate::payload::DropPayload;
use fibermesh_core::{CrossConnectApi, Side, Structure};

impl<A: CrossConnectApi> CrossConnectEngine<A> {
    /// Route a drop onto `(port_number, side)` of the selected structure.
    ///
    /// `structures` lists the node's structures; cable fills spill into them
    /// by slot order.
    pub async fn handle_port_drop(
        &self,
        port_number: u32,
        side: Side,
        payload: DropPayload,
        structures: &[Structure],
    ) -> DropOutcome {
        let kind = payload.kind();
        if self.selected_structure_id().await.is_none() {
            debug!("engine: {kind} drop ignored, no structure selected");
            return DropOutcome::Rejected {
                reason: "no structure selected".into(),
            };
        }
        match payload {
            DropPayload::Fiber(fiber) => {
                DropOutcome::Fiber(self.handle_single_fiber_drop(port_number, side, &fiber).await)
            }
            DropPayload::Bundle(bundle) => {
                DropOutcome::Fill(self.handle_bundle_drop(port_number, side, &bundle).await)
            }
            DropPayload::Cable(cable) => DropOutcome::Fill(
                self.handle_cable_drop(port_number, side, &cable, structures)
                    .await,
            ),
            DropPayload::ExistingStructure { .. } | DropPayload::ComponentType { .. } => {
                self.reject_drop(format!("a {kind} cannot be dropped on a port"))
                    .await
            }
        }
    }

    /// Like [`handle_port_drop`](Self::handle_port_drop) for a raw drag
    /// payload. Payloads that do not parse change nothing.
    pub async fn handle_port_drop_json(
        &self,
        port_number: u32,
        side: Side,
        raw: &Value,
        structures: &[Structure],
    ) -> DropOutcome {
        match DropPayload::from_json(raw) {
            Ok(payload) => {
                self.handle_port_drop(port_number, side, payload, structures)
                    .await
            }
            Err(err) => self.reject_drop(err.message().to_string()).await,
        }
    }

    async fn reject_drop(&self, reason: String) -> DropOutcome {
        warn!("engine: drop rejected reason={reason}");
        self.notify(Notice::warning(reason.clone())).await;
        DropOutcome::Rejected { reason }
    }
}
