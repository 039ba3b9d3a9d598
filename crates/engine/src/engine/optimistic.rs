//! Snapshot, apply, reconcile or roll back.

use std::future::Future;

use log::{debug, warn};

use super::CrossConnectEngine;
use crate::state::EditorAction;
use fibermesh_core::{CrossConnectApi, Splice, SpliceResult, StructureId};

/// How to fold a successful remote result back into local state.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Reconcile {
    /// Swap one optimistic row for the authority's row.
    Row(Splice),
    /// Replace every row with a fresh listing.
    Reload(Vec<Splice>),
    /// Drop rows left with nothing on them.
    Prune,
}

impl Reconcile {
    fn into_action(self, structure_id: StructureId) -> EditorAction {
        match self {
            Reconcile::Row(splice) => EditorAction::RowConfirmed {
                structure_id,
                splice,
            },
            Reconcile::Reload(splices) => EditorAction::SplicesReplaced {
                structure_id,
                splices,
            },
            Reconcile::Prune => EditorAction::EmptyRowsPruned { structure_id },
        }
    }
}

impl<A: CrossConnectApi> CrossConnectEngine<A> {
    /// Apply `action` locally, run `remote`, then reconcile on success or
    /// restore the pre-call rows on failure.
    ///
    /// `remote` is not polled until the optimistic state is in place. Neither
    /// step touches state when another structure has been selected meanwhile.
    pub(crate) async fn with_optimistic_update<F>(
        &self,
        structure_id: StructureId,
        action: EditorAction,
        remote: F,
    ) -> SpliceResult<()>
    where
        F: Future<Output = SpliceResult<Reconcile>>,
    {
        let snapshot = {
            let mut inner = self.lock().await;
            let snapshot = inner.editor.splices.clone();
            inner.apply(action);
            snapshot
        };
        match remote.await {
            Ok(reconcile) => {
                self.lock().await.apply(reconcile.into_action(structure_id));
                Ok(())
            }
            Err(err) => {
                warn!("engine: rolling back structure={structure_id} error={err}");
                self.lock().await.apply(EditorAction::SplicesReplaced {
                    structure_id,
                    splices: snapshot,
                });
                debug!("engine: restored {structure_id} to pre-call rows");
                Err(err)
            }
        }
    }
}
