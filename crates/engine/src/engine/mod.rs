//! The cross-connect engine: editor state plus the operations that change it.

mod assign;
mod dispatch;
mod fill;
mod merge;
mod optimistic;

use std::sync::Arc;

use log::{debug, info, warn};
use tokio::sync::{Mutex, MutexGuard};

use crate::bulk::BulkOperationCoordinator;
use crate::config::EngineConfig;
use crate::notice::{Notice, NoticeLog};
use crate::state::{EditorAction, EditorState, reduce};
use fibermesh_core::{CrossConnectApi, Port, Splice, SpliceResult, Structure, StructureId};

pub use optimistic::Reconcile;

pub(crate) struct EngineInner {
    pub(crate) editor: EditorState,
    pub(crate) notices: NoticeLog,
}

impl EngineInner {
    pub(crate) fn apply(&mut self, action: EditorAction) {
        self.editor = reduce(&self.editor, action);
    }

    pub(crate) fn notify(&mut self, notice: Notice) {
        self.notices.push(notice);
    }
}

/// Client-side cross-connect editor bound to one remote authority.
pub struct CrossConnectEngine<A> {
    api: Arc<A>,
    config: EngineConfig,
    bulk: BulkOperationCoordinator,
    inner: Mutex<EngineInner>,
}

impl<A: CrossConnectApi> CrossConnectEngine<A> {
    pub fn new(api: A, config: EngineConfig) -> Self {
        let notices = NoticeLog::new(config.max_notices());
        Self {
            api: Arc::new(api),
            config,
            bulk: BulkOperationCoordinator::new(),
            inner: Mutex::new(EngineInner {
                editor: EditorState::default(),
                notices,
            }),
        }
    }

    pub fn api(&self) -> &A {
        &self.api
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn bulk(&self) -> &BulkOperationCoordinator {
        &self.bulk
    }

    pub(crate) async fn lock(&self) -> MutexGuard<'_, EngineInner> {
        self.inner.lock().await
    }

    /// Current editor state, as the UI would render it.
    pub async fn snapshot(&self) -> EditorState {
        self.lock().await.editor.clone()
    }

    pub async fn splices(&self) -> Vec<Splice> {
        self.lock().await.editor.splices.clone()
    }

    pub async fn notices(&self) -> Vec<Notice> {
        self.lock().await.notices.iter().cloned().collect()
    }

    pub async fn drain_notices(&self) -> Vec<Notice> {
        self.lock().await.notices.drain()
    }

    pub(crate) async fn selected_structure_id(&self) -> Option<StructureId> {
        self.lock().await.editor.structure_id()
    }

    pub(crate) async fn notify(&self, notice: Notice) {
        self.lock().await.notify(notice);
    }

    /// Load a structure's ports and splices and make it the edit target.
    ///
    /// Holds the bulk slot until the new structure is in place, so a fill
    /// cannot start against a half-switched editor. Refused while a fill
    /// runs. On a failed fetch the previous selection stays in place.
    pub async fn select_structure(&self, structure: Structure) -> bool {
        let Some(_permit) = self.bulk.try_begin() else {
            warn!(
                "engine: select_structure rejected during bulk fill structure={}",
                structure.id
            );
            self.refuse_switch().await;
            return false;
        };
        match self.load_structure(&structure).await {
            Ok((ports, splices)) => {
                info!(
                    "engine: selected structure={} ports={} splices={}",
                    structure.id,
                    ports.len(),
                    splices.len()
                );
                self.lock().await.apply(EditorAction::StructureLoaded {
                    structure,
                    ports,
                    splices,
                });
                true
            }
            Err(err) => {
                warn!(
                    "engine: select_structure failed structure={} error={err}",
                    structure.id
                );
                self.notify(Notice::from_error("Could not load structure", &err))
                    .await;
                false
            }
        }
    }

    /// Drop the current selection. Refused while a fill runs.
    pub async fn deselect_structure(&self) -> bool {
        let Some(_permit) = self.bulk.try_begin() else {
            warn!("engine: deselect_structure rejected during bulk fill");
            self.refuse_switch().await;
            return false;
        };
        self.lock().await.apply(EditorAction::StructureCleared);
        true
    }

    async fn refuse_switch(&self) {
        self.notify(Notice::warning(
            "Wait for the running fill to finish before switching structures",
        ))
        .await;
    }

    async fn load_structure(
        &self,
        structure: &Structure,
    ) -> SpliceResult<(Vec<Port>, Vec<Splice>)> {
        let Some(component_type) = structure.component_type else {
            debug!("engine: structure={} exposes no ports", structure.id);
            return Ok((Vec::new(), Vec::new()));
        };
        let ports = self.api.get_component_ports(component_type).await?;
        let splices = self.api.get_fiber_splices(structure.id).await?;
        Ok((ports, splices))
    }
}
