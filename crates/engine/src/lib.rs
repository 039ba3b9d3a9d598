//! Port and fiber-splice assignment for the cross-connect editor.
//!
//! [`CrossConnectEngine`] keeps the selected structure's splice rows as
//! optimistic local state and talks to the authority through
//! [`fibermesh_core::CrossConnectApi`]. Occupancy rules live in
//! [`occupancy`]; every state change goes through [`state::reduce`].

pub mod bulk;
pub mod config;
mod engine;
pub mod notice;
pub mod occupancy;
pub mod outcome;
pub mod payload;
pub mod state;

pub use bulk::{BulkOperationCoordinator, BulkPermit};
pub use config::{EngineConfig, FillConfig, MergeConfig, NoticeConfig};
pub use engine::{CrossConnectEngine, Reconcile};
pub use notice::{Notice, NoticeLevel};
pub use outcome::{DropOutcome, FillOutcome, FillReport, MergeInfoView};
pub use payload::{DropPayload, DroppedFiber};
pub use state::{EditorAction, EditorState, PortSelection, SelectedStructure, reduce};
