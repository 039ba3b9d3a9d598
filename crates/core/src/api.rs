use async_trait::async_trait;

use crate::{
    CableId, ClearSpliceOutcome, ComponentTypeId, Fiber, MergeGroupId, MergedFiber, Port, Side,
    Splice, SpliceResult, StructureId, UpsertFiberSpliceInput,
};

/// Remote cross-connect authority.
///
/// Every call may fail with a transport error or an application-level
/// rejection; callers treat both the same way.
#[async_trait]
pub trait CrossConnectApi: Send + Sync {
    async fn get_component_ports(&self, component_type_id: ComponentTypeId)
    -> SpliceResult<Vec<Port>>;

    async fn get_fiber_splices(&self, structure_id: StructureId) -> SpliceResult<Vec<Splice>>;

    async fn get_fibers_for_cable(&self, cable_id: CableId) -> SpliceResult<Vec<Fiber>>;

    async fn upsert_fiber_splice(&self, input: UpsertFiberSpliceInput) -> SpliceResult<Splice>;

    async fn clear_fiber_splice(
        &self,
        structure_id: StructureId,
        port_number: u32,
        side: Side,
    ) -> SpliceResult<ClearSpliceOutcome>;

    async fn merge_ports(
        &self,
        structure_id: StructureId,
        port_numbers: Vec<u32>,
        side: Side,
    ) -> SpliceResult<()>;

    async fn unmerge_ports(
        &self,
        merge_group_id: MergeGroupId,
        port_numbers: Vec<u32>,
    ) -> SpliceResult<()>;

    async fn upsert_merged_splice(
        &self,
        merge_group_id: MergeGroupId,
        side: Side,
        fibers: Vec<MergedFiber>,
    ) -> SpliceResult<()>;
}
