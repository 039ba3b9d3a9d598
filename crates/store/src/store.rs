//! In-memory cross-connect authority.
//!
//! `MemoryStore` plays the remote side of the engine: it owns the
//! authoritative splice rows and merge groups, enforces the server-side rules
//! (port existence, merge validation, merge propagation, pruning) and records
//! every call it receives.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;
use log::{debug, warn};

use crate::{NodeFixture, StoreConfig};
use fibermesh_core::{
    Cable, CableId, ClearSpliceOutcome, ComponentType, ComponentTypeId, CrossConnectApi, Fiber,
    FiberSummary, MergeGroup, MergeGroupId, MergedFiber, Port, Side, Splice, SpliceError,
    SpliceId, SpliceResult, Structure, StructureId, UpsertFiberSpliceInput, validate_merge_ports,
};

/// One remote call as received by the store.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum ApiCall {
    GetComponentPorts(ComponentTypeId),
    GetFiberSplices(StructureId),
    GetFibersForCable(CableId),
    UpsertFiberSplice(UpsertFiberSpliceInput),
    ClearFiberSplice {
        structure_id: StructureId,
        port_number: u32,
        side: Side,
    },
    MergePorts {
        structure_id: StructureId,
        port_numbers: Vec<u32>,
        side: Side,
    },
    UnmergePorts {
        merge_group_id: MergeGroupId,
        port_numbers: Vec<u32>,
    },
    UpsertMergedSplice {
        merge_group_id: MergeGroupId,
        side: Side,
        fibers: Vec<MergedFiber>,
    },
}

impl ApiCall {
    pub fn name(&self) -> &'static str {
        match self {
            ApiCall::GetComponentPorts(_) => "get_component_ports",
            ApiCall::GetFiberSplices(_) => "get_fiber_splices",
            ApiCall::GetFibersForCable(_) => "get_fibers_for_cable",
            ApiCall::UpsertFiberSplice(_) => "upsert_fiber_splice",
            ApiCall::ClearFiberSplice { .. } => "clear_fiber_splice",
            ApiCall::MergePorts { .. } => "merge_ports",
            ApiCall::UnmergePorts { .. } => "unmerge_ports",
            ApiCall::UpsertMergedSplice { .. } => "upsert_merged_splice",
        }
    }

    pub fn is_write(&self) -> bool {
        !matches!(
            self,
            ApiCall::GetComponentPorts(_)
                | ApiCall::GetFiberSplices(_)
                | ApiCall::GetFibersForCable(_)
        )
    }

    fn port_number(&self) -> Option<u32> {
        match self {
            ApiCall::UpsertFiberSplice(input) => Some(input.port_number),
            ApiCall::ClearFiberSplice { port_number, .. } => Some(*port_number),
            _ => None,
        }
    }
}

#[derive(Clone, Copy, Debug)]
struct StoreLimits {
    max_merge_group_size: usize,
    max_merged_fibers: usize,
}

impl StoreLimits {
    fn from_config(config: &StoreConfig) -> Self {
        let defaults = crate::LimitsConfig::with_defaults();
        let limits = config.limits.clone().unwrap_or(defaults);
        Self {
            max_merge_group_size: limits.max_merge_group_size.unwrap_or(144),
            max_merged_fibers: limits.max_merged_fibers.unwrap_or(144),
        }
    }
}

#[derive(Clone)]
pub struct MemoryStore {
    authority: Arc<Mutex<Authority>>,
    calls: Arc<Mutex<Vec<ApiCall>>>,
    failpoints: Arc<Mutex<HashSet<String>>>,
    latency: Option<Duration>,
    limits: StoreLimits,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new(&StoreConfig::in_memory())
    }
}

impl MemoryStore {
    pub fn new(config: &StoreConfig) -> Self {
        let failpoints = config
            .failpoints
            .clone()
            .unwrap_or_default()
            .into_iter()
            .collect::<HashSet<_>>();
        Self {
            authority: Arc::new(Mutex::new(Authority::default())),
            calls: Arc::new(Mutex::new(Vec::new())),
            failpoints: Arc::new(Mutex::new(failpoints)),
            latency: config.latency(),
            limits: StoreLimits::from_config(config),
        }
    }

    pub fn from_fixture(config: &StoreConfig, fixture: &NodeFixture) -> SpliceResult<Self> {
        let store = Self::new(config);
        store.load_fixture(fixture)?;
        Ok(store)
    }

    pub fn load_fixture(&self, fixture: &NodeFixture) -> SpliceResult<()> {
        for component in &fixture.component_types {
            self.insert_component_type(component.build())?;
        }
        for structure in &fixture.structures {
            self.insert_structure(structure.clone())?;
        }
        for cable in &fixture.cables {
            self.insert_cable(cable.build())?;
        }
        debug!(
            "store: loaded fixture name={} structures={} cables={}",
            fixture.name,
            fixture.structures.len(),
            fixture.cables.len()
        );
        Ok(())
    }

    pub fn insert_component_type(&self, component: ComponentType) -> SpliceResult<()> {
        let mut authority = self.authority()?;
        authority.component_types.insert(component.id, component);
        Ok(())
    }

    pub fn insert_structure(&self, structure: Structure) -> SpliceResult<()> {
        let mut authority = self.authority()?;
        if let Some(component_type) = structure.component_type {
            if !authority.component_types.contains_key(&component_type) {
                return Err(SpliceError::not_found(format!(
                    "component type {component_type}"
                )));
            }
        }
        authority.structures.insert(structure.id, structure);
        Ok(())
    }

    pub fn insert_cable(&self, cable: Cable) -> SpliceResult<()> {
        let mut authority = self.authority()?;
        authority.cables.insert(cable.id, cable);
        Ok(())
    }

    /// Structures ordered by slot start.
    pub fn structures(&self) -> SpliceResult<Vec<Structure>> {
        let authority = self.authority()?;
        let mut structures: Vec<Structure> = authority.structures.values().cloned().collect();
        structures.sort_by_key(|structure| structure.slot_start);
        Ok(structures)
    }

    pub fn cable(&self, cable_id: CableId) -> SpliceResult<Cable> {
        let authority = self.authority()?;
        authority
            .cables
            .get(&cable_id)
            .cloned()
            .ok_or_else(|| SpliceError::not_found(format!("cable {cable_id}")))
    }

    /// Cables ordered by name.
    pub fn cables(&self) -> SpliceResult<Vec<Cable>> {
        let authority = self.authority()?;
        let mut cables: Vec<Cable> = authority.cables.values().cloned().collect();
        cables.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(cables)
    }

    pub fn merge_group(&self, merge_group_id: MergeGroupId) -> SpliceResult<Option<MergeGroup>> {
        let authority = self.authority()?;
        Ok(authority.merge_groups.get(&merge_group_id).cloned())
    }

    /// Authoritative rows for a structure, read without recording a call.
    pub fn splices(&self, structure_id: StructureId) -> SpliceResult<Vec<Splice>> {
        let authority = self.authority()?;
        Ok(authority.listing(structure_id))
    }

    pub fn calls(&self) -> Vec<ApiCall> {
        self.calls
            .lock()
            .map(|calls| calls.clone())
            .unwrap_or_default()
    }

    pub fn write_calls(&self) -> Vec<ApiCall> {
        self.calls()
            .into_iter()
            .filter(ApiCall::is_write)
            .collect()
    }

    pub fn reset_calls(&self) {
        if let Ok(mut calls) = self.calls.lock() {
            calls.clear();
        }
    }

    pub fn set_failpoint(&self, key: impl Into<String>) {
        if let Ok(mut failpoints) = self.failpoints.lock() {
            failpoints.insert(key.into());
        }
    }

    pub fn clear_failpoint(&self, key: &str) {
        if let Ok(mut failpoints) = self.failpoints.lock() {
            failpoints.remove(key);
        }
    }

    fn authority(&self) -> SpliceResult<MutexGuard<'_, Authority>> {
        self.authority
            .lock()
            .map_err(|_| SpliceError::storage("authority poisoned"))
    }

    /// Record the call, wait out the simulated latency, then apply failpoints.
    async fn round_trip(&self, call: ApiCall) -> SpliceResult<()> {
        let name = call.name();
        let port = call.port_number();
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(call);
        }
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
        let failpoints = self
            .failpoints
            .lock()
            .map_err(|_| SpliceError::storage("failpoints poisoned"))?;
        let scoped = port.map(|port| format!("{name}:port={port}"));
        let hit = if failpoints.contains(name) {
            Some(name.to_string())
        } else {
            scoped.filter(|key| failpoints.contains(key))
        };
        match hit {
            Some(key) => {
                warn!("store: failpoint {key} rejected call");
                Err(SpliceError::rejected(format!("failpoint {key}")))
            }
            None => Ok(()),
        }
    }
}

#[async_trait]
impl CrossConnectApi for MemoryStore {
    async fn get_component_ports(
        &self,
        component_type_id: ComponentTypeId,
    ) -> SpliceResult<Vec<Port>> {
        self.round_trip(ApiCall::GetComponentPorts(component_type_id))
            .await?;
        let authority = self.authority()?;
        authority
            .component_types
            .get(&component_type_id)
            .map(|component| component.ports.clone())
            .ok_or_else(|| SpliceError::not_found(format!("component type {component_type_id}")))
    }

    async fn get_fiber_splices(&self, structure_id: StructureId) -> SpliceResult<Vec<Splice>> {
        self.round_trip(ApiCall::GetFiberSplices(structure_id))
            .await?;
        let authority = self.authority()?;
        authority.structure(structure_id)?;
        Ok(authority.listing(structure_id))
    }

    async fn get_fibers_for_cable(&self, cable_id: CableId) -> SpliceResult<Vec<Fiber>> {
        self.round_trip(ApiCall::GetFibersForCable(cable_id)).await?;
        let authority = self.authority()?;
        let cable = authority
            .cables
            .get(&cable_id)
            .ok_or_else(|| SpliceError::not_found(format!("cable {cable_id}")))?;
        let mut fibers = cable.fibers.clone();
        fibers.sort_by_key(|fiber| fiber.fiber_number_absolute);
        Ok(fibers)
    }

    async fn upsert_fiber_splice(&self, input: UpsertFiberSpliceInput) -> SpliceResult<Splice> {
        self.round_trip(ApiCall::UpsertFiberSplice(input.clone()))
            .await?;
        let mut authority = self.authority()?;
        authority.upsert(&input)
    }

    async fn clear_fiber_splice(
        &self,
        structure_id: StructureId,
        port_number: u32,
        side: Side,
    ) -> SpliceResult<ClearSpliceOutcome> {
        self.round_trip(ApiCall::ClearFiberSplice {
            structure_id,
            port_number,
            side,
        })
        .await?;
        let mut authority = self.authority()?;
        authority.clear(structure_id, port_number, side)
    }

    async fn merge_ports(
        &self,
        structure_id: StructureId,
        port_numbers: Vec<u32>,
        side: Side,
    ) -> SpliceResult<()> {
        self.round_trip(ApiCall::MergePorts {
            structure_id,
            port_numbers: port_numbers.clone(),
            side,
        })
        .await?;
        let mut authority = self.authority()?;
        let group = authority.merge(
            structure_id,
            &port_numbers,
            side,
            self.limits.max_merge_group_size,
        )?;
        debug!("store: merged ports group={group} side={side} ports={port_numbers:?}");
        Ok(())
    }

    async fn unmerge_ports(
        &self,
        merge_group_id: MergeGroupId,
        port_numbers: Vec<u32>,
    ) -> SpliceResult<()> {
        self.round_trip(ApiCall::UnmergePorts {
            merge_group_id,
            port_numbers: port_numbers.clone(),
        })
        .await?;
        let mut authority = self.authority()?;
        authority.unmerge(merge_group_id, &port_numbers)
    }

    async fn upsert_merged_splice(
        &self,
        merge_group_id: MergeGroupId,
        side: Side,
        fibers: Vec<MergedFiber>,
    ) -> SpliceResult<()> {
        self.round_trip(ApiCall::UpsertMergedSplice {
            merge_group_id,
            side,
            fibers: fibers.clone(),
        })
        .await?;
        let mut authority = self.authority()?;
        authority.upsert_merged(merge_group_id, side, &fibers, self.limits.max_merged_fibers)
    }
}

#[derive(Default)]
struct Authority {
    component_types: HashMap<ComponentTypeId, ComponentType>,
    structures: HashMap<StructureId, Structure>,
    cables: HashMap<CableId, Cable>,
    splices: HashMap<StructureId, BTreeMap<u32, Splice>>,
    merge_groups: HashMap<MergeGroupId, MergeGroup>,
}

impl Authority {
    fn structure(&self, structure_id: StructureId) -> SpliceResult<&Structure> {
        self.structures
            .get(&structure_id)
            .ok_or_else(|| SpliceError::not_found(format!("structure {structure_id}")))
    }

    fn require_port(
        &self,
        structure_id: StructureId,
        port_number: u32,
        side: Side,
    ) -> SpliceResult<()> {
        let structure = self.structure(structure_id)?;
        let component_type = structure.component_type.ok_or_else(|| {
            SpliceError::rejected(format!("structure {} has no component type", structure.name))
        })?;
        let component = self
            .component_types
            .get(&component_type)
            .ok_or_else(|| SpliceError::not_found(format!("component type {component_type}")))?;
        let exists = component
            .ports
            .iter()
            .any(|port| port.port_number == port_number && port.side() == side);
        if exists {
            Ok(())
        } else {
            Err(SpliceError::rejected(format!(
                "port {port_number} does not exist on side {side} of {}",
                structure.name
            )))
        }
    }

    fn fiber_summary(&self, fiber: MergedFiber) -> SpliceResult<FiberSummary> {
        let cable = self
            .cables
            .get(&fiber.cable_id)
            .ok_or_else(|| SpliceError::not_found(format!("cable {}", fiber.cable_id)))?;
        let found = cable
            .fibers
            .iter()
            .find(|candidate| candidate.id == fiber.fiber_id)
            .ok_or_else(|| {
                SpliceError::not_found(format!("fiber {} in cable {}", fiber.fiber_id, cable.name))
            })?;
        Ok(FiberSummary::from_fiber(found, cable.name.clone()))
    }

    fn group_for(
        &self,
        structure_id: StructureId,
        port_number: u32,
        side: Side,
    ) -> Option<&MergeGroup> {
        self.merge_groups.values().find(|group| {
            group.structure_id == structure_id
                && group.side == side
                && group.port_numbers.contains(&port_number)
        })
    }

    /// Ports written together with `port_number` on `side`.
    fn fan_out(&self, structure_id: StructureId, port_number: u32, side: Side) -> Vec<u32> {
        self.group_for(structure_id, port_number, side)
            .map(|group| group.port_numbers.clone())
            .unwrap_or_else(|| vec![port_number])
    }

    fn row_mut(&mut self, structure_id: StructureId, port_number: u32) -> &mut Splice {
        self.splices
            .entry(structure_id)
            .or_default()
            .entry(port_number)
            .or_insert_with(|| Splice::new(SpliceId::persisted(), structure_id, port_number))
    }

    fn listing(&self, structure_id: StructureId) -> Vec<Splice> {
        self.splices
            .get(&structure_id)
            .map(|rows| rows.values().cloned().collect())
            .unwrap_or_default()
    }

    fn prune(&mut self, structure_id: StructureId) {
        if let Some(rows) = self.splices.get_mut(&structure_id) {
            rows.retain(|_, splice| !splice.is_empty());
        }
    }

    fn upsert(&mut self, input: &UpsertFiberSpliceInput) -> SpliceResult<Splice> {
        self.require_port(input.structure_id, input.port_number, input.side)?;
        let summary = self.fiber_summary(MergedFiber {
            fiber_id: input.fiber_id,
            cable_id: input.cable_id,
        })?;
        for port_number in self.fan_out(input.structure_id, input.port_number, input.side) {
            self.row_mut(input.structure_id, port_number)
                .endpoint_mut(input.side)
                .fiber = Some(summary.clone());
        }
        Ok(self.row_mut(input.structure_id, input.port_number).clone())
    }

    fn clear(
        &mut self,
        structure_id: StructureId,
        port_number: u32,
        side: Side,
    ) -> SpliceResult<ClearSpliceOutcome> {
        self.structure(structure_id)?;
        if let Some(group_id) = self
            .group_for(structure_id, port_number, side)
            .map(|group| group.id)
        {
            if let Some(group) = self.merge_groups.get_mut(&group_id) {
                group.fibers.clear();
            }
        }
        let targets = self.fan_out(structure_id, port_number, side);
        if let Some(rows) = self.splices.get_mut(&structure_id) {
            for target in targets {
                if let Some(row) = rows.get_mut(&target) {
                    row.endpoint_mut(side).fiber = None;
                }
            }
        }
        self.prune(structure_id);
        let deleted = self
            .splices
            .get(&structure_id)
            .is_none_or(|rows| !rows.contains_key(&port_number));
        Ok(ClearSpliceOutcome { deleted })
    }

    fn merge(
        &mut self,
        structure_id: StructureId,
        port_numbers: &[u32],
        side: Side,
        max_size: usize,
    ) -> SpliceResult<MergeGroupId> {
        let sorted = validate_merge_ports(port_numbers, Some(max_size))?;
        for port_number in &sorted {
            self.require_port(structure_id, *port_number, side)?;
            if self.group_for(structure_id, *port_number, side).is_some() {
                return Err(SpliceError::conflict(format!(
                    "port {port_number} side {side} already belongs to a merge group"
                )));
            }
        }
        let shared = self.splices.get(&structure_id).and_then(|rows| {
            sorted
                .iter()
                .find_map(|port| rows.get(port).and_then(|row| row.fiber(side).cloned()))
        });
        let group = MergeGroup {
            id: MergeGroupId::new(),
            structure_id,
            side,
            port_numbers: sorted.clone(),
            fibers: Vec::new(),
        };
        let group_id = group.id;
        let info = group.info();
        self.merge_groups.insert(group_id, group);
        for port_number in sorted {
            let endpoint = self.row_mut(structure_id, port_number).endpoint_mut(side);
            endpoint.merge_group = Some(group_id);
            endpoint.merge_info = Some(info.clone());
            endpoint.fiber = shared.clone();
        }
        Ok(group_id)
    }

    fn unmerge(&mut self, merge_group_id: MergeGroupId, port_numbers: &[u32]) -> SpliceResult<()> {
        let group = self
            .merge_groups
            .get(&merge_group_id)
            .cloned()
            .ok_or_else(|| SpliceError::not_found(format!("merge group {merge_group_id}")))?;
        let mut requested = port_numbers.to_vec();
        requested.sort_unstable();
        if requested != group.port_numbers {
            return Err(SpliceError::validation(format!(
                "ports {requested:?} do not match merge group {}",
                group.info().port_range()
            )));
        }
        let keeper = group.info().first_port();
        for port_number in &group.port_numbers {
            let endpoint = self
                .row_mut(group.structure_id, *port_number)
                .endpoint_mut(group.side);
            endpoint.merge_group = None;
            endpoint.merge_info = None;
            if Some(*port_number) != keeper {
                endpoint.fiber = None;
            }
        }
        self.merge_groups.remove(&merge_group_id);
        self.prune(group.structure_id);
        Ok(())
    }

    fn upsert_merged(
        &mut self,
        merge_group_id: MergeGroupId,
        side: Side,
        fibers: &[MergedFiber],
        max_fibers: usize,
    ) -> SpliceResult<()> {
        let group = self
            .merge_groups
            .get(&merge_group_id)
            .cloned()
            .ok_or_else(|| SpliceError::not_found(format!("merge group {merge_group_id}")))?;
        if group.side != side {
            return Err(SpliceError::validation(format!(
                "merge group {} is on side {}, not {side}",
                group.info().port_range(),
                group.side
            )));
        }
        if fibers.is_empty() {
            return Err(SpliceError::validation("no fibers to assign"));
        }
        if fibers.len() > group.port_numbers.len() || fibers.len() > max_fibers {
            return Err(SpliceError::validation(format!(
                "{} fibers exceed merge group {}",
                fibers.len(),
                group.info().port_range()
            )));
        }
        let summaries = fibers
            .iter()
            .map(|fiber| self.fiber_summary(*fiber))
            .collect::<SpliceResult<Vec<_>>>()?;
        let shared = summaries.first().cloned();
        for port_number in &group.port_numbers {
            self.row_mut(group.structure_id, *port_number)
                .endpoint_mut(side)
                .fiber = shared.clone();
        }
        if let Some(stored) = self.merge_groups.get_mut(&merge_group_id) {
            stored.fibers = summaries;
        }
        Ok(())
    }
}
