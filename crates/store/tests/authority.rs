use fibermesh_core::{
    ComponentType, ComponentTypeId, CrossConnectApi, MergedFiber, Side, Structure, StructureId,
    UpsertFiberSpliceInput,
};
use fibermesh_store::{MemoryStore, NodeFixture, StoreConfig, open_store};
use tempfile::tempdir;

struct Seeded {
    store: MemoryStore,
    tray: StructureId,
    fibers: Vec<MergedFiber>,
}

fn seeded(config: StoreConfig) -> Seeded {
    let fixture = NodeFixture::embedded().expect("fixture");
    let store = MemoryStore::from_fixture(&config, &fixture).expect("store");
    let tray = fixture.structures_in_slot_order()[0].id;
    let cable = store.cable(fixture.cables[0].id).expect("cable");
    let fibers = cable.fibers.iter().map(MergedFiber::from).collect();
    Seeded {
        store,
        tray,
        fibers,
    }
}

fn input(seeded: &Seeded, port_number: u32, side: Side, fiber: usize) -> UpsertFiberSpliceInput {
    UpsertFiberSpliceInput {
        structure_id: seeded.tray,
        port_number,
        side,
        fiber_id: seeded.fibers[fiber].fiber_id,
        cable_id: seeded.fibers[fiber].cable_id,
    }
}

#[tokio::test]
async fn upsert_creates_rows_lazily_and_clear_prunes_them() {
    let seeded = seeded(StoreConfig::in_memory());
    let store = &seeded.store;
    assert!(store.get_fiber_splices(seeded.tray).await.expect("list").is_empty());

    let row = store
        .upsert_fiber_splice(input(&seeded, 2, Side::A, 0))
        .await
        .expect("upsert");
    assert_eq!(row.port_number, 2);
    assert_eq!(row.fiber(Side::A).map(|f| f.cable_name.as_str()), Some("K-Nord-24"));
    assert!(!row.id.is_temporary());

    store
        .upsert_fiber_splice(input(&seeded, 2, Side::B, 1))
        .await
        .expect("other side");
    let cleared = store
        .clear_fiber_splice(seeded.tray, 2, Side::A)
        .await
        .expect("clear a");
    assert!(!cleared.deleted);
    let cleared = store
        .clear_fiber_splice(seeded.tray, 2, Side::B)
        .await
        .expect("clear b");
    assert!(cleared.deleted);
    assert!(store.splices(seeded.tray).expect("rows").is_empty());
}

#[tokio::test]
async fn ports_must_exist_on_the_side() {
    let seeded = seeded(StoreConfig::in_memory());
    let err = seeded
        .store
        .upsert_fiber_splice(input(&seeded, 13, Side::A, 0))
        .await
        .expect_err("no port 13");
    assert_eq!(err.code(), "rejected");
}

#[tokio::test]
async fn merge_propagates_and_unmerge_keeps_first_port() {
    let seeded = seeded(StoreConfig::in_memory());
    let store = &seeded.store;
    store
        .upsert_fiber_splice(input(&seeded, 5, Side::B, 3))
        .await
        .expect("upsert");
    store
        .merge_ports(seeded.tray, vec![6, 4, 5], Side::B)
        .await
        .expect("merge");

    let rows = store.splices(seeded.tray).expect("rows");
    assert_eq!(rows.len(), 3);
    let group = rows[0].merge_group(Side::B).expect("group");
    for row in &rows {
        assert_eq!(row.merge_group(Side::B), Some(group));
        assert_eq!(
            row.endpoint(Side::B).merge_info.as_ref().map(|i| i.port_range()),
            Some("4-6".to_string())
        );
        assert_eq!(
            row.fiber(Side::B).map(|f| f.fiber_number_absolute),
            Some(4)
        );
        assert!(row.merge_group(Side::A).is_none());
    }

    store
        .upsert_fiber_splice(input(&seeded, 6, Side::B, 7))
        .await
        .expect("propagate");
    assert!(
        store
            .splices(seeded.tray)
            .expect("rows")
            .iter()
            .all(|row| row.fiber(Side::B).map(|f| f.fiber_number_absolute) == Some(8))
    );

    let err = store
        .unmerge_ports(group, vec![4, 5])
        .await
        .expect_err("partial unmerge");
    assert!(err.is_validation());
    store
        .unmerge_ports(group, vec![4, 5, 6])
        .await
        .expect("unmerge");
    let rows = store.splices(seeded.tray).expect("rows");
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].port_number, 4);
    assert!(store.merge_group(group).expect("lookup").is_none());
}

#[tokio::test]
async fn merge_rules_are_enforced() {
    let seeded = seeded(StoreConfig::in_memory());
    let store = &seeded.store;
    let single = store.merge_ports(seeded.tray, vec![1], Side::A).await;
    assert!(single.expect_err("single").is_validation());
    let gap = store.merge_ports(seeded.tray, vec![1, 3], Side::A).await;
    assert!(gap.expect_err("gap").is_validation());

    store
        .merge_ports(seeded.tray, vec![1, 2], Side::A)
        .await
        .expect("merge");
    let overlap = store.merge_ports(seeded.tray, vec![2, 3], Side::A).await;
    assert_eq!(overlap.expect_err("overlap").code(), "conflict");
    store
        .merge_ports(seeded.tray, vec![2, 3], Side::B)
        .await
        .expect("other side is independent");
}

#[tokio::test]
async fn merge_size_limit_comes_from_config() {
    let mut config = StoreConfig::in_memory();
    config.limits = Some(fibermesh_store::LimitsConfig {
        max_merge_group_size: Some(2),
        max_merged_fibers: None,
    });
    let seeded = seeded(config);
    let err = seeded
        .store
        .merge_ports(seeded.tray, vec![1, 2, 3], Side::A)
        .await
        .expect_err("too large");
    assert!(err.is_validation());
}

#[tokio::test]
async fn merged_upload_records_fibers_on_the_group() {
    let seeded = seeded(StoreConfig::in_memory());
    let store = &seeded.store;
    store
        .merge_ports(seeded.tray, vec![1, 2, 3], Side::A)
        .await
        .expect("merge");
    let group = store.splices(seeded.tray).expect("rows")[0]
        .merge_group(Side::A)
        .expect("group");

    let too_many = store
        .upsert_merged_splice(group, Side::A, seeded.fibers[..4].to_vec())
        .await;
    assert!(too_many.expect_err("four fibers").is_validation());
    let wrong_side = store
        .upsert_merged_splice(group, Side::B, seeded.fibers[..1].to_vec())
        .await;
    assert!(wrong_side.expect_err("side b").is_validation());

    store
        .upsert_merged_splice(group, Side::A, seeded.fibers[2..5].to_vec())
        .await
        .expect("upload");
    let stored = store.merge_group(group).expect("lookup").expect("group");
    let numbers: Vec<u32> = stored.fibers.iter().map(|f| f.fiber_number_absolute).collect();
    assert_eq!(numbers, vec![3, 4, 5]);
    assert!(
        store
            .splices(seeded.tray)
            .expect("rows")
            .iter()
            .all(|row| row.fiber(Side::A).map(|f| f.fiber_number_absolute) == Some(3))
    );

    store
        .clear_fiber_splice(seeded.tray, 3, Side::A)
        .await
        .expect("clear");
    let stored = store.merge_group(group).expect("lookup").expect("group");
    assert!(stored.fibers.is_empty());
}

#[tokio::test]
async fn structures_without_components_expose_no_ports() {
    let store = MemoryStore::default();
    let component = ComponentType::with_port_counts(ComponentTypeId::new(), "1x2", 1, 2);
    store.insert_component_type(component).expect("component");
    let bar = Structure {
        id: StructureId::new(),
        name: "Bar".into(),
        slot_start: 1,
        slot_end: 1,
        component_type: None,
    };
    store.insert_structure(bar.clone()).expect("bar");
    let err = store
        .merge_ports(bar.id, vec![1, 2], Side::B)
        .await
        .expect_err("no ports");
    assert_eq!(err.code(), "rejected");

    let orphan = Structure {
        component_type: Some(ComponentTypeId::new()),
        ..bar
    };
    assert!(store.insert_structure(orphan).is_err());
}

#[tokio::test]
async fn fibers_come_back_in_absolute_order() {
    let seeded = seeded(StoreConfig::in_memory());
    let fixture = NodeFixture::embedded().expect("fixture");
    let fibers = seeded
        .store
        .get_fibers_for_cable(fixture.cables[0].id)
        .await
        .expect("fibers");
    assert_eq!(fibers.len(), 24);
    assert!(
        fibers
            .windows(2)
            .all(|pair| pair[0].fiber_number_absolute < pair[1].fiber_number_absolute)
    );
    assert_eq!(fibers[12].bundle_number, 2);
    assert_eq!(fibers[12].color, "blue");
}

#[tokio::test]
async fn configured_failpoints_reject_and_are_recorded() {
    let seeded = seeded(StoreConfig::in_memory().with_failpoint("merge_ports"));
    let err = seeded
        .store
        .merge_ports(seeded.tray, vec![1, 2], Side::A)
        .await
        .expect_err("failpoint");
    assert_eq!(err.code(), "rejected");
    assert_eq!(seeded.store.write_calls().len(), 1);
    assert!(seeded.store.splices(seeded.tray).expect("rows").is_empty());
}

#[test]
fn open_store_prefers_a_node_file() {
    let dir = tempdir().expect("tempdir");
    let mut fixture = NodeFixture::embedded().expect("fixture");
    fixture.name = "Custom".into();
    fixture.structures.truncate(1);
    std::fs::write(
        dir.path().join("node.json"),
        serde_json::to_string(&fixture).expect("encode"),
    )
    .expect("write");
    let store = open_store(dir.path()).expect("open");
    assert_eq!(store.structures().expect("structures").len(), 1);
}
