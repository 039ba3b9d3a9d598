mod support;

use fibermesh_core::{CrossConnectApi, Side, UpsertFiberSpliceInput};
use fibermesh_engine::occupancy::available_ports;
use fibermesh_engine::{DropOutcome, DropPayload, NoticeLevel};
use fibermesh_store::{ApiCall, StoreConfig};
use serde_json::json;
use support::{Node, selected_engine};

#[tokio::test]
async fn occupied_port_blocks_the_scan() {
    let node = Node::new(StoreConfig::in_memory());
    let engine = selected_engine(&node).await;
    assert!(engine.handle_single_fiber_drop(3, Side::A, &node.fiber(1)).await);
    let state = engine.snapshot().await;
    assert_eq!(available_ports(state.ports(), &state.splices, Side::A, 1), vec![1, 2]);
    assert_eq!(available_ports(state.ports(), &state.splices, Side::A, 4), vec![4, 5]);
    assert_eq!(
        available_ports(state.ports(), &state.splices, Side::B, 1),
        vec![1, 2, 3, 4, 5]
    );
}

#[tokio::test]
async fn assign_then_clear_restores_the_splices() {
    let node = Node::new(StoreConfig::in_memory());
    let engine = selected_engine(&node).await;
    let before = engine.splices().await;

    assert!(engine.handle_single_fiber_drop(4, Side::B, &node.fiber(2)).await);
    let assigned = engine.splices().await;
    assert_eq!(assigned.len(), 1);
    assert!(!assigned[0].id.is_temporary());
    assert_eq!(
        assigned[0].fiber(Side::B).map(|f| f.fiber_number_absolute),
        Some(2)
    );
    assert_eq!(assigned, node.store.splices(node.trays[0].id).expect("rows"));

    assert!(engine.handle_clear_port(4, Side::B).await);
    assert_eq!(engine.splices().await, before);
    assert!(node.store.splices(node.trays[0].id).expect("rows").is_empty());
}

#[tokio::test]
async fn rejected_upsert_rolls_back() {
    let node = Node::new(StoreConfig::in_memory());
    let engine = selected_engine(&node).await;
    assert!(engine.handle_single_fiber_drop(1, Side::A, &node.fiber(1)).await);
    let before = engine.splices().await;
    engine.drain_notices().await;

    node.store.set_failpoint("upsert_fiber_splice");
    assert!(!engine.handle_single_fiber_drop(2, Side::A, &node.fiber(2)).await);
    assert_eq!(engine.splices().await, before);

    let notices = engine.drain_notices().await;
    assert_eq!(notices.len(), 1);
    assert_eq!(notices[0].level, NoticeLevel::Error);
    assert_eq!(notices[0].code.as_deref(), Some("rejected"));
}

#[tokio::test]
async fn rejected_clear_rolls_back() {
    let node = Node::new(StoreConfig::in_memory());
    let engine = selected_engine(&node).await;
    assert!(engine.handle_single_fiber_drop(2, Side::B, &node.fiber(5)).await);
    let before = engine.splices().await;

    node.store.set_failpoint("clear_fiber_splice");
    assert!(!engine.handle_clear_port(2, Side::B).await);
    assert_eq!(engine.splices().await, before);
}

#[tokio::test]
async fn later_write_replaces_the_fiber_on_a_port() {
    let node = Node::new(StoreConfig::in_memory());
    let engine = selected_engine(&node).await;
    assert!(engine.handle_single_fiber_drop(1, Side::A, &node.fiber(1)).await);
    assert!(engine.handle_single_fiber_drop(1, Side::A, &node.fiber(7)).await);
    let splices = engine.splices().await;
    assert_eq!(splices.len(), 1);
    assert_eq!(
        splices[0].fiber(Side::A).map(|f| f.fiber_number_absolute),
        Some(7)
    );
}

#[tokio::test]
async fn unknown_port_is_refused_without_a_remote_call() {
    let node = Node::new(StoreConfig::in_memory());
    let engine = selected_engine(&node).await;
    assert!(!engine.handle_single_fiber_drop(9, Side::A, &node.fiber(1)).await);
    assert!(node.store.calls().is_empty());
    assert!(engine.splices().await.is_empty());
    let notices = engine.drain_notices().await;
    assert_eq!(notices[0].level, NoticeLevel::Warning);
    assert_eq!(notices[0].code.as_deref(), Some("validation"));
}

#[tokio::test]
async fn move_onto_the_same_port_does_nothing() {
    let node = Node::new(StoreConfig::in_memory());
    let engine = selected_engine(&node).await;
    assert!(engine.handle_single_fiber_drop(1, Side::A, &node.fiber(1)).await);
    node.store.reset_calls();
    let before = engine.splices().await;

    assert!(!engine.handle_fiber_move(1, Side::A, 1, Side::A, &node.fiber(1)).await);
    assert!(node.store.calls().is_empty());
    assert_eq!(engine.splices().await, before);
}

#[tokio::test]
async fn move_places_before_clearing() {
    let node = Node::new(StoreConfig::in_memory());
    let engine = selected_engine(&node).await;
    assert!(engine.handle_single_fiber_drop(1, Side::A, &node.fiber(3)).await);
    node.store.reset_calls();

    assert!(engine.handle_fiber_move(1, Side::A, 2, Side::B, &node.fiber(3)).await);
    let names: Vec<&str> = node.store.write_calls().iter().map(ApiCall::name).collect();
    assert_eq!(names, vec!["upsert_fiber_splice", "clear_fiber_splice"]);

    let splices = engine.splices().await;
    assert_eq!(splices.len(), 1);
    assert_eq!(splices[0].port_number, 2);
    assert_eq!(
        splices[0].fiber(Side::B).map(|f| f.fiber_number_absolute),
        Some(3)
    );
}

#[tokio::test]
async fn failed_clear_leaves_the_fiber_on_both_ports() {
    let node = Node::new(StoreConfig::in_memory());
    let engine = selected_engine(&node).await;
    assert!(engine.handle_single_fiber_drop(1, Side::A, &node.fiber(3)).await);
    engine.drain_notices().await;
    node.store.set_failpoint("clear_fiber_splice:port=1");

    assert!(!engine.handle_fiber_move(1, Side::A, 3, Side::A, &node.fiber(3)).await);
    let state = engine.snapshot().await;
    let on_fiber_three: Vec<u32> = state
        .splices
        .iter()
        .filter(|s| s.fiber(Side::A).map(|f| f.fiber_number_absolute) == Some(3))
        .map(|s| s.port_number)
        .collect();
    assert_eq!(on_fiber_three, vec![1, 3]);
    let notices = engine.drain_notices().await;
    assert!(notices.iter().any(|n| n.level == NoticeLevel::Warning));
}

#[tokio::test]
async fn failed_placement_aborts_the_move() {
    let node = Node::new(StoreConfig::in_memory());
    let engine = selected_engine(&node).await;
    assert!(engine.handle_single_fiber_drop(1, Side::A, &node.fiber(3)).await);
    let before = engine.splices().await;
    node.store.reset_calls();
    node.store.set_failpoint("upsert_fiber_splice");

    assert!(!engine.handle_fiber_move(1, Side::A, 2, Side::A, &node.fiber(3)).await);
    assert_eq!(engine.splices().await, before);
    let names: Vec<&str> = node.store.calls().iter().map(ApiCall::name).collect();
    assert_eq!(names, vec!["upsert_fiber_splice"]);
}

#[tokio::test]
async fn slot_payloads_and_unknown_tags_are_rejected() {
    let node = Node::new(StoreConfig::in_memory());
    let engine = selected_engine(&node).await;
    let structures = node.structures();

    let outcome = engine
        .handle_port_drop(
            1,
            Side::A,
            DropPayload::ExistingStructure {
                structure_id: node.trays[1].id,
            },
            &structures,
        )
        .await;
    assert!(matches!(outcome, DropOutcome::Rejected { .. }));

    let outcome = engine
        .handle_port_drop_json(1, Side::A, &json!({ "type": "duct", "id": 4 }), &structures)
        .await;
    assert!(matches!(outcome, DropOutcome::Rejected { .. }));

    assert!(node.store.calls().is_empty());
    assert!(engine.splices().await.is_empty());
}

#[tokio::test]
async fn raw_fiber_payload_is_assigned() {
    let node = Node::new(StoreConfig::in_memory());
    let engine = selected_engine(&node).await;
    let raw = serde_json::to_value(DropPayload::Fiber(node.fiber(4))).expect("payload");
    assert_eq!(raw["type"], "fiber");

    let outcome = engine
        .handle_port_drop_json(5, Side::B, &raw, &node.structures())
        .await;
    assert_eq!(outcome, DropOutcome::Fiber(true));
    let state = engine.snapshot().await;
    assert_eq!(
        state
            .splice(5)
            .and_then(|s| s.fiber(Side::B))
            .map(|f| f.fiber_number_absolute),
        Some(4)
    );
}

#[tokio::test]
async fn drops_without_a_selection_are_ignored() {
    let node = Node::new(StoreConfig::in_memory());
    let engine = node.engine();
    let outcome = engine
        .handle_port_drop(1, Side::A, DropPayload::Fiber(node.fiber(1)), &node.structures())
        .await;
    assert!(matches!(outcome, DropOutcome::Rejected { .. }));
    assert!(!engine.handle_clear_port(1, Side::A).await);
    assert!(node.store.calls().is_empty());
}

#[tokio::test]
async fn selection_refetch_sees_other_writers() {
    let node = Node::new(StoreConfig::in_memory());
    let engine = selected_engine(&node).await;
    let fiber = node.fiber(9);
    node.store
        .upsert_fiber_splice(UpsertFiberSpliceInput {
            structure_id: node.trays[0].id,
            port_number: 2,
            side: Side::B,
            fiber_id: fiber.fiber.id,
            cable_id: fiber.fiber.cable_id,
        })
        .await
        .expect("direct write");
    assert!(engine.splices().await.is_empty());

    assert!(engine.select_structure(node.trays[0].clone()).await);
    assert_eq!(engine.splices().await.len(), 1);
}

#[tokio::test]
async fn failed_selection_keeps_the_previous_structure() {
    let node = Node::new(StoreConfig::in_memory());
    let engine = selected_engine(&node).await;
    node.store.set_failpoint("get_fiber_splices");
    assert!(!engine.select_structure(node.trays[1].clone()).await);
    assert_eq!(engine.snapshot().await.structure_id(), Some(node.trays[0].id));
}
