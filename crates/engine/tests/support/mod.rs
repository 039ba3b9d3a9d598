#![allow(dead_code)]

use fibermesh_core::{
    Bundle, Cable, CableId, ComponentType, ComponentTypeId, Structure, StructureId,
};
use fibermesh_engine::{CrossConnectEngine, DroppedFiber, EngineConfig};
use fibermesh_store::{BundleFixture, CableFixture, MemoryStore, StoreConfig};

/// Three 5x5 trays in slots 1, 3 and 5, a bar without ports in slot 7, and
/// a 12-fiber cable in two bundles of six.
pub struct Node {
    pub store: MemoryStore,
    pub trays: Vec<Structure>,
    pub bar: Structure,
    pub cable: Cable,
}

impl Node {
    pub fn new(config: StoreConfig) -> Self {
        let store = MemoryStore::new(&config);
        let tray = ComponentType::with_port_counts(ComponentTypeId::new(), "Tray 5F", 5, 5);
        let tray_type = tray.id;
        store.insert_component_type(tray).expect("component type");
        let trays: Vec<Structure> = (0..3)
            .map(|index| Structure {
                id: StructureId::new(),
                name: format!("Tray {}", index + 1),
                slot_start: index * 2 + 1,
                slot_end: index * 2 + 2,
                component_type: Some(tray_type),
            })
            .collect();
        for tray in &trays {
            store.insert_structure(tray.clone()).expect("tray");
        }
        let bar = Structure {
            id: StructureId::new(),
            name: "Bar".into(),
            slot_start: 7,
            slot_end: 7,
            component_type: None,
        };
        store.insert_structure(bar.clone()).expect("bar");
        let cable = CableFixture {
            id: CableId::new(),
            name: "K-01".into(),
            bundles: vec![
                BundleFixture {
                    bundle_number: 1,
                    fiber_count: 6,
                },
                BundleFixture {
                    bundle_number: 2,
                    fiber_count: 6,
                },
            ],
        }
        .build();
        store.insert_cable(cable.clone()).expect("cable");
        Self {
            store,
            trays,
            bar,
            cable,
        }
    }

    pub fn engine(&self) -> CrossConnectEngine<MemoryStore> {
        self.engine_with(EngineConfig::with_defaults())
    }

    pub fn engine_with(&self, config: EngineConfig) -> CrossConnectEngine<MemoryStore> {
        CrossConnectEngine::new(self.store.clone(), config)
    }

    /// Structures as a caller would list them: deliberately out of slot order.
    pub fn structures(&self) -> Vec<Structure> {
        vec![
            self.bar.clone(),
            self.trays[2].clone(),
            self.trays[0].clone(),
            self.trays[1].clone(),
        ]
    }

    /// Fiber by absolute number.
    pub fn fiber(&self, number: u32) -> DroppedFiber {
        let fiber = self
            .cable
            .fibers
            .iter()
            .find(|fiber| fiber.fiber_number_absolute == number)
            .cloned()
            .expect("fiber number");
        DroppedFiber::new(fiber, self.cable.name.clone())
    }

    pub fn bundle(&self, number: u32) -> Bundle {
        self.cable
            .bundles()
            .into_iter()
            .find(|bundle| bundle.bundle_number == number)
            .expect("bundle number")
    }

    /// The cable as dropped from a list, without its fibers.
    pub fn cable_ref(&self) -> Cable {
        Cable {
            id: self.cable.id,
            name: self.cable.name.clone(),
            fibers: Vec::new(),
        }
    }
}

pub async fn selected_engine(node: &Node) -> CrossConnectEngine<MemoryStore> {
    let engine = node.engine();
    assert!(engine.select_structure(node.trays[0].clone()).await);
    node.store.reset_calls();
    engine
}
