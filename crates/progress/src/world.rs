use std::cell::RefCell;
use std::collections::BTreeSet;
use std::rc::Rc;

use tracing::{info, warn};

use crate::activation::{
    ActivationError, ActivationRegistry, ActivationState, ActivationStateMachine, EntityVisual,
    TickOutcome,
};
use crate::events::SubscriptionId;
use crate::layout::ActivatableDef;
use crate::ledger::ZoneVisitLedger;
use crate::persistence::ActivatableWorld;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EntityId(pub u64);

#[derive(Debug, Default)]
pub struct EntityIdAllocator {
    next: u64,
}

impl EntityIdAllocator {
    pub fn allocate(&mut self) -> EntityId {
        let id = EntityId(self.next);
        self.next = self.next.saturating_add(1);
        id
    }
}

struct WorldEntity {
    id: EntityId,
    machine: Rc<RefCell<ActivationStateMachine>>,
    subscription: Option<SubscriptionId>,
}

/// Read-only view of one activatable entity for presentation and debugging.
#[derive(Debug, Clone, PartialEq)]
pub struct EntityStatus {
    pub entity: EntityId,
    pub id: String,
    pub label: String,
    pub target_zone: Option<String>,
    pub required_visits: u32,
    pub state: ActivationState,
    pub visual: EntityVisual,
}

/// The activatable entities instantiated from the world layout.
///
/// Each entity subscribes to the ledger when spawned and unsubscribes on
/// teardown, so visit fan-out reaches exactly the live entities.
pub struct World {
    layout: Vec<ActivatableDef>,
    registry: ActivationRegistry,
    allocator: EntityIdAllocator,
    entities: Vec<WorldEntity>,
}

impl World {
    pub fn new(layout: Vec<ActivatableDef>, registry: ActivationRegistry) -> Self {
        Self {
            layout,
            registry,
            allocator: EntityIdAllocator::default(),
            entities: Vec::new(),
        }
    }

    /// Instantiates every def dormant and subscribes it to `ledger`.
    pub fn spawn_all(&mut self, ledger: &mut ZoneVisitLedger) {
        for def in &self.layout {
            let id = self.allocator.allocate();
            let machine = Rc::new(RefCell::new(ActivationStateMachine::new(
                def.config.clone(),
                self.registry.clone(),
            )));
            let listener = Rc::clone(&machine);
            let subscription = ledger.subscribe(move |event| match listener.try_borrow_mut() {
                Ok(mut machine) => {
                    machine.on_zone_visited(event);
                }
                Err(_) => warn!(
                    zone = %event.zone_id,
                    "activatable_busy; zone visit ignored to avoid re-entry"
                ),
            });
            self.entities.push(WorldEntity {
                id,
                machine,
                subscription: Some(subscription),
            });
        }
        info!(entity_count = self.entities.len(), "world_spawned");
    }

    /// Activates, without animation, every entity whose threshold is already met.
    pub fn start(&mut self, ledger: &ZoneVisitLedger) -> usize {
        let mut activated = 0usize;
        for entity in &self.entities {
            if entity.machine.borrow_mut().on_world_start(ledger) {
                activated += 1;
            }
        }
        info!(activated, "world_started");
        activated
    }

    pub fn teardown(&mut self, ledger: &mut ZoneVisitLedger) {
        for entity in self.entities.drain(..) {
            if let Some(subscription) = entity.subscription {
                ledger.unsubscribe(subscription);
            }
        }
    }

    /// Advances in-flight animations. Returns how many completed this tick.
    pub fn tick(&mut self, fixed_dt_seconds: f32) -> usize {
        self.entities
            .iter()
            .filter(|entity| {
                entity.machine.borrow_mut().tick(fixed_dt_seconds) == TickOutcome::Completed
            })
            .count()
    }

    pub fn entity_count(&self) -> usize {
        self.entities.len()
    }

    pub fn active_count(&self) -> usize {
        self.entities
            .iter()
            .filter(|entity| entity.machine.borrow().is_active())
            .count()
    }

    pub fn any_active(&self) -> bool {
        self.active_count() > 0
    }

    pub fn statuses(&self) -> Vec<EntityStatus> {
        self.entities
            .iter()
            .map(|entity| {
                let machine = entity.machine.borrow();
                let config = machine.config();
                EntityStatus {
                    entity: entity.id,
                    id: config.id.clone(),
                    label: config.label.clone(),
                    target_zone: config.target_zone.clone(),
                    required_visits: config.required_visits,
                    state: machine.state(),
                    visual: machine.visual(),
                }
            })
            .collect()
    }

    pub fn find_by_id(&self, id: &str) -> Vec<EntityStatus> {
        self.statuses()
            .into_iter()
            .filter(|status| status.id == id)
            .collect()
    }

    /// Starts activation on every entity with identifier `id`. Returns how many started.
    pub fn activate(&mut self, id: &str) -> usize {
        self.matching(id)
            .filter(|entity| entity.machine.borrow_mut().activate())
            .count()
    }

    /// Deactivates every entity with identifier `id`, or none of them if any is
    /// still animating. The identifier stays registered while a sibling remains
    /// active.
    pub fn deactivate(&mut self, id: &str) -> Result<usize, ActivationError> {
        let animating = self.matching(id).any(|entity| {
            let machine = entity.machine.borrow();
            !machine.config().permanent && machine.state() == ActivationState::Animating
        });
        if animating {
            return Err(ActivationError::InvalidState {
                state: ActivationState::Animating,
                operation: "deactivate",
            });
        }

        let mut touched = 0usize;
        for entity in self.matching(id) {
            entity.machine.borrow_mut().deactivate()?;
            touched += 1;
        }
        if self
            .matching(id)
            .any(|entity| entity.machine.borrow().is_active())
        {
            self.registry.register(id);
        }
        Ok(touched)
    }

    fn matching<'a>(&'a self, id: &'a str) -> impl Iterator<Item = &'a WorldEntity> + 'a {
        self.entities
            .iter()
            .filter(move |entity| entity.machine.borrow().id() == id)
    }
}

impl ActivatableWorld for World {
    fn restore_activated(&mut self, activated: &BTreeSet<String>) -> usize {
        let mut restored = 0usize;
        for entity in &self.entities {
            let mut machine = entity.machine.borrow_mut();
            if machine.id().is_empty() || !activated.contains(machine.id()) {
                continue;
            }
            machine.activate_from_save();
            restored += 1;
        }
        restored
    }

    fn reload(&mut self, ledger: &mut ZoneVisitLedger) {
        self.teardown(ledger);
        self.spawn_all(ledger);
        self.start(ledger);
    }
}

impl std::fmt::Debug for World {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("World")
            .field("layout", &self.layout.len())
            .field("entities", &self.entities.len())
            .finish()
    }
}
