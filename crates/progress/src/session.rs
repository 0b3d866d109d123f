use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;
use tracing::{error, info, warn};

use crate::activation::{ActivationError, ActivationRegistry};
use crate::discovery::{DiscoveryError, DiscoverySet};
use crate::layout::{load_layout_dir, load_layout_file, ActivatableDef, LayoutError};
use crate::ledger::ZoneVisitLedger;
use crate::persistence::{
    Collaborators, LoadOutcome, PersistenceConfig, PersistenceCoordinator, PersistenceError,
    SaveOutcome,
};
use crate::world::World;
use crate::AppPaths;

pub const DEFAULT_LAYOUT_FILE: &str = "world.xml";

#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub persistence: PersistenceConfig,
    /// A single layout file, or a directory scanned for `.xml` files.
    pub layout_path: PathBuf,
}

impl SessionConfig {
    pub fn from_app_paths(paths: &AppPaths) -> Self {
        Self {
            persistence: PersistenceConfig::new(&paths.save_dir),
            layout_path: paths.content_dir.join(DEFAULT_LAYOUT_FILE),
        }
    }
}

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("failed to load world layout: {0}")]
    Layout(#[from] LayoutError),
}

/// One of each progress service, created and torn down in a fixed order.
///
/// Startup: ledger and discovery set, coordinator, world spawned dormant, save
/// loaded, then the world evaluates thresholds against the loaded counts.
/// Shutdown: one save attempt, then the world unsubscribes from the ledger.
#[derive(Debug)]
pub struct GameSession {
    ledger: ZoneVisitLedger,
    discovery: DiscoverySet,
    coordinator: PersistenceCoordinator,
    world: World,
    shut_down: bool,
}

impl GameSession {
    pub fn start(config: SessionConfig) -> Result<Self, SessionError> {
        let layout = if config.layout_path.is_dir() {
            load_layout_dir(&config.layout_path)?
        } else {
            load_layout_file(&config.layout_path)?
        };
        Ok(Self::with_layout(config.persistence, layout))
    }

    pub fn with_layout(persistence: PersistenceConfig, layout: Vec<ActivatableDef>) -> Self {
        let registry = ActivationRegistry::default();
        let mut ledger = ZoneVisitLedger::new();
        let mut discovery = DiscoverySet::new();
        let coordinator = PersistenceCoordinator::new(persistence, registry.clone());
        let mut world = World::new(layout, registry);

        world.spawn_all(&mut ledger);
        match coordinator.load(&mut ledger, &mut discovery, &mut world) {
            LoadOutcome::Failed(error) => {
                warn!(error = %error, "startup_load_failed; starting fresh");
            }
            LoadOutcome::NoSaveFile => info!("startup_without_save"),
            LoadOutcome::Loaded(_) | LoadOutcome::Skipped(_) => {}
        }
        world.start(&ledger);

        info!(
            save_path = %coordinator.save_path().display(),
            entities = world.entity_count(),
            active = world.active_count(),
            "session_started"
        );
        Self {
            ledger,
            discovery,
            coordinator,
            world,
            shut_down: false,
        }
    }

    pub fn ledger(&self) -> &ZoneVisitLedger {
        &self.ledger
    }

    pub fn ledger_mut(&mut self) -> &mut ZoneVisitLedger {
        &mut self.ledger
    }

    pub fn discovery(&self) -> &DiscoverySet {
        &self.discovery
    }

    pub fn discovery_mut(&mut self) -> &mut DiscoverySet {
        &mut self.discovery
    }

    pub fn world(&self) -> &World {
        &self.world
    }

    pub fn coordinator(&self) -> &PersistenceCoordinator {
        &self.coordinator
    }

    pub fn record_visit(&mut self, zone_id: &str) -> u32 {
        self.ledger.record_visit(zone_id)
    }

    pub fn discover(&mut self, identifier: &str) -> Result<bool, DiscoveryError> {
        self.discovery.discover(identifier)
    }

    pub fn activate(&mut self, id: &str) -> usize {
        self.world.activate(id)
    }

    pub fn deactivate(&mut self, id: &str) -> Result<usize, ActivationError> {
        self.world.deactivate(id)
    }

    /// One fixed step: auto-save bookkeeping first, then entity animations.
    pub fn tick(&mut self, fixed_dt_seconds: f32) {
        let dt = Duration::try_from_secs_f32(fixed_dt_seconds).unwrap_or_default();
        let collaborators = Collaborators::available(&self.ledger, &self.discovery);
        if let Some(Err(error)) = self.coordinator.tick(dt, collaborators) {
            warn!(error = %error, "auto_save_failed");
        }
        self.world.tick(fixed_dt_seconds);
    }

    pub fn save(&self) -> Result<SaveOutcome, PersistenceError> {
        self.coordinator
            .save(Collaborators::available(&self.ledger, &self.discovery))
    }

    pub fn load(&mut self) -> LoadOutcome {
        self.coordinator
            .load(&mut self.ledger, &mut self.discovery, &mut self.world)
    }

    pub fn delete_save(&self) -> Result<bool, PersistenceError> {
        self.coordinator.delete_save()
    }

    pub fn start_new_game(&mut self) -> Result<(), PersistenceError> {
        self.coordinator
            .start_new_game(&mut self.ledger, &mut self.discovery, &mut self.world)
    }

    pub fn shutdown(&mut self) -> Result<SaveOutcome, PersistenceError> {
        let result = self
            .coordinator
            .save_on_shutdown(Collaborators::available(&self.ledger, &self.discovery), "shutdown");
        if !self.shut_down {
            self.world.teardown(&mut self.ledger);
            self.shut_down = true;
            info!("session_shut_down");
        }
        result
    }
}

impl Drop for GameSession {
    fn drop(&mut self) {
        let collaborators = Collaborators::available(&self.ledger, &self.discovery);
        if let Err(error) = self.coordinator.save_on_shutdown(collaborators, "drop") {
            error!(error = %error, "shutdown_save_failed");
        }
    }
}
