use std::collections::BTreeSet;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use thiserror::Error;
use tracing::{debug, error, info, warn};

use crate::activation::ActivationRegistry;
use crate::atomic_io::{remove_if_exists, write_text_atomic};
use crate::discovery::DiscoverySet;
use crate::ledger::ZoneVisitLedger;
use crate::snapshot::{SaveSnapshot, SnapshotError, SAVE_VERSION};

pub const DEFAULT_SAVE_FILE_NAME: &str = "outback_save.json";
pub const DEFAULT_AUTO_SAVE_INTERVAL: Duration = Duration::from_secs(120);

#[derive(Debug, Clone)]
pub struct PersistenceConfig {
    pub save_dir: PathBuf,
    pub file_name: String,
    pub auto_save_interval: Duration,
    pub auto_save_enabled: bool,
}

impl PersistenceConfig {
    pub fn new(save_dir: impl Into<PathBuf>) -> Self {
        Self {
            save_dir: save_dir.into(),
            file_name: DEFAULT_SAVE_FILE_NAME.to_string(),
            auto_save_interval: DEFAULT_AUTO_SAVE_INTERVAL,
            auto_save_enabled: true,
        }
    }

    pub fn save_path(&self) -> PathBuf {
        self.save_dir.join(&self.file_name)
    }
}

#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("failed to write save file {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to read save file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to delete save file {path}: {source}")]
    Delete {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error(transparent)]
    Snapshot(#[from] SnapshotError),
}

/// The world side of a load or new game: whatever owns the activatable entities.
pub trait ActivatableWorld {
    /// Instantly activates every entity whose identifier is in `activated`,
    /// including every entity sharing a duplicated identifier. Returns how many
    /// entities were restored.
    fn restore_activated(&mut self, activated: &BTreeSet<String>) -> usize;

    /// Rebuilds all entities in their dormant baseline.
    fn reload(&mut self, ledger: &mut ZoneVisitLedger);
}

/// Managers a save reads from. Either may already be torn down during shutdown.
#[derive(Debug, Clone, Copy, Default)]
pub struct Collaborators<'a> {
    pub ledger: Option<&'a ZoneVisitLedger>,
    pub discovery: Option<&'a DiscoverySet>,
}

impl<'a> Collaborators<'a> {
    pub fn available(ledger: &'a ZoneVisitLedger, discovery: &'a DiscoverySet) -> Self {
        Self {
            ledger: Some(ledger),
            discovery: Some(discovery),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaveTrigger {
    Manual,
    AutoSave,
    Shutdown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    OperationInProgress,
    CollaboratorsUnavailable,
    ShutdownAlreadySaved,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SaveOutcome {
    Written { path: PathBuf, snapshot: SaveSnapshot },
    Skipped(SkipReason),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadReport {
    pub zone_count: usize,
    pub discovered_count: usize,
    pub activated_ids: usize,
    pub restored_entities: usize,
    pub version_mismatch: Option<u32>,
}

#[derive(Debug)]
pub enum LoadOutcome {
    NoSaveFile,
    Loaded(LoadReport),
    /// The file could not be read or parsed; state was left untouched.
    Failed(PersistenceError),
    Skipped(SkipReason),
}

#[derive(Debug, Default)]
struct OperationGate {
    busy: AtomicBool,
}

struct GateGuard<'a> {
    busy: &'a AtomicBool,
}

impl OperationGate {
    fn try_enter(&self) -> Option<GateGuard<'_>> {
        self.busy
            .compare_exchange(false, true, Ordering::Acquire, Ordering::Relaxed)
            .ok()
            .map(|_| GateGuard { busy: &self.busy })
    }
}

impl Drop for GateGuard<'_> {
    fn drop(&mut self) {
        self.busy.store(false, Ordering::Release);
    }
}

/// Owns the save file and every save/load transaction against it.
///
/// Save and load never interleave: each holds the operation gate for its whole
/// duration, and an auto-save that finds the gate taken waits for the next tick.
#[derive(Debug)]
pub struct PersistenceCoordinator {
    config: PersistenceConfig,
    registry: ActivationRegistry,
    gate: OperationGate,
    shutdown_saved: AtomicBool,
    auto_save_elapsed: Duration,
}

impl PersistenceCoordinator {
    pub fn new(config: PersistenceConfig, registry: ActivationRegistry) -> Self {
        Self {
            config,
            registry,
            gate: OperationGate::default(),
            shutdown_saved: AtomicBool::new(false),
            auto_save_elapsed: Duration::ZERO,
        }
    }

    pub fn config(&self) -> &PersistenceConfig {
        &self.config
    }

    pub fn registry(&self) -> &ActivationRegistry {
        &self.registry
    }

    pub fn save_path(&self) -> PathBuf {
        self.config.save_path()
    }

    pub fn has_save_file(&self) -> bool {
        self.save_path().is_file()
    }

    pub fn register_activated_entity(&self, id: &str) -> bool {
        self.registry.register(id)
    }

    pub fn save(&self, collaborators: Collaborators<'_>) -> Result<SaveOutcome, PersistenceError> {
        self.save_with_trigger(collaborators, SaveTrigger::Manual)
    }

    fn save_with_trigger(
        &self,
        collaborators: Collaborators<'_>,
        trigger: SaveTrigger,
    ) -> Result<SaveOutcome, PersistenceError> {
        let Some(_guard) = self.gate.try_enter() else {
            warn!(trigger = ?trigger, "save_skipped_operation_in_progress");
            return Ok(SaveOutcome::Skipped(SkipReason::OperationInProgress));
        };

        let path = self.save_path();
        let prior = match (collaborators.ledger, collaborators.discovery) {
            (None, None) => {
                warn!(
                    trigger = ?trigger,
                    "save_skipped_collaborators_unavailable; keeping previous save"
                );
                return Ok(SaveOutcome::Skipped(SkipReason::CollaboratorsUnavailable));
            }
            (Some(_), Some(_)) => None,
            (ledger, discovery) => {
                warn!(
                    trigger = ?trigger,
                    ledger_available = ledger.is_some(),
                    discovery_available = discovery.is_some(),
                    "save_collaborator_unavailable; carrying section from previous save"
                );
                read_snapshot_best_effort(&path)
            }
        };

        let zone_visits = match collaborators.ledger {
            Some(ledger) => ledger.all_visit_data(),
            None => prior
                .as_ref()
                .map(SaveSnapshot::visit_map)
                .unwrap_or_default(),
        };
        let discovered = match collaborators.discovery {
            Some(discovery) => discovery.all(),
            None => prior
                .as_ref()
                .map(SaveSnapshot::discovered_list)
                .unwrap_or_default(),
        };
        let activated = self.registry.snapshot();

        let snapshot = SaveSnapshot::capture(&zone_visits, &discovered, &activated);
        let text = snapshot.to_json_pretty()?;
        if let Err(source) = write_text_atomic(&path, &text) {
            error!(path = %path.display(), error = %source, "save_write_failed");
            return Err(PersistenceError::Write { path, source });
        }

        info!(
            trigger = ?trigger,
            path = %path.display(),
            zones = snapshot.zone_visits.len(),
            discovered = snapshot.discovered.len(),
            activated = snapshot.activated.len(),
            "save_written"
        );
        Ok(SaveOutcome::Written { path, snapshot })
    }

    /// Reads the save file without applying it. `Ok(None)` when there is no file.
    pub fn read_snapshot(&self) -> Result<Option<SaveSnapshot>, PersistenceError> {
        read_snapshot_at(&self.save_path())
    }

    pub fn load(
        &self,
        ledger: &mut ZoneVisitLedger,
        discovery: &mut DiscoverySet,
        world: &mut dyn ActivatableWorld,
    ) -> LoadOutcome {
        let Some(_guard) = self.gate.try_enter() else {
            warn!("load_skipped_operation_in_progress");
            return LoadOutcome::Skipped(SkipReason::OperationInProgress);
        };

        let snapshot = match self.read_snapshot() {
            Ok(Some(snapshot)) => snapshot,
            Ok(None) => {
                info!(path = %self.save_path().display(), "load_no_save_file");
                return LoadOutcome::NoSaveFile;
            }
            Err(error) => {
                warn!(error = %error, "load_failed; continuing with current state");
                return LoadOutcome::Failed(error);
            }
        };

        let version_mismatch = (snapshot.version != SAVE_VERSION).then_some(snapshot.version);
        if let Some(found) = version_mismatch {
            warn!(
                found,
                expected = SAVE_VERSION,
                "load_version_mismatch; continuing best-effort"
            );
        }

        ledger.load_visit_data(snapshot.visit_map());
        discovery.load_all(snapshot.discovered_list());
        self.registry.replace(snapshot.activated.clone());
        // Entities activated since the snapshot must not outlive it.
        world.reload(ledger);
        let restored_entities = world.restore_activated(&snapshot.activated);

        let report = LoadReport {
            zone_count: snapshot.zone_visits.len(),
            discovered_count: snapshot.discovered.len(),
            activated_ids: snapshot.activated.len(),
            restored_entities,
            version_mismatch,
        };
        info!(
            saved_at = %snapshot.saved_at,
            zones = report.zone_count,
            discovered = report.discovered_count,
            activated = report.activated_ids,
            restored = report.restored_entities,
            "load_applied"
        );
        LoadOutcome::Loaded(report)
    }

    /// Returns `Ok(false)` if there was no save file.
    pub fn delete_save(&self) -> Result<bool, PersistenceError> {
        let path = self.save_path();
        match remove_if_exists(&path) {
            Ok(removed) => {
                info!(path = %path.display(), removed, "save_deleted");
                Ok(removed)
            }
            Err(source) => {
                error!(path = %path.display(), error = %source, "save_delete_failed");
                Err(PersistenceError::Delete { path, source })
            }
        }
    }

    /// Wipes the save file and all progress, then rebuilds the world dormant.
    ///
    /// The in-memory reset happens even if the file cannot be deleted.
    pub fn start_new_game(
        &self,
        ledger: &mut ZoneVisitLedger,
        discovery: &mut DiscoverySet,
        world: &mut dyn ActivatableWorld,
    ) -> Result<(), PersistenceError> {
        let delete_result = self.delete_save().map(|_| ());
        ledger.reset_all_visits();
        discovery.reset_all();
        self.registry.clear();
        world.reload(ledger);
        info!("new_game_started");
        delete_result
    }

    /// Advances the auto-save timer. Returns the outcome when a save was attempted.
    pub fn tick(
        &mut self,
        dt: Duration,
        collaborators: Collaborators<'_>,
    ) -> Option<Result<SaveOutcome, PersistenceError>> {
        if !self.config.auto_save_enabled || self.config.auto_save_interval.is_zero() {
            return None;
        }
        self.auto_save_elapsed = self.auto_save_elapsed.saturating_add(dt);
        if self.auto_save_elapsed < self.config.auto_save_interval {
            return None;
        }

        let result = self.save_with_trigger(collaborators, SaveTrigger::AutoSave);
        match &result {
            Ok(SaveOutcome::Skipped(SkipReason::OperationInProgress)) => {
                debug!("auto_save_deferred");
            }
            _ => self.auto_save_elapsed = Duration::ZERO,
        }
        Some(result)
    }

    /// Saves once on the way out. Later calls from other teardown hooks are skipped.
    pub fn save_on_shutdown(
        &self,
        collaborators: Collaborators<'_>,
        hook: &'static str,
    ) -> Result<SaveOutcome, PersistenceError> {
        if self.shutdown_saved.swap(true, Ordering::AcqRel) {
            debug!(hook, "shutdown_save_already_attempted");
            return Ok(SaveOutcome::Skipped(SkipReason::ShutdownAlreadySaved));
        }
        info!(hook, "shutdown_save");
        self.save_with_trigger(collaborators, SaveTrigger::Shutdown)
    }
}

fn read_snapshot_at(path: &Path) -> Result<Option<SaveSnapshot>, PersistenceError> {
    let raw = match fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(source) if source.kind() == io::ErrorKind::NotFound => return Ok(None),
        Err(source) => {
            return Err(PersistenceError::Read {
                path: path.to_path_buf(),
                source,
            })
        }
    };
    Ok(Some(SaveSnapshot::from_json(&raw)?))
}

fn read_snapshot_best_effort(path: &Path) -> Option<SaveSnapshot> {
    match read_snapshot_at(path) {
        Ok(snapshot) => snapshot,
        Err(error) => {
            warn!(error = %error, "previous_save_unreadable; missing sections will be empty");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use serde_json::json;
    use tempfile::TempDir;

    use super::*;

    #[derive(Default)]
    struct RecordingWorld {
        ids: Vec<String>,
        restored: Vec<String>,
        reloads: usize,
    }

    impl ActivatableWorld for RecordingWorld {
        fn restore_activated(&mut self, activated: &BTreeSet<String>) -> usize {
            let matching = self
                .ids
                .iter()
                .filter(|id| activated.contains(*id))
                .cloned()
                .collect::<Vec<_>>();
            self.restored.extend(matching.iter().cloned());
            matching.len()
        }

        fn reload(&mut self, _ledger: &mut ZoneVisitLedger) {
            self.restored.clear();
            self.reloads += 1;
        }
    }

    fn coordinator(temp: &TempDir) -> PersistenceCoordinator {
        PersistenceCoordinator::new(
            PersistenceConfig::new(temp.path().join("saves")),
            ActivationRegistry::default(),
        )
    }

    fn seeded() -> (ZoneVisitLedger, DiscoverySet) {
        let mut ledger = ZoneVisitLedger::new();
        for _ in 0..3 {
            ledger.record_visit("zone_01");
        }
        ledger.record_visit("zone_02");
        ledger.record_visit("zone_02");
        ledger.record_visit("zone_03");
        let mut discovery = DiscoverySet::new();
        discovery.discover("Kangaroo").expect("discover");
        discovery.discover("Emu").expect("discover");
        (ledger, discovery)
    }

    #[test]
    fn save_then_load_restores_everything() {
        let temp = TempDir::new().expect("tempdir");
        let coordinator = coordinator(&temp);
        let (ledger, discovery) = seeded();
        coordinator.register_activated_entity("homestead_01");
        coordinator.register_activated_entity("water_tank_02");

        let outcome = coordinator
            .save(Collaborators::available(&ledger, &discovery))
            .expect("save");
        assert!(matches!(outcome, SaveOutcome::Written { .. }));

        let mut fresh_ledger = ZoneVisitLedger::new();
        let mut fresh_discovery = DiscoverySet::new();
        coordinator.registry().clear();
        let mut world = RecordingWorld {
            ids: vec!["homestead_01".to_string(), "windmill_03".to_string()],
            ..RecordingWorld::default()
        };

        let outcome = coordinator.load(&mut fresh_ledger, &mut fresh_discovery, &mut world);

        match outcome {
            LoadOutcome::Loaded(report) => {
                assert_eq!(report.restored_entities, 1);
                assert_eq!(report.version_mismatch, None);
            }
            other => panic!("expected load, got {other:?}"),
        }
        assert_eq!(fresh_ledger.all_visit_data(), ledger.all_visit_data());
        assert_eq!(fresh_discovery.all(), discovery.all());
        assert_eq!(
            coordinator.registry().snapshot(),
            BTreeSet::from(["homestead_01".to_string(), "water_tank_02".to_string()])
        );
        assert_eq!(world.restored, vec!["homestead_01".to_string()]);
        assert_eq!(world.reloads, 1, "load rebuilds the world before restoring");
    }

    #[test]
    fn load_without_file_changes_nothing() {
        let temp = TempDir::new().expect("tempdir");
        let coordinator = coordinator(&temp);
        let (mut ledger, mut discovery) = seeded();
        let before = ledger.all_visit_data();

        let outcome = coordinator.load(&mut ledger, &mut discovery, &mut RecordingWorld::default());

        assert!(matches!(outcome, LoadOutcome::NoSaveFile));
        assert_eq!(ledger.all_visit_data(), before);
        assert_eq!(discovery.discovery_count(), 2);
    }

    #[test]
    fn corrupt_file_is_reported_and_state_kept() {
        let temp = TempDir::new().expect("tempdir");
        let coordinator = coordinator(&temp);
        fs::create_dir_all(temp.path().join("saves")).expect("mkdir");
        fs::write(coordinator.save_path(), "{ not json").expect("write");
        let (mut ledger, mut discovery) = seeded();

        let outcome = coordinator.load(&mut ledger, &mut discovery, &mut RecordingWorld::default());

        assert!(matches!(outcome, LoadOutcome::Failed(PersistenceError::Snapshot(_))));
        assert_eq!(ledger.visit_count("zone_01"), 3);
    }

    #[test]
    fn version_mismatch_loads_best_effort() {
        let temp = TempDir::new().expect("tempdir");
        let coordinator = coordinator(&temp);
        fs::create_dir_all(temp.path().join("saves")).expect("mkdir");
        let legacy = json!({
            "zoneIDs": ["zone_01"],
            "visitCounts": [4],
            "discoveredAnimals": ["Wombat"],
            "activatedBuildingIDs": ["homestead_01"],
            "saveTimestamp": "2024-01-01 00:00:00",
            "saveVersion": 1
        });
        fs::write(coordinator.save_path(), legacy.to_string()).expect("write");
        let mut ledger = ZoneVisitLedger::new();
        let mut discovery = DiscoverySet::new();

        let outcome = coordinator.load(&mut ledger, &mut discovery, &mut RecordingWorld::default());

        match outcome {
            LoadOutcome::Loaded(report) => assert_eq!(report.version_mismatch, Some(1)),
            other => panic!("expected load, got {other:?}"),
        }
        assert_eq!(ledger.visit_count("zone_01"), 4);
        assert!(discovery.has_discovered("Wombat"));
        assert!(coordinator.registry().contains("homestead_01"));
    }

    #[test]
    fn save_with_no_collaborators_keeps_previous_file() {
        let temp = TempDir::new().expect("tempdir");
        let coordinator = coordinator(&temp);
        let (ledger, discovery) = seeded();
        coordinator
            .save(Collaborators::available(&ledger, &discovery))
            .expect("save");
        let before = fs::read_to_string(coordinator.save_path()).expect("read");

        let outcome = coordinator.save(Collaborators::default()).expect("save");

        assert_eq!(
            outcome,
            SaveOutcome::Skipped(SkipReason::CollaboratorsUnavailable)
        );
        assert_eq!(fs::read_to_string(coordinator.save_path()).expect("read"), before);
    }

    #[test]
    fn missing_discovery_section_is_carried_from_previous_save() {
        let temp = TempDir::new().expect("tempdir");
        let coordinator = coordinator(&temp);
        let (mut ledger, discovery) = seeded();
        coordinator
            .save(Collaborators::available(&ledger, &discovery))
            .expect("save");
        ledger.record_visit("zone_04");

        let outcome = coordinator
            .save(Collaborators {
                ledger: Some(&ledger),
                discovery: None,
            })
            .expect("save");

        let SaveOutcome::Written { snapshot, .. } = outcome else {
            panic!("expected a written save");
        };
        assert_eq!(snapshot.zone_visits.get("zone_04"), Some(&1));
        assert_eq!(snapshot.discovered.len(), 2);
    }

    #[test]
    fn shutdown_save_fires_once() {
        let temp = TempDir::new().expect("tempdir");
        let coordinator = coordinator(&temp);
        let (ledger, discovery) = seeded();

        let first = coordinator
            .save_on_shutdown(Collaborators::available(&ledger, &discovery), "quit")
            .expect("save");
        let second = coordinator
            .save_on_shutdown(Collaborators::available(&ledger, &discovery), "drop")
            .expect("save");

        assert!(matches!(first, SaveOutcome::Written { .. }));
        assert_eq!(second, SaveOutcome::Skipped(SkipReason::ShutdownAlreadySaved));
    }

    #[test]
    fn auto_save_fires_on_interval_and_defers_while_busy() {
        let temp = TempDir::new().expect("tempdir");
        let mut config = PersistenceConfig::new(temp.path().join("saves"));
        config.auto_save_interval = Duration::from_secs(10);
        let mut coordinator = PersistenceCoordinator::new(config, ActivationRegistry::default());
        let (ledger, discovery) = seeded();
        let collaborators = Collaborators::available(&ledger, &discovery);

        assert!(coordinator
            .tick(Duration::from_secs(9), collaborators)
            .is_none());

        {
            let busy = coordinator.gate.busy.swap(true, Ordering::AcqRel);
            assert!(!busy);
        }
        let deferred = coordinator.tick(Duration::from_secs(1), collaborators);
        assert!(matches!(
            deferred,
            Some(Ok(SaveOutcome::Skipped(SkipReason::OperationInProgress)))
        ));
        assert!(!coordinator.has_save_file());

        coordinator.gate.busy.store(false, Ordering::Release);
        let written = coordinator.tick(Duration::from_millis(1), collaborators);
        assert!(matches!(written, Some(Ok(SaveOutcome::Written { .. }))));
        assert!(coordinator.has_save_file());

        assert!(coordinator
            .tick(Duration::from_secs(1), collaborators)
            .is_none());
    }

    #[test]
    fn load_is_rejected_while_a_save_holds_the_gate() {
        let temp = TempDir::new().expect("tempdir");
        let coordinator = coordinator(&temp);
        let (mut ledger, mut discovery) = seeded();
        let _guard = coordinator.gate.try_enter().expect("gate free");

        let outcome = coordinator.load(&mut ledger, &mut discovery, &mut RecordingWorld::default());

        assert!(matches!(
            outcome,
            LoadOutcome::Skipped(SkipReason::OperationInProgress)
        ));
    }

    #[test]
    fn new_game_clears_state_file_and_registry() {
        let temp = TempDir::new().expect("tempdir");
        let coordinator = coordinator(&temp);
        let (mut ledger, mut discovery) = seeded();
        coordinator.register_activated_entity("homestead_01");
        coordinator
            .save(Collaborators::available(&ledger, &discovery))
            .expect("save");
        let mut world = RecordingWorld::default();

        coordinator
            .start_new_game(&mut ledger, &mut discovery, &mut world)
            .expect("new game");

        assert!(!coordinator.has_save_file());
        assert!(ledger.all_visit_data().is_empty());
        assert_eq!(discovery.discovery_count(), 0);
        assert!(coordinator.registry().is_empty());
        assert_eq!(world.reloads, 1);
    }

    #[test]
    fn delete_save_is_a_no_op_without_file() {
        let temp = TempDir::new().expect("tempdir");
        let coordinator = coordinator(&temp);
        assert!(!coordinator.delete_save().expect("delete"));
    }

    #[test]
    fn save_overwrites_previous_file() {
        let temp = TempDir::new().expect("tempdir");
        let coordinator = coordinator(&temp);
        let (mut ledger, discovery) = seeded();
        coordinator
            .save(Collaborators::available(&ledger, &discovery))
            .expect("save");
        ledger.load_visit_data(HashMap::from([("zone_99".to_string(), 1)]));
        coordinator
            .save(Collaborators::available(&ledger, &discovery))
            .expect("save");

        let snapshot = coordinator
            .read_snapshot()
            .expect("read")
            .expect("file present");
        assert_eq!(snapshot.zone_visits.len(), 1);
        assert_eq!(snapshot.zone_visits.get("zone_99"), Some(&1));
    }

    #[test]
    fn failed_write_reports_error_and_keeps_prior_save() {
        let temp = TempDir::new().expect("tempdir");
        let coordinator = coordinator(&temp);
        let (mut ledger, discovery) = seeded();
        coordinator
            .save(Collaborators::available(&ledger, &discovery))
            .expect("first save");
        let path = coordinator.save_path();
        let before = fs::read_to_string(&path).expect("read prior save");

        // A directory squatting on the temp file makes the write fail.
        let blocked = path.with_file_name(format!("{DEFAULT_SAVE_FILE_NAME}.tmp"));
        fs::create_dir_all(&blocked).expect("block temp path");
        ledger.record_visit("zone_42");

        let result = coordinator.save(Collaborators::available(&ledger, &discovery));

        assert!(matches!(result, Err(PersistenceError::Write { .. })));
        assert_eq!(fs::read_to_string(&path).expect("read after failure"), before);
    }
}
