use std::collections::BTreeSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use thiserror::Error;
use tracing::{debug, info, warn};

use crate::ledger::{ZoneVisitLedger, ZoneVisited};

pub const SCALE_UP_START_FRACTION: f32 = 0.1;

static REGISTRY_LOCK_POISON_WARNED: AtomicBool = AtomicBool::new(false);

fn warn_registry_lock_poison_once(operation: &'static str) {
    if REGISTRY_LOCK_POISON_WARNED
        .compare_exchange(false, true, Ordering::Relaxed, Ordering::Relaxed)
        .is_ok()
    {
        warn!(operation, "activation registry lock poisoned; recovered inner value");
    }
}

/// Identifiers of every entity that has become active, whether or not the
/// entity currently exists in the world. Shared between the persistence
/// coordinator and the activation machines.
#[derive(Clone, Debug, Default)]
pub struct ActivationRegistry {
    ids: Arc<Mutex<BTreeSet<String>>>,
}

impl ActivationRegistry {
    fn lock(&self, operation: &'static str) -> MutexGuard<'_, BTreeSet<String>> {
        match self.ids.lock() {
            Ok(guard) => guard,
            Err(poisoned) => {
                warn_registry_lock_poison_once(operation);
                poisoned.into_inner()
            }
        }
    }

    /// Returns `true` if the identifier was not registered before.
    pub fn register(&self, id: &str) -> bool {
        if id.is_empty() {
            warn!("activated_entity_without_id; it will not survive a save");
            return false;
        }
        let inserted = self.lock("register").insert(id.to_string());
        if inserted {
            debug!(id, "activated_entity_registered");
        }
        inserted
    }

    pub fn unregister(&self, id: &str) -> bool {
        self.lock("unregister").remove(id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.lock("contains").contains(id)
    }

    pub fn len(&self) -> usize {
        self.lock("len").len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock("is_empty").is_empty()
    }

    pub fn snapshot(&self) -> BTreeSet<String> {
        self.lock("snapshot").clone()
    }

    /// Replaces the whole set, dropping empty identifiers.
    pub fn replace(&self, mut ids: BTreeSet<String>) {
        if ids.remove("") {
            warn!("activated_entity_without_id dropped from loaded set");
        }
        *self.lock("replace") = ids;
    }

    pub fn clear(&self) {
        self.lock("clear").clear();
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum AnimationStyle {
    Instant,
    #[default]
    FadeIn,
    ScaleUp,
    FadeAndScale,
}

impl AnimationStyle {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "Instant" => Some(Self::Instant),
            "FadeIn" => Some(Self::FadeIn),
            "ScaleUp" => Some(Self::ScaleUp),
            "FadeAndScale" => Some(Self::FadeAndScale),
            _ => None,
        }
    }

    fn fades(self) -> bool {
        matches!(self, Self::FadeIn | Self::FadeAndScale)
    }

    fn scales(self) -> bool {
        matches!(self, Self::ScaleUp | Self::FadeAndScale)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActivationState {
    Dormant,
    Animating,
    Active,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ActivationError {
    #[error("cannot {operation} while {state:?}")]
    InvalidState {
        state: ActivationState,
        operation: &'static str,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct ActivationConfig {
    pub id: String,
    pub label: String,
    pub target_zone: Option<String>,
    pub required_visits: u32,
    pub style: AnimationStyle,
    pub duration_seconds: f32,
    pub permanent: bool,
}

impl Default for ActivationConfig {
    fn default() -> Self {
        Self {
            id: String::new(),
            label: String::new(),
            target_zone: None,
            required_visits: 1,
            style: AnimationStyle::default(),
            duration_seconds: 1.0,
            permanent: true,
        }
    }
}

/// What the presentation layer should draw for an activatable entity.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EntityVisual {
    pub opacity: f32,
    pub scale: f32,
    pub renderer_enabled: bool,
    pub collider_enabled: bool,
}

impl EntityVisual {
    fn hidden() -> Self {
        Self {
            opacity: 0.0,
            scale: 1.0,
            renderer_enabled: false,
            collider_enabled: false,
        }
    }

    fn shown() -> Self {
        Self {
            opacity: 1.0,
            scale: 1.0,
            renderer_enabled: true,
            collider_enabled: true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    Idle,
    Animating,
    Completed,
}

#[derive(Debug, Clone, Copy)]
struct Transition {
    elapsed_seconds: f32,
    duration_seconds: f32,
}

pub(crate) fn smoothstep(t: f32) -> f32 {
    let t = t.clamp(0.0, 1.0);
    t * t * (3.0 - 2.0 * t)
}

/// Drives one activatable entity through `Dormant -> Animating -> Active`.
///
/// The machine keeps running while hidden so it can react to zone visits;
/// only its [`EntityVisual`] changes.
#[derive(Debug)]
pub struct ActivationStateMachine {
    config: ActivationConfig,
    state: ActivationState,
    transition: Option<Transition>,
    visual: EntityVisual,
    registry: ActivationRegistry,
}

impl ActivationStateMachine {
    pub fn new(config: ActivationConfig, registry: ActivationRegistry) -> Self {
        if config.target_zone.as_deref().map_or(true, str::is_empty) {
            warn!(
                id = %config.id,
                label = %config.label,
                "activatable_without_target_zone; only save restore can activate it"
            );
        }
        Self {
            config,
            state: ActivationState::Dormant,
            transition: None,
            visual: EntityVisual::hidden(),
            registry,
        }
    }

    pub fn id(&self) -> &str {
        &self.config.id
    }

    pub fn config(&self) -> &ActivationConfig {
        &self.config
    }

    pub fn state(&self) -> ActivationState {
        self.state
    }

    pub fn is_active(&self) -> bool {
        self.state == ActivationState::Active
    }

    pub fn visual(&self) -> EntityVisual {
        self.visual
    }

    fn required_visits(&self) -> u32 {
        self.config.required_visits.max(1)
    }

    fn target_zone(&self) -> Option<&str> {
        self.config
            .target_zone
            .as_deref()
            .filter(|zone| !zone.is_empty())
    }

    /// Called once the world is live. Progress earned before this session
    /// activates the entity without animation.
    pub fn on_world_start(&mut self, ledger: &ZoneVisitLedger) -> bool {
        if self.state != ActivationState::Dormant {
            return false;
        }
        let Some(zone) = self.target_zone() else {
            return false;
        };
        let count = ledger.visit_count(zone);
        if count < self.required_visits() {
            return false;
        }
        debug!(id = %self.config.id, zone, count, "activation_threshold_met_at_start");
        self.finish_activation();
        true
    }

    /// Returns `true` if this visit started an activation.
    pub fn on_zone_visited(&mut self, event: &ZoneVisited) -> bool {
        if self.state != ActivationState::Dormant {
            return false;
        }
        if self.target_zone() != Some(event.zone_id.as_str()) {
            return false;
        }
        if event.count < self.required_visits() {
            debug!(
                id = %self.config.id,
                zone = %event.zone_id,
                count = event.count,
                required = self.required_visits(),
                "activation_threshold_pending"
            );
            return false;
        }
        self.activate()
    }

    /// Starts the configured animation. No-op unless dormant.
    pub fn activate(&mut self) -> bool {
        if self.state != ActivationState::Dormant {
            return false;
        }

        let duration_seconds = self.config.duration_seconds;
        if self.config.style == AnimationStyle::Instant
            || !duration_seconds.is_finite()
            || duration_seconds <= 0.0
        {
            self.finish_activation();
            return true;
        }

        self.state = ActivationState::Animating;
        self.transition = Some(Transition {
            elapsed_seconds: 0.0,
            duration_seconds,
        });
        self.visual.renderer_enabled = true;
        self.apply_progress(0.0);
        info!(
            id = %self.config.id,
            style = ?self.config.style,
            duration_seconds,
            "activation_started"
        );
        true
    }

    /// Activates immediately from persisted state, bypassing thresholds and animation.
    pub fn activate_from_save(&mut self) {
        if self.state == ActivationState::Active {
            return;
        }
        self.finish_activation();
    }

    pub fn deactivate(&mut self) -> Result<(), ActivationError> {
        if self.config.permanent {
            return Ok(());
        }
        match self.state {
            ActivationState::Dormant => Ok(()),
            ActivationState::Animating => Err(ActivationError::InvalidState {
                state: ActivationState::Animating,
                operation: "deactivate",
            }),
            ActivationState::Active => {
                self.state = ActivationState::Dormant;
                self.transition = None;
                self.visual = EntityVisual::hidden();
                self.registry.unregister(&self.config.id);
                info!(id = %self.config.id, "entity_deactivated");
                Ok(())
            }
        }
    }

    pub fn tick(&mut self, fixed_dt_seconds: f32) -> TickOutcome {
        let Some(mut transition) = self.transition else {
            return TickOutcome::Idle;
        };
        if fixed_dt_seconds.is_finite() && fixed_dt_seconds > 0.0 {
            transition.elapsed_seconds += fixed_dt_seconds;
        }
        let t = (transition.elapsed_seconds / transition.duration_seconds).clamp(0.0, 1.0);
        if t >= 1.0 {
            self.finish_activation();
            return TickOutcome::Completed;
        }
        self.transition = Some(transition);
        self.apply_progress(t);
        TickOutcome::Animating
    }

    fn apply_progress(&mut self, t: f32) {
        let style = self.config.style;
        self.visual.opacity = if style.fades() { t } else { 1.0 };
        self.visual.scale = if style.scales() {
            SCALE_UP_START_FRACTION + (1.0 - SCALE_UP_START_FRACTION) * smoothstep(t)
        } else {
            1.0
        };
    }

    fn finish_activation(&mut self) {
        self.state = ActivationState::Active;
        self.transition = None;
        self.visual = EntityVisual::shown();
        self.registry.register(&self.config.id);
        info!(id = %self.config.id, label = %self.config.label, "entity_activated");
    }
}
