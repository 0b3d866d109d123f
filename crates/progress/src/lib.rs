use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use thiserror::Error;

pub mod activation;
mod atomic_io;
pub mod discovery;
pub mod events;
pub mod integrity;
pub mod layout;
pub mod ledger;
pub mod persistence;
pub mod session;
pub mod snapshot;
pub mod world;

pub use activation::{
    ActivationConfig, ActivationError, ActivationRegistry, ActivationState,
    ActivationStateMachine, AnimationStyle, EntityVisual, TickOutcome, SCALE_UP_START_FRACTION,
};
pub use discovery::{Discovered, DiscoveryError, DiscoverySet};
pub use events::{Subscribers, SubscriptionId};
pub use integrity::{audit, generate_unique_id, DefRef, IntegrityReport};
pub use layout::{
    load_layout_dir, load_layout_file, parse_layout_document, ActivatableDef, LayoutError,
    LayoutErrorCode, SourceLocation,
};
pub use ledger::{ZoneVisitLedger, ZoneVisited};
pub use persistence::{
    ActivatableWorld, Collaborators, LoadOutcome, LoadReport, PersistenceConfig,
    PersistenceCoordinator, PersistenceError, SaveOutcome, SaveTrigger, SkipReason,
    DEFAULT_AUTO_SAVE_INTERVAL, DEFAULT_SAVE_FILE_NAME,
};
pub use session::{GameSession, SessionConfig, SessionError, DEFAULT_LAYOUT_FILE};
pub use snapshot::{SaveSnapshot, SnapshotError, SAVE_VERSION};
pub use world::{EntityId, EntityStatus, World};

pub const ROOT_ENV_VAR: &str = "OUTBACK_ROOT";

#[derive(Debug, Clone)]
pub struct AppPaths {
    pub root: PathBuf,
    pub content_dir: PathBuf,
    pub save_dir: PathBuf,
}

#[derive(Debug, Error)]
pub enum StartupError {
    #[error("failed to read environment variable {var}: {source}")]
    EnvVar {
        var: &'static str,
        #[source]
        source: env::VarError,
    },
    #[error("failed to resolve current executable path: {0}")]
    CurrentExe(#[source] std::io::Error),
    #[error("current executable path has no parent directory: {0}")]
    ExeHasNoParent(PathBuf),
    #[error("failed to create save directory at {path}: {source}")]
    CreateSaveDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error(
        "OUTBACK_ROOT is set but does not point to a valid project root: {path}\n\
A valid root must contain Cargo.toml and either crates/ or assets/."
    )]
    InvalidEnvRoot { path: PathBuf },
    #[error(
        "Could not detect project root by walking upward from executable directory: {start_dir}\n\
Expected a directory containing Cargo.toml and either crates/ or assets/.\n\
Set {env_var} explicitly, for example:\n\
export {env_var}=\"/path/to/outback\""
    )]
    RootNotFound {
        start_dir: PathBuf,
        env_var: &'static str,
    },
}

pub fn resolve_app_paths() -> Result<AppPaths, StartupError> {
    let root = resolve_root()?;
    let content_dir = root.join("assets").join("base");
    let save_dir = root.join("saves");

    fs::create_dir_all(&save_dir).map_err(|source| StartupError::CreateSaveDir {
        path: save_dir.clone(),
        source,
    })?;

    Ok(AppPaths {
        root,
        content_dir,
        save_dir,
    })
}

fn resolve_root() -> Result<PathBuf, StartupError> {
    match env::var(ROOT_ENV_VAR) {
        Ok(value) => {
            let normalized = normalize_path(Path::new(&value));
            if is_repo_marker(&normalized) {
                Ok(normalized)
            } else {
                Err(StartupError::InvalidEnvRoot { path: normalized })
            }
        }
        Err(env::VarError::NotPresent) => {
            let exe = env::current_exe().map_err(StartupError::CurrentExe)?;
            let exe_dir = exe
                .parent()
                .map(Path::to_path_buf)
                .ok_or_else(|| StartupError::ExeHasNoParent(exe.clone()))?;

            exe_dir
                .ancestors()
                .find(|candidate| is_repo_marker(candidate))
                .map(normalize_path)
                .ok_or_else(|| StartupError::RootNotFound {
                    start_dir: normalize_path(&exe_dir),
                    env_var: ROOT_ENV_VAR,
                })
        }
        Err(source) => Err(StartupError::EnvVar {
            var: ROOT_ENV_VAR,
            source,
        }),
    }
}

fn is_repo_marker(path: &Path) -> bool {
    path.join("Cargo.toml").is_file() && (path.join("crates").is_dir() || path.join("assets").is_dir())
}

fn normalize_path(path: &Path) -> PathBuf {
    fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf())
}
