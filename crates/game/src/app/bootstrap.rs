use std::time::Duration;

use progress::{resolve_app_paths, PersistenceConfig, SessionConfig, StartupError};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

const SAVE_FILE_ENV_VAR: &str = "OUTBACK_SAVE_FILE";
const AUTO_SAVE_SECS_ENV_VAR: &str = "OUTBACK_AUTOSAVE_SECS";

pub(crate) struct AppWiring {
    pub(crate) session: SessionConfig,
}

pub(crate) fn build_app() -> Result<AppWiring, StartupError> {
    init_tracing();
    info!("=== Outback Startup ===");

    let paths = resolve_app_paths()?;
    let mut session = SessionConfig::from_app_paths(&paths);
    apply_env_overrides(
        &mut session.persistence,
        std::env::var(SAVE_FILE_ENV_VAR).ok(),
        std::env::var(AUTO_SAVE_SECS_ENV_VAR).ok(),
    );
    info!(
        root = %paths.root.display(),
        layout = %session.layout_path.display(),
        save_path = %session.persistence.save_path().display(),
        auto_save_enabled = session.persistence.auto_save_enabled,
        auto_save_secs = session.persistence.auto_save_interval.as_secs(),
        "startup_config"
    );

    Ok(AppWiring { session })
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_names(true)
        .compact()
        .init();
}

fn apply_env_overrides(
    config: &mut PersistenceConfig,
    save_file: Option<String>,
    auto_save_secs: Option<String>,
) {
    if let Some(file_name) = save_file
        .map(|raw| raw.trim().to_string())
        .filter(|raw| !raw.is_empty())
    {
        config.file_name = file_name;
    }

    let Some(raw) = auto_save_secs else {
        return;
    };
    match raw.trim().parse::<u64>() {
        Ok(0) => config.auto_save_enabled = false,
        Ok(secs) => {
            config.auto_save_enabled = true;
            config.auto_save_interval = Duration::from_secs(secs);
        }
        Err(_) => warn!(
            var = AUTO_SAVE_SECS_ENV_VAR,
            value = %raw,
            "invalid auto-save interval; keeping default"
        ),
    }
}

#[cfg(test)]
mod tests {
    use progress::{DEFAULT_AUTO_SAVE_INTERVAL, DEFAULT_SAVE_FILE_NAME};

    use super::*;

    fn config() -> PersistenceConfig {
        PersistenceConfig::new("saves")
    }

    #[test]
    fn no_overrides_keeps_defaults() {
        let mut config = config();
        apply_env_overrides(&mut config, None, None);

        assert_eq!(config.file_name, DEFAULT_SAVE_FILE_NAME);
        assert_eq!(config.auto_save_interval, DEFAULT_AUTO_SAVE_INTERVAL);
        assert!(config.auto_save_enabled);
    }

    #[test]
    fn overrides_file_name_and_interval() {
        let mut config = config();
        apply_env_overrides(
            &mut config,
            Some(" slot_2.json ".to_string()),
            Some("30".to_string()),
        );

        assert_eq!(config.file_name, "slot_2.json");
        assert_eq!(config.auto_save_interval, Duration::from_secs(30));
    }

    #[test]
    fn zero_interval_disables_auto_save_and_garbage_is_ignored() {
        let mut config = config();
        apply_env_overrides(&mut config, Some("  ".to_string()), Some("0".to_string()));
        assert!(!config.auto_save_enabled);
        assert_eq!(config.file_name, DEFAULT_SAVE_FILE_NAME);

        let mut config = PersistenceConfig::new("saves");
        apply_env_overrides(&mut config, None, Some("often".to_string()));
        assert!(config.auto_save_enabled);
        assert_eq!(config.auto_save_interval, DEFAULT_AUTO_SAVE_INTERVAL);
    }
}
