use std::collections::{BTreeMap, BTreeSet, HashMap};

use chrono::Local;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::warn;

/// Version written by this build. Version 1 files stored zone visits as the
/// parallel `zoneIDs`/`visitCounts` arrays; they are still readable.
pub const SAVE_VERSION: u32 = 2;
pub const LEGACY_PARALLEL_ARRAY_VERSION: u32 = 1;
pub const SAVE_TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SnapshotError {
    #[error("failed to encode save json: {0}")]
    Encode(String),
    #[error("failed to parse save json: {message}")]
    Parse { message: String },
    #[error("failed to parse save json at {path}: {message}")]
    ParseAt { path: String, message: String },
}

/// Complete persisted progress, built fresh for every save and every load.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SaveSnapshot {
    pub zone_visits: BTreeMap<String, u32>,
    pub discovered: BTreeSet<String>,
    pub activated: BTreeSet<String>,
    pub saved_at: String,
    pub version: u32,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SaveFile {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    zone_visits: Option<BTreeMap<String, u32>>,
    #[serde(rename = "zoneIDs", default, skip_serializing_if = "Vec::is_empty")]
    zone_ids: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    visit_counts: Vec<u32>,
    #[serde(default)]
    discovered_animals: Vec<String>,
    #[serde(rename = "activatedBuildingIDs", default)]
    activated_building_ids: Vec<String>,
    #[serde(default)]
    save_timestamp: String,
    #[serde(default)]
    save_version: u32,
}

impl SaveSnapshot {
    /// Builds a snapshot stamped with the local time and the current version.
    pub fn capture(
        zone_visits: &HashMap<String, u32>,
        discovered: &[String],
        activated: &BTreeSet<String>,
    ) -> Self {
        Self {
            zone_visits: zone_visits
                .iter()
                .map(|(zone, count)| (zone.clone(), *count))
                .collect(),
            discovered: discovered.iter().cloned().collect(),
            activated: activated.clone(),
            saved_at: Local::now().format(SAVE_TIMESTAMP_FORMAT).to_string(),
            version: SAVE_VERSION,
        }
    }

    pub fn visit_map(&self) -> HashMap<String, u32> {
        self.zone_visits
            .iter()
            .map(|(zone, count)| (zone.clone(), *count))
            .collect()
    }

    pub fn discovered_list(&self) -> Vec<String> {
        self.discovered.iter().cloned().collect()
    }

    pub fn to_json_pretty(&self) -> Result<String, SnapshotError> {
        let file = SaveFile {
            zone_visits: Some(self.zone_visits.clone()),
            zone_ids: Vec::new(),
            visit_counts: Vec::new(),
            discovered_animals: self.discovered.iter().cloned().collect(),
            activated_building_ids: self.activated.iter().cloned().collect(),
            save_timestamp: self.saved_at.clone(),
            save_version: self.version,
        };
        serde_json::to_string_pretty(&file)
            .map_err(|error| SnapshotError::Encode(error.to_string()))
    }

    pub fn from_json(raw: &str) -> Result<Self, SnapshotError> {
        let mut deserializer = serde_json::Deserializer::from_str(raw);
        let file = match serde_path_to_error::deserialize::<_, SaveFile>(&mut deserializer) {
            Ok(file) => file,
            Err(error) => {
                let path = error.path().to_string();
                let message = error.into_inner().to_string();
                return Err(if path.is_empty() || path == "." {
                    SnapshotError::Parse { message }
                } else {
                    SnapshotError::ParseAt { path, message }
                });
            }
        };

        let mut zone_visits = file.zone_visits.unwrap_or_default();
        if !file.zone_ids.is_empty() || !file.visit_counts.is_empty() {
            let legacy = visits_from_parallel_arrays(&file.zone_ids, &file.visit_counts);
            for (zone, count) in legacy {
                zone_visits.entry(zone).or_insert(count);
            }
        }

        Ok(Self {
            zone_visits,
            discovered: dedup_ids("discoveredAnimals", file.discovered_animals),
            activated: dedup_ids("activatedBuildingIDs", file.activated_building_ids),
            saved_at: file.save_timestamp,
            version: file.save_version,
        })
    }
}

/// Pairs up legacy arrays. Extra entries on the longer side are dropped.
fn visits_from_parallel_arrays(zone_ids: &[String], counts: &[u32]) -> BTreeMap<String, u32> {
    if zone_ids.len() != counts.len() {
        warn!(
            zone_ids = zone_ids.len(),
            visit_counts = counts.len(),
            "save_parallel_arrays_length_mismatch; truncating to shorter"
        );
    }
    let mut visits = BTreeMap::new();
    for (zone, count) in zone_ids.iter().zip(counts) {
        if visits.insert(zone.clone(), *count).is_some() {
            warn!(zone = %zone, "save_duplicate_zone_id; last value wins");
        }
    }
    visits
}

fn dedup_ids(field: &'static str, ids: Vec<String>) -> BTreeSet<String> {
    let total = ids.len();
    let named = ids
        .into_iter()
        .filter(|id| !id.trim().is_empty())
        .collect::<Vec<_>>();
    if named.len() != total {
        warn!(field, dropped = total - named.len(), "save_empty_ids_dropped");
    }
    let named_total = named.len();
    let set = named.into_iter().collect::<BTreeSet<_>>();
    if set.len() != named_total {
        warn!(field, dropped = named_total - set.len(), "save_duplicate_ids_dropped");
    }
    set
}
