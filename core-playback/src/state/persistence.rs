//! Durable playback positions on top of a [`RecordStore`].
//!
//! One record per media id. The record's `updated_at` mirrors the state's
//! `last_updated` stamp so age-based sweeps can use the store's index.

use crate::error::{PlaybackError, Result};
use crate::types::PlaybackState;
use bridge_traits::{Clock, RecordStore, StoredRecord};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

const EXPORT_VERSION: u32 = 1;
const MILLIS_PER_DAY: i64 = 86_400_000;

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ExportEnvelope {
    version: u32,
    exported_at: i64,
    states: Vec<PlaybackState>,
}

/// Outcome of [`PlaybackPersistence::import_json`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportSummary {
    pub imported: usize,
    /// States not newer than what the store already held.
    pub skipped: usize,
}

pub struct PlaybackPersistence {
    store: Arc<dyn RecordStore>,
    clock: Arc<dyn Clock>,
    last_stamp: AtomicI64,
}

impl PlaybackPersistence {
    pub fn new(store: Arc<dyn RecordStore>, clock: Arc<dyn Clock>) -> Self {
        Self {
            store,
            clock,
            last_stamp: AtomicI64::new(0),
        }
    }

    /// Next `last_updated` value: the clock, but strictly increasing within
    /// this instance.
    fn next_stamp(&self) -> i64 {
        let now = self.clock.unix_timestamp_millis();
        let mut previous = self.last_stamp.load(Ordering::Acquire);
        loop {
            let stamp = now.max(previous + 1);
            match self.last_stamp.compare_exchange_weak(
                previous,
                stamp,
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => return stamp,
                Err(actual) => previous = actual,
            }
        }
    }

    /// Write `state` with a fresh `last_updated` and return what was stored.
    #[instrument(skip(self, state), fields(media_id = %state.media_id))]
    pub async fn save(&self, state: &PlaybackState) -> Result<PlaybackState> {
        let stamped = PlaybackState {
            last_updated: self.next_stamp(),
            ..state.clone()
        };
        self.write(&stamped).await?;
        debug!(position = stamped.current_time, "Playback state saved");
        Ok(stamped)
    }

    async fn write(&self, state: &PlaybackState) -> Result<()> {
        let payload = serde_json::to_string(state)?;
        self.store
            .put(StoredRecord::new(
                state.media_id.clone(),
                payload,
                state.last_updated,
            ))
            .await
            .map_err(|e| {
                PlaybackError::Persistence(format!(
                    "failed to write state for {}: {}",
                    state.media_id, e
                ))
            })
    }

    /// A record that no longer parses is deleted and reported as missing.
    pub async fn load(&self, media_id: &str) -> Result<Option<PlaybackState>> {
        let record = self.store.get(media_id).await.map_err(|e| {
            PlaybackError::Persistence(format!("failed to read state for {}: {}", media_id, e))
        })?;

        let Some(record) = record else {
            return Ok(None);
        };

        match serde_json::from_str::<PlaybackState>(&record.payload) {
            Ok(state) => Ok(Some(state)),
            Err(e) => {
                warn!(media_id, "Discarding corrupt playback record: {}", e);
                if let Err(e) = self.store.delete(media_id).await {
                    warn!(media_id, "Failed to delete corrupt record: {}", e);
                }
                Ok(None)
            }
        }
    }

    pub async fn delete(&self, media_id: &str) -> Result<bool> {
        self.store.delete(media_id).await.map_err(|e| {
            PlaybackError::Persistence(format!("failed to delete state for {}: {}", media_id, e))
        })
    }

    /// Every readable state. Corrupt records are skipped.
    pub async fn get_all(&self) -> Result<Vec<PlaybackState>> {
        let records = self
            .store
            .get_all()
            .await
            .map_err(|e| PlaybackError::Persistence(format!("failed to list states: {}", e)))?;

        Ok(records
            .into_iter()
            .filter_map(|record| match serde_json::from_str(&record.payload) {
                Ok(state) => Some(state),
                Err(e) => {
                    warn!(media_id = %record.key, "Skipping corrupt playback record: {}", e);
                    None
                }
            })
            .collect())
    }

    pub async fn export_json(&self) -> Result<String> {
        let envelope = ExportEnvelope {
            version: EXPORT_VERSION,
            exported_at: self.clock.unix_timestamp_millis(),
            states: self.get_all().await?,
        };
        info!("Exporting {} playback states", envelope.states.len());
        Ok(serde_json::to_string(&envelope)?)
    }

    /// Merge an export. Incoming states keep their own stamps and replace
    /// stored ones only when strictly newer.
    pub async fn import_json(&self, document: &str) -> Result<ImportSummary> {
        let envelope: ExportEnvelope = serde_json::from_str(document)?;
        if envelope.version != EXPORT_VERSION {
            return Err(PlaybackError::Persistence(format!(
                "unsupported export version {}",
                envelope.version
            )));
        }

        let mut summary = ImportSummary::default();
        for state in envelope.states {
            let newer = match self.load(&state.media_id).await? {
                Some(existing) => state.last_updated > existing.last_updated,
                None => true,
            };
            if newer {
                self.write(&state).await?;
                summary.imported += 1;
            } else {
                summary.skipped += 1;
            }
        }

        info!(
            imported = summary.imported,
            skipped = summary.skipped,
            "Imported playback states"
        );
        Ok(summary)
    }

    /// Delete states last updated more than `days` days ago.
    pub async fn sweep_older_than(&self, days: u32) -> Result<usize> {
        let cutoff = self.clock.unix_timestamp_millis() - i64::from(days) * MILLIS_PER_DAY;
        let stale = self
            .store
            .keys_updated_before(cutoff)
            .await
            .map_err(|e| PlaybackError::Persistence(format!("failed to scan states: {}", e)))?;

        let mut removed = 0;
        for key in stale {
            if self.delete(&key).await? {
                removed += 1;
            }
        }
        if removed > 0 {
            info!("Swept {} playback states older than {} days", removed, days);
        }
        Ok(removed)
    }

    pub async fn clear_all(&self) -> Result<()> {
        self.store
            .clear()
            .await
            .map_err(|e| PlaybackError::Persistence(format!("failed to clear states: {}", e)))?;
        info!("Cleared all playback states");
        Ok(())
    }
}

impl std::fmt::Debug for PlaybackPersistence {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PlaybackPersistence")
            .field("last_stamp", &self.last_stamp.load(Ordering::Relaxed))
            .finish()
    }
}
