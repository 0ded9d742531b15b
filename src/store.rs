use crate::clock::{Clock, day_key};
use crate::errors::AppError;
use crate::models::{CalendarMonth, DayStatus, QuitRecord, Reflection, RelapseEntry, TriggerEntry};
use crate::storage::{RecordSlot, STORAGE_KEY, decode_record, encode_record};
use crate::streak;
use chrono::NaiveDate;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{error, info, warn};

/// Owns the quit record and writes it back to its slot after every change.
///
/// Subscribers get a fresh snapshot through [`QuitStore::subscribe`] whenever
/// the record changes.
pub struct QuitStore<S> {
    slot: S,
    clock: Arc<dyn Clock>,
    record: QuitRecord,
    loaded: bool,
    changes: watch::Sender<QuitRecord>,
}

impl<S: RecordSlot> QuitStore<S> {
    pub fn new(slot: S, clock: Arc<dyn Clock>) -> Self {
        let record = QuitRecord::fresh(clock.now_ms());
        let (changes, _) = watch::channel(record.clone());
        Self {
            slot,
            clock,
            record,
            loaded: false,
            changes,
        }
    }

    pub async fn open(slot: S, clock: Arc<dyn Clock>) -> Self {
        let mut store = Self::new(slot, clock);
        store.load().await;
        store
    }

    /// Reads the slot, replacing whatever is in memory, and marks the store ready.
    ///
    /// Never fails: read errors start a fresh record and a failed write-back
    /// is logged, leaving the loaded record in memory.
    pub async fn load(&mut self) {
        let now = self.clock.now_ms();
        self.record = match self.slot.get(STORAGE_KEY).await {
            Ok(Some(bytes)) => decode_record(&bytes, now),
            Ok(None) => {
                info!("no stored record, starting fresh");
                QuitRecord::fresh(now)
            }
            Err(err) => {
                error!("failed to read stored record: {err}");
                QuitRecord::fresh(now)
            }
        };
        self.loaded = true;
        if self.commit().await.is_err() {
            warn!("record loaded but could not be written back");
        }
    }

    pub fn is_loaded(&self) -> bool {
        self.loaded
    }

    pub fn data(&self) -> &QuitRecord {
        &self.record
    }

    pub fn subscribe(&self) -> watch::Receiver<QuitRecord> {
        self.changes.subscribe()
    }

    pub fn into_slot(self) -> S {
        self.slot
    }

    pub async fn log_relapse(
        &mut self,
        lie: Option<String>,
        change: Option<String>,
    ) -> Result<(), AppError> {
        let now = self.clock.now();
        let timestamp = next_timestamp(
            now.timestamp_millis(),
            self.record.relapse_history.iter().map(|entry| entry.timestamp),
        );

        self.record.last_relapse_date = Some(timestamp);
        self.record.streak_start_date = Some(timestamp);
        self.record.relapse_history.push(RelapseEntry {
            timestamp,
            lie,
            change,
        });
        self.record
            .day_statuses
            .insert(day_key(now.date_naive()), DayStatus::Slip);
        info!(timestamp, "relapse logged");
        self.commit().await
    }

    pub async fn log_trigger(
        &mut self,
        triggers: Vec<String>,
        action_completed: String,
    ) -> Result<(), AppError> {
        let timestamp = next_timestamp(
            self.clock.now_ms(),
            self.record.trigger_history.iter().map(|entry| entry.timestamp),
        );
        self.record.trigger_history.push(TriggerEntry {
            timestamp,
            triggers,
            action_completed,
        });
        self.commit().await
    }

    /// Returns whether the video is in the list afterwards.
    pub async fn toggle_play_later(&mut self, video_id: &str) -> Result<bool, AppError> {
        let videos = &mut self.record.play_later_videos;
        let listed = if videos.iter().any(|id| id == video_id) {
            videos.retain(|id| id != video_id);
            false
        } else {
            videos.push(video_id.to_string());
            true
        };
        self.commit().await?;
        Ok(listed)
    }

    pub async fn delete_relapse_entry(&mut self, timestamp: i64) -> Result<bool, AppError> {
        let before = self.record.relapse_history.len();
        self.record
            .relapse_history
            .retain(|entry| entry.timestamp != timestamp);
        let removed = self.record.relapse_history.len() != before;
        self.commit().await?;
        Ok(removed)
    }

    pub async fn delete_trigger_entry(&mut self, timestamp: i64) -> Result<bool, AppError> {
        let before = self.record.trigger_history.len();
        self.record
            .trigger_history
            .retain(|entry| entry.timestamp != timestamp);
        let removed = self.record.trigger_history.len() != before;
        self.commit().await?;
        Ok(removed)
    }

    /// Range is the caller's concern; any day is accepted.
    pub async fn set_day_status(
        &mut self,
        date: NaiveDate,
        status: DayStatus,
    ) -> Result<(), AppError> {
        self.record.day_statuses.insert(day_key(date), status);
        self.commit().await
    }

    /// Flips a day between good and slip. Days outside
    /// `[first opened, today]` are left alone and yield `None`.
    pub async fn toggle_day_status(
        &mut self,
        date: NaiveDate,
    ) -> Result<Option<DayStatus>, AppError> {
        let today = self.clock.today();
        let Some(current) = streak::day_status_in_range(&self.record, date, today) else {
            return Ok(None);
        };
        let next = current.flipped();
        self.set_day_status(date, next).await?;
        Ok(Some(next))
    }

    pub fn streak_days(&self) -> u32 {
        streak::streak_days_at(&self.record, self.clock.today())
    }

    pub fn time_since_relapse(&self) -> Option<String> {
        streak::time_since_relapse_at(&self.record, self.clock.now())
    }

    pub fn calendar(&self, year: i32, month: u32) -> Option<CalendarMonth> {
        streak::calendar_month(&self.record, year, month, self.clock.today())
    }

    pub fn reflections(&self) -> Vec<Reflection> {
        streak::reflections(&self.record)
    }

    pub fn today(&self) -> NaiveDate {
        self.clock.today()
    }

    async fn commit(&mut self) -> Result<(), AppError> {
        self.changes.send_replace(self.record.clone());
        if !self.loaded {
            return Ok(());
        }

        let payload = encode_record(&self.record)?;
        if let Err(err) = self.slot.set(STORAGE_KEY, payload).await {
            error!("failed to persist record: {err}");
            return Err(AppError::internal(err));
        }
        Ok(())
    }
}

/// History timestamps double as entry ids, so a new one must not collide.
fn next_timestamp(now: i64, existing: impl Iterator<Item = i64>) -> i64 {
    match existing.max() {
        Some(latest) if latest >= now => latest + 1,
        _ => now,
    }
}
