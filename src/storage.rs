use crate::errors::AppError;
use crate::models::{DayStatus, QuitRecord, RelapseEntry, TriggerEntry};
use serde::{Deserialize, Deserializer};
use serde_json::Value;
use std::{collections::BTreeMap, collections::HashMap, future::Future, io, path::PathBuf};
use tokio::{fs, sync::Mutex};
use tracing::{debug, warn};

pub const STORAGE_KEY: &str = "quit-app-data";

/// A durable key-value slot holding raw bytes.
pub trait RecordSlot: Send + Sync {
    fn get(&self, key: &str) -> impl Future<Output = io::Result<Option<Vec<u8>>>> + Send;

    fn set(&self, key: &str, bytes: Vec<u8>) -> impl Future<Output = io::Result<()>> + Send;
}

/// Stores each key as `<dir>/<key>.json`.
#[derive(Debug, Clone)]
pub struct FileSlot {
    dir: PathBuf,
}

impl FileSlot {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{key}.json"))
    }
}

impl RecordSlot for FileSlot {
    async fn get(&self, key: &str) -> io::Result<Option<Vec<u8>>> {
        match fs::read(self.path_for(key)).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(err) => Err(err),
        }
    }

    async fn set(&self, key: &str, bytes: Vec<u8>) -> io::Result<()> {
        fs::create_dir_all(&self.dir).await?;
        let path = self.path_for(key);
        fs::write(&path, bytes).await?;
        debug!(path = %path.display(), "record written");
        Ok(())
    }
}

#[derive(Debug, Default)]
pub struct MemorySlot {
    entries: Mutex<HashMap<String, Vec<u8>>>,
}

impl MemorySlot {
    pub fn with_entry(key: &str, bytes: impl Into<Vec<u8>>) -> Self {
        let mut entries = HashMap::new();
        entries.insert(key.to_string(), bytes.into());
        Self {
            entries: Mutex::new(entries),
        }
    }
}

impl RecordSlot for MemorySlot {
    async fn get(&self, key: &str) -> io::Result<Option<Vec<u8>>> {
        Ok(self.entries.lock().await.get(key).cloned())
    }

    async fn set(&self, key: &str, bytes: Vec<u8>) -> io::Result<()> {
        self.entries.lock().await.insert(key.to_string(), bytes);
        Ok(())
    }
}

/// Loose shape of a persisted record: every field may be missing.
/// Date fields are kept as raw JSON so a malformed date does not sink the
/// rest of the record; an outer `None` means the key was absent.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StoredRecord {
    #[serde(default, deserialize_with = "present")]
    first_opened_date: Option<Value>,
    #[serde(default, deserialize_with = "present")]
    streak_start_date: Option<Value>,
    #[serde(default, deserialize_with = "present")]
    last_relapse_date: Option<Value>,
    #[serde(default)]
    relapse_history: Option<Vec<RelapseEntry>>,
    #[serde(default)]
    trigger_history: Option<Vec<TriggerEntry>>,
    #[serde(default)]
    play_later_videos: Option<Vec<String>>,
    #[serde(default)]
    day_statuses: Option<BTreeMap<String, DayStatus>>,
}

fn present<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    T::deserialize(deserializer).map(Some)
}

/// Decodes stored bytes onto a fresh record. Unreadable input yields the fresh record.
pub fn decode_record(bytes: &[u8], now_ms: i64) -> QuitRecord {
    match merge_stored(bytes, now_ms) {
        Ok(record) => record,
        Err(err) => {
            warn!("stored record unreadable, starting fresh: {err}");
            QuitRecord::fresh(now_ms)
        }
    }
}

fn merge_stored(bytes: &[u8], now_ms: i64) -> Result<QuitRecord, serde_json::Error> {
    let stored: StoredRecord = serde_json::from_slice(bytes)?;
    let defaults = QuitRecord::fresh(now_ms);

    let streak_start = match &stored.streak_start_date {
        None => defaults.streak_start_date,
        Some(value) => millis(value),
    };
    let first_opened = match stored.first_opened_date.as_ref().and_then(millis) {
        Some(first) => first,
        None => match streak_start {
            Some(start) => {
                debug!("migrating record without numeric firstOpenedDate");
                start
            }
            None => now_ms,
        },
    };

    Ok(QuitRecord {
        first_opened_date: Some(first_opened),
        streak_start_date: streak_start,
        last_relapse_date: stored.last_relapse_date.as_ref().and_then(millis),
        relapse_history: stored.relapse_history.unwrap_or(defaults.relapse_history),
        trigger_history: stored.trigger_history.unwrap_or(defaults.trigger_history),
        play_later_videos: stored.play_later_videos.unwrap_or(defaults.play_later_videos),
        day_statuses: stored.day_statuses.unwrap_or(defaults.day_statuses),
    })
}

/// Epoch milliseconds from a JSON number; anything else is treated as unset.
fn millis(value: &Value) -> Option<i64> {
    value
        .as_i64()
        .or_else(|| value.as_f64().filter(|f| f.is_finite()).map(|f| f as i64))
}

pub fn encode_record(record: &QuitRecord) -> Result<Vec<u8>, AppError> {
    Ok(serde_json::to_vec_pretty(record)?)
}
