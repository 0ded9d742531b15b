use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DayStatus {
    Good,
    Slip,
}

impl DayStatus {
    pub fn flipped(self) -> Self {
        match self {
            DayStatus::Good => DayStatus::Slip,
            DayStatus::Slip => DayStatus::Good,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelapseEntry {
    pub timestamp: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lie: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub change: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TriggerEntry {
    pub timestamp: i64,
    pub triggers: Vec<String>,
    pub action_completed: String,
}

/// The single persisted record. Timestamps are epoch milliseconds.
///
/// A day missing from `day_statuses` counts as [`DayStatus::Good`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuitRecord {
    pub first_opened_date: Option<i64>,
    pub streak_start_date: Option<i64>,
    pub last_relapse_date: Option<i64>,
    pub relapse_history: Vec<RelapseEntry>,
    pub trigger_history: Vec<TriggerEntry>,
    pub play_later_videos: Vec<String>,
    pub day_statuses: BTreeMap<String, DayStatus>,
}

impl QuitRecord {
    pub fn fresh(now_ms: i64) -> Self {
        Self {
            first_opened_date: Some(now_ms),
            streak_start_date: Some(now_ms),
            last_relapse_date: None,
            relapse_history: Vec::new(),
            trigger_history: Vec::new(),
            play_later_videos: Vec::new(),
            day_statuses: BTreeMap::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Reflection {
    Relapse(RelapseEntry),
    Action(TriggerEntry),
}

impl Reflection {
    pub fn timestamp(&self) -> i64 {
        match self {
            Reflection::Relapse(entry) => entry.timestamp,
            Reflection::Action(entry) => entry.timestamp,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct CalendarDay {
    pub date: String,
    pub status: Option<DayStatus>,
}

#[derive(Debug, Serialize)]
pub struct CalendarMonth {
    pub year: i32,
    pub month: u32,
    pub days: Vec<CalendarDay>,
}

#[derive(Debug, Deserialize)]
pub struct RelapseRequest {
    pub lie: Option<String>,
    pub change: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TriggerRequest {
    pub triggers: Vec<String>,
    pub action_completed: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayLaterRequest {
    pub video_id: String,
}

#[derive(Debug, Deserialize)]
pub struct DayStatusRequest {
    pub date: String,
    pub status: DayStatus,
}

#[derive(Debug, Deserialize)]
pub struct DayToggleRequest {
    pub date: String,
}

#[derive(Debug, Deserialize)]
pub struct CalendarQuery {
    pub year: Option<i32>,
    pub month: Option<u32>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordResponse {
    pub data: QuitRecord,
    pub is_loaded: bool,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SummaryResponse {
    pub streak_days: u32,
    pub time_since_relapse: Option<String>,
    pub first_opened_date: Option<i64>,
}
