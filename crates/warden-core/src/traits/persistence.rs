use std::collections::{BTreeMap, HashMap};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::errors::PersistenceError;
use crate::models::{AlertRecord, Category, FeatureFlag, OverrideRecord, Thresholds};

/// Kind of an append-only governance record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordKind {
    Flag,
    SafeMode,
    Threshold,
    Override,
    Alert,
}

impl RecordKind {
    pub const ALL: [RecordKind; 5] = [
        RecordKind::Flag,
        RecordKind::SafeMode,
        RecordKind::Threshold,
        RecordKind::Override,
        RecordKind::Alert,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Flag => "flag",
            Self::SafeMode => "safe_mode",
            Self::Threshold => "threshold",
            Self::Override => "override",
            Self::Alert => "alert",
        }
    }

    /// Whether records of this kind describe current state (only the latest
    /// per key matters) rather than an audit log.
    pub fn is_state(self) -> bool {
        matches!(self, Self::Flag | Self::SafeMode | Self::Threshold)
    }
}

/// One append-only persistence record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "record", rename_all = "snake_case")]
pub enum PersistedRecord {
    Flag(FeatureFlag),
    SafeMode {
        enabled: bool,
        at: DateTime<Utc>,
    },
    Threshold {
        category: Category,
        thresholds: Thresholds,
        at: DateTime<Utc>,
    },
    Override(OverrideRecord),
    Alert(AlertRecord),
}

impl PersistedRecord {
    pub fn kind(&self) -> RecordKind {
        match self {
            Self::Flag(_) => RecordKind::Flag,
            Self::SafeMode { .. } => RecordKind::SafeMode,
            Self::Threshold { .. } => RecordKind::Threshold,
            Self::Override(_) => RecordKind::Override,
            Self::Alert(_) => RecordKind::Alert,
        }
    }

    /// Key identifying the entity the record describes.
    pub fn key(&self) -> String {
        match self {
            Self::Flag(flag) => flag.name.clone(),
            Self::SafeMode { .. } => "safe_mode".to_string(),
            Self::Threshold { category, .. } => category.as_str().to_string(),
            Self::Override(record) => record.id.clone(),
            Self::Alert(alert) => alert.id.clone(),
        }
    }

    pub fn recorded_at(&self) -> DateTime<Utc> {
        match self {
            Self::Flag(flag) => flag.updated_at,
            Self::SafeMode { at, .. } | Self::Threshold { at, .. } => *at,
            Self::Override(record) => record.timestamp,
            Self::Alert(alert) => alert.last_notified_at.unwrap_or(alert.created_at),
        }
    }
}

/// State reconstructed by replaying records in append order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PersistedState {
    pub flags: BTreeMap<String, FeatureFlag>,
    pub safe_mode: bool,
    pub thresholds: BTreeMap<Category, Thresholds>,
    pub overrides: Vec<OverrideRecord>,
    /// Latest version of each alert, in first-seen order.
    pub alerts: Vec<AlertRecord>,
    /// Alert id to position in `alerts`.
    #[serde(skip)]
    alert_index: HashMap<String, usize>,
}

impl PersistedState {
    pub fn replay(records: impl IntoIterator<Item = PersistedRecord>) -> Self {
        let mut state = Self::default();
        for record in records {
            state.apply(record);
        }
        state
    }

    pub fn apply(&mut self, record: PersistedRecord) {
        match record {
            PersistedRecord::Flag(flag) => {
                self.flags.insert(flag.name.clone(), flag);
            }
            PersistedRecord::SafeMode { enabled, .. } => self.safe_mode = enabled,
            PersistedRecord::Threshold {
                category,
                thresholds,
                ..
            } => {
                self.thresholds.insert(category, thresholds);
            }
            PersistedRecord::Override(record) => self.overrides.push(record),
            PersistedRecord::Alert(alert) => {
                if self.alert_index.len() != self.alerts.len() {
                    self.reindex_alerts();
                }
                match self.alert_index.get(&alert.id) {
                    Some(&pos) => self.alerts[pos] = alert,
                    None => {
                        self.alert_index.insert(alert.id.clone(), self.alerts.len());
                        self.alerts.push(alert);
                    }
                }
            }
        }
    }

    fn reindex_alerts(&mut self) {
        self.alert_index = self
            .alerts
            .iter()
            .enumerate()
            .map(|(pos, alert)| (alert.id.clone(), pos))
            .collect();
    }

    pub fn is_empty(&self) -> bool {
        self.flags.is_empty()
            && !self.safe_mode
            && self.thresholds.is_empty()
            && self.overrides.is_empty()
            && self.alerts.is_empty()
    }
}

/// Retention bounds for audit-log record kinds (overrides, alerts).
/// State kinds always keep their latest record per key.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RetentionPolicy {
    pub max_records_per_kind: Option<usize>,
    pub max_age_days: Option<i64>,
}

impl Default for RetentionPolicy {
    fn default() -> Self {
        Self {
            max_records_per_kind: Some(100_000),
            max_age_days: Some(365),
        }
    }
}

/// Durable backend: `load()` + `append(record)`, optional `compact`.
pub trait Persistence: Send + Sync {
    fn load(&self) -> Result<PersistedState, PersistenceError>;

    fn append(&self, record: &PersistedRecord) -> Result<(), PersistenceError>;

    fn append_batch(&self, records: &[PersistedRecord]) -> Result<(), PersistenceError> {
        for record in records {
            self.append(record)?;
        }
        Ok(())
    }

    /// Apply retention. Returns the number of records removed.
    fn compact(&self, _policy: &RetentionPolicy) -> Result<usize, PersistenceError> {
        Ok(0)
    }
}

/// Non-blocking record intake used by governance components. Implemented by
/// the write-behind writer; must never block the caller.
pub trait RecordSink: Send + Sync {
    fn submit(&self, record: PersistedRecord);
}
