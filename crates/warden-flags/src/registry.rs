//! [`FeatureFlagRegistry`]: copy-on-write flag state.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, PoisonError, RwLock};

use chrono::Utc;
use warden_core::errors::ConfigError;
use warden_core::models::{FeatureFlag, FlagTier};
use warden_core::traits::{PersistedRecord, PersistedState, RecordSink};
use warden_observability::tracing_setup::events;

use crate::catalog::FLAG_CATALOG;

/// Immutable view of every flag plus the global safe-mode switch.
#[derive(Debug, Clone, Default)]
pub struct FlagSnapshot {
    flags: BTreeMap<String, FeatureFlag>,
    safe_mode: bool,
}

impl FlagSnapshot {
    /// Effective state; unknown flags are disabled.
    pub fn is_enabled(&self, name: &str) -> bool {
        self.flags
            .get(name)
            .map(|f| f.is_effective(self.safe_mode))
            .unwrap_or(false)
    }

    pub fn get(&self, name: &str) -> Option<&FeatureFlag> {
        self.flags.get(name)
    }

    pub fn flags(&self) -> impl Iterator<Item = &FeatureFlag> {
        self.flags.values()
    }

    pub fn safe_mode(&self) -> bool {
        self.safe_mode
    }

    pub fn len(&self) -> usize {
        self.flags.len()
    }

    pub fn is_empty(&self) -> bool {
        self.flags.is_empty()
    }
}

/// Thread-safe flag registry.
///
/// Writers serialize on `write_lock`, build a new snapshot, and swap it in.
/// Readers clone the current `Arc` and never wait on a writer's work.
pub struct FeatureFlagRegistry {
    current: RwLock<Arc<FlagSnapshot>>,
    write_lock: Mutex<()>,
    sink: Option<Arc<dyn RecordSink>>,
}

impl FeatureFlagRegistry {
    /// Empty registry.
    pub fn new() -> Self {
        Self {
            current: RwLock::new(Arc::new(FlagSnapshot::default())),
            write_lock: Mutex::new(()),
            sink: None,
        }
    }

    /// Registry seeded with [`FLAG_CATALOG`].
    pub fn with_defaults() -> Self {
        let flags = FLAG_CATALOG
            .iter()
            .map(|e| {
                (
                    e.name.to_string(),
                    FeatureFlag::new(e.name, e.tier, e.default_enabled),
                )
            })
            .collect();
        Self {
            current: RwLock::new(Arc::new(FlagSnapshot {
                flags,
                safe_mode: false,
            })),
            write_lock: Mutex::new(()),
            sink: None,
        }
    }

    /// Attach a write-behind sink; every later mutation is appended to it.
    pub fn with_sink(mut self, sink: Arc<dyn RecordSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    /// Current snapshot.
    pub fn snapshot(&self) -> Arc<FlagSnapshot> {
        Arc::clone(&self.current.read().unwrap_or_else(PoisonError::into_inner))
    }

    pub fn is_enabled(&self, name: &str) -> bool {
        self.snapshot().is_enabled(name)
    }

    pub fn get(&self, name: &str) -> Option<FeatureFlag> {
        self.snapshot().get(name).cloned()
    }

    pub fn safe_mode(&self) -> bool {
        self.snapshot().safe_mode
    }

    /// Add a new flag. Flags are never removed.
    pub fn register(&self, name: &str, tier: FlagTier, enabled: bool) -> Result<(), ConfigError> {
        if name.trim().is_empty() {
            return Err(ConfigError::InvalidValue {
                key: "flag.name".into(),
                reason: "must not be empty".into(),
            });
        }
        self.mutate(|snapshot| {
            if snapshot.flags.contains_key(name) {
                return Err(ConfigError::DuplicateFlag {
                    name: name.to_string(),
                });
            }
            let flag = FeatureFlag::new(name, tier, enabled);
            snapshot.flags.insert(name.to_string(), flag.clone());
            Ok(Some(PersistedRecord::Flag(flag)))
        })
    }

    /// Set a flag's individual `enabled` bit. Does not clear a kill switch.
    pub fn set_flag(&self, name: &str, enabled: bool) -> Result<(), ConfigError> {
        self.mutate_flag(name, |flag| {
            if flag.enabled == enabled {
                return false;
            }
            flag.enabled = enabled;
            true
        })
    }

    /// Engage the kill switch. Idempotent.
    pub fn kill_feature(&self, name: &str) -> Result<(), ConfigError> {
        self.mutate_flag(name, |flag| {
            if flag.killed {
                return false;
            }
            flag.killed = true;
            true
        })
    }

    /// Release the kill switch, returning the flag to its `enabled` bit.
    pub fn restore_flag(&self, name: &str) -> Result<(), ConfigError> {
        self.mutate_flag(name, |flag| {
            if !flag.killed {
                return false;
            }
            flag.killed = false;
            true
        })
    }

    /// Toggle global safe mode. Individual flags are masked, never altered.
    pub fn set_safe_mode(&self, enabled: bool) {
        // The closure never fails.
        let _ = self.mutate(|snapshot| {
            if snapshot.safe_mode == enabled {
                return Ok(None);
            }
            snapshot.safe_mode = enabled;
            events::safe_mode_changed(enabled);
            Ok(Some(PersistedRecord::SafeMode {
                enabled,
                at: Utc::now(),
            }))
        });
    }

    /// Apply persisted flag state on startup. Persisted flags replace
    /// same-named ones; unknown persisted flags are added. Nothing is
    /// re-appended to the sink.
    pub fn load_from(&self, state: &PersistedState) {
        let _guard = self.write_lock.lock().unwrap_or_else(PoisonError::into_inner);
        let mut next = (*self.snapshot()).clone();
        for (name, flag) in &state.flags {
            next.flags.insert(name.clone(), flag.clone());
        }
        next.safe_mode = state.safe_mode;
        *self.current.write().unwrap_or_else(PoisonError::into_inner) = Arc::new(next);
    }

    fn mutate_flag(
        &self,
        name: &str,
        apply: impl FnOnce(&mut FeatureFlag) -> bool,
    ) -> Result<(), ConfigError> {
        self.mutate(|snapshot| {
            let flag = snapshot
                .flags
                .get_mut(name)
                .ok_or_else(|| ConfigError::UnknownFlag {
                    name: name.to_string(),
                })?;
            if !apply(flag) {
                return Ok(None);
            }
            flag.updated_at = Utc::now();
            events::flag_changed(&flag.name, flag.enabled, flag.killed);
            Ok(Some(PersistedRecord::Flag(flag.clone())))
        })
    }

    /// Copy, modify, swap. A failed modification leaves the current snapshot in place.
    fn mutate(
        &self,
        apply: impl FnOnce(&mut FlagSnapshot) -> Result<Option<PersistedRecord>, ConfigError>,
    ) -> Result<(), ConfigError> {
        let _guard = self.write_lock.lock().unwrap_or_else(PoisonError::into_inner);
        let mut next = (*self.snapshot()).clone();
        let record = apply(&mut next)?;
        if record.is_none() {
            return Ok(());
        }
        *self.current.write().unwrap_or_else(PoisonError::into_inner) = Arc::new(next);
        if let (Some(sink), Some(record)) = (&self.sink, record) {
            sink.submit(record);
        }
        Ok(())
    }
}

impl Default for FeatureFlagRegistry {
    fn default() -> Self {
        Self::with_defaults()
    }
}

impl std::fmt::Debug for FeatureFlagRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let snapshot = self.snapshot();
        f.debug_struct("FeatureFlagRegistry")
            .field("flags", &snapshot.len())
            .field("safe_mode", &snapshot.safe_mode)
            .finish()
    }
}
