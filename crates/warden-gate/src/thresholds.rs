//! [`ThresholdRegistry`]: runtime-mutable per-category thresholds.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, PoisonError, RwLock};

use chrono::Utc;
use warden_core::config::GateConfig;
use warden_core::errors::ConfigError;
use warden_core::models::{Category, ThresholdField, Thresholds};
use warden_core::traits::{PersistedRecord, PersistedState, RecordSink};
use warden_observability::tracing_setup::events;

/// Copy-on-write threshold table. Evaluations read a snapshot; a change
/// applies to every later evaluation and never to an earlier decision.
pub struct ThresholdRegistry {
    current: RwLock<Arc<BTreeMap<Category, Thresholds>>>,
    write_lock: Mutex<()>,
    sink: Option<Arc<dyn RecordSink>>,
}

impl ThresholdRegistry {
    /// Built-in defaults overlaid with `config.thresholds`.
    pub fn new(config: &GateConfig) -> Self {
        let table = Category::ALL
            .into_iter()
            .map(|c| (c, config.thresholds_for(c)))
            .collect();
        Self {
            current: RwLock::new(Arc::new(table)),
            write_lock: Mutex::new(()),
            sink: None,
        }
    }

    pub fn with_sink(mut self, sink: Arc<dyn RecordSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    pub fn snapshot(&self) -> Arc<BTreeMap<Category, Thresholds>> {
        Arc::clone(&self.current.read().unwrap_or_else(PoisonError::into_inner))
    }

    pub fn get(&self, category: Category) -> Thresholds {
        self.snapshot()
            .get(&category)
            .copied()
            .unwrap_or_else(|| Thresholds::default_for(category))
    }

    /// Replace one field. Out-of-range values are rejected and the previous
    /// value is retained. Returns the new thresholds.
    pub fn set_threshold(
        &self,
        category: Category,
        field: ThresholdField,
        value: f64,
    ) -> Result<Thresholds, ConfigError> {
        let _guard = self.write_lock.lock().unwrap_or_else(PoisonError::into_inner);
        let snapshot = self.snapshot();
        let old = snapshot
            .get(&category)
            .copied()
            .unwrap_or_else(|| Thresholds::default_for(category));
        let next = old.with_field(field, value)?;
        if next == old {
            return Ok(next);
        }

        let mut table = (*snapshot).clone();
        table.insert(category, next);
        *self.current.write().unwrap_or_else(PoisonError::into_inner) = Arc::new(table);

        events::threshold_changed(category.as_str(), field.as_str(), field_value(&old, field), value);
        if let Some(sink) = &self.sink {
            sink.submit(PersistedRecord::Threshold {
                category,
                thresholds: next,
                at: Utc::now(),
            });
        }
        Ok(next)
    }

    /// Restore persisted thresholds. Invalid persisted rows are skipped.
    pub fn load_from(&self, state: &PersistedState) {
        let _guard = self.write_lock.lock().unwrap_or_else(PoisonError::into_inner);
        let mut table = (*self.snapshot()).clone();
        for (category, thresholds) in &state.thresholds {
            if thresholds.validate().is_ok() {
                table.insert(*category, *thresholds);
            }
        }
        *self.current.write().unwrap_or_else(PoisonError::into_inner) = Arc::new(table);
    }
}

fn field_value(thresholds: &Thresholds, field: ThresholdField) -> f64 {
    match field {
        ThresholdField::MinConfidence => thresholds.min_confidence,
        ThresholdField::MaxUncertainty => thresholds.max_uncertainty,
        ThresholdField::MinSampleCount => f64::from(thresholds.min_sample_count),
        ThresholdField::MaxDisagreementRate => thresholds.max_disagreement_rate,
    }
}

impl Default for ThresholdRegistry {
    fn default() -> Self {
        Self::new(&GateConfig::default())
    }
}

impl std::fmt::Debug for ThresholdRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ThresholdRegistry")
            .field("thresholds", &self.snapshot())
            .finish()
    }
}
