//! Reactive chart controller.
//!
//! Owns the current [`ChartControls`], the resource caches, and the
//! published [`ControllerState`]. Any control change that affects the
//! aggregation starts a refresh:
//!
//! ```text
//! setter ──▶ controls (replaced) ──▶ refresh(seq)
//!                                      │  load rows + period metadata (cached)
//!                                      │  aggregate on a blocking thread
//!                                      ▼
//!                          seq still latest? ──yes──▶ watch::Sender<ControllerState>
//!                                      └──no───▶ dropped
//! ```
//!
//! Refreshes are never aborted. A refresh that finishes after a newer one
//! was requested is discarded, so the published state always reflects the
//! most recent request regardless of completion order. Category selection
//! is applied on read by [`ChartController::combined_view`] and never
//! triggers a refresh.

#[cfg(test)]
mod controller_tests;

use std::collections::{BTreeMap, BTreeSet};
use std::num::NonZeroU32;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use rankmap_types::{
    ChartControls, ChartData, DifficultySelect, NormalizationMode, PeriodRange,
};
use tokio::sync::{RwLock, watch};
use tracing::{debug, info, warn};

use crate::aggregate::{AggregateResult, aggregate, combine_selected};
use crate::config::{RankmapConfig, SourceConfig};
use crate::error::{Error, Result};
use crate::fetch::{ResourceCache, ResourceSource, source_for_base};
use crate::periods::{PeriodMeta, parse_period_meta};
use crate::records::{ParticipationRecord, parse_rows};

/// Snapshot published to subscribers after every change.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ControllerState {
    /// A refresh is outstanding
    pub is_loading: bool,
    /// Message of the last failed refresh; cleared by the next success
    pub error: Option<String>,
    pub slices_by_category: Arc<BTreeMap<u32, ChartData>>,
    pub available_categories: BTreeSet<u32>,
    pub full_period_range: PeriodRange,
    pub selected_categories: BTreeSet<u32>,
    /// Modes the committed slices were computed with
    pub heatmap_mode: NormalizationMode,
    pub histogram_mode: NormalizationMode,
    /// Sequence number of the request that produced the slices
    pub committed_seq: u64,
}

pub struct ChartController {
    rows: ResourceCache<Vec<ParticipationRecord>>,
    periods: ResourceCache<Vec<PeriodMeta>>,
    source: SourceConfig,
    default_period_range: PeriodRange,
    controls: RwLock<ChartControls>,
    /// Last stamped request
    latest_seq: AtomicU64,
    state: watch::Sender<ControllerState>,
}

impl ChartController {
    pub fn new(config: &RankmapConfig) -> Self {
        Self::with_source(source_for_base(&config.source.base), config)
    }

    pub fn with_source(source: Arc<dyn ResourceSource>, config: &RankmapConfig) -> Self {
        let initial = ControllerState {
            full_period_range: config.default_period_range,
            selected_categories: config.controls.selected_categories.clone(),
            heatmap_mode: config.controls.heatmap_mode,
            histogram_mode: config.controls.histogram_mode,
            ..Default::default()
        };
        let (state, _) = watch::channel(initial);
        Self {
            rows: ResourceCache::new(Arc::clone(&source)),
            periods: ResourceCache::new(source),
            source: config.source.clone(),
            default_period_range: config.default_period_range,
            controls: RwLock::new(config.controls.clone()),
            latest_seq: AtomicU64::new(0),
            state,
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<ControllerState> {
        self.state.subscribe()
    }

    pub fn state(&self) -> ControllerState {
        self.state.borrow().clone()
    }

    pub async fn controls(&self) -> ChartControls {
        self.controls.read().await.clone()
    }

    /// Sum of the selected categories' slices from the committed state.
    ///
    /// `None` when nothing is selected or no selected category has data.
    pub fn combined_view(&self) -> Option<ChartData> {
        let state = self.state.borrow();
        combine_selected(&state.slices_by_category, &state.selected_categories)
    }

    // ─── Control setters ────────────────────────────────────────────────────

    pub async fn set_entity(&self, entity: Option<u32>) -> u64 {
        self.update(|c| c.entity = entity).await
    }

    pub async fn set_bucket_width(&self, width: NonZeroU32) -> u64 {
        self.update(|c| c.bucket_width = width).await
    }

    pub async fn set_difficulty(&self, difficulty: DifficultySelect) -> u64 {
        self.update(|c| c.difficulty = difficulty).await
    }

    pub async fn set_period_range(&self, range: PeriodRange) -> u64 {
        self.update(|c| c.period_range = range).await
    }

    pub async fn set_hide_threshold(&self, threshold: f64) -> u64 {
        self.update(|c| c.hide_threshold = threshold).await
    }

    pub async fn set_heatmap_mode(&self, mode: NormalizationMode) -> u64 {
        self.update(|c| c.heatmap_mode = mode).await
    }

    pub async fn set_histogram_mode(&self, mode: NormalizationMode) -> u64 {
        self.update(|c| c.histogram_mode = mode).await
    }

    /// Replace every control at once.
    pub async fn set_controls(&self, controls: ChartControls) -> u64 {
        self.update(move |c| *c = controls).await
    }

    /// Add `category` to the selection, or remove it if already selected.
    pub async fn toggle_category(&self, category: u32) -> u64 {
        self.update(|c| {
            let mut selected = c.selected_categories.clone();
            if !selected.remove(&category) {
                selected.insert(category);
            }
            c.selected_categories = selected;
        })
        .await
    }

    pub async fn set_selected_categories(&self, selected: BTreeSet<u32>) -> u64 {
        self.update(move |c| c.selected_categories = selected).await
    }

    /// Apply `change` to a copy of the controls and swap it in. Refreshes if
    /// anything besides the selection changed; returns the latest request
    /// sequence number.
    async fn update(&self, change: impl FnOnce(&mut ChartControls)) -> u64 {
        let needs_refresh = {
            let mut controls = self.controls.write().await;
            let mut next = controls.clone();
            change(&mut next);
            let needs_refresh = controls.needs_recompute(&next);

            self.state.send_if_modified(|state| {
                if state.selected_categories == next.selected_categories {
                    return false;
                }
                state.selected_categories = next.selected_categories.clone();
                true
            });
            *controls = next;
            needs_refresh
        };

        if needs_refresh {
            self.refresh().await
        } else {
            self.latest_seq.load(Ordering::SeqCst)
        }
    }

    // ─── Refresh ────────────────────────────────────────────────────────────

    /// Recompute from the current controls and publish the result if no
    /// newer request was made in the meantime. Returns this request's
    /// sequence number.
    ///
    /// Dropping the future before it completes abandons the request; the
    /// loading flag is cleared if no newer request took over.
    pub async fn refresh(&self) -> u64 {
        // Stamped under the lock so a higher sequence never sees older controls
        let (controls, seq) = {
            let controls = self.controls.read().await;
            (controls.clone(), self.latest_seq.fetch_add(1, Ordering::SeqCst) + 1)
        };

        let (heatmap_mode, histogram_mode) = (controls.heatmap_mode, controls.histogram_mode);

        let Some(entity) = controls.entity else {
            let default_range = self.default_period_range;
            self.commit(seq, move |state| {
                state.error = None;
                state.heatmap_mode = heatmap_mode;
                state.histogram_mode = histogram_mode;
                state.slices_by_category = Arc::default();
                state.available_categories.clear();
                state.full_period_range = default_range;
            });
            return seq;
        };

        // Only the latest request may raise the flag, or a newer commit that
        // already cleared it would be overwritten
        let _loading = LoadingGuard { controller: self, seq };
        self.state.send_if_modified(|state| {
            if self.latest_seq.load(Ordering::SeqCst) != seq || state.is_loading {
                return false;
            }
            state.is_loading = true;
            true
        });
        debug!(seq, entity, "Recomputing chart data");

        match self.compute(entity, &controls).await {
            Ok(result) => {
                let categories = result.available_categories.len();
                let (columns, rows) = result
                    .slices
                    .values()
                    .next()
                    .map_or((0, 0), |s| (s.heatmap.cols.len(), s.heatmap.rows.len()));
                let committed = self.commit(seq, move |state| {
                    state.error = None;
                    state.heatmap_mode = heatmap_mode;
                    state.histogram_mode = histogram_mode;
                    state.slices_by_category = Arc::new(result.slices);
                    state.available_categories = result.available_categories;
                    state.full_period_range = result.full_period_range;
                });
                if committed {
                    info!(seq, entity, categories, columns, rows, "Chart data updated");
                }
            }
            Err(e) => {
                let message = e.to_string();
                if self.commit(seq, move |state| state.error = Some(message)) {
                    warn!(seq, entity, error = %e, "Chart refresh failed, keeping previous view");
                }
            }
        }
        seq
    }

    async fn compute(&self, entity: u32, controls: &ChartControls) -> Result<AggregateResult> {
        let dataset_key = self.source.dataset_key_for(entity);
        let (records, metas) = tokio::try_join!(
            self.rows.get_or_load(&dataset_key, parse_rows),
            self.periods
                .get_or_load(&self.source.period_meta_key, parse_period_meta),
        )?;

        let controls = controls.clone();
        let empty_range = self.default_period_range;
        tokio::task::spawn_blocking(move || aggregate(&records, &metas, &controls, empty_range))
            .await
            .map_err(|e| Error::Compute(format!("aggregation task failed: {e}")))?
    }

    /// Publish `apply` and clear the loading flag, unless `seq` has been
    /// superseded. Returns whether the update was published.
    fn commit(&self, seq: u64, apply: impl FnOnce(&mut ControllerState)) -> bool {
        let committed = self.state.send_if_modified(|state| {
            if self.latest_seq.load(Ordering::SeqCst) != seq {
                return false;
            }
            apply(state);
            state.is_loading = false;
            state.committed_seq = seq;
            true
        });
        if !committed {
            warn!(
                seq,
                latest = self.latest_seq.load(Ordering::SeqCst),
                "Discarding stale chart result"
            );
        }
        committed
    }
}

/// Clears the loading flag when a refresh ends without committing, as long
/// as it is still the latest request.
struct LoadingGuard<'a> {
    controller: &'a ChartController,
    seq: u64,
}

impl Drop for LoadingGuard<'_> {
    fn drop(&mut self) {
        let controller = self.controller;
        controller.state.send_if_modified(|state| {
            if controller.latest_seq.load(Ordering::SeqCst) != self.seq || !state.is_loading {
                return false;
            }
            state.is_loading = false;
            true
        });
    }
}
