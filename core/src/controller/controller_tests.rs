//! Tests for request sequencing, caching and error retention in the
//! chart controller.

use std::collections::{BTreeSet, HashMap, HashSet};
use std::num::NonZeroU32;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use rankmap_types::{ChartControls, NormalizationMode, PeriodRange};

use super::*;
use crate::config::{RankmapConfig, SourceConfig};
use crate::error::{Error, Result};
use crate::fetch::ResourceSource;

const PERIODS: &str = r#"[
    {"Id": "S0", "Boss": "Hod", "MaxLv": 100, "Cnt": {"All": 400}},
    {"Id": "S1", "Boss": "Hod", "MaxLv": 50, "Cnt": {"All": 200, "Lunatic": 80}}
]"#;

/// In-memory files with per-key latency, fetch counting and switchable
/// failures.
#[derive(Default)]
struct FixtureSource {
    files: HashMap<String, Vec<u8>>,
    delays: HashMap<String, Duration>,
    fetches: Mutex<HashMap<String, usize>>,
    failing: Mutex<HashSet<String>>,
}

impl FixtureSource {
    fn new() -> Self {
        let mut source = Self::default();
        source.file("periods.json", PERIODS);
        source.file("map/1.tsv", "1\t5\t3\t10\t0\n1\t5\t4\t5\t0\n");
        source.file("map/2.tsv", "0\t3\t7\t2\t1\n");
        // References a period with no metadata
        source.file("map/5.tsv", "4\t1\t1\t1\t0\n");
        source
    }

    fn file(&mut self, key: &str, body: &str) {
        self.files.insert(key.to_string(), body.as_bytes().to_vec());
    }

    fn delay(mut self, key: &str, millis: u64) -> Self {
        self.delays.insert(key.to_string(), Duration::from_millis(millis));
        self
    }

    fn fetches(&self, key: &str) -> usize {
        self.fetches.lock().unwrap().get(key).copied().unwrap_or(0)
    }

    fn set_failing(&self, key: &str, failing: bool) {
        let mut keys = self.failing.lock().unwrap();
        if failing {
            keys.insert(key.to_string());
        } else {
            keys.remove(key);
        }
    }
}

#[async_trait]
impl ResourceSource for FixtureSource {
    async fn fetch(&self, key: &str) -> Result<Vec<u8>> {
        *self.fetches.lock().unwrap().entry(key.to_string()).or_default() += 1;
        if let Some(delay) = self.delays.get(key) {
            tokio::time::sleep(*delay).await;
        }
        if self.failing.lock().unwrap().contains(key) {
            return Err(Error::fetch(key, "503 Service Unavailable"));
        }
        self.files
            .get(key)
            .cloned()
            .ok_or_else(|| Error::fetch(key, "404 Not Found"))
    }
}

fn config() -> RankmapConfig {
    RankmapConfig {
        source: SourceConfig {
            base: "fixture".to_string(),
            dataset_key: "map/{entity}.tsv".to_string(),
            period_meta_key: "periods.json".to_string(),
        },
        controls: ChartControls {
            bucket_width: NonZeroU32::new(10).unwrap(),
            hide_threshold: 0.0,
            ..Default::default()
        },
        default_period_range: PeriodRange::new(0, 150),
    }
}

fn controller(source: FixtureSource) -> (Arc<FixtureSource>, ChartController) {
    let source = Arc::new(source);
    let controller = ChartController::with_source(source.clone(), &config());
    (source, controller)
}

#[tokio::test]
async fn test_refresh_publishes_slices() {
    let (source, ctl) = controller(FixtureSource::new());

    let seq = ctl.set_entity(Some(1)).await;
    let state = ctl.state();
    assert!(!state.is_loading);
    assert_eq!(state.error, None);
    assert_eq!(state.committed_seq, seq);
    assert_eq!(state.available_categories, BTreeSet::from([3, 4]));
    assert_eq!(state.full_period_range, PeriodRange::new(1, 1));
    assert_eq!(source.fetches("map/1.tsv"), 1);
    assert_eq!(source.fetches("periods.json"), 1);

    // Nothing selected yet
    assert!(ctl.combined_view().is_none());
}

#[tokio::test]
async fn test_selection_change_does_not_refetch() {
    let (source, ctl) = controller(FixtureSource::new());
    ctl.set_heatmap_mode(NormalizationMode::Percent).await;
    let seq = ctl.set_entity(Some(1)).await;

    let after_toggle = ctl.toggle_category(3).await;
    assert_eq!(after_toggle, seq);
    let only_three = ctl.combined_view().unwrap();
    let cell = only_three.heatmap.values[0][1].unwrap();
    assert!((cell - 100.0 * 10.0 / 15.0).abs() < 1e-9);

    ctl.set_selected_categories(BTreeSet::from([3, 4])).await;
    let both = ctl.combined_view().unwrap();
    assert!((both.heatmap.values[0][1].unwrap() - 100.0).abs() < 1e-9);

    // Toggling off leaves only category 4
    ctl.toggle_category(3).await;
    assert_eq!(ctl.state().selected_categories, BTreeSet::from([4]));

    assert_eq!(ctl.state().committed_seq, seq);
    assert_eq!(source.fetches("map/1.tsv"), 1);
    assert_eq!(source.fetches("periods.json"), 1);
}

#[tokio::test]
async fn test_recompute_reuses_cached_rows() {
    let (source, ctl) = controller(FixtureSource::new());
    ctl.set_entity(Some(1)).await;
    ctl.set_bucket_width(NonZeroU32::new(3).unwrap()).await;
    ctl.set_heatmap_mode(NormalizationMode::Percent).await;

    let state = ctl.state();
    let slice = &state.slices_by_category[&3];
    assert_eq!(slice.heatmap.rows, vec!["4-6"]);
    assert_eq!(source.fetches("map/1.tsv"), 1);
}

#[tokio::test]
async fn test_last_request_wins() {
    let (_source, ctl) = controller(FixtureSource::new().delay("map/1.tsv", 200));

    let (first, second) = tokio::join!(ctl.set_entity(Some(1)), async {
        tokio::time::sleep(Duration::from_millis(20)).await;
        ctl.set_entity(Some(2)).await
    });
    assert!(second > first);

    // The slow entity 1 load finished last but was older
    let state = ctl.state();
    assert_eq!(state.committed_seq, second);
    assert_eq!(state.available_categories, BTreeSet::from([7]));
    assert_eq!(state.full_period_range, PeriodRange::new(0, 0));
    assert!(!state.is_loading);
}

#[tokio::test]
async fn test_loading_flag_while_outstanding() {
    let (_source, ctl) = controller(FixtureSource::new().delay("map/1.tsv", 100));
    let mut updates = ctl.subscribe();

    let (_, seen_loading) = tokio::join!(ctl.set_entity(Some(1)), async {
        tokio::time::sleep(Duration::from_millis(30)).await;
        ctl.state().is_loading
    });
    assert!(seen_loading);
    assert!(updates.has_changed().unwrap());
    assert!(!updates.borrow_and_update().is_loading);
}

#[tokio::test]
async fn test_error_keeps_previous_view() {
    let (_source, ctl) = controller(FixtureSource::new());
    ctl.set_entity(Some(1)).await;
    let before = ctl.state();

    ctl.set_entity(Some(9)).await;
    let state = ctl.state();
    let error = state.error.as_deref().unwrap();
    assert!(error.contains("map/9.tsv"), "{error}");
    assert_eq!(state.slices_by_category, before.slices_by_category);
    assert_eq!(state.available_categories, BTreeSet::from([3, 4]));
    assert!(!state.is_loading);
}

#[tokio::test]
async fn test_missing_period_metadata_reported() {
    let (_source, ctl) = controller(FixtureSource::new());
    ctl.set_entity(Some(5)).await;
    let state = ctl.state();
    assert!(state.error.unwrap().contains("no metadata for period"));
    assert!(state.slices_by_category.is_empty());
}

#[tokio::test]
async fn test_failed_fetch_retried_on_next_request() {
    let (source, ctl) = controller(FixtureSource::new());
    source.set_failing("map/1.tsv", true);

    ctl.set_entity(Some(1)).await;
    assert!(ctl.state().error.unwrap().contains("503"));

    source.set_failing("map/1.tsv", false);
    ctl.refresh().await;
    let state = ctl.state();
    assert_eq!(state.error, None);
    assert_eq!(state.available_categories, BTreeSet::from([3, 4]));
    assert_eq!(source.fetches("map/1.tsv"), 2);
    // Metadata loaded fine the first time and stays cached
    assert_eq!(source.fetches("periods.json"), 1);
}

#[tokio::test]
async fn test_no_entity_clears_view() {
    let (source, ctl) = controller(FixtureSource::new());
    ctl.set_entity(Some(2)).await;
    assert!(!ctl.state().slices_by_category.is_empty());

    ctl.set_entity(None).await;
    let state = ctl.state();
    assert!(state.slices_by_category.is_empty());
    assert!(state.available_categories.is_empty());
    assert_eq!(state.full_period_range, PeriodRange::new(0, 150));
    assert!(!state.is_loading);
    assert_eq!(source.fetches("map/2.tsv"), 1);
}

#[tokio::test]
async fn test_set_controls_replaces_everything() {
    let (_source, ctl) = controller(FixtureSource::new());
    let controls = ChartControls {
        entity: Some(1),
        bucket_width: NonZeroU32::new(10).unwrap(),
        hide_threshold: 0.0,
        selected_categories: BTreeSet::from([4]),
        ..Default::default()
    };
    ctl.set_controls(controls.clone()).await;

    assert_eq!(ctl.controls().await, controls);
    let view = ctl.combined_view().unwrap();
    // Absolute: 5 / capacity 50
    assert!((view.heatmap.values[0][1].unwrap() - 0.1).abs() < 1e-9);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_loading_flag_cleared_after_racing_requests() {
    let (_source, ctl) = controller(FixtureSource::new());
    let ctl = Arc::new(ctl);

    for _ in 0..500 {
        ctl.set_entity(Some(1)).await;
        let refresh = tokio::spawn({
            let ctl = Arc::clone(&ctl);
            async move { ctl.refresh().await }
        });
        let clear = tokio::spawn({
            let ctl = Arc::clone(&ctl);
            async move { ctl.set_entity(None).await }
        });
        let (a, b) = (refresh.await.unwrap(), clear.await.unwrap());

        let state = ctl.state();
        assert!(!state.is_loading, "stuck loading after requests {a} and {b}");
        assert_eq!(state.committed_seq, a.max(b));
    }
}

#[tokio::test]
async fn test_abandoned_refresh_clears_loading() {
    let (_source, ctl) = controller(FixtureSource::new().delay("map/1.tsv", 200));

    let abandoned =
        tokio::time::timeout(Duration::from_millis(30), ctl.set_entity(Some(1))).await;
    assert!(abandoned.is_err());
    assert!(!ctl.state().is_loading);

    // The pending load stays cached and the next request completes it
    ctl.refresh().await;
    let state = ctl.state();
    assert!(!state.is_loading);
    assert_eq!(state.available_categories, BTreeSet::from([3, 4]));
}

#[tokio::test]
async fn test_failed_refresh_keeps_committed_modes() {
    let (source, ctl) = controller(FixtureSource::new());
    ctl.set_entity(Some(1)).await;
    assert_eq!(ctl.state().heatmap_mode, NormalizationMode::Absolute);

    source.set_failing("map/2.tsv", true);
    ctl.set_entity(Some(2)).await;
    ctl.set_heatmap_mode(NormalizationMode::Percent).await;

    let state = ctl.state();
    assert!(state.error.is_some());
    // The kept view still holds absolute values
    assert_eq!(state.heatmap_mode, NormalizationMode::Absolute);
    assert_eq!(ctl.controls().await.heatmap_mode, NormalizationMode::Percent);

    source.set_failing("map/2.tsv", false);
    ctl.refresh().await;
    assert_eq!(ctl.state().heatmap_mode, NormalizationMode::Percent);
}
