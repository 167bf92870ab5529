//! Tests for metrics emitted along the gateway call path.
//!
//! Uses `metrics_util::debugging::DebuggingRecorder` to capture and assert
//! on emitted metrics without needing a real exporter.

use std::future::Future;
use std::io::Cursor;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use base64::Engine;
use metrics_util::MetricKind;
use metrics_util::debugging::{DebugValue, DebuggingRecorder, Snapshotter};

use huginn::store::CounterStore;
use huginn::{
    AnalysisBackend, AnalysisRequest, BackendOutput, EffortTier, Huginn, HuginnError, ImageRef,
    Result, telemetry,
};

// ============================================================================
// Mock backend and store
// ============================================================================

struct FixedBackend;

#[async_trait]
impl AnalysisBackend for FixedBackend {
    fn name(&self) -> &str {
        "fixed"
    }

    async fn analyze(
        &self,
        _image: &ImageRef,
        _query: &str,
        _effort: EffortTier,
    ) -> Result<BackendOutput> {
        Ok(BackendOutput {
            text: "a lighthouse at dusk".to_string(),
            processing_time: Duration::from_millis(900),
            model: "fixed-vision".to_string(),
            cost_usd: 0.003,
        })
    }
}

struct DownCounters;

#[async_trait]
impl CounterStore for DownCounters {
    fn name(&self) -> &str {
        "down"
    }

    async fn read(&self, _key: &str) -> Result<f64> {
        Err(HuginnError::store("down", "refused"))
    }

    async fn increment(&self, _key: &str, _amount: f64, _ttl: Duration) -> Result<f64> {
        Err(HuginnError::store("down", "refused"))
    }

    async fn clear(&self, _keys: &[String]) -> Result<()> {
        Err(HuginnError::store("down", "refused"))
    }
}

// ============================================================================
// Snapshot type alias for readability
// ============================================================================

type SnapshotVec = Vec<(
    metrics_util::CompositeKey,
    Option<metrics::Unit>,
    Option<metrics::SharedString>,
    DebugValue,
)>;

// ============================================================================
// Helpers
// ============================================================================

/// Sum all counter values matching a given metric name.
fn counter_total(snapshot: &SnapshotVec, name: &str) -> u64 {
    counter_with_label(snapshot, name, None)
}

/// Sum counter values matching a name and, optionally, one label pair.
fn counter_with_label(snapshot: &SnapshotVec, name: &str, label: Option<(&str, &str)>) -> u64 {
    snapshot
        .iter()
        .filter(|(key, _, _, _)| key.kind() == MetricKind::Counter && key.key().name() == name)
        .filter(|(key, _, _, _)| match label {
            Some((k, v)) => key.key().labels().any(|l| l.key() == k && l.value() == v),
            None => true,
        })
        .map(|(_, _, _, value)| match value {
            DebugValue::Counter(v) => *v,
            _ => 0,
        })
        .sum()
}

/// Check if any histogram entries exist for a given metric name.
fn has_histogram(snapshot: &SnapshotVec, name: &str) -> bool {
    snapshot
        .iter()
        .any(|(key, _, _, _)| key.kind() == MetricKind::Histogram && key.key().name() == name)
}

/// Runs async code within a local recorder scope on the multi-thread runtime.
///
/// `block_in_place` keeps the sync `with_local_recorder` closure on the
/// current thread while `block_on` drives the inner async work.
fn recorded<F: Future>(fut: F) -> (F::Output, Snapshotter) {
    let recorder = DebuggingRecorder::new();
    let snapshotter = recorder.snapshotter();
    let output = metrics::with_local_recorder(&recorder, || {
        tokio::task::block_in_place(|| tokio::runtime::Handle::current().block_on(fut))
    });
    (output, snapshotter)
}

fn png_request(query: &str) -> AnalysisRequest {
    let img = image::RgbImage::from_fn(32, 32, |x, y| image::Rgb([x as u8 * 7, y as u8 * 7, 40]));
    let mut buf = Vec::new();
    image::DynamicImage::ImageRgb8(img)
        .write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Png)
        .unwrap();
    let url = format!(
        "data:image/png;base64,{}",
        base64::engine::general_purpose::STANDARD.encode(buf)
    );
    AnalysisRequest::new(ImageRef::inline(url), query).analysis_type("document")
}

// ============================================================================
// Tests
// ============================================================================

#[tokio::test(flavor = "multi_thread", worker_threads = 1)]
async fn miss_then_hit_records_metrics() {
    let gateway = Huginn::builder()
        .backend(Arc::new(FixedBackend))
        .build()
        .unwrap();
    let req = png_request("extract the caption");

    let (results, snapshotter) = recorded(async {
        let first = gateway.analyze("alice", &req).await;
        let second = gateway.analyze("alice", &req).await;
        (first, second)
    });
    assert!(results.0.is_ok());
    assert!(results.1.unwrap().is_cached());

    let snapshot = snapshotter.snapshot().into_vec();
    assert_eq!(counter_total(&snapshot, telemetry::CACHE_MISSES_TOTAL), 1);
    assert_eq!(
        counter_with_label(&snapshot, telemetry::CACHE_HITS_TOTAL, Some(("level", "L1"))),
        1
    );
    assert_eq!(
        counter_with_label(&snapshot, telemetry::ADMISSIONS_TOTAL, Some(("outcome", "admit"))),
        2
    );
    assert_eq!(counter_total(&snapshot, telemetry::EFFORT_SELECTIONS_TOTAL), 1);
    assert_eq!(
        counter_with_label(&snapshot, telemetry::BACKEND_REQUESTS_TOTAL, Some(("status", "ok"))),
        1
    );
    assert!(
        has_histogram(&snapshot, telemetry::BACKEND_DURATION_SECONDS),
        "expected a duration histogram entry"
    );
    // 0.003 USD charged once, in micro-dollars.
    assert_eq!(counter_total(&snapshot, telemetry::SPEND_MICRO_USD_TOTAL), 3_000);
    assert_eq!(counter_total(&snapshot, telemetry::STORE_ERRORS_TOTAL), 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 1)]
async fn undecodable_inline_image_counts_fallback() {
    let gateway = Huginn::builder()
        .backend(Arc::new(FixedBackend))
        .build()
        .unwrap();
    let req = AnalysisRequest::new(
        ImageRef::inline("data:image/png;base64,bm90IGFuIGltYWdl"),
        "what is it",
    );

    let (result, snapshotter) = recorded(gateway.analyze("alice", &req));
    assert!(result.is_ok());

    let snapshot = snapshotter.snapshot().into_vec();
    assert!(counter_total(&snapshot, telemetry::SIGNATURE_FALLBACKS_TOTAL) >= 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 1)]
async fn denial_and_store_errors_are_counted() {
    let gateway = Huginn::builder()
        .backend(Arc::new(FixedBackend))
        .counter_store(Arc::new(DownCounters))
        .build()
        .unwrap();
    let req = png_request("extract the caption");

    let (result, snapshotter) = recorded(gateway.analyze("alice", &req));
    assert!(matches!(result, Err(HuginnError::AdmissionDenied(_))));

    let snapshot = snapshotter.snapshot().into_vec();
    assert_eq!(
        counter_with_label(&snapshot, telemetry::ADMISSIONS_TOTAL, Some(("outcome", "deny"))),
        1
    );
    assert_eq!(
        counter_with_label(&snapshot, telemetry::ADMISSIONS_TOTAL, Some(("reason", "daily_budget"))),
        1
    );
    // Five window reads, all failed.
    assert_eq!(
        counter_with_label(&snapshot, telemetry::STORE_ERRORS_TOTAL, Some(("store", "down"))),
        5
    );
    assert_eq!(counter_total(&snapshot, telemetry::BACKEND_REQUESTS_TOTAL), 0);
}
