//! VisionGateway - admission, caching and effort selection around one backend

use std::sync::Arc;
use std::time::Duration;

use tokio::time::Instant;
use tracing::{debug, instrument, warn};

use crate::backend::AnalysisBackend;
use crate::cache::ResultCache;
use crate::config::BackendConfig;
use crate::effort::{EffortContext, EffortSelector, TierEstimate};
use crate::telemetry;
use crate::types::{AnalysisRequest, AnalysisResponse, BackendOutput, EffortTier};
use crate::usage::{Admission, ResetScope, UsageGuard, UsageStats};
use crate::{HuginnError, Result};

/// Gateway in front of an expensive visual-analysis backend.
///
/// Each [`analyze`](Self::analyze) call runs:
///
/// 1. admission check against the user's rate limits and budgets
/// 2. cache lookup (L1, then L2)
/// 3. on a miss: effort selection, then the backend call under a timeout
/// 4. on success: usage charge, cache store, effort feedback
///
/// Dropping the returned future while the backend call is in flight
/// cancels it; nothing is cached or charged for it. Once the backend has
/// answered, the user is charged before anything is cached.
///
/// Concurrent identical requests are not coalesced. Each one that misses
/// the cache calls the backend, and the last to finish owns the entry.
pub struct VisionGateway {
    backend: Arc<dyn AnalysisBackend>,
    cache: ResultCache,
    effort: EffortSelector,
    usage: UsageGuard,
    settings: BackendConfig,
}

impl VisionGateway {
    pub(crate) fn new(
        backend: Arc<dyn AnalysisBackend>,
        cache: ResultCache,
        effort: EffortSelector,
        usage: UsageGuard,
        settings: BackendConfig,
    ) -> Self {
        Self {
            backend,
            cache,
            effort,
            usage,
            settings,
        }
    }

    /// Analyse an image on behalf of `user_id`.
    ///
    /// Only [`HuginnError::AdmissionDenied`], backend errors (verbatim),
    /// [`HuginnError::BackendTimeout`] and [`HuginnError::InvalidInput`]
    /// are returned. Store and signature trouble degrades silently.
    #[instrument(
        name = "huginn.analyze",
        skip(self, request),
        fields(backend = self.backend.name(), analysis_type = %request.analysis_type)
    )]
    pub async fn analyze(
        &self,
        user_id: &str,
        request: &AnalysisRequest,
    ) -> Result<AnalysisResponse> {
        let estimated_cost = match request.estimated_cost_usd {
            Some(usd) if !usd.is_finite() || usd < 0.0 => {
                return Err(HuginnError::InvalidInput(format!(
                    "estimated cost must be a non-negative amount, got {usd}"
                )));
            }
            Some(usd) => usd,
            None => self.settings.default_estimated_cost_usd,
        };

        if let Admission::Deny(denial) = self.usage.check_admission(user_id, estimated_cost).await
        {
            return Err(HuginnError::AdmissionDenied(denial));
        }

        if let Some(hit) = self.cache.lookup(request).await {
            return Ok(AnalysisResponse {
                text: hit.result,
                model: hit.meta.model_used.clone(),
                cost_usd: 0.0,
                cache: Some(hit.meta),
                effort: None,
            });
        }

        let decision = self.effort.choose_effort(&EffortContext::from_request(request));
        let output = match self.call_backend(request, decision.tier).await {
            Ok(output) => output,
            Err(e) => {
                warn!(tier = %decision.tier, error = %e, "backend call failed");
                return Err(e);
            }
        };

        // Charged before cached: no cached answer exists that was not paid for.
        if let Err(e) = self.usage.record_usage(user_id, output.cost_usd).await {
            warn!(error = %e, "failed to record usage");
        }
        let complexity = self.cache.store(request, &output).await;
        self.effort
            .record_outcome(decision.tier, output.processing_time, true);

        debug!(
            tier = %decision.tier,
            %complexity,
            model = %output.model,
            cost_usd = output.cost_usd,
            "analysis complete"
        );

        Ok(AnalysisResponse {
            text: output.text,
            model: output.model,
            cost_usd: output.cost_usd,
            cache: None,
            effort: Some(decision),
        })
    }

    async fn call_backend(
        &self,
        request: &AnalysisRequest,
        tier: EffortTier,
    ) -> Result<BackendOutput> {
        let after = self.settings.timeout();
        let query = compose_query(request);
        let started = Instant::now();

        let result = match tokio::time::timeout(
            after,
            self.backend.analyze(&request.image, &query, tier),
        )
        .await
        {
            Ok(result) => result,
            Err(_) => Err(HuginnError::BackendTimeout(after)),
        };
        let elapsed = started.elapsed();

        let status = if result.is_ok() { "ok" } else { "error" };
        metrics::counter!(telemetry::BACKEND_REQUESTS_TOTAL,
            "backend" => self.backend.name().to_owned(),
            "tier" => tier.as_str(),
            "status" => status,
        )
        .increment(1);
        metrics::histogram!(telemetry::BACKEND_DURATION_SECONDS,
            "backend" => self.backend.name().to_owned(),
            "tier" => tier.as_str(),
        )
        .record(elapsed.as_secs_f64());

        if result.is_err() {
            self.effort.record_outcome(tier, elapsed, false);
        }
        result
    }

    /// Current counters and limits for `user_id`.
    pub async fn usage_stats(&self, user_id: &str) -> Result<UsageStats> {
        self.usage.get_usage_stats(user_id).await
    }

    /// Clear `user_id`'s counters for the current window(s).
    pub async fn reset_limits(&self, user_id: &str, scope: ResetScope) -> Result<()> {
        self.usage.reset_limits(user_id, scope).await
    }

    /// Per-tier latency and success estimates.
    pub fn effort_stats(&self) -> Vec<TierEstimate> {
        self.effort.stats()
    }

    /// Drop stale L1 entries now. Returns how many were removed.
    pub async fn sweep_cache(&self) -> usize {
        self.cache.sweep_expired().await
    }

    pub fn backend_timeout(&self) -> Duration {
        self.settings.timeout()
    }
}

impl std::fmt::Debug for VisionGateway {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VisionGateway")
            .field("backend", &self.backend.name())
            .field("usage", &self.usage)
            .field("effort", &self.effort)
            .finish_non_exhaustive()
    }
}

/// Query text handed to the backend: the free-form query followed by any
/// specific questions, numbered.
fn compose_query(request: &AnalysisRequest) -> String {
    if request.specific_questions.is_empty() {
        return request.query.clone();
    }
    let mut query = request.query.trim_end().to_string();
    if !query.is_empty() {
        query.push_str("\n\n");
    }
    query.push_str("Specific questions:");
    for (i, question) in request.specific_questions.iter().enumerate() {
        query.push_str(&format!("\n{}. {question}", i + 1));
    }
    query
}
