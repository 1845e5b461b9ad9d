//! Scripted collaborators for pricing core tests.

use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;

use super::session::{PricingSession, Session, SessionProvider};
use super::synthesizer::{FilterSynthesizer, SynthesisRequest};
use crate::core::schema::tests::retail_schema;
use crate::core::{Filter, PriceRecord, PricingResult, Resource};
use crate::error::PricingError;

pub(crate) fn sample_vm() -> Resource {
    Resource::new(
        "Microsoft.Compute/virtualMachines",
        "Standard_D2s_v3",
        "2 vCPUs, 8GiB",
        "eastus",
    )
}

pub(crate) fn one_record(price: f64) -> PricingResult {
    PricingResult::new(vec![PriceRecord {
        retail_price: price,
        unit_price: price,
        currency_code: "USD".to_string(),
        unit_of_measure: "1 Hour".to_string(),
    }])
}

/// What the synthesizer was asked for on one call.
#[derive(Debug, Clone)]
pub(crate) struct SynthesisCall {
    pub sku: String,
    pub permit_wide_fields: bool,
    pub feedback_len: Option<usize>,
}

/// Returns scripted filter JSON in rotation, validated like a real
/// synthesizer would.
pub(crate) struct ScriptedSynthesizer {
    script: Vec<serde_json::Value>,
    fail_for_sku: Option<String>,
    slow_for_sku: Option<(String, Duration)>,
    calls: Mutex<Vec<SynthesisCall>>,
}

impl ScriptedSynthesizer {
    pub(crate) fn cycling(script: Vec<serde_json::Value>) -> Self {
        Self {
            script,
            fail_for_sku: None,
            slow_for_sku: None,
            calls: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn failing_for(mut self, sku: &str) -> Self {
        self.fail_for_sku = Some(sku.to_string());
        self
    }

    /// Sleeps for `delay` before answering for `sku`.
    pub(crate) fn slow_for(mut self, sku: &str, delay: Duration) -> Self {
        self.slow_for_sku = Some((sku.to_string(), delay));
        self
    }

    pub(crate) fn requests(&self) -> Vec<SynthesisCall> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl FilterSynthesizer for ScriptedSynthesizer {
    async fn synthesize(&self, request: &SynthesisRequest<'_>) -> Result<Filter, PricingError> {
        let index = {
            let mut calls = self
                .calls
                .lock()
                .map_err(|_| PricingError::synthesis("poisoned"))?;
            calls.push(SynthesisCall {
                sku: request.resource.sku.clone(),
                permit_wide_fields: request.permit_wide_fields,
                feedback_len: request.feedback.map(|f| f.rejected.len()),
            });
            calls.len() - 1
        };

        if let Some((ref sku, delay)) = self.slow_for_sku
            && *sku == request.resource.sku
        {
            tokio::time::sleep(delay).await;
        }
        if self.fail_for_sku.as_deref() == Some(request.resource.sku.as_str()) {
            return Err(PricingError::synthesis("model returned prose"));
        }

        let value = &self.script[index % self.script.len()];
        request.validate(value)
    }
}

/// Shared counters observable after the session has been moved away.
#[derive(Debug, Default)]
pub(crate) struct SessionCounters {
    pub invocations: AtomicUsize,
    pub closes: AtomicUsize,
}

/// Pops scripted results; an exhausted script yields empty results.
pub(crate) struct ScriptedSession {
    script: Mutex<VecDeque<Result<PricingResult, PricingError>>>,
    delay: Option<Duration>,
    fail_close: bool,
    panic_on_invoke: bool,
    counters: Arc<SessionCounters>,
}

impl ScriptedSession {
    pub(crate) fn new(script: Vec<Result<PricingResult, PricingError>>) -> Self {
        Self {
            script: Mutex::new(script.into()),
            delay: None,
            fail_close: false,
            panic_on_invoke: false,
            counters: Arc::new(SessionCounters::default()),
        }
    }

    pub(crate) fn always_empty() -> Self {
        Self::new(Vec::new())
    }

    pub(crate) const fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub(crate) const fn with_close_failure(mut self) -> Self {
        self.fail_close = true;
        self
    }

    pub(crate) const fn panicking(mut self) -> Self {
        self.panic_on_invoke = true;
        self
    }

    pub(crate) fn counters(&self) -> Arc<SessionCounters> {
        Arc::clone(&self.counters)
    }

    pub(crate) fn invocations(&self) -> usize {
        self.counters.invocations.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PricingSession for ScriptedSession {
    async fn invoke(&self, _filter: &Filter) -> Result<PricingResult, PricingError> {
        self.counters.invocations.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        assert!(!self.panic_on_invoke, "scripted session panic");
        self.script
            .lock()
            .map_err(|_| PricingError::invocation("poisoned"))?
            .pop_front()
            .unwrap_or_else(|| Ok(PricingResult::default()))
    }

    async fn close(self: Box<Self>) -> Result<(), PricingError> {
        self.counters.closes.fetch_add(1, Ordering::SeqCst);
        if self.fail_close {
            Err(PricingError::cleanup("socket already closed"))
        } else {
            Ok(())
        }
    }
}

/// Hands out one scripted session, or fails to connect.
pub(crate) struct ScriptedProvider {
    session: Mutex<Option<ScriptedSession>>,
    establishes: AtomicUsize,
    delay: Option<Duration>,
}

impl ScriptedProvider {
    pub(crate) fn with_session(session: ScriptedSession) -> Self {
        Self {
            session: Mutex::new(Some(session)),
            establishes: AtomicUsize::new(0),
            delay: None,
        }
    }

    pub(crate) fn unreachable() -> Self {
        Self {
            session: Mutex::new(None),
            establishes: AtomicUsize::new(0),
            delay: None,
        }
    }

    /// Sleeps for `delay` before handing out the session.
    pub(crate) const fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub(crate) fn establishes(&self) -> usize {
        self.establishes.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SessionProvider for ScriptedProvider {
    async fn establish(&self) -> Result<Session, PricingError> {
        self.establishes.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        let session = self
            .session
            .lock()
            .ok()
            .and_then(|mut s| s.take())
            .ok_or_else(|| PricingError::session("connection refused"))?;
        Ok(Session::new(
            Box::new(session),
            retail_schema().with_restricted_fields(["skuName"]),
        ))
    }
}
