use crate::{
    config::Targets,
    dispatch::{Dispatcher, Outcome},
    fault::{generic_invalid_body, ErrorRate, FaultInjector},
    log_sink::LogSink,
    session::{refine_body, refine_path, SessionState, Slot},
    types::{FiredRequest, Operation, Step},
};
use anyhow::{bail, Result};
use log::debug;
use rand::{rngs::StdRng, seq::SliceRandom, Rng, SeedableRng};
use serde_json::Value;
use std::{fmt, sync::Arc, time::Duration};

/// How many times to fire, how fast, and how often to break the request.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FirePlan {
    pub count: u32,
    pub delay: Duration,
    pub error_rate: ErrorRate,
}

impl Default for FirePlan {
    fn default() -> Self {
        Self {
            count: 1,
            delay: Duration::ZERO,
            error_rate: ErrorRate::NONE,
        }
    }
}

impl FirePlan {
    pub fn new(count: u32, delay_ms: u64, error_rate: ErrorRate) -> Result<Self> {
        if count == 0 {
            bail!("Fire count must be at least 1");
        }
        Ok(Self {
            count,
            delay: Duration::from_millis(delay_ms),
            error_rate,
        })
    }
}

/// What each iteration fires.
#[derive(Debug, Clone)]
pub enum Target {
    Single(&'static Operation),
    /// Fires the operation with a fixed organic body; `$$slot` strings are expanded.
    Custom(&'static Operation, Value),
    /// Sampled uniformly with replacement on every iteration.
    Menu(Vec<&'static Operation>),
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FireReport {
    pub attempts: u32,
    pub succeeded: u32,
    pub failed: u32,
    pub injected: u32,
    pub skipped: u32,
}

impl FireReport {
    fn record(&mut self, outcome: &Outcome) {
        self.attempts += 1;
        if outcome.success {
            self.succeeded += 1;
        } else {
            self.failed += 1;
        }
        if outcome.mutation.is_some() {
            self.injected += 1;
        }
    }
}

impl fmt::Display for FireReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} fired, {} ok, {} failed, {} injected, {} skipped",
            self.attempts, self.succeeded, self.failed, self.injected, self.skipped
        )
    }
}

/// The shared fire/fault/log machinery behind every panel.
///
/// Cloning is cheap; clones share the log pane and the session.
#[derive(Debug, Clone)]
pub struct Engine {
    dispatcher: Dispatcher,
    targets: Arc<Targets>,
    session: SessionState,
    log: LogSink,
}

impl Engine {
    pub fn new(targets: Targets, session: SessionState, log: LogSink) -> Result<Self> {
        Ok(Self {
            dispatcher: Dispatcher::new()?,
            targets: Arc::new(targets),
            session,
            log,
        })
    }

    pub fn session(&self) -> &SessionState {
        &self.session
    }

    pub fn log(&self) -> &LogSink {
        &self.log
    }

    pub fn targets(&self) -> &Targets {
        &self.targets
    }

    /// Same targets and log pane, separate session.
    pub fn with_session(&self, session: SessionState) -> Self {
        Self {
            session,
            ..self.clone()
        }
    }

    pub async fn fire(&self, target: &Target, plan: &FirePlan) -> FireReport {
        let mut rng = StdRng::from_entropy();
        self.fire_with_rng(target, plan, &mut rng).await
    }

    /// Runs `plan.count` sequential iterations; each one appends exactly one entry.
    pub async fn fire_with_rng<R: Rng + Send>(
        &self,
        target: &Target,
        plan: &FirePlan,
        rng: &mut R,
    ) -> FireReport {
        let injector = FaultInjector::new(plan.error_rate);
        let mut report = FireReport::default();
        for i in 0..plan.count {
            let bindings = self.session.snapshot();
            let (op, custom) = match target {
                Target::Single(op) => (Some(*op), None),
                Target::Custom(op, body) => (Some(*op), Some(body)),
                Target::Menu(ops) => {
                    let available: Vec<_> = ops
                        .iter()
                        .copied()
                        .filter(|op| op.is_available(&bindings))
                        .collect();
                    (available.choose(rng).copied(), None)
                }
            };
            let Some(op) = op else {
                self.log.append("⏭ no operation available yet");
                report.skipped += 1;
                self.pause(plan, i).await;
                continue;
            };
            let Some(mut req) = op.build(self.targets.base_url(op.service), &bindings) else {
                let missing: Vec<_> = op.missing(&bindings).iter().map(Slot::as_str).collect();
                self.log
                    .append(format!("⏭ {} skipped: no {}", op.label, missing.join(", ")));
                report.skipped += 1;
                self.pause(plan, i).await;
                continue;
            };
            if let Some(body) = custom {
                req.body = Some(refine_body(body.clone(), &bindings).unwrap_or_else(|e| {
                    debug!("using custom payload as written: {}", e);
                    body.clone()
                }));
            }
            if let Some(m) = injector.plan(rng) {
                m.apply(&mut req, || (op.invalid_payload)(&bindings));
            }
            let outcome = self.send(&req, op.service.capture()).await;
            report.record(&outcome);
            self.pause(plan, i).await;
        }
        debug!("fire loop finished: {}", report);
        report
    }

    /// Runs scenario steps in order, resolving `$$slot` variables from the session.
    pub async fn run_steps(&self, steps: &[Step], plan: &FirePlan) -> FireReport {
        let mut rng = StdRng::from_entropy();
        self.run_steps_with_rng(steps, plan, &mut rng).await
    }

    pub async fn run_steps_with_rng<R: Rng + Send>(
        &self,
        steps: &[Step],
        plan: &FirePlan,
        rng: &mut R,
    ) -> FireReport {
        let injector = FaultInjector::new(plan.error_rate);
        let mut report = FireReport::default();
        let last = steps.len().saturating_sub(1);
        for (i, step) in steps.iter().enumerate() {
            let outcome = match self.prepare(step) {
                Ok(mut req) => {
                    if let Some(m) = injector.plan(rng) {
                        m.apply(&mut req, generic_invalid_body);
                    }
                    self.send(&req, step.service.capture()).await
                }
                Err(e) => {
                    let message = format!("{} ❌ (ERR): {}", step.label(), e);
                    self.log.append(message.clone());
                    Outcome {
                        success: false,
                        status: None,
                        mutation: None,
                        captured: None,
                        message,
                    }
                }
            };
            report.record(&outcome);
            if i < last && !plan.delay.is_zero() {
                tokio::time::sleep(plan.delay).await;
            }
        }
        report
    }

    fn prepare(&self, step: &Step) -> Result<FiredRequest> {
        let bindings = self.session.snapshot();
        let path = refine_path(&step.path, &bindings)?;
        let body = match &step.body {
            Some(b) => Some(refine_body(b.clone(), &bindings)?),
            None => None,
        };
        Ok(FiredRequest {
            method: step.method,
            url: format!("{}{}", self.targets.base_url(step.service), path),
            body,
            label: step.label(),
            mutation: None,
        })
    }

    async fn send(&self, req: &FiredRequest, capture: (&str, Slot)) -> Outcome {
        let outcome = self
            .dispatcher
            .dispatch(req, Some(capture), &self.session)
            .await;
        self.log.append(outcome.message.clone());
        outcome
    }

    async fn pause(&self, plan: &FirePlan, iteration: u32) {
        if iteration + 1 < plan.count && !plan.delay.is_zero() {
            tokio::time::sleep(plan.delay).await;
        }
    }
}
