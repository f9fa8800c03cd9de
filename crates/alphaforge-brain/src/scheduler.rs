//! Evaluation scheduling over the platform API.
//!
//! Two modes, both built on the same primitives:
//!
//! - [`EvalScheduler::evaluate`]: submit one candidate and poll it in a
//!   blocking loop to a terminal status.
//! - [`BatchScheduler`]: keep a bounded window of outstanding jobs (nominally
//!   3), top it up from the candidate queue and round-robin poll until every
//!   candidate reaches a terminal status.
//!
//! Concurrency is purely "one thread, many outstanding remote jobs": the
//! in-flight set is touched only by the polling loop, and all sleeps and
//! timeouts go through the injected [`Clock`] so tests run on simulated time.

use crate::api::{JobHandle, PollReply, SimulationApi};
use crate::clock::Clock;
use crate::error::BrainError;
use crate::metrics::PerformanceVector;
use crate::settings::{SimulationRequest, SimulationSettings};
use std::collections::VecDeque;
use std::time::Duration;

/// Inter-poll delay for the synchronous single-candidate loop.
const SINGLE_POLL_DELAY: Duration = Duration::from_secs(10);
/// Inter-round delay for the batch polling loop.
const BATCH_POLL_DELAY: Duration = Duration::from_secs(5);
/// Backoff before retrying after a transient network error.
const TRANSIENT_BACKOFF: Duration = Duration::from_secs(60);
/// Per-endpoint budget for the auxiliary metric probes.
const AUX_TIMEOUT: Duration = Duration::from_secs(30);
/// Delay between auxiliary probes.
const AUX_POLL_DELAY: Duration = Duration::from_secs(5);

/// Nominal in-flight window for batch evaluation.
pub const DEFAULT_WINDOW: usize = 3;

/// Sharpe magnitude above which the auxiliary endpoints are worth fetching.
const MATERIALITY_SHARPE: f64 = 0.3;

/// Turns candidate expressions into scored results.
pub struct EvalScheduler<A, C> {
    api: A,
    clock: C,
    settings: SimulationSettings,
    /// Fetch correlation bounds and competition score for material results.
    fetch_aux: bool,
}

impl<A: SimulationApi, C: Clock> EvalScheduler<A, C> {
    pub fn new(api: A, clock: C, settings: SimulationSettings) -> Self {
        Self {
            api,
            clock,
            settings,
            fetch_aux: true,
        }
    }

    pub fn with_aux(mut self, fetch_aux: bool) -> Self {
        self.fetch_aux = fetch_aux;
        self
    }

    pub fn settings(&self) -> &SimulationSettings {
        &self.settings
    }

    /// Evaluate one candidate with the configured settings.
    ///
    /// Returns `None` for terminal job failures and unrecoverable errors;
    /// callers rank a `None` result as metric 0, never as an exception.
    pub fn evaluate(&mut self, expression: &str) -> Option<PerformanceVector> {
        self.evaluate_with_decay(expression, self.settings.decay)
    }

    /// Evaluate one candidate overriding the decay setting (used by the
    /// turnover-reduction pass).
    pub fn evaluate_with_decay(&mut self, expression: &str, decay: u32) -> Option<PerformanceVector> {
        let mut settings = self.settings.clone();
        settings.decay = decay;
        let request = SimulationRequest::regular(expression, settings);

        let mut handle = match self.submit_with_recovery(&request) {
            Ok(handle) => handle,
            Err(err) => {
                tracing::warn!(expression, error = %err, "submission failed");
                return None;
            }
        };

        // One re-authenticate-and-resubmit per job; a second expiry or
        // transient failure records a null result.
        let mut recovered = false;
        loop {
            match self.api.poll(&handle) {
                Ok(reply) => {
                    if reply.auth_expired {
                        if recovered {
                            tracing::warn!(expression, "credentials expired twice, giving up");
                            return None;
                        }
                        recovered = true;
                        match self.reauth_and_resubmit(&request) {
                            Some(next) => {
                                handle = next;
                                continue;
                            }
                            None => return None,
                        }
                    }
                    if let Some(status) = reply.status {
                        if status.has_result() {
                            let alpha_id = reply.alpha_id?;
                            return self.collect(&alpha_id);
                        }
                        if status.is_terminal() {
                            tracing::warn!(expression, ?status, "terminal job failure");
                            return None;
                        }
                    }
                }
                Err(err) => {
                    if recovered {
                        tracing::warn!(expression, error = %err, "repeated failure, recording null");
                        return None;
                    }
                    recovered = true;
                    tracing::warn!(expression, error = %err, "poll failed, backing off");
                    self.clock.sleep(TRANSIENT_BACKOFF);
                    match self.reauth_and_resubmit(&request) {
                        Some(next) => {
                            handle = next;
                            continue;
                        }
                        None => return None,
                    }
                }
            }
            self.clock.sleep(SINGLE_POLL_DELAY);
        }
    }

    /// Evaluate a batch of candidates through a bounded in-flight window.
    pub fn evaluate_batch(
        &mut self,
        candidates: Vec<String>,
        window: usize,
    ) -> Vec<(String, Option<PerformanceVector>)> {
        BatchScheduler::new(self, candidates, window).run()
    }

    /// Submit, recovering once from expired credentials or a transient error.
    fn submit_with_recovery(
        &mut self,
        request: &SimulationRequest,
    ) -> Result<JobHandle, BrainError> {
        match self.api.submit(request) {
            Ok(handle) => Ok(handle),
            Err(BrainError::AuthExpired) => {
                tracing::warn!("session expired on submit, re-authenticating");
                self.api.reauthenticate()?;
                self.api.submit(request)
            }
            Err(err) if err.is_transient() => {
                tracing::warn!(error = %err, "transient error on submit, backing off");
                self.clock.sleep(TRANSIENT_BACKOFF);
                self.api.reauthenticate()?;
                self.api.submit(request)
            }
            Err(err) => Err(err),
        }
    }

    fn reauth_and_resubmit(&mut self, request: &SimulationRequest) -> Option<JobHandle> {
        if let Err(err) = self.api.reauthenticate() {
            tracing::warn!(error = %err, "re-authentication failed");
            return None;
        }
        match self.api.submit(request) {
            Ok(handle) => Some(handle),
            Err(err) => {
                tracing::warn!(error = %err, "resubmission failed");
                None
            }
        }
    }

    /// Fetch the metrics document and, for material results, the auxiliary
    /// endpoints (each under its own bounded polling loop).
    fn collect(&mut self, alpha_id: &str) -> Option<PerformanceVector> {
        let doc = match self.api.fetch_metrics(alpha_id) {
            Ok(doc) => doc,
            Err(err) => {
                tracing::warn!(alpha_id, error = %err, "metrics fetch failed");
                return None;
            }
        };
        let mut vector = doc.into_vector();

        let material = vector
            .sharpe
            .map(|s| s.abs() > MATERIALITY_SHARPE)
            .unwrap_or(false);
        if material && self.fetch_aux {
            if let Some(bounds) = self.probe_bounded(|api| api.probe_correlation(alpha_id)) {
                vector.min_correlation = Some(bounds.min);
                vector.max_correlation = Some(bounds.max);
            }
            vector.score_delta = self.probe_bounded(|api| api.probe_competition_score(alpha_id));
        }
        Some(vector)
    }

    /// Poll an auxiliary endpoint until it answers or the budget elapses.
    /// Timing out leaves the corresponding fields null rather than blocking.
    fn probe_bounded<T>(
        &mut self,
        mut probe: impl FnMut(&mut A) -> Result<Option<T>, BrainError>,
    ) -> Option<T> {
        let deadline = self.clock.now() + AUX_TIMEOUT;
        loop {
            match probe(&mut self.api) {
                Ok(Some(value)) => return Some(value),
                Ok(None) => {}
                Err(err) => {
                    tracing::debug!(error = %err, "auxiliary probe failed, will retry")
                }
            }
            if self.clock.now() >= deadline {
                return None;
            }
            self.clock.sleep(AUX_POLL_DELAY);
        }
    }
}

struct BatchJob {
    candidate: String,
    request: SimulationRequest,
    handle: JobHandle,
    /// The single allowed re-authenticate-and-resubmit has been spent.
    recovered: bool,
}

/// Bounded-concurrency batch evaluator.
///
/// While unsubmitted candidates remain, the in-flight window is topped up to
/// `window`; each [`BatchScheduler::tick`] performs one top-up plus one
/// round-robin poll over the window, removing terminal jobs and recording
/// their results. Once the queue is exhausted the window is never topped up
/// again, so it shrinks toward a single outstanding job and the same loop
/// services the stragglers.
pub struct BatchScheduler<'a, A, C> {
    eval: &'a mut EvalScheduler<A, C>,
    window: usize,
    queue: VecDeque<String>,
    in_flight: Vec<BatchJob>,
    results: Vec<(String, Option<PerformanceVector>)>,
}

impl<'a, A: SimulationApi, C: Clock> BatchScheduler<'a, A, C> {
    pub fn new(
        eval: &'a mut EvalScheduler<A, C>,
        candidates: Vec<String>,
        window: usize,
    ) -> Self {
        Self {
            eval,
            window: window.max(1),
            queue: candidates.into(),
            in_flight: Vec::new(),
            results: Vec::new(),
        }
    }

    pub fn is_done(&self) -> bool {
        self.queue.is_empty() && self.in_flight.is_empty()
    }

    /// Drive the batch to completion, sleeping between idle rounds.
    pub fn run(mut self) -> Vec<(String, Option<PerformanceVector>)> {
        while !self.is_done() {
            if self.tick() == 0 && !self.is_done() {
                self.eval.clock.sleep(BATCH_POLL_DELAY);
            }
        }
        self.results
    }

    /// One scheduling round: top up the window, poll each in-flight job once.
    /// Returns the number of jobs that reached a terminal status this round.
    pub fn tick(&mut self) -> usize {
        self.top_up();

        let mut completed = 0;
        let mut i = 0;
        while i < self.in_flight.len() {
            match self.eval.api.poll(&self.in_flight[i].handle) {
                Ok(reply) => {
                    if reply.auth_expired {
                        if self.recover(i) {
                            completed += 1;
                        }
                        continue;
                    }
                    match reply.status {
                        Some(status) if status.is_terminal() => {
                            let result = status_result(self.eval, reply, status);
                            self.finish(i, result);
                            completed += 1;
                        }
                        _ => i += 1,
                    }
                }
                Err(err) => {
                    tracing::warn!(
                        candidate = %self.in_flight[i].candidate,
                        error = %err,
                        "poll failed"
                    );
                    self.eval.clock.sleep(TRANSIENT_BACKOFF);
                    if self.recover(i) {
                        completed += 1;
                    }
                }
            }
        }
        completed
    }

    fn top_up(&mut self) {
        while self.in_flight.len() < self.window {
            let Some(candidate) = self.queue.pop_front() else {
                break;
            };
            let request = SimulationRequest::regular(&candidate, self.eval.settings.clone());
            match self.eval.submit_with_recovery(&request) {
                Ok(handle) => {
                    tracing::info!(candidate = %candidate, "submitted");
                    self.in_flight.push(BatchJob {
                        candidate,
                        request,
                        handle,
                        recovered: false,
                    });
                }
                Err(err) => {
                    tracing::warn!(candidate = %candidate, error = %err, "submission failed");
                    self.results.push((candidate, None));
                }
            }
        }
    }

    /// Spend the job's single recovery, or record a null result if it is
    /// already spent. Returns true when the job left the window.
    fn recover(&mut self, i: usize) -> bool {
        if self.in_flight[i].recovered {
            self.finish(i, None);
            return true;
        }
        self.in_flight[i].recovered = true;
        let request = self.in_flight[i].request.clone();
        match self.eval.reauth_and_resubmit(&request) {
            Some(handle) => {
                self.in_flight[i].handle = handle;
                false
            }
            None => {
                self.finish(i, None);
                true
            }
        }
    }

    fn finish(&mut self, i: usize, result: Option<PerformanceVector>) {
        let job = self.in_flight.remove(i);
        tracing::info!(candidate = %job.candidate, ok = result.is_some(), "job finished");
        self.results.push((job.candidate, result));
    }
}

fn status_result<A: SimulationApi, C: Clock>(
    eval: &mut EvalScheduler<A, C>,
    reply: PollReply,
    status: crate::api::JobStatus,
) -> Option<PerformanceVector> {
    if !status.has_result() {
        return None;
    }
    let alpha_id = reply.alpha_id?;
    eval.collect(&alpha_id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::JobStatus;
    use crate::clock::ManualClock;
    use crate::metrics::{AlphaDocument, CorrelationBounds};
    use std::collections::HashMap;

    struct MockJob {
        expression: String,
        polls_left: usize,
    }

    /// Scripted platform: jobs complete after a fixed number of polls, with
    /// per-expression overrides for failure and credential expiry.
    struct MockApi {
        next_id: usize,
        jobs: HashMap<String, MockJob>,
        polls_until_done: usize,
        /// Expressions that end in FAILED.
        failing: Vec<String>,
        /// Pending credential expiries, served one per poll round.
        expiries: usize,
        correlation_ready: bool,
        score_ready: bool,
        submissions: Vec<String>,
        reauths: usize,
        active: usize,
        max_active: usize,
    }

    impl MockApi {
        fn new(polls_until_done: usize) -> Self {
            Self {
                next_id: 0,
                jobs: HashMap::new(),
                polls_until_done,
                failing: Vec::new(),
                expiries: 0,
                correlation_ready: true,
                score_ready: true,
                submissions: Vec::new(),
                reauths: 0,
                active: 0,
                max_active: 0,
            }
        }
    }

    impl SimulationApi for MockApi {
        fn reauthenticate(&mut self) -> Result<(), BrainError> {
            self.reauths += 1;
            Ok(())
        }

        fn submit(&mut self, request: &SimulationRequest) -> Result<JobHandle, BrainError> {
            let handle = format!("/simulations/{}", self.next_id);
            self.next_id += 1;
            self.submissions.push(request.regular.clone());
            self.jobs.insert(
                handle.clone(),
                MockJob {
                    expression: request.regular.clone(),
                    polls_left: self.polls_until_done,
                },
            );
            self.active += 1;
            self.max_active = self.max_active.max(self.active);
            Ok(JobHandle(handle))
        }

        fn poll(&mut self, handle: &JobHandle) -> Result<PollReply, BrainError> {
            if self.expiries > 0 {
                self.expiries -= 1;
                self.active -= 1;
                self.jobs.remove(&handle.0);
                return Ok(PollReply {
                    auth_expired: true,
                    ..PollReply::default()
                });
            }
            let job = self.jobs.get_mut(&handle.0).expect("unknown handle");
            if job.polls_left > 0 {
                job.polls_left -= 1;
                return Ok(PollReply {
                    status: Some(JobStatus::Pending),
                    ..PollReply::default()
                });
            }
            let expression = job.expression.clone();
            self.jobs.remove(&handle.0);
            self.active -= 1;
            if self.failing.contains(&expression) {
                return Ok(PollReply {
                    status: Some(JobStatus::Failed),
                    ..PollReply::default()
                });
            }
            Ok(PollReply {
                status: Some(JobStatus::Complete),
                alpha_id: Some(format!("A_{expression}")),
                ..PollReply::default()
            })
        }

        fn fetch_metrics(&mut self, alpha_id: &str) -> Result<AlphaDocument, BrainError> {
            Ok(serde_json::from_value(serde_json::json!({
                "id": alpha_id,
                "settings": {"universe": "TOP3000", "delay": 1, "decay": 0,
                             "neutralization": "INDUSTRY", "truncation": 0.05},
                "is": {"sharpe": 1.25, "turnover": 0.4, "fitness": 1.0,
                       "returns": 0.1, "drawdown": 0.05, "margin": 0.002,
                       "longCount": 100, "shortCount": 100, "checks": []},
                "regular": {"code": "x"}
            }))
            .expect("valid document"))
        }

        fn probe_correlation(
            &mut self,
            _alpha_id: &str,
        ) -> Result<Option<CorrelationBounds>, BrainError> {
            if self.correlation_ready {
                Ok(Some(CorrelationBounds { min: 0.1, max: 0.6 }))
            } else {
                Ok(None)
            }
        }

        fn probe_competition_score(&mut self, _alpha_id: &str) -> Result<Option<f64>, BrainError> {
            if self.score_ready {
                Ok(Some(0.25))
            } else {
                Ok(None)
            }
        }
    }

    fn scheduler(api: MockApi) -> EvalScheduler<MockApi, ManualClock> {
        EvalScheduler::new(api, ManualClock::new(), SimulationSettings::default())
    }

    #[test]
    fn single_candidate_completes_with_aux() {
        let mut sched = scheduler(MockApi::new(2));
        let vector = sched.evaluate("rank(close)").expect("result");
        assert_eq!(vector.sharpe, Some(1.25));
        assert_eq!(vector.min_correlation, Some(0.1));
        assert_eq!(vector.max_correlation, Some(0.6));
        assert_eq!(vector.score_delta, Some(0.25));
        assert_eq!(vector.alpha_id.as_deref(), Some("A_rank(close)"));
    }

    #[test]
    fn aux_probe_times_out_to_null_fields() {
        let mut api = MockApi::new(0);
        api.correlation_ready = false;
        api.score_ready = false;
        let mut sched = scheduler(api);
        let vector = sched.evaluate("rank(close)").expect("result");
        assert_eq!(vector.sharpe, Some(1.25));
        assert_eq!(vector.min_correlation, None);
        assert_eq!(vector.max_correlation, None);
        assert_eq!(vector.score_delta, None);
        // Both bounded loops must have consumed their 30s budget.
        assert!(sched.clock.elapsed() >= Duration::from_secs(60));
    }

    #[test]
    fn terminal_failure_is_null_and_never_retried() {
        let mut api = MockApi::new(1);
        api.failing.push("bad_alpha".to_string());
        let mut sched = scheduler(api);
        assert!(sched.evaluate("bad_alpha").is_none());
        assert_eq!(sched.api.submissions.len(), 1);
    }

    #[test]
    fn auth_expiry_resubmits_exactly_once() {
        let mut api = MockApi::new(1);
        api.expiries = 1;
        let mut sched = scheduler(api);
        let vector = sched.evaluate("rank(close)").expect("result after recovery");
        assert_eq!(vector.sharpe, Some(1.25));
        assert_eq!(sched.api.reauths, 1);
        assert_eq!(sched.api.submissions.len(), 2);
    }

    #[test]
    fn second_auth_expiry_records_null() {
        let mut api = MockApi::new(1);
        api.expiries = 2;
        let mut sched = scheduler(api);
        assert!(sched.evaluate("rank(close)").is_none());
        // One recovery spent, no third submission.
        assert_eq!(sched.api.submissions.len(), 2);
        assert_eq!(sched.api.reauths, 1);
    }

    #[test]
    fn batch_respects_window_and_drains() {
        let candidates: Vec<String> = (0..7).map(|i| format!("alpha_{i}")).collect();
        let mut sched = scheduler(MockApi::new(2)).with_aux(false);
        let results = sched.evaluate_batch(candidates.clone(), 3);

        assert_eq!(results.len(), 7);
        assert!(results.iter().all(|(_, r)| r.is_some()));
        assert!(sched.api.max_active <= 3, "window exceeded: {}", sched.api.max_active);
        // Every candidate reached a terminal status.
        assert_eq!(sched.api.active, 0);
        let mut seen: Vec<&str> = results.iter().map(|(c, _)| c.as_str()).collect();
        seen.sort_unstable();
        let mut expected: Vec<&str> = candidates.iter().map(|c| c.as_str()).collect();
        expected.sort_unstable();
        assert_eq!(seen, expected);
    }

    #[test]
    fn batch_records_null_for_failed_jobs() {
        let mut api = MockApi::new(1);
        api.failing.push("alpha_1".to_string());
        let mut sched = scheduler(api).with_aux(false);
        let results = sched.evaluate_batch(
            vec!["alpha_0".into(), "alpha_1".into(), "alpha_2".into()],
            DEFAULT_WINDOW,
        );
        let by_name: HashMap<_, _> = results
            .iter()
            .map(|(c, r)| (c.as_str(), r.is_some()))
            .collect();
        assert_eq!(by_name["alpha_0"], true);
        assert_eq!(by_name["alpha_1"], false);
        assert_eq!(by_name["alpha_2"], true);
    }

    #[test]
    fn batch_recovers_expired_sessions() {
        let mut api = MockApi::new(1);
        api.expiries = 1;
        let mut sched = scheduler(api).with_aux(false);
        let results =
            sched.evaluate_batch(vec!["alpha_0".into(), "alpha_1".into()], DEFAULT_WINDOW);
        assert_eq!(results.len(), 2);
        assert!(results.iter().all(|(_, r)| r.is_some()));
        assert_eq!(sched.api.reauths, 1);
    }
}
