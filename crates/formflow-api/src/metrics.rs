//! Prometheus metrics for submissions, served at `/v1/metrics`.
use prometheus::{
    Encoder, Histogram, HistogramOpts, IntCounter, IntCounterVec, Opts, Registry, TextEncoder,
};
use std::time::Duration;

use formflow_core::SubmissionStatus;

#[derive(Clone)]
pub struct Metrics {
    registry: Registry,
    started: IntCounter,
    finished: IntCounterVec,
    duration: Histogram,
}

impl Metrics {
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new();

        let started = IntCounter::with_opts(Opts::new(
            "formflow_submissions_started_total",
            "Submission attempts started",
        ))?;
        let finished = IntCounterVec::new(
            Opts::new(
                "formflow_submissions_finished_total",
                "Submission attempts that reached a terminal state",
            ),
            &["status"],
        )?;
        let duration = Histogram::with_opts(
            HistogramOpts::new(
                "formflow_submission_duration_seconds",
                "Wall time of one submission attempt",
            )
            .buckets(vec![0.5, 1.0, 2.5, 5.0, 10.0, 30.0, 60.0, 120.0]),
        )?;

        registry.register(Box::new(started.clone()))?;
        registry.register(Box::new(finished.clone()))?;
        registry.register(Box::new(duration.clone()))?;

        Ok(Self {
            registry,
            started,
            finished,
            duration,
        })
    }

    pub fn submission_started(&self) {
        self.started.inc();
    }

    pub fn submission_finished(&self, status: SubmissionStatus, elapsed: Duration) {
        self.finished.with_label_values(&[status.as_str()]).inc();
        self.duration.observe(elapsed.as_secs_f64());
    }

    pub fn encode(&self) -> Result<String, prometheus::Error> {
        let encoder = TextEncoder::new();
        let mut buffer = Vec::new();
        encoder.encode(&self.registry.gather(), &mut buffer)?;
        Ok(String::from_utf8_lossy(&buffer).to_string())
    }
}
