//! Optional observability for session flows.
//!
//! # Feature Flags
//!
//! - `tracing`: every flow runs inside a `bearer_session.flow` span carrying `flow` and `stage`
//!   fields; failures the session absorbs become `warn` events and terminations `info` events.
//! - `metrics`: outcomes increment `bearer_session_flow_total{flow,outcome}` and finished flows
//!   feed the `bearer_session_flow_duration_seconds{flow}` histogram.
//!
//! Without either feature the helpers below compile to nothing.

mod metrics;
mod tracing;

pub use metrics::*;
pub use tracing::*;

// std
use std::time::Instant;
// self
use crate::_prelude::*;

/// Session flows observed by the crate.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FlowKind {
	/// Outbound API request handled by the pipeline.
	Dispatch,
	/// Best-effort refresh triggered by an access token nearing expiry.
	ProactiveRefresh,
	/// Single-flight refresh cycle.
	Refresh,
	/// Session termination.
	Terminate,
}
impl FlowKind {
	/// Stable label used in span and metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			Self::Dispatch => "dispatch",
			Self::ProactiveRefresh => "proactive_refresh",
			Self::Refresh => "refresh",
			Self::Terminate => "terminate",
		}
	}
}
impl Display for FlowKind {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// How a flow run ended.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FlowOutcome {
	/// The flow started.
	Attempt,
	/// The flow completed.
	Success,
	/// The flow failed and the error reached the caller.
	Failure,
	/// The flow failed and the session absorbed the error.
	Swallowed,
}
impl FlowOutcome {
	/// Stable label used in span and metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			Self::Attempt => "attempt",
			Self::Success => "success",
			Self::Failure => "failure",
			Self::Swallowed => "swallowed",
		}
	}
}
impl Display for FlowOutcome {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// One observed run of a flow: its span, its start time, and the attempt already recorded.
#[derive(Debug)]
pub struct Flow {
	kind: FlowKind,
	span: FlowSpan,
	started: Instant,
}
impl Flow {
	/// Opens a span for `kind` at `stage` and records the attempt.
	pub fn start(kind: FlowKind, stage: &'static str) -> Self {
		record_flow_outcome(kind, FlowOutcome::Attempt);

		Self { kind, span: FlowSpan::new(kind, stage), started: Instant::now() }
	}

	/// Runs `fut` inside the flow's span.
	pub fn instrument<Fut>(&self, fut: Fut) -> InstrumentedFlow<Fut>
	where
		Fut: Future,
	{
		self.span.instrument(fut)
	}

	/// Records the outcome and duration of `result`, then hands it back.
	pub fn finish<T>(self, result: Result<T>) -> Result<T> {
		let outcome = if result.is_ok() { FlowOutcome::Success } else { FlowOutcome::Failure };

		record_flow_outcome(self.kind, outcome);
		record_flow_duration(self.kind, self.started.elapsed());

		result
	}

	/// Records a failure the session absorbed instead of returning it.
	pub fn absorb(self, error: &Error) {
		absorb(self.kind, error);
		record_flow_duration(self.kind, self.started.elapsed());
	}
}

/// Logs and counts a failure the session absorbed outside of an opened [`Flow`].
pub fn absorb(kind: FlowKind, error: &Error) {
	log_swallowed(kind, error);
	record_flow_outcome(kind, FlowOutcome::Swallowed);
}
