// self
use crate::{_prelude::*, obs::FlowKind};

/// Future returned by [`FlowSpan::instrument`]; the input future itself without `tracing`.
#[cfg(feature = "tracing")]
pub type InstrumentedFlow<F> = tracing::instrument::Instrumented<F>;
/// Future returned by [`FlowSpan::instrument`]; the input future itself without `tracing`.
#[cfg(not(feature = "tracing"))]
pub type InstrumentedFlow<F> = F;

/// `bearer_session.flow` span, or nothing when tracing is disabled.
#[derive(Clone, Debug)]
pub struct FlowSpan {
	#[cfg(feature = "tracing")]
	span: tracing::Span,
}
impl FlowSpan {
	/// Opens a span for `kind`; `stage` names the call site.
	pub fn new(kind: FlowKind, stage: &'static str) -> Self {
		#[cfg(feature = "tracing")]
		{
			Self { span: tracing::info_span!("bearer_session.flow", flow = kind.as_str(), stage) }
		}
		#[cfg(not(feature = "tracing"))]
		{
			let _ = (kind, stage);

			Self {}
		}
	}

	/// Attaches the span to `fut` so no guard is held across `.await` points.
	pub fn instrument<Fut>(&self, fut: Fut) -> InstrumentedFlow<Fut>
	where
		Fut: Future,
	{
		#[cfg(feature = "tracing")]
		{
			tracing::Instrument::instrument(fut, self.span.clone())
		}
		#[cfg(not(feature = "tracing"))]
		{
			fut
		}
	}
}

/// `warn` event for a failure the session absorbed.
pub fn log_swallowed(kind: FlowKind, error: &Error) {
	#[cfg(feature = "tracing")]
	{
		tracing::warn!(flow = kind.as_str(), error = %error, "session absorbed a failure");
	}
	#[cfg(not(feature = "tracing"))]
	{
		let _ = (kind, error);
	}
}

/// `info` event emitted once the stored credential has been cleared.
pub fn log_terminated() {
	#[cfg(feature = "tracing")]
	{
		tracing::info!(flow = FlowKind::Terminate.as_str(), "session terminated");
	}
}
