// crates.io
use tracing::instrument::Instrumented;
// self
use crate::{_prelude::*, obs::SessionStage};

/// A span builder used by session stages.
#[derive(Clone, Debug)]
pub struct SessionSpan {
	span: tracing::Span,
}
impl SessionSpan {
	/// Creates a new span tagged with the provided stage + call site.
	pub fn new(stage: SessionStage, call_site: &'static str) -> Self {
		Self { span: tracing::info_span!("receiptr_session.stage", stage = stage.as_str(), call_site) }
	}

	/// Instruments an async block without holding a guard across `.await` points.
	pub fn instrument<Fut>(&self, fut: Fut) -> Instrumented<Fut>
	where
		Fut: Future,
	{
		use tracing::Instrument;

		fut.instrument(self.span.clone())
	}
}
