// self
use crate::{
	obs::{SessionStage, StageOutcome},
	session::InterceptOutcome,
};

/// Records a stage outcome via the global metrics recorder (when enabled).
pub fn record_stage_outcome(stage: SessionStage, outcome: StageOutcome) {
	#[cfg(feature = "metrics")]
	{
		metrics::counter!(
			"receiptr_session_stage_total",
			"stage" => stage.as_str(),
			"outcome" => outcome.as_str()
		)
		.increment(1);
	}

	#[cfg(not(feature = "metrics"))]
	{
		let _ = (stage, outcome);
	}
}

/// Records the state an interception ended in (when enabled).
pub fn record_intercept_outcome(outcome: InterceptOutcome) {
	#[cfg(feature = "metrics")]
	{
		metrics::counter!("receiptr_session_intercept_total", "outcome" => outcome.as_str())
			.increment(1);
	}

	#[cfg(not(feature = "metrics"))]
	{
		let _ = outcome;
	}
}
