//! Expiry checks and UTC-coercing timestamp parsing.

// crates.io
use time::{PrimitiveDateTime, format_description::well_known::Rfc3339, macros::format_description};
// self
use crate::_prelude::*;

/// Parses an expiry string into a UTC instant.
///
/// Strings carrying a zone marker (`Z` or `±hh:mm`) are parsed as RFC 3339. Strings without one
/// are interpreted as UTC, never local time, so a token cannot appear expired because of the
/// device's locale.
pub fn parse_utc_timestamp(raw: &str) -> Option<OffsetDateTime> {
	let raw = raw.trim();

	if let Ok(instant) = OffsetDateTime::parse(raw, &Rfc3339) {
		return Some(instant.to_offset(time::UtcOffset::UTC));
	}

	PrimitiveDateTime::parse(
		raw,
		format_description!("[year]-[month]-[day]T[hour]:[minute]:[second][optional [.[subsecond]]]"),
	)
	.or_else(|_| {
		PrimitiveDateTime::parse(
			raw,
			format_description!(
				"[year]-[month]-[day] [hour]:[minute]:[second][optional [.[subsecond]]]"
			),
		)
	})
	.ok()
	.map(PrimitiveDateTime::assume_utc)
}

/// Returns `true` when `expires_at` is absent, in the past, or within `buffer` of `now`.
///
/// The comparison is strict: an instant exactly `buffer` ahead of `now` is still usable.
pub fn is_near_or_past_expiry(
	expires_at: Option<OffsetDateTime>,
	buffer: Duration,
	now: OffsetDateTime,
) -> bool {
	let Some(expires_at) = expires_at else {
		return true;
	};

	match expires_at.checked_sub(buffer) {
		Some(cutoff) => now > cutoff,
		None => true,
	}
}

/// Safety margin applied before a token is considered usable.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ExpiryPolicy {
	buffer: Duration,
}
impl ExpiryPolicy {
	/// Buffer applied when none is configured.
	pub const DEFAULT_BUFFER: Duration = Duration::minutes(1);

	/// Creates a policy with the provided buffer; negative buffers clamp to zero.
	pub fn new(buffer: Duration) -> Self {
		Self { buffer: if buffer.is_negative() { Duration::ZERO } else { buffer } }
	}

	/// Creates a policy from a (possibly fractional) number of minutes.
	pub fn from_minutes(minutes: f64) -> Self {
		if !minutes.is_finite() || minutes <= 0. {
			return Self::new(Duration::ZERO);
		}

		Self::new(Duration::saturating_seconds_f64(minutes * 60.))
	}

	/// Returns the configured buffer.
	pub fn buffer(&self) -> Duration {
		self.buffer
	}

	/// Checks `expires_at` against the current UTC clock.
	pub fn is_near_or_past_expiry(&self, expires_at: Option<OffsetDateTime>) -> bool {
		self.is_near_or_past_expiry_at(expires_at, OffsetDateTime::now_utc())
	}

	/// Checks `expires_at` against the provided instant.
	pub fn is_near_or_past_expiry_at(
		&self,
		expires_at: Option<OffsetDateTime>,
		now: OffsetDateTime,
	) -> bool {
		is_near_or_past_expiry(expires_at, self.buffer, now)
	}

	/// Checks a raw expiry string; unparseable input counts as expired.
	pub fn is_near_or_past_expiry_str(&self, expires_at: Option<&str>) -> bool {
		self.is_near_or_past_expiry(expires_at.and_then(parse_utc_timestamp))
	}
}
impl Default for ExpiryPolicy {
	fn default() -> Self {
		Self::new(Self::DEFAULT_BUFFER)
	}
}
