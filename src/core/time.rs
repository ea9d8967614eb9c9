use time::{format_description::well_known::Rfc3339, OffsetDateTime, PrimitiveDateTime};

pub(crate) fn primitive_now_utc() -> PrimitiveDateTime {
    let now = OffsetDateTime::now_utc();
    PrimitiveDateTime::new(now.date(), now.time())
}

pub(crate) fn format_primitive(value: PrimitiveDateTime) -> String {
    value.assume_utc().format(&Rfc3339).unwrap_or_else(|_| value.assume_utc().to_string())
}

/// Whole seconds left of a `duration_seconds` window opened at `started_at`, never negative.
pub(crate) fn seconds_remaining(
    started_at: PrimitiveDateTime,
    duration_seconds: u32,
    now: PrimitiveDateTime,
) -> u32 {
    let elapsed = (now - started_at).whole_seconds().max(0);
    let remaining = i64::from(duration_seconds) - elapsed;
    remaining.clamp(0, i64::from(duration_seconds)) as u32
}
