use time::OffsetDateTime;

/// Wall-clock time in unix milliseconds.
///
/// Used where time must be comparable across processes (lease records, tag creation times).
pub(crate) fn unix_ms() -> u64 {
    let nanos = OffsetDateTime::now_utc().unix_timestamp_nanos();
    u64::try_from(nanos / 1_000_000).unwrap_or(0)
}
