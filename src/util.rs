use time::format_description::FormatItem;
use time::OffsetDateTime;

lazy_static::lazy_static! {
    // Timestamp embedded in archive names, e.g. `2025-12-31_14-30-45`.
    static ref ARCHIVE_TS: Vec<FormatItem<'static>> = time::format_description::parse(
        "[year]-[month]-[day]_[hour]-[minute]-[second]",
    ).unwrap(/*ok*/);
}

pub(crate) fn now_local_or_utc() -> OffsetDateTime {
    OffsetDateTime::now_local().unwrap_or_else(|_| OffsetDateTime::now_utc())
}

/// The stamp for a new archive name, in local time.
pub(crate) fn archive_stamp() -> Result<String, time::error::Format> {
    now_local_or_utc().format(&ARCHIVE_TS)
}
