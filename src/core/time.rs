use time::{
    format_description::well_known::Rfc3339, macros::format_description, Date, OffsetDateTime,
    PrimitiveDateTime, UtcOffset,
};

pub(crate) fn now_utc() -> OffsetDateTime {
    OffsetDateTime::now_utc()
}

/// Wall-clock time in the academy's zone with the offset dropped, the shape stored in
/// `submitted_at` / `graded_at`.
pub(crate) fn to_local_primitive(value: OffsetDateTime, offset: UtcOffset) -> PrimitiveDateTime {
    let local = value.to_offset(offset);
    PrimitiveDateTime::new(local.date(), local.time())
}

pub(crate) fn local_today(offset: UtcOffset) -> Date {
    OffsetDateTime::now_utc().to_offset(offset).date()
}

pub(crate) fn format_local(value: PrimitiveDateTime, offset: UtcOffset) -> String {
    let with_offset = value.assume_offset(offset);
    with_offset.format(&Rfc3339).unwrap_or_else(|_| with_offset.to_string())
}

pub(crate) fn parse_date(value: &str) -> Option<Date> {
    Date::parse(value.trim(), format_description!("[year]-[month]-[day]")).ok()
}
