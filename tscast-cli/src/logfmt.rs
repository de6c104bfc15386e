//! Apache-errorlog-style event formatting for the stderr log:
//! `[Sat Aug 01 12:00:00.123456 2026] [tscast:info] [pid 4242] message`

use std::fmt;

use time::OffsetDateTime;
use time::format_description::BorrowedFormatItem;
use time::macros::format_description;
use tracing::{Event, Subscriber};
use tracing_subscriber::fmt::format::Writer;
use tracing_subscriber::fmt::{FmtContext, FormatEvent, FormatFields};
use tracing_subscriber::registry::LookupSpan;

const TIME_FORMAT: &[BorrowedFormatItem<'static>] = format_description!(
    "[weekday repr:short] [month repr:short] [day] [hour]:[minute]:[second].[subsecond digits:6] [year]"
);

pub struct ApacheLogFormat;

impl<S, N> FormatEvent<S, N> for ApacheLogFormat
where
    S: Subscriber + for<'a> LookupSpan<'a>,
    N: for<'a> FormatFields<'a> + 'static,
{
    fn format_event(
        &self,
        ctx: &FmtContext<'_, S, N>,
        mut writer: Writer<'_>,
        event: &Event<'_>,
    ) -> fmt::Result {
        let now = OffsetDateTime::now_local().unwrap_or_else(|_| OffsetDateTime::now_utc());
        let stamp = now.format(&TIME_FORMAT).map_err(|_| fmt::Error)?;
        write!(
            writer,
            "[{}] [tscast:{}] [pid {}] ",
            stamp,
            event.metadata().level().as_str().to_lowercase(),
            std::process::id()
        )?;
        ctx.field_format().format_fields(writer.by_ref(), event)?;
        writeln!(writer)
    }
}
