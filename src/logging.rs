//! Log output setup.
//!
//! Progress goes to stderr so it never mixes with package manager output
//! on stdout. Info lines are printed bare; other levels get a tag.

use tracing::{Event, Level, Subscriber};
use tracing_subscriber::{
    fmt::{self, format::Writer, FmtContext, FormatEvent, FormatFields},
    registry::LookupSpan,
    EnvFilter,
};

#[derive(Default)]
struct MessageVisitor {
    message: Option<String>,
}

impl tracing::field::Visit for MessageVisitor {
    fn record_debug(&mut self, field: &tracing::field::Field, value: &dyn std::fmt::Debug) {
        if field.name() == "message" {
            self.message = Some(format!("{value:?}"));
        }
    }
}

struct TaggedFormatter;

impl<S, N> FormatEvent<S, N> for TaggedFormatter
where
    S: Subscriber + for<'a> LookupSpan<'a>,
    N: for<'a> FormatFields<'a> + 'static,
{
    fn format_event(
        &self,
        _: &FmtContext<'_, S, N>,
        mut writer: Writer<'_>,
        event: &Event<'_>,
    ) -> std::fmt::Result {
        let mut visitor = MessageVisitor::default();
        event.record(&mut visitor);

        match *event.metadata().level() {
            Level::TRACE => write!(writer, "[TRACE] "),
            Level::DEBUG => write!(writer, "[DEBUG] "),
            Level::INFO => Ok(()),
            Level::WARN => write!(writer, "[WARN] "),
            Level::ERROR => write!(writer, "[ERROR] "),
        }?;

        writeln!(writer, "{}", visitor.message.unwrap_or_default())
    }
}

/// Filter level for the `-v`/`-q` flags.
pub fn filter_level(verbose: u8, quiet: bool) -> Level {
    if quiet {
        Level::ERROR
    } else if verbose >= 2 {
        Level::TRACE
    } else if verbose == 1 {
        Level::DEBUG
    } else {
        Level::INFO
    }
}

/// Install the global subscriber. `RUST_LOG` overrides the flags.
pub fn setup_logging(verbose: u8, quiet: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!("rootstrap={}", filter_level(verbose, quiet)))
    });

    let subscriber = fmt::Subscriber::builder()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .event_format(TaggedFormatter)
        .finish();

    if tracing::subscriber::set_global_default(subscriber).is_err() {
        eprintln!("[WARN] logging was already initialised");
    }
}
