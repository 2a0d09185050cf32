use chrono::Local;
use nu_ansi_term::{Color, Style};
use std::fmt;
use tracing::{Event, Level, Subscriber};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{
    fmt::{format::Writer, FmtContext, FormatEvent, FormatFields},
    prelude::*,
    registry::LookupSpan,
    Layer,
};

/// Log target that is always shown on the console
pub const BATCH_RESULT_TARGET: &str = "batch_result";

/// Installs the console and rolling-file layers.
///
/// Console: batch results at INFO, everything else at WARN (INFO when
/// `verbose`). File: batch results at INFO, everything else at INFO
/// (DEBUG when `verbose`).
pub fn setup_logger(log_dir: &str, verbose: bool) -> Option<WorkerGuard> {
    if let Err(e) = std::fs::create_dir_all(log_dir) {
        eprintln!("Cannot create log directory {}: {}", log_dir, e);
        return None;
    }

    // Hourly files so a long run does not end up in one huge log
    let file_appender = tracing_appender::rolling::hourly(log_dir, "flow-bulk");
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    let (file_default, console_default) = if verbose {
        (Level::DEBUG, Level::INFO)
    } else {
        (Level::INFO, Level::WARN)
    };

    let file_filter = tracing_subscriber::filter::Targets::new()
        .with_target(BATCH_RESULT_TARGET, Level::INFO)
        .with_default(file_default);

    let file_layer = tracing_subscriber::fmt::layer()
        .with_writer(non_blocking)
        .with_ansi(false)
        .event_format(FileFormatter)
        .with_filter(file_filter);

    let console_filter = tracing_subscriber::filter::Targets::new()
        .with_target(BATCH_RESULT_TARGET, Level::INFO)
        .with_default(console_default);

    let console_layer = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stdout)
        .with_ansi(true)
        .event_format(TerminalFormatter)
        .with_filter(console_filter);

    if tracing_subscriber::registry()
        .with(file_layer)
        .with(console_layer)
        .try_init()
        .is_err()
    {
        return None;
    }

    // Caller keeps the guard alive for the whole run
    Some(guard)
}

// --- Formatters ---

struct MessageVisitor {
    message: String,
}

impl tracing::field::Visit for MessageVisitor {
    fn record_debug(&mut self, field: &tracing::field::Field, value: &dyn fmt::Debug) {
        if field.name() == "message" {
            self.message = format!("{:?}", value);
        }
    }
    fn record_str(&mut self, field: &tracing::field::Field, value: &str) {
        if field.name() == "message" {
            self.message = value.to_string();
        }
    }
}

pub struct TerminalFormatter;

impl<S, N> FormatEvent<S, N> for TerminalFormatter
where
    S: Subscriber + for<'a> LookupSpan<'a>,
    N: for<'a> FormatFields<'a> + 'static,
{
    fn format_event(
        &self,
        _ctx: &FmtContext<'_, S, N>,
        mut writer: Writer<'_>,
        event: &Event<'_>,
    ) -> fmt::Result {
        let mut msg_visitor = MessageVisitor {
            message: String::new(),
        };
        event.record(&mut msg_visitor);

        let time = Local::now().format("%H:%M:%S");
        write!(writer, "{} ", Style::new().dimmed().paint(time.to_string()))?;

        match *event.metadata().level() {
            Level::ERROR => write!(writer, "{} ", Color::Red.bold().paint("ERROR"))?,
            Level::WARN => write!(writer, "{} ", Color::Yellow.bold().paint("WARN"))?,
            _ => {}
        }

        writeln!(writer, "{}", colorize_outcome(msg_visitor.message))
    }
}

/// Paints SUCCESS green and FAILED red
fn colorize_outcome(msg: String) -> String {
    if msg.contains("SUCCESS") {
        let green_text = Style::new().fg(Color::LightGreen).bold();
        msg.replace("SUCCESS", &green_text.paint("SUCCESS").to_string())
    } else if msg.contains("FAILED") {
        let red_text = Style::new().fg(Color::LightRed).bold();
        msg.replace("FAILED", &red_text.paint("FAILED").to_string())
    } else {
        msg
    }
}

pub struct FileFormatter;

impl<S, N> FormatEvent<S, N> for FileFormatter
where
    S: Subscriber + for<'a> LookupSpan<'a>,
    N: for<'a> FormatFields<'a> + 'static,
{
    fn format_event(
        &self,
        _ctx: &FmtContext<'_, S, N>,
        mut writer: Writer<'_>,
        event: &Event<'_>,
    ) -> fmt::Result {
        let timestamp = Local::now().format("%Y-%m-%d %H:%M:%S");
        let level = event.metadata().level();
        let target = event.metadata().target();

        write!(writer, "{} [{}] {}: ", timestamp, level, target)?;

        let mut msg_visitor = MessageVisitor {
            message: String::new(),
        };
        event.record(&mut msg_visitor);
        writeln!(writer, "{}", msg_visitor.message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_colorize_outcome() {
        let plain = "[Batch #0001] nothing to see".to_string();
        assert_eq!(colorize_outcome(plain.clone()), plain);

        let success = colorize_outcome("[Batch #0001] SUCCESS | 40 items".to_string());
        assert!(success.contains("\u{1b}["));
        assert!(success.contains("SUCCESS"));

        let failed = colorize_outcome("[Batch #0002] FAILED | 40 items".to_string());
        assert!(failed.contains("\u{1b}["));
    }
}
