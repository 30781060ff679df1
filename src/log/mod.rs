//! Provides logging utilities, used by the network test.

use std::io;

use chrono::Local;
use slog::{
    o, Discard, Drain, Duplicate, FnValue, Fuse, Level, Logger, PushFnValue,
    Record,
};
use slog_async::Async;
use slog_json::Json;

/// Re-exports common definitions for logging.
///
/// Use this module as following:
/// ```rust
/// use medea_network_test::log::prelude::*;
/// ```
pub mod prelude {
    pub use slog::{slog_debug, slog_error, slog_info, slog_trace, slog_warn};
    pub use slog_scope::{debug, error, info, trace, warn};
}

/// Builds JSON [`Logger`] which prints all its log records to `w_out` writer,
/// but WARN level (and higher) to `w_err` writer. Logger will use [`Async`]
/// drain with channel size of 2048 entries.
///
/// Records less severe than the provided `level` are dropped. `None` level
/// means logging is turned off, so a [`Discard`]ing [`Logger`] is returned.
///
/// Created [`Logger`] produces log records with `fqn`, `lvl`, `time` and `msg`
/// fields by default.
///
/// Install it with [`slog_scope::set_global_logger()`] so the engine's
/// records are emitted.
pub fn new_dual_logger<W1, W2>(
    w_out: W1,
    w_err: W2,
    level: Option<Level>,
) -> Logger
where
    W1: io::Write + Send + 'static,
    W2: io::Write + Send + 'static,
{
    let level = match level {
        Some(l) => l,
        None => return Logger::root(Discard, o!()),
    };

    let drain_out = Json::new(w_out).build();
    let drain_err = Json::new(w_err).build();
    let drain = Duplicate(
        drain_out.filter(|r| !r.level().is_at_least(Level::Warning)),
        drain_err.filter_level(Level::Warning),
    )
    .map(Fuse);
    let drain = drain.filter_level(level).fuse();
    let drain = Async::new(drain).chan_size(2048).build().fuse();
    add_default_keys(&Logger::root(drain, o!()))
}

/// Adds default log record data (key-value pairs) to specified [`Logger`]:
/// - `msg`: log record message.
/// - `fqn`: path to code line that called log function.
/// - `time`: creation date and time of log record in [RFC 3339] format.
/// - `lvl`: logging level of log record.
///
/// [RFC 3339]: https://www.ietf.org/rfc/rfc3339.txt
fn add_default_keys(logger: &Logger) -> Logger {
    logger.new(o!(
        "msg" => PushFnValue(move |record : &Record, ser| {
            ser.emit(record.msg())
        }),
        "fqn" => PushFnValue(move |record : &Record, ser| {
             ser.emit(format_args!("{}:{}", record.module(), record.line()))
        }),
        "time" => PushFnValue(move |_ : &Record, ser| {
            ser.emit(Local::now().to_rfc3339())
        }),
        "lvl" => FnValue(move |rinfo : &Record| {
            rinfo.level().as_str()
        }),
    ))
}

#[cfg(test)]
mod spec {
    use std::{
        io,
        sync::{Arc, Mutex},
    };

    use slog::{info, warn, Level};

    use super::new_dual_logger;

    /// [`io::Write`] collecting everything into a shared buffer.
    #[derive(Clone, Default)]
    struct Sink(Arc<Mutex<Vec<u8>>>);

    impl Sink {
        fn contents(&self) -> String {
            String::from_utf8(self.0.lock().unwrap().clone()).unwrap()
        }
    }

    impl io::Write for Sink {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn splits_records_by_severity() {
        let (out, err) = (Sink::default(), Sink::default());
        {
            let logger =
                new_dual_logger(out.clone(), err.clone(), Some(Level::Info));
            info!(logger, "sampling started");
            warn!(logger, "teardown timed out");
        }

        let out = out.contents();
        let err = err.contents();
        assert!(out.contains("sampling started"));
        assert!(!out.contains("teardown timed out"));
        assert!(err.contains("teardown timed out"));
        assert!(err.contains(r#""lvl":"WARNING""#));
    }

    #[test]
    fn discards_everything_when_off() {
        let (out, err) = (Sink::default(), Sink::default());
        {
            let logger = new_dual_logger(out.clone(), err.clone(), None);
            warn!(logger, "never written");
        }

        assert!(out.contents().is_empty());
        assert!(err.contents().is_empty());
    }
}
