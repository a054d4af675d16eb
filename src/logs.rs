//! Log system of the monitor daemon.
//!
//! Settings are derived from the `LOG` section of `monitor.conf` and turned into
//! a process-wide `tracing` subscriber. Entries look like
//! `Thu Oct 17 10:00:00 2026 [MON][I]: Init Monitor Log system`.
use std::{
    fmt,
    fs::{File, OpenOptions},
    io::{self, Write},
    path::{Path, PathBuf},
    sync::Arc,
};

use serde::Serialize;
use strum::IntoEnumIterator;
use strum_macros::{AsRefStr, EnumIter, EnumString};
use tracing::{Dispatch, Event, Level, Metadata, Subscriber, info, level_filters::LevelFilter};
use tracing_subscriber::{
    EnvFilter,
    fmt::{FmtContext, FormatEvent, FormatFields, format::Writer, writer::BoxMakeWriter},
    registry::LookupSpan,
};

use crate::{
    config::Configuration,
    constants::{
        BANNER_RULE, COMPONENT, LOG_DEBUG_LEVEL_KEY, LOG_SECTION, LOG_SYSTEM_KEY,
        LOG_TIMESTAMP_FORMAT,
    },
    error::LogError,
};

/// Log backend selected by `LOG/SYSTEM`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumString, AsRefStr, Serialize)]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
#[serde(rename_all = "lowercase")]
pub enum LogSystem {
    /// Timestamped entries in the daemon log file.
    File,
    /// Local syslog daemon.
    Syslog,
    /// Standard output, used for foreground runs.
    Std,
    /// Unrecognized backend name.
    Undefined,
}

impl LogSystem {
    /// Maps a backend name, yielding `Undefined` for anything unknown.
    pub fn from_name(name: &str) -> Self {
        name.trim().parse().unwrap_or(LogSystem::Undefined)
    }
}

/// Message severity, ordered from least to most verbose.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, EnumIter, AsRefStr, Serialize,
)]
#[repr(u8)]
pub enum Severity {
    Error = 0,
    Warning = 1,
    Info = 2,
    Debug = 3,
    DDebug = 4,
    DDDebug = 5,
}

impl Severity {
    /// Most verbose accepted level.
    pub const MOST_VERBOSE: Severity = Severity::DDDebug;

    /// Maps a numeric `DEBUG_LEVEL`, rejecting anything outside
    /// `[Error, MOST_VERBOSE]`.
    pub fn from_level(level: i64) -> Option<Self> {
        Severity::iter().find(|severity| *severity as i64 == level)
    }

    /// Threshold applied to `tracing` events.
    pub fn level_filter(self) -> LevelFilter {
        match self {
            Severity::Error => LevelFilter::ERROR,
            Severity::Warning => LevelFilter::WARN,
            Severity::Info => LevelFilter::INFO,
            Severity::Debug => LevelFilter::DEBUG,
            Severity::DDebug | Severity::DDDebug => LevelFilter::TRACE,
        }
    }

    fn directive(self) -> &'static str {
        match self.level_filter() {
            LevelFilter::ERROR => "error",
            LevelFilter::WARN => "warn",
            LevelFilter::INFO => "info",
            LevelFilter::DEBUG => "debug",
            LevelFilter::TRACE => "trace",
            LevelFilter::OFF => "off",
        }
    }
}

/// How the log file is opened.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum OpenMode {
    Truncate,
    Append,
}

/// Effective log configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LogSettings {
    pub system: LogSystem,
    pub level: Severity,
    pub destination: PathBuf,
    pub open_mode: OpenMode,
}

impl LogSettings {
    /// Backend used when there is no `LOG` section.
    pub const DEFAULT_SYSTEM: LogSystem = LogSystem::Std;

    /// Threshold used when there is no `LOG` section or `DEBUG_LEVEL` is out
    /// of range.
    pub const DEFAULT_LEVEL: Severity = Severity::Warning;

    /// Derives settings from the `LOG` section, writing files to `destination`.
    ///
    /// Inside `LOG`, a missing key reads as an empty value: no `SYSTEM` is
    /// `Undefined` and no `DEBUG_LEVEL` is level 0.
    pub fn derive(config: &Configuration, destination: impl Into<PathBuf>) -> Self {
        let mut settings = Self {
            system: Self::DEFAULT_SYSTEM,
            level: Self::DEFAULT_LEVEL,
            destination: destination.into(),
            open_mode: OpenMode::Truncate,
        };

        if let Some(log) = config.get_vector(LOG_SECTION) {
            let system = log.vector_value(LOG_SYSTEM_KEY).unwrap_or_default();
            settings.system = LogSystem::from_name(system);

            let level = log.vector_value(LOG_DEBUG_LEVEL_KEY).unwrap_or_default();
            if let Some(level) = leading_integer(level).and_then(Severity::from_level) {
                settings.level = level;
            }
        }

        settings
    }

    /// Whether entries go to standard output.
    pub fn is_standard_output(&self) -> bool {
        self.system == LogSystem::Std
    }
}

/// Reads the integer at the start of `value` the way C `atoi` does: leading
/// blanks and an optional sign, then digits up to the first non-digit. No
/// digits reads as 0. `None` only when the number overflows.
fn leading_integer(value: &str) -> Option<i64> {
    let value = value.trim_start();
    let (negative, rest) = match value.as_bytes().first() {
        Some(b'-') => (true, &value[1..]),
        Some(b'+') => (false, &value[1..]),
        _ => (false, value),
    };

    let digits = rest.bytes().take_while(u8::is_ascii_digit).count();
    if digits == 0 {
        return Some(0);
    }

    let magnitude: i64 = rest[..digits].parse().ok()?;
    Some(if negative { -magnitude } else { magnitude })
}

/// Builds the subscriber described by `settings` and installs it as the
/// process-wide dispatcher. Succeeds once per process.
pub fn activate(settings: &LogSettings, app_name: &str) -> Result<LogHandle, LogError> {
    let (dispatch, handle) = build(settings, app_name)?;
    tracing::dispatcher::set_global_default(dispatch).map_err(|_| LogError::AlreadyActive)?;
    Ok(handle)
}

/// Builds the subscriber described by `settings` without installing it.
pub fn build(settings: &LogSettings, app_name: &str) -> Result<(Dispatch, LogHandle), LogError> {
    let (writer, sink, timestamps) = match settings.system {
        LogSystem::Undefined => return Err(LogError::UnknownSystem),
        LogSystem::Std => (BoxMakeWriter::new(io::stdout), Sink::Stdout, true),
        LogSystem::File => {
            let file = Arc::new(open_log_file(&settings.destination, settings.open_mode)?);
            let shared = Arc::clone(&file);
            (
                BoxMakeWriter::new(move || SharedFile(Arc::clone(&shared))),
                Sink::File(file),
                true,
            )
        }
        LogSystem::Syslog => {
            syslog::open(app_name);
            (BoxMakeWriter::new(syslog::SyslogMakeWriter), Sink::Syslog, false)
        }
    };

    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(settings.level.directive()))
        .event_format(EntryFormat { timestamps })
        .with_writer(writer)
        .finish();

    Ok((
        Dispatch::new(subscriber),
        LogHandle {
            system: settings.system,
            sink,
        },
    ))
}

fn open_log_file(path: &Path, mode: OpenMode) -> Result<File, LogError> {
    let mut options = OpenOptions::new();
    options.create(true);
    match mode {
        OpenMode::Truncate => options.write(true).truncate(true),
        OpenMode::Append => options.append(true),
    };

    options.open(path).map_err(|source| LogError::Open {
        path: path.to_path_buf(),
        source,
    })
}

/// Startup banner summarizing the effective configuration.
pub fn banner(config: &Configuration) -> String {
    format!(
        "Starting Monitor Daemon\n{BANNER_RULE}\n      Monitor Configuration File\n{BANNER_RULE}\n{config}{BANNER_RULE}"
    )
}

#[derive(Debug)]
enum Sink {
    Stdout,
    File(Arc<File>),
    Syslog,
}

/// Owner of the active log backend, finalized last during teardown.
#[derive(Debug)]
pub struct LogHandle {
    system: LogSystem,
    sink: Sink,
}

impl LogHandle {
    pub fn system(&self) -> LogSystem {
        self.system
    }

    /// Flushes and closes the backend.
    pub fn finalize(self) {
        info!(target: COMPONENT, "Finalizing Monitor log system");

        match self.sink {
            Sink::Stdout => {
                if let Err(err) = io::stdout().flush() {
                    eprintln!("Failed to flush monitor log: {err}");
                }
            }
            Sink::File(file) => {
                if let Err(err) = file.sync_all() {
                    eprintln!("Failed to sync monitor log: {err}");
                }
            }
            Sink::Syslog => syslog::close(),
        }
    }
}

/// Writes through a log file shared by every writer the subscriber creates.
struct SharedFile(Arc<File>);

impl Write for SharedFile {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        (&*self.0).write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        (&*self.0).flush()
    }
}

/// Formats entries as `<time> [<component>][<severity>]: <message>`.
struct EntryFormat {
    timestamps: bool,
}

fn severity_code(level: &Level) -> char {
    match *level {
        Level::ERROR => 'E',
        Level::WARN => 'W',
        Level::INFO => 'I',
        Level::DEBUG | Level::TRACE => 'D',
    }
}

fn component<'a>(metadata: &Metadata<'a>) -> &'a str {
    let target = metadata.target();
    if target.contains("::") { COMPONENT } else { target }
}

impl<S, N> FormatEvent<S, N> for EntryFormat
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
        let metadata = event.metadata();

        if self.timestamps {
            write!(
                writer,
                "{} ",
                chrono::Local::now().format(LOG_TIMESTAMP_FORMAT)
            )?;
        }
        write!(
            writer,
            "[{}][{}]: ",
            component(metadata),
            severity_code(metadata.level())
        )?;

        ctx.field_format().format_fields(writer.by_ref(), event)?;
        writeln!(writer)
    }
}

mod syslog {
    use std::{
        ffi::CString,
        io::{self, Write},
        sync::OnceLock,
    };

    use libc::c_int;
    use tracing::{Level, Metadata};
    use tracing_subscriber::fmt::MakeWriter;

    static IDENT: OnceLock<CString> = OnceLock::new();

    /// Opens the syslog connection. The ident must outlive every later call,
    /// so it lives in a static.
    pub(super) fn open(app_name: &str) {
        let ident = IDENT.get_or_init(|| {
            CString::new(app_name).unwrap_or_else(|_| CString::from(c"one_monitor"))
        });

        unsafe { libc::openlog(ident.as_ptr(), libc::LOG_PID, libc::LOG_DAEMON) };
    }

    pub(super) fn close() {
        unsafe { libc::closelog() };
    }

    pub(super) fn priority(level: &Level) -> c_int {
        match *level {
            Level::ERROR => libc::LOG_ERR,
            Level::WARN => libc::LOG_WARNING,
            Level::INFO => libc::LOG_INFO,
            Level::DEBUG | Level::TRACE => libc::LOG_DEBUG,
        }
    }

    pub(super) struct SyslogMakeWriter;

    impl<'a> MakeWriter<'a> for SyslogMakeWriter {
        type Writer = SyslogWriter;

        fn make_writer(&'a self) -> Self::Writer {
            SyslogWriter::new(libc::LOG_INFO)
        }

        fn make_writer_for(&'a self, meta: &Metadata<'_>) -> Self::Writer {
            SyslogWriter::new(priority(meta.level()))
        }
    }

    /// Buffers one formatted entry and hands it to syslog when dropped.
    pub(super) struct SyslogWriter {
        priority: c_int,
        buffer: Vec<u8>,
    }

    impl SyslogWriter {
        fn new(priority: c_int) -> Self {
            Self {
                priority,
                buffer: Vec::new(),
            }
        }

        /// Takes the buffered entry without trailing newlines or NUL bytes.
        fn entry(&mut self) -> Option<CString> {
            while self.buffer.last() == Some(&b'\n') {
                self.buffer.pop();
            }
            self.buffer.retain(|byte| *byte != 0);

            if self.buffer.is_empty() {
                return None;
            }

            CString::new(std::mem::take(&mut self.buffer)).ok()
        }

        fn send(&mut self) {
            if let Some(message) = self.entry() {
                unsafe { libc::syslog(self.priority, c"%s".as_ptr(), message.as_ptr()) };
            }
        }
    }

    impl Write for SyslogWriter {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.buffer.extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            self.send();
            Ok(())
        }
    }

    impl Drop for SyslogWriter {
        fn drop(&mut self) {
            self.send();
        }
    }

}
