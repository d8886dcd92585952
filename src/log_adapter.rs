//! The `androidembed` module: one `log(message)` function that forwards a
//! line of text to the platform log.

use std::sync::{Arc, Mutex};

use pyo3::exceptions::PyTypeError;
use pyo3::prelude::*;
use pyo3::types::{PyCFunction, PyDict, PyTuple};

/// Tag every record from interpreted code is written under.
pub const LOG_TAG: &str = "python";

/// Name the module is importable under.
pub const MODULE_NAME: &str = "androidembed";

/// Destination for complete log records.
pub trait LogSink: Send + Sync {
    /// Writes `line` verbatim as one record.
    fn log(&self, line: &str);
}

/// Forwards records to the `log` facade at info level under [`LOG_TAG`].
///
/// On Android the facade is backed by `android_logger`, so records show up
/// in logcat; on the host whichever logger the binary installed receives them.
#[derive(Debug, Default, Clone, Copy)]
pub struct PlatformLog;

impl LogSink for PlatformLog {
    fn log(&self, line: &str) {
        log::info!(target: LOG_TAG, "{}", line);
    }
}

/// Keeps every record in memory, in arrival order.
#[derive(Debug, Default)]
pub struct MemorySink {
    lines: Mutex<Vec<String>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of the records received so far.
    pub fn lines(&self) -> Vec<String> {
        self.lines.lock().map(|l| l.clone()).unwrap_or_default()
    }
}

impl LogSink for MemorySink {
    fn log(&self, line: &str) {
        if let Ok(mut lines) = self.lines.lock() {
            lines.push(line.to_owned());
        }
    }
}

/// Every record goes to both sinks.
pub struct Tee<A, B>(pub A, pub B);

impl<A: LogSink, B: LogSink> LogSink for Tee<A, B> {
    fn log(&self, line: &str) {
        self.0.log(line);
        self.1.log(line);
    }
}

impl<T: LogSink + ?Sized> LogSink for Arc<T> {
    fn log(&self, line: &str) {
        (**self).log(line);
    }
}

/// Builds the `androidembed` module around `sink` and registers it in
/// `sys.modules`, so `import androidembed` resolves without touching the
/// search path.
pub fn register<'py>(py: Python<'py>, sink: Arc<dyn LogSink>) -> PyResult<Bound<'py, PyModule>> {
    let module = PyModule::new(py, MODULE_NAME)?;
    let log = PyCFunction::new_closure(
        py,
        Some(c"log"),
        Some(c"Log on android platform"),
        move |args: &Bound<'_, PyTuple>, kwargs: Option<&Bound<'_, PyDict>>| -> PyResult<()> {
            let message = parse_message(args, kwargs)?;
            sink.log(&message);
            Ok(())
        },
    )?;
    module.add("log", log)?;

    py.import("sys")?
        .getattr("modules")?
        .set_item(MODULE_NAME, &module)?;
    Ok(module)
}

/// Accepts exactly one positional `str`; every other call shape is a
/// `TypeError`.
fn parse_message(args: &Bound<'_, PyTuple>, kwargs: Option<&Bound<'_, PyDict>>) -> PyResult<String> {
    if kwargs.is_some_and(|kw| !kw.is_empty()) {
        return Err(PyTypeError::new_err("log() takes no keyword arguments"));
    }
    if args.len() != 1 {
        return Err(PyTypeError::new_err(format!(
            "log() takes exactly one argument ({} given)",
            args.len()
        )));
    }
    args.get_item(0)?.extract()
}

/// Removes the module registered by [`register`]. Missing entries are fine.
pub fn unregister(py: Python<'_>) -> PyResult<()> {
    let modules = py.import("sys")?.getattr("modules")?;
    if modules.contains(MODULE_NAME)? {
        modules.del_item(MODULE_NAME)?;
    }
    Ok(())
}
