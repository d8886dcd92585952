//! Runs the entry script inside an interpreter session and turns the result
//! into a process status code.

use std::env;
use std::fs;
use std::path::PathBuf;
use std::sync::Arc;

use pyo3::exceptions::PySystemExit;
use pyo3::prelude::*;
use pyo3::types::{PyBytes, PyDict, PyList};
use serde::Serialize;

use crate::config::LaunchConfig;
use crate::error::{LaunchError, Result};
use crate::log_adapter::{self, LogSink};
use crate::paths;

/// How a run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum RunOutcome {
    /// The script ran to the end.
    Completed,
    /// The script raised `SystemExit`.
    Exited { code: i32 },
    /// The script raised any other exception.
    Failed,
    /// The entry script could not be opened; no user code ran.
    EntryMissing,
    /// Bootstrapping the interpreter failed; no user code ran.
    Aborted,
}

impl RunOutcome {
    /// Process exit status for this outcome.
    pub fn status(&self) -> i32 {
        match self {
            RunOutcome::Completed => 0,
            RunOutcome::Exited { code } => *code,
            RunOutcome::Failed | RunOutcome::EntryMissing | RunOutcome::Aborted => 1,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Init,
    Running,
    Terminated(RunOutcome),
}

/// What a run leaves installed in the interpreter once the script is done.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Teardown {
    /// Put back streams, `sys.path`, `sys.argv` and the working directory,
    /// and drop `androidembed`. The interpreter can host another run.
    #[default]
    Restore,
    /// Leave the redirector and `androidembed` in place so output from
    /// `atexit` handlers and non-daemon threads during finalization still
    /// reaches the log.
    Keep,
}

/// Owns one launch: bootstraps the interpreter, runs the entry script and,
/// depending on [`Teardown`], restores the interpreter afterwards.
pub struct ProgramRunner {
    config: LaunchConfig,
    sink: Arc<dyn LogSink>,
    teardown: Teardown,
    state: RunState,
}

impl ProgramRunner {
    pub fn new(config: LaunchConfig, sink: Arc<dyn LogSink>) -> Self {
        Self {
            config,
            sink,
            teardown: Teardown::default(),
            state: RunState::Init,
        }
    }

    pub fn with_teardown(mut self, teardown: Teardown) -> Self {
        self.teardown = teardown;
        self
    }

    pub fn state(&self) -> RunState {
        self.state
    }

    pub fn config(&self) -> &LaunchConfig {
        &self.config
    }

    /// Runs against the process-wide interpreter, starting it if needed.
    /// The interpreter stays alive afterwards.
    pub fn run(&mut self) -> RunOutcome {
        Python::initialize();
        Python::attach(|py| self.run_in(py))
    }

    /// Runs with the interpreter already held through `py`.
    pub fn run_in(&mut self, py: Python<'_>) -> RunOutcome {
        self.state = RunState::Init;
        let outcome = match self.run_session(py) {
            Ok(outcome) => outcome,
            Err(err) => {
                log::error!("Python bootstrap failed: {}", err);
                RunOutcome::Aborted
            }
        };
        self.state = RunState::Terminated(outcome);
        log::info!("Python for android ended with status {}", outcome.status());
        outcome
    }

    fn run_session(&mut self, py: Python<'_>) -> Result<RunOutcome> {
        let _session = match self.teardown {
            Teardown::Restore => Some(Session::open(py)?),
            Teardown::Keep => None,
        };

        set_argv(py, &self.config.argv)?;
        log_adapter::register(py, self.sink.clone())?;
        paths::bootstrap(py, &self.config, self.sink.clone())?;

        log::info!(
            "Run user program, change dir and execute {}",
            self.config.entry_script
        );
        let source = match self.open_entry() {
            Ok(source) => source,
            Err(err) => {
                log::error!("Open the {} failed: {}", self.config.entry_script, err);
                return Ok(RunOutcome::EntryMissing);
            }
        };

        self.state = RunState::Running;
        let outcome = match execute(py, &self.config.entry_script, &source) {
            Ok(()) => RunOutcome::Completed,
            Err(err) => outcome_from_error(py, err),
        };
        Ok(outcome)
    }

    fn open_entry(&self) -> Result<Vec<u8>> {
        let root = &self.config.argument_root;
        env::set_current_dir(root).map_err(|source| LaunchError::WorkingDir {
            path: root.clone(),
            source,
        })?;
        let path = self.config.entry_path();
        fs::read(&path).map_err(|source| LaunchError::EntryScript { path, source })
    }
}

fn set_argv(py: Python<'_>, argv: &[String]) -> PyResult<()> {
    py.import("sys")?.setattr("argv", PyList::new(py, argv)?)
}

/// Compiles and executes `source` as `__main__`. Bytes go to `compile`
/// unchanged so coding declarations in the script are honoured.
fn execute(py: Python<'_>, file_name: &str, source: &[u8]) -> PyResult<()> {
    let builtins = py.import("builtins")?;
    let code = builtins
        .getattr("compile")?
        .call1((PyBytes::new(py, source), file_name, "exec"))?;

    let globals = PyDict::new(py);
    globals.set_item("__name__", "__main__")?;
    globals.set_item("__file__", file_name)?;
    globals.set_item("__builtins__", &builtins)?;
    builtins.getattr("exec")?.call1((code, &globals))?;
    Ok(())
}

fn outcome_from_error(py: Python<'_>, err: PyErr) -> RunOutcome {
    // PyErr::print would terminate the process on SystemExit
    if err.is_instance_of::<PySystemExit>(py) {
        return RunOutcome::Exited {
            code: exit_code(py, &err),
        };
    }
    err.print(py);
    RunOutcome::Failed
}

/// `None` means success, an int is the status (truncated to C `int` width
/// like CPython does), anything else is printed to `sys.stderr` and reported
/// as 1.
fn exit_code(py: Python<'_>, err: &PyErr) -> i32 {
    let Ok(code) = err.value(py).getattr("code") else {
        return 1;
    };
    if code.is_none() {
        return 0;
    }
    if let Ok(status) = code.extract::<i64>() {
        return status as i32;
    }
    let message = code.str().map(|s| s.to_string()).unwrap_or_default();
    if let Err(write_err) = write_stderr(py, &format!("{message}\n")) {
        log::warn!("could not report exit message: {}", write_err);
    }
    1
}

fn write_stderr(py: Python<'_>, text: &str) -> PyResult<()> {
    py.import("sys")?
        .getattr("stderr")?
        .call_method1("write", (text,))?;
    Ok(())
}

/// Interpreter state a run replaces. Restored when dropped, which also drops
/// the redirector and any text it was still holding.
struct Session<'py> {
    py: Python<'py>,
    stdout: Bound<'py, PyAny>,
    stderr: Bound<'py, PyAny>,
    argv: Option<Bound<'py, PyAny>>,
    path: Bound<'py, PyList>,
    cwd: Option<PathBuf>,
}

impl<'py> Session<'py> {
    fn open(py: Python<'py>) -> PyResult<Self> {
        let sys = py.import("sys")?;
        let path = sys.getattr("path")?.downcast_into::<PyList>()?;
        Ok(Self {
            py,
            stdout: sys.getattr("stdout")?,
            stderr: sys.getattr("stderr")?,
            argv: sys.getattr("argv").ok(),
            path: path.get_slice(0, path.len()),
            cwd: env::current_dir().ok(),
        })
    }

    fn restore(&self) -> PyResult<()> {
        let sys = self.py.import("sys")?;
        sys.setattr("stdout", &self.stdout)?;
        sys.setattr("stderr", &self.stderr)?;
        if let Some(argv) = &self.argv {
            sys.setattr("argv", argv)?;
        }
        let path = sys.getattr("path")?.downcast_into::<PyList>()?;
        path.set_slice(0, path.len(), self.path.as_any())?;
        log_adapter::unregister(self.py)
    }
}

impl Drop for Session<'_> {
    fn drop(&mut self) {
        if let Err(err) = self.restore() {
            log::warn!("failed to restore interpreter state: {}", err);
        }
        if let Some(cwd) = &self.cwd {
            if let Err(err) = env::set_current_dir(cwd) {
                log::warn!("failed to restore working directory: {}", err);
            }
        }
    }
}
