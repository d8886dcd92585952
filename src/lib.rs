//! droidpy - Python launcher for Android application processes
//!
//! The host loads this library and calls `SDL_main`. The launcher reads the
//! app's storage roots from the environment, starts an embedded CPython,
//! points `sys.path` at the bundled runtime, routes `sys.stdout` and
//! `sys.stderr` into logcat under the `python` tag and runs `main.py` from
//! the app's argument directory.
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use droidpy::{LaunchConfig, PlatformLog, launch};
//!
//! let config = LaunchConfig::from_env().expect("ANDROID_PRIVATE and ANDROID_ARGUMENT");
//! let status = launch(config, Arc::new(PlatformLog)).status();
//! std::process::exit(status);
//! ```

use std::env;
use std::sync::Arc;

pub mod config;
pub mod error;
pub mod log_adapter;
pub mod logcat;
pub mod paths;
pub mod redirect;
pub mod runner;

#[cfg(target_os = "android")]
mod android;

pub use config::LaunchConfig;
pub use error::{LaunchError, Result};
pub use log_adapter::{LogSink, MemorySink, PlatformLog};
pub use paths::SearchPath;
pub use redirect::{LineBuffer, LogFile};
pub use runner::{ProgramRunner, RunOutcome, RunState, Teardown};

/// Starts the interpreter, runs the entry script, then finalizes the
/// interpreter. Must be called at most once per process, before anything
/// else has initialized Python, and before the caller starts other threads.
///
/// Standard output and standard error stay routed to `sink` through
/// finalization, so `atexit` handlers and non-daemon threads still log.
pub fn launch(config: LaunchConfig, sink: Arc<dyn LogSink>) -> RunOutcome {
    log::info!("Initialize Python for Android");
    // SAFETY: callers run this on the only thread of the process (SDL_main,
    // or the host CLI's current-thread runtime), before the interpreter
    // exists.
    unsafe { env::set_var(config::ENV_APP_PATH, &config.argument_root) };

    let mut runner = ProgramRunner::new(config, sink).with_teardown(Teardown::Keep);
    // SAFETY: the interpreter is not running yet, and nothing created inside
    // the closure outlives it.
    unsafe { pyo3::with_embedded_python_interpreter(|py| runner.run_in(py)) }
}
