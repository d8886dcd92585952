//! Native entry point called by the Android host.

use std::ffi::{CStr, c_char, c_int};
use std::sync::Arc;

use android_logger::Config as AndroidLoggerConfig;
use log::{LevelFilter, error};

use crate::config::LaunchConfig;
use crate::log_adapter::{LOG_TAG, PlatformLog};
use crate::launch;

/// Entry point the SDL activity calls once its native library is loaded.
/// `ANDROID_PRIVATE` and `ANDROID_ARGUMENT` are set by the Java side first.
#[unsafe(no_mangle)]
#[allow(non_snake_case)]
pub extern "C" fn SDL_main(argc: c_int, argv: *const *const c_char) -> c_int {
    android_logger::init_once(
        AndroidLoggerConfig::default()
            .with_tag(LOG_TAG)
            .with_max_level(LevelFilter::Info),
    );

    std::panic::set_hook(Box::new(|panic_info| {
        error!("PANIC: {:?}", panic_info);
    }));

    // SAFETY: the host passes a C argv of `argc` entries.
    let args = unsafe { collect_args(argc, argv) };

    let config = match LaunchConfig::from_env() {
        Ok(config) => config.with_argv(args),
        Err(err) => {
            error!("{}", err);
            return 1;
        }
    };

    let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
        launch(config, Arc::new(PlatformLog))
    }));
    match result {
        Ok(outcome) => outcome.status(),
        Err(panic) => {
            error!("Launcher panicked: {:?}", panic);
            1
        }
    }
}

unsafe fn collect_args(argc: c_int, argv: *const *const c_char) -> Vec<String> {
    if argv.is_null() {
        return Vec::new();
    }
    (0..argc.max(0) as usize)
        .filter_map(|i| {
            // SAFETY: i < argc, and each non-null entry is a NUL-terminated string.
            let arg = unsafe { *argv.add(i) };
            (!arg.is_null()).then(|| unsafe { CStr::from_ptr(arg) }.to_string_lossy().into_owned())
        })
        .collect()
}
