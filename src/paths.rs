//! Module search path rooted in the app's private storage.

use std::path::Path;
use std::sync::Arc;

use pyo3::prelude::*;
use pyo3::types::PyList;
use serde::Serialize;

use crate::config::LaunchConfig;
use crate::log_adapter::LogSink;
use crate::redirect;

/// The four directories `sys.path` is replaced with, highest priority first.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SearchPath {
    pub stdlib: String,
    pub dynload: String,
    pub site_packages: String,
    pub argument: String,
}

impl SearchPath {
    /// Lays out the bundled runtime under `private` for Python `major.minor`.
    pub fn new(private: &Path, argument: &Path, (major, minor): (u8, u8)) -> Self {
        let stdlib = private.join("lib").join(format!("python{major}.{minor}"));
        Self {
            stdlib: dir_entry(&stdlib),
            dynload: dir_entry(&stdlib.join("lib-dynload")),
            site_packages: dir_entry(&stdlib.join("site-packages")),
            argument: argument.to_string_lossy().into_owned(),
        }
    }

    pub fn entries(&self) -> [&str; 4] {
        [&self.stdlib, &self.dynload, &self.site_packages, &self.argument]
    }
}

/// Runtime directories keep their trailing separator.
fn dir_entry(path: &Path) -> String {
    let mut entry = path.to_string_lossy().into_owned();
    if !entry.ends_with('/') {
        entry.push('/');
    }
    entry
}

/// Replaces the contents of `sys.path` with `search_path`. The list object
/// itself is kept so modules holding a reference to it see the change.
pub fn replace_sys_path(py: Python<'_>, search_path: &SearchPath) -> PyResult<()> {
    let path = py.import("sys")?.getattr("path")?.downcast_into::<PyList>()?;
    let entries = PyList::new(py, search_path.entries())?;
    path.set_slice(0, path.len(), entries.as_any())
}

/// Points imports at the bundled runtime, then routes standard output and
/// standard error through `sink`.
pub fn bootstrap(py: Python<'_>, config: &LaunchConfig, sink: Arc<dyn LogSink>) -> PyResult<SearchPath> {
    let version = py.version_info();
    let search_path = SearchPath::new(
        &config.private_root,
        &config.argument_root,
        (version.major, version.minor),
    );
    replace_sys_path(py, &search_path)?;
    redirect::install(py, sink)?;

    log::info!("Android path {:?}", search_path.entries());
    log::info!(
        "Python {}.{} bootstrap done, entry script {}",
        version.major,
        version.minor,
        config.entry_script
    );
    Ok(search_path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn four_entries_in_priority_order() {
        let paths = SearchPath::new(
            Path::new("/data/data/org.test/files"),
            Path::new("/sdcard/org.test"),
            (3, 11),
        );
        assert_eq!(
            paths.entries(),
            [
                "/data/data/org.test/files/lib/python3.11/",
                "/data/data/org.test/files/lib/python3.11/lib-dynload/",
                "/data/data/org.test/files/lib/python3.11/site-packages/",
                "/sdcard/org.test",
            ]
        );
    }

    #[test]
    fn serializes_by_field_name() {
        let paths = SearchPath::new(Path::new("/p"), Path::new("/a"), (3, 12));
        let json = serde_json::to_value(&paths).unwrap();
        assert_eq!(json["site_packages"], "/p/lib/python3.12/site-packages/");
        assert_eq!(json["argument"], "/a");
    }
}
