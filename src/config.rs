//! Launch configuration read from the process environment.

use std::env;
use std::path::PathBuf;

use crate::error::{LaunchError, Result};

/// Per-application writable storage root set by the Java side.
pub const ENV_PRIVATE: &str = "ANDROID_PRIVATE";
/// Public content root holding the entry script and user files.
pub const ENV_ARGUMENT: &str = "ANDROID_ARGUMENT";
/// Exported for user code; mirrors the argument root.
pub const ENV_APP_PATH: &str = "ANDROID_APP_PATH";

/// Name of the script run as the program's main logic.
pub const DEFAULT_ENTRY_SCRIPT: &str = "main.py";

/// Everything the launcher needs to know about where the app lives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaunchConfig {
    pub private_root: PathBuf,
    pub argument_root: PathBuf,
    pub entry_script: String,
    /// Becomes `sys.argv`. The first element is the program name.
    pub argv: Vec<String>,
}

impl LaunchConfig {
    pub fn new(private_root: impl Into<PathBuf>, argument_root: impl Into<PathBuf>) -> Self {
        Self {
            private_root: private_root.into(),
            argument_root: argument_root.into(),
            entry_script: DEFAULT_ENTRY_SCRIPT.to_string(),
            argv: vec![String::new()],
        }
    }

    /// Reads both roots from the process environment.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Reads both roots through `lookup`. An empty value counts as missing.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let read = |key: &'static str| {
            lookup(key)
                .filter(|value| !value.is_empty())
                .ok_or(LaunchError::MissingEnv(key))
        };
        let private_root = read(ENV_PRIVATE)?;
        let argument_root = read(ENV_ARGUMENT)?;
        Ok(Self::new(private_root, argument_root))
    }

    pub fn with_entry_script(mut self, name: impl Into<String>) -> Self {
        self.entry_script = name.into();
        self
    }

    pub fn with_argv<I, S>(mut self, argv: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.argv = argv.into_iter().map(Into::into).collect();
        if self.argv.is_empty() {
            self.argv.push(String::new());
        }
        self
    }

    /// Absolute location of the entry script.
    pub fn entry_path(&self) -> PathBuf {
        self.argument_root.join(&self.entry_script)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn reads_both_roots() {
        let config = LaunchConfig::from_lookup(lookup_from(&[
            (ENV_PRIVATE, "/data/data/org.example/files"),
            (ENV_ARGUMENT, "/sdcard/org.example"),
        ]))
        .unwrap();

        assert_eq!(config.private_root, PathBuf::from("/data/data/org.example/files"));
        assert_eq!(config.argument_root, PathBuf::from("/sdcard/org.example"));
        assert_eq!(config.entry_script, "main.py");
        assert_eq!(config.entry_path(), PathBuf::from("/sdcard/org.example/main.py"));
    }

    #[test]
    fn missing_private_root_is_fatal() {
        let err = LaunchConfig::from_lookup(lookup_from(&[(ENV_ARGUMENT, "/sdcard/app")]))
            .unwrap_err();
        assert!(matches!(err, LaunchError::MissingEnv(ENV_PRIVATE)));
    }

    #[test]
    fn empty_private_root_counts_as_missing() {
        let err = LaunchConfig::from_lookup(lookup_from(&[
            (ENV_PRIVATE, ""),
            (ENV_ARGUMENT, "/sdcard/app"),
        ]))
        .unwrap_err();
        assert!(matches!(err, LaunchError::MissingEnv(ENV_PRIVATE)));
    }

    #[test]
    fn missing_argument_root_is_fatal() {
        let err = LaunchConfig::from_lookup(lookup_from(&[(ENV_PRIVATE, "/data/app")]))
            .unwrap_err();
        assert!(matches!(err, LaunchError::MissingEnv(ENV_ARGUMENT)));
    }

    #[test]
    fn empty_argv_keeps_program_name_slot() {
        let config = LaunchConfig::new("/p", "/a").with_argv(Vec::<String>::new());
        assert_eq!(config.argv, vec![String::new()]);
    }
}
