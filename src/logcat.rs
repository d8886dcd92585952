//! Parsing and filtering of `adb logcat -v threadtime` output for the
//! launcher's log tag.

use std::str::FromStr;

use regex::Regex;

use crate::log_adapter::LOG_TAG;

/// "MM-DD HH:MM:SS.mmm  PID  TID LEVEL TAG: Message"
pub const THREADTIME_PATTERN: &str =
    r"(\d{2}-\d{2} \d{2}:\d{2}:\d{2}\.\d{3})\s+(\d+)\s+(\d+)\s+([VDIWEF])\s+([^:]+):\s?(.*)";

const TRACEBACK_HEADER: &str = "Traceback (most recent call last):";

pub fn threadtime_regex() -> Result<Regex, regex::Error> {
    Regex::new(THREADTIME_PATTERN)
}

/// Minimum severity shown.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogLevel {
    Verbose,
    Debug,
    #[default]
    Info,
    Warn,
    Error,
}

impl FromStr for LogLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "v" | "verbose" => Ok(LogLevel::Verbose),
            "d" | "debug" => Ok(LogLevel::Debug),
            "i" | "info" => Ok(LogLevel::Info),
            "w" | "warn" | "warning" => Ok(LogLevel::Warn),
            "e" | "error" => Ok(LogLevel::Error),
            _ => Err(format!("Invalid log level: {}. Use: verbose, debug, info, warn, error", s)),
        }
    }
}

impl LogLevel {
    fn rank(self) -> u8 {
        match self {
            LogLevel::Verbose => 0,
            LogLevel::Debug => 1,
            LogLevel::Info => 2,
            LogLevel::Warn => 3,
            LogLevel::Error => 4,
        }
    }

    /// Whether a logcat level letter is at or above this level.
    pub fn includes(&self, letter: &str) -> bool {
        let other = match letter {
            "V" => 0,
            "D" => 1,
            "I" => 2,
            "W" => 3,
            "E" | "F" => 4,
            _ => 2,
        };
        other >= self.rank()
    }
}

/// One parsed logcat line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogEntry {
    pub timestamp: String,
    pub pid: u32,
    pub level: String,
    pub tag: String,
    pub message: String,
}

impl LogEntry {
    pub fn parse(line: &str, log_regex: &Regex) -> Option<Self> {
        let caps = log_regex.captures(line)?;
        let field = |i: usize| caps.get(i).map(|m| m.as_str()).unwrap_or("");
        Some(LogEntry {
            timestamp: field(1).to_string(),
            pid: field(2).parse().ok()?,
            level: field(4).to_string(),
            tag: field(5).trim().to_string(),
            message: field(6).to_string(),
        })
    }

    /// Written by the launcher or by interpreted code.
    pub fn is_python(&self) -> bool {
        self.tag == LOG_TAG
    }

    /// A native crash in the process hosting the interpreter.
    pub fn is_native_crash(&self) -> bool {
        (self.tag == "DEBUG" && (self.message.contains("signal") || self.message.contains("fault addr")))
            || (self.tag == "libc" && self.message.contains("Fatal signal"))
            || self.tag == "crash_dump"
            || ["SIGABRT", "SIGSEGV", "SIGFPE", "SIGBUS"]
                .iter()
                .any(|sig| self.message.contains(sig))
    }

    /// The Java side died, e.g. before the native library was loaded.
    pub fn is_java_crash(&self) -> bool {
        self.tag == "AndroidRuntime" && self.level == "E"
    }
}

/// Position of a line relative to a Python traceback.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TraceLine {
    Outside,
    Start,
    Inside,
    /// The final `ExceptionType: message` line.
    End,
}

/// Follows `python` tagged messages to find where tracebacks begin and end.
#[derive(Debug, Default)]
pub struct TracebackTracker {
    active: bool,
}

impl TracebackTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn observe(&mut self, message: &str) -> TraceLine {
        if message.starts_with(TRACEBACK_HEADER) {
            self.active = true;
            return TraceLine::Start;
        }
        if !self.active {
            return TraceLine::Outside;
        }
        if message.starts_with(' ') || message.is_empty() {
            TraceLine::Inside
        } else {
            self.active = false;
            TraceLine::End
        }
    }
}

/// Filters applied to parsed entries.
#[derive(Debug, Clone, Default)]
pub struct LogFilter {
    pub level: LogLevel,
    pub tags: Vec<String>,
    pub search: Option<String>,
    pub crashes_only: bool,
}

impl LogFilter {
    /// `in_traceback` keeps every line of a traceback together even when
    /// individual lines would not match `search`.
    pub fn matches(&self, entry: &LogEntry, in_traceback: bool) -> bool {
        let is_crash = entry.is_native_crash() || entry.is_java_crash();
        if !self.level.includes(&entry.level) {
            return false;
        }
        if self.crashes_only && !is_crash && !in_traceback {
            return false;
        }

        let tag_wanted = if self.tags.is_empty() {
            entry.is_python()
        } else {
            self.tags.iter().any(|t| entry.tag.contains(t.as_str()))
        };
        if !tag_wanted && !is_crash {
            return false;
        }

        match &self.search {
            Some(search) if !in_traceback => {
                let search = search.to_lowercase();
                entry.message.to_lowercase().contains(&search)
                    || entry.tag.to_lowercase().contains(&search)
            }
            _ => true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(line: &str) -> LogEntry {
        LogEntry::parse(line, &threadtime_regex().unwrap()).expect("threadtime line")
    }

    #[test]
    fn parses_threadtime_line() {
        let e = entry("10-19 12:34:56.789  4321  4321 I python  : Android path ['/data/lib']");
        assert_eq!(e.timestamp, "10-19 12:34:56.789");
        assert_eq!(e.pid, 4321);
        assert_eq!(e.level, "I");
        assert_eq!(e.tag, "python");
        assert_eq!(e.message, "Android path ['/data/lib']");
        assert!(e.is_python());
    }

    #[test]
    fn keeps_indentation_of_traceback_lines() {
        let e = entry("10-19 12:34:56.789  4321  4321 I python  :   File \"main.py\", line 3");
        assert_eq!(e.message, "  File \"main.py\", line 3");
    }

    #[test]
    fn rejects_non_threadtime_lines() {
        assert!(LogEntry::parse("--------- beginning of main", &threadtime_regex().unwrap()).is_none());
    }

    #[test]
    fn level_ordering() {
        assert!(LogLevel::Info.includes("I"));
        assert!(LogLevel::Info.includes("E"));
        assert!(!LogLevel::Info.includes("D"));
        assert!(LogLevel::Error.includes("F"));
        assert_eq!("warning".parse::<LogLevel>(), Ok(LogLevel::Warn));
        assert!("loud".parse::<LogLevel>().is_err());
    }

    #[test]
    fn tracks_traceback_block() {
        let mut tracker = TracebackTracker::new();
        assert_eq!(tracker.observe("hello"), TraceLine::Outside);
        assert_eq!(tracker.observe("Traceback (most recent call last):"), TraceLine::Start);
        assert_eq!(tracker.observe("  File \"main.py\", line 1, in <module>"), TraceLine::Inside);
        assert_eq!(tracker.observe("    raise RuntimeError(\"boom\")"), TraceLine::Inside);
        assert_eq!(tracker.observe("RuntimeError: boom"), TraceLine::End);
        assert_eq!(tracker.observe("after"), TraceLine::Outside);
    }

    #[test]
    fn default_filter_keeps_python_and_crashes() {
        let filter = LogFilter::default();
        assert!(filter.matches(&entry("10-19 12:00:00.000   1   1 I python  : hi"), false));
        assert!(!filter.matches(&entry("10-19 12:00:00.000   1   1 I ActivityManager: hi"), false));
        assert!(filter.matches(
            &entry("10-19 12:00:00.000   1   1 F libc    : Fatal signal 11 (SIGSEGV)"),
            false
        ));
    }

    #[test]
    fn search_does_not_split_tracebacks() {
        let filter = LogFilter {
            search: Some("boom".into()),
            ..LogFilter::default()
        };
        let frame = entry("10-19 12:00:00.000   1   1 I python  :   File \"main.py\", line 1");
        assert!(!filter.matches(&frame, false));
        assert!(filter.matches(&frame, true));
    }

    #[test]
    fn crashes_only_keeps_tracebacks() {
        let filter = LogFilter {
            crashes_only: true,
            ..LogFilter::default()
        };
        let plain = entry("10-19 12:00:00.000   1   1 I python  : ready");
        assert!(!filter.matches(&plain, false));
        assert!(filter.matches(&plain, true));
    }
}
