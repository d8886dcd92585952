//! Line-buffered stand-in for `sys.stdout` and `sys.stderr`.
//!
//! Writes are accumulated until a newline arrives; each complete line is
//! forwarded to a [`LogSink`] without its terminator. Text still pending when
//! the session ends is dropped.

use std::sync::Arc;

use pyo3::prelude::*;

use crate::log_adapter::LogSink;

/// Text written since the last newline.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct LineBuffer {
    pending: String,
}

impl LineBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends `s` and returns the lines it completed, in order.
    pub fn write(&mut self, s: &str) -> Vec<String> {
        self.pending.push_str(s);
        let Some(last_newline) = self.pending.rfind('\n') else {
            return Vec::new();
        };
        let rest = self.pending.split_off(last_newline + 1);
        let complete = std::mem::replace(&mut self.pending, rest);
        // drop the final '\n' so split yields exactly the finished lines
        complete[..complete.len() - 1]
            .split('\n')
            .map(str::to_owned)
            .collect()
    }

    /// Appends `s` and forwards each completed line to `sink`.
    pub fn write_to(&mut self, s: &str, sink: &dyn LogSink) {
        for line in self.write(s) {
            sink.log(&line);
        }
    }

    pub fn pending(&self) -> &str {
        &self.pending
    }
}

/// The object installed as `sys.stdout`/`sys.stderr`.
#[pyclass(module = "androidembed")]
pub struct LogFile {
    buffer: LineBuffer,
    sink: Arc<dyn LogSink>,
}

impl LogFile {
    pub fn new(sink: Arc<dyn LogSink>) -> Self {
        Self {
            buffer: LineBuffer::new(),
            sink,
        }
    }
}

#[pymethods]
impl LogFile {
    fn write(&mut self, s: &str) {
        self.buffer.write_to(s, &*self.sink);
    }

    /// Partial lines stay buffered; only a newline forwards text.
    fn flush(&self) {}

    fn writable(&self) -> bool {
        true
    }

    fn isatty(&self) -> bool {
        false
    }

    /// Unterminated text currently held back.
    #[getter]
    fn pending(&self) -> String {
        self.buffer.pending().to_owned()
    }
}

/// Installs one shared [`LogFile`] as both `sys.stdout` and `sys.stderr`.
pub fn install<'py>(py: Python<'py>, sink: Arc<dyn LogSink>) -> PyResult<Bound<'py, LogFile>> {
    let file = Bound::new(py, LogFile::new(sink))?;
    let sys = py.import("sys")?;
    sys.setattr("stdout", &file)?;
    sys.setattr("stderr", &file)?;
    Ok(file)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::log_adapter::MemorySink;

    #[test]
    fn splits_multi_line_write() {
        let mut buffer = LineBuffer::new();
        assert_eq!(buffer.write("a\nb\nc"), vec!["a", "b"]);
        assert_eq!(buffer.pending(), "c");
    }

    #[test]
    fn trailing_newline_resets_buffer() {
        let mut buffer = LineBuffer::new();
        assert_eq!(buffer.write("a\n"), vec!["a"]);
        assert!(buffer.write("").is_empty());
        assert_eq!(buffer.pending(), "");
    }

    #[test]
    fn empty_write_is_a_no_op() {
        let mut buffer = LineBuffer::new();
        buffer.write("partial");
        let before = buffer.clone();
        assert!(buffer.write("").is_empty());
        assert_eq!(buffer, before);
    }

    #[test]
    fn text_without_newline_accumulates() {
        let mut buffer = LineBuffer::new();
        assert!(buffer.write("hel").is_empty());
        assert!(buffer.write("lo").is_empty());
        assert_eq!(buffer.write(" world\n"), vec!["hello world"]);
        assert_eq!(buffer.pending(), "");
    }

    #[test]
    fn blank_lines_are_forwarded() {
        let mut buffer = LineBuffer::new();
        assert_eq!(buffer.write("\n\nx\n"), vec!["", "", "x"]);
    }

    #[test]
    fn write_to_forwards_in_order() {
        let sink = MemorySink::new();
        let mut buffer = LineBuffer::new();
        buffer.write_to("one\ntw", &sink);
        buffer.write_to("o\nthree", &sink);
        assert_eq!(sink.lines(), vec!["one", "two"]);
        assert_eq!(buffer.pending(), "three");
    }
}
