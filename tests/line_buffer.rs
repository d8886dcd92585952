//! Content preservation of the stream redirector's line buffer.

use droidpy::{LineBuffer, LogSink, MemorySink};
use proptest::prelude::*;

fn chunk() -> impl Strategy<Value = String> {
    prop::string::string_regex("[ab\n]{0,8}").unwrap()
}

proptest! {
    #[test]
    fn forwarded_lines_plus_pending_rebuild_the_input(writes in prop::collection::vec(chunk(), 0..16)) {
        let sink = MemorySink::new();
        let mut buffer = LineBuffer::new();
        for w in &writes {
            buffer.write_to(w, &sink);
        }

        let mut rebuilt: String = sink.lines().iter().map(|l| format!("{l}\n")).collect();
        rebuilt.push_str(buffer.pending());
        prop_assert_eq!(rebuilt, writes.concat());
    }

    #[test]
    fn pending_is_text_after_last_newline(writes in prop::collection::vec(chunk(), 1..16)) {
        let mut buffer = LineBuffer::new();
        for w in &writes {
            buffer.write(w);
        }
        let all = writes.concat();
        let expected = all.rsplit('\n').next().unwrap_or("");
        prop_assert_eq!(buffer.pending(), expected);
    }

    #[test]
    fn empty_write_changes_nothing(prefix in chunk()) {
        let mut buffer = LineBuffer::new();
        buffer.write(&prefix);
        let before = buffer.clone();
        prop_assert!(buffer.write("").is_empty());
        prop_assert_eq!(buffer, before);
    }
}

#[test]
fn lines_arrive_once_in_order() {
    struct Numbered(MemorySink);
    impl LogSink for Numbered {
        fn log(&self, line: &str) {
            self.0.log(&format!("{}:{}", self.0.lines().len(), line));
        }
    }

    let sink = Numbered(MemorySink::new());
    let mut buffer = LineBuffer::new();
    buffer.write_to("x\ny", &sink);
    buffer.write_to("\nz\n", &sink);
    assert_eq!(sink.0.lines(), vec!["0:x", "1:y", "2:z"]);
}
