//! Failure traceback capture from the install tool's log stream

const START_MARKER: &str = "Traceback (most recent call last):";

/// Picks the first Python traceback out of a stream of log lines.
///
/// Capture starts at the marker line and stops at the first line that begins
/// with a non-whitespace character, which is kept as the exception summary.
/// Only one traceback is ever captured.
#[derive(Debug, Default, Clone)]
pub struct TracebackExtractor {
    lines: Vec<String>,
    in_traceback: bool,
}

impl TracebackExtractor {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Consume one log line
    pub fn feed(&mut self, line: &str) {
        if self.lines.is_empty() && line.starts_with(START_MARKER) {
            self.in_traceback = true;
        } else if self.in_traceback && line.starts_with(|c: char| !c.is_whitespace()) {
            self.lines.push(line.to_string());
            self.in_traceback = false;
        }
        if self.in_traceback {
            self.lines.push(line.to_string());
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// The captured traceback joined by newlines, empty when none was seen
    #[must_use]
    pub fn traceback(&self) -> String {
        self.lines.join("\n")
    }
}
