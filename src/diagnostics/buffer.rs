//! Bounded buffer of the most recent diagnostic lines.

use std::collections::VecDeque;

/// Default number of diagnostic lines kept for error reports.
pub const DEFAULT_DIAGNOSTIC_LINES: usize = 10;

/// Fixed-capacity FIFO of trimmed, non-empty text lines.
///
/// Once full, every new line evicts the oldest one.
#[derive(Debug, Clone)]
pub struct DiagnosticBuffer {
    limit: usize,
    lines: VecDeque<String>,
}

impl Default for DiagnosticBuffer {
    fn default() -> Self {
        Self::new(DEFAULT_DIAGNOSTIC_LINES)
    }
}

impl DiagnosticBuffer {
    /// Create a buffer keeping at most `limit` lines.
    #[must_use]
    pub fn new(limit: usize) -> Self {
        Self {
            limit,
            lines: VecDeque::with_capacity(limit),
        }
    }

    /// Split `chunk` on newlines and append every non-blank line.
    pub fn write_chunk(&mut self, chunk: &[u8]) {
        let text = String::from_utf8_lossy(chunk);
        for line in text.split('\n') {
            self.push_line(line);
        }
    }

    /// Append a single line, trimmed. Blank lines are dropped.
    pub fn push_line(&mut self, line: &str) {
        let line = line.trim();
        if line.is_empty() {
            return;
        }
        self.lines.push_back(line.to_string());
        while self.lines.len() > self.limit {
            self.lines.pop_front();
        }
    }

    /// Buffered lines, oldest first.
    pub fn lines(&self) -> impl Iterator<Item = &str> {
        self.lines.iter().map(String::as_str)
    }

    /// Copy of the buffered lines, oldest first.
    #[must_use]
    pub fn snapshot(&self) -> Vec<String> {
        self.lines.iter().cloned().collect()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.lines.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Maximum number of lines kept.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.limit
    }
}

impl std::io::Write for DiagnosticBuffer {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.write_chunk(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}
