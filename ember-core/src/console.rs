//! Reporting sink

use core::fmt;

/// Where process tables and task output go.
///
/// The kernel forwards it to its logger; tests record it in memory.
pub trait Console: fmt::Write {
    /// Print the NUL-terminated string a task passed to the `print` syscall.
    fn print_user(&mut self, addr: u64);

    /// Diagnostic pacing after a process table. Default: none.
    fn pause(&mut self) {}
}

/// Fixed-capacity line assembler for consoles that forward whole lines.
///
/// Lines longer than `CAP` bytes are emitted in pieces, split on a char
/// boundary. Nothing is allocated.
pub struct LineBuffer<const CAP: usize> {
    buf: [u8; CAP],
    len: usize,
}

impl<const CAP: usize> LineBuffer<CAP> {
    pub const fn new() -> Self {
        Self { buf: [0; CAP], len: 0 }
    }

    /// The unfinished line.
    pub fn as_str(&self) -> &str {
        // Only whole chars are ever pushed.
        core::str::from_utf8(&self.buf[..self.len]).unwrap_or_default()
    }

    /// Append `text`, calling `emit` for every completed line.
    pub fn feed(&mut self, text: &str, mut emit: impl FnMut(&str)) {
        let mut lines = text.split('\n');
        if let Some(first) = lines.next() {
            self.push(first, &mut emit);
        }
        for line in lines {
            emit(self.as_str());
            self.len = 0;
            self.push(line, &mut emit);
        }
    }

    /// Like `feed`, replacing invalid UTF-8 with U+FFFD.
    pub fn feed_bytes(&mut self, bytes: &[u8], mut emit: impl FnMut(&str)) {
        let mut rest = bytes;
        while !rest.is_empty() {
            match core::str::from_utf8(rest) {
                Ok(text) => {
                    self.feed(text, &mut emit);
                    return;
                }
                Err(err) => {
                    let (valid, tail) = rest.split_at(err.valid_up_to());
                    self.feed(core::str::from_utf8(valid).unwrap_or_default(), &mut emit);
                    self.feed(char::REPLACEMENT_CHARACTER.encode_utf8(&mut [0; 4]), &mut emit);
                    let skip = err.error_len().unwrap_or(tail.len());
                    rest = &tail[skip..];
                }
            }
        }
    }

    fn push(&mut self, mut text: &str, emit: &mut impl FnMut(&str)) {
        while !text.is_empty() {
            let mut take = text.len().min(CAP - self.len);
            while !text.is_char_boundary(take) {
                take -= 1;
            }
            if take == 0 {
                if self.len == 0 {
                    // A single char wider than the whole buffer.
                    let skip = text.chars().next().map_or(text.len(), char::len_utf8);
                    text = &text[skip..];
                } else {
                    emit(self.as_str());
                    self.len = 0;
                }
                continue;
            }
            self.buf[self.len..self.len + take].copy_from_slice(&text.as_bytes()[..take]);
            self.len += take;
            text = &text[take..];
        }
    }
}

impl<const CAP: usize> Default for LineBuffer<CAP> {
    fn default() -> Self {
        Self::new()
    }
}
