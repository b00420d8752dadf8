//! Bounded line readers
//!
//! Small files are read whole and sliced. Larger files are streamed one
//! capped line at a time, so memory stays proportional to the window. In
//! both cases the lines before the window are passed to a callback, which
//! the extractor uses to carry highlighter state into the window.

use crate::config::compile_time::source::MAX_LINE_LENGTH;
use std::fs::{self, File};
use std::io::{self, BufRead, BufReader};
use std::path::Path;

/// Worst-case UTF-8 width of a line that is still under the char limit
const MAX_LINE_BYTES: usize = MAX_LINE_LENGTH * 4;

/// One line read from a source file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawLine {
    pub number: u32,
    pub text: String,
    pub truncated: bool,
}

/// Read the whole file and return lines `start..=end` (1-based).
/// Lines before the window are handed to `before` in order.
pub fn read_window_full(
    path: &Path,
    start: u32,
    end: u32,
    mut before: impl FnMut(&str),
) -> io::Result<Vec<RawLine>> {
    let bytes = fs::read(path)?;
    let content = String::from_utf8_lossy(&bytes);
    let skip = start.saturating_sub(1) as usize;

    let mut lines = content.lines();
    for line in lines.by_ref().take(skip) {
        before(&truncate_line(line).0);
    }

    Ok(lines
        .take(end.saturating_sub(start) as usize + 1)
        .enumerate()
        .map(|(offset, line)| {
            let (text, truncated) = truncate_line(line);
            RawLine {
                number: start.max(1) + offset as u32,
                text,
                truncated,
            }
        })
        .collect())
}

/// Stream the file and return lines `start..=end` (1-based).
/// Lines before the window are handed to `before` one at a time and never
/// buffered together.
pub fn read_window_streaming(
    path: &Path,
    start: u32,
    end: u32,
    mut before: impl FnMut(&str),
) -> io::Result<Vec<RawLine>> {
    let mut reader = BufReader::new(File::open(path)?);
    let mut lines = Vec::new();

    for _ in 1..start {
        let Some((bytes, _)) = read_capped_line(&mut reader, MAX_LINE_BYTES)? else {
            return Ok(lines);
        };
        before(&truncate_line(&String::from_utf8_lossy(&bytes)).0);
    }

    for number in start..=end {
        let Some((bytes, capped)) = read_capped_line(&mut reader, MAX_LINE_BYTES)? else {
            break;
        };
        let decoded = String::from_utf8_lossy(&bytes);
        let (text, truncated) = truncate_line(&decoded);
        lines.push(RawLine {
            number,
            text,
            truncated: truncated || capped,
        });
    }

    Ok(lines)
}

/// Cut a line to `MAX_LINE_LENGTH` characters
pub fn truncate_line(line: &str) -> (String, bool) {
    match line.char_indices().nth(MAX_LINE_LENGTH) {
        Some((cut, _)) => (line[..cut].to_string(), true),
        None => (line.to_string(), false),
    }
}

/// Read one line keeping at most `cap` bytes; the flag reports a cut
fn read_capped_line<R: BufRead>(reader: &mut R, cap: usize) -> io::Result<Option<(Vec<u8>, bool)>> {
    let mut line = Vec::new();
    let mut capped = false;
    let mut consumed_any = false;

    loop {
        let (found_newline, used) = {
            let buffer = reader.fill_buf()?;
            if buffer.is_empty() {
                break;
            }
            let (chunk, found_newline) = match buffer.iter().position(|&b| b == b'\n') {
                Some(index) => (&buffer[..index], true),
                None => (buffer, false),
            };
            let room = cap.saturating_sub(line.len());
            if chunk.len() > room {
                capped = true;
            }
            line.extend_from_slice(&chunk[..chunk.len().min(room)]);
            let used = if found_newline { chunk.len() + 1 } else { chunk.len() };
            (found_newline, used)
        };
        reader.consume(used);
        consumed_any = true;
        if found_newline {
            break;
        }
    }

    if !consumed_any {
        return Ok(None);
    }
    if line.last() == Some(&b'\r') {
        line.pop();
    }
    Ok(Some((line, capped)))
}
