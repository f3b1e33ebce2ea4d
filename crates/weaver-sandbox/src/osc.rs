//! Command-boundary markers embedded in shell output.
//!
//! The sandbox shell reports command boundaries with private OSC sequences:
//!
//! ```text
//! ESC ] 654 ; <name> [= <code> [: <extra>]] BEL
//! ```
//!
//! `prompt` is emitted whenever the shell is idle and ready for input,
//! `exit=<code>` after every command.

/// Start of every marker.
pub const MARKER_PREFIX: &str = "\x1b]654;";

/// Terminator of every marker.
pub const MARKER_END: char = '\x07';

/// Unterminated markers longer than this are passed through as text.
const MAX_MARKER_LEN: usize = 256;

/// Name of the marker emitted when the shell waits for input.
pub const PROMPT: &str = "prompt";

/// Name of the marker emitted after a command finishes.
pub const EXIT: &str = "exit";

/// A parsed marker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OscMarker {
    pub name: String,
    pub code: Option<i32>,
    pub extra: Option<String>,
}

impl OscMarker {
    /// Parse the text between the prefix and BEL.
    pub fn parse(body: &str) -> Self {
        let (name, rest) = match body.split_once('=') {
            Some((name, rest)) => (name, Some(rest)),
            None => (body, None),
        };
        let (code, extra) = match rest {
            Some(rest) => match rest.split_once(':') {
                Some((code, extra)) => (code, Some(extra.to_string())),
                None => (rest, None),
            },
            None => ("", None),
        };
        Self {
            name: name.to_string(),
            code: code.trim().parse().ok(),
            extra,
        }
    }

    pub fn is(&self, name: &str) -> bool {
        self.name == name
    }

    /// Render back to the wire form.
    pub fn encode(&self) -> String {
        let mut out = format!("{MARKER_PREFIX}{}", self.name);
        if let Some(code) = self.code {
            out.push('=');
            out.push_str(&code.to_string());
            if let Some(extra) = &self.extra {
                out.push(':');
                out.push_str(extra);
            }
        }
        out.push(MARKER_END);
        out
    }
}

/// Output of [`OscScanner::push`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    Text(String),
    Marker(OscMarker),
}

/// Incremental marker scanner.
///
/// Chunks may split a marker anywhere; the incomplete part is held back
/// until the next chunk arrives.
#[derive(Debug, Default)]
pub struct OscScanner {
    pending: String,
}

impl OscScanner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed a chunk, returning the text and markers completed so far.
    pub fn push(&mut self, chunk: &str) -> Vec<Segment> {
        self.pending.push_str(chunk);
        let buffer = std::mem::take(&mut self.pending);
        let mut segments = Vec::new();
        let mut rest = buffer.as_str();

        loop {
            let Some(start) = rest.find(MARKER_PREFIX) else {
                let keep = partial_prefix_len(rest);
                let (text, tail) = rest.split_at(rest.len() - keep);
                push_text(&mut segments, text);
                self.pending = tail.to_string();
                break;
            };

            push_text(&mut segments, &rest[..start]);
            let body_start = start + MARKER_PREFIX.len();
            match rest[body_start..].find(MARKER_END) {
                Some(end) => {
                    let body = &rest[body_start..body_start + end];
                    segments.push(Segment::Marker(OscMarker::parse(body)));
                    rest = &rest[body_start + end + MARKER_END.len_utf8()..];
                }
                None if rest.len() - start > MAX_MARKER_LEN => {
                    // Not one of ours; let it through
                    push_text(&mut segments, &rest[start..]);
                    break;
                }
                None => {
                    self.pending = rest[start..].to_string();
                    break;
                }
            }
        }

        segments
    }

    /// Return whatever is held back as plain text.
    pub fn finish(&mut self) -> Option<String> {
        if self.pending.is_empty() {
            None
        } else {
            Some(std::mem::take(&mut self.pending))
        }
    }
}

fn push_text(segments: &mut Vec<Segment>, text: &str) {
    if text.is_empty() {
        return;
    }
    if let Some(Segment::Text(last)) = segments.last_mut() {
        last.push_str(text);
    } else {
        segments.push(Segment::Text(text.to_string()));
    }
}

/// Length of the longest suffix of `text` that is a proper prefix of the marker.
fn partial_prefix_len(text: &str) -> usize {
    let max = (MARKER_PREFIX.len() - 1).min(text.len());
    (1..=max)
        .rev()
        .find(|&k| text.ends_with(&MARKER_PREFIX[..k]))
        .unwrap_or(0)
}

/// Remove terminal escape sequences.
///
/// Handles CSI (`ESC [ ... final`), OSC (`ESC ] ... BEL` or `ESC ] ... ESC \`)
/// and two-character escapes. Backspaces and other C0 controls except tab,
/// newline and carriage return are dropped too.
pub fn strip_ansi(text: &str) -> String {
    let mut result = String::with_capacity(text.len());
    let mut chars = text.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '\t' | '\n' | '\r' => result.push(c),
            '\x1b' => match chars.peek() {
                Some('[') => {
                    chars.next();
                    // Parameters and intermediates, then one final byte
                    for next in chars.by_ref() {
                        if ('\x40'..='\x7e').contains(&next) {
                            break;
                        }
                    }
                }
                Some(']') => {
                    chars.next();
                    while let Some(next) = chars.next() {
                        if next == '\x07' {
                            break;
                        }
                        if next == '\x1b' {
                            if chars.peek() == Some(&'\\') {
                                chars.next();
                            }
                            break;
                        }
                    }
                }
                Some(_) => {
                    chars.next();
                }
                None => {}
            },
            c if c.is_ascii_control() => {}
            _ => result.push(c),
        }
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;

    fn marker(name: &str, code: Option<i32>) -> Segment {
        Segment::Marker(OscMarker {
            name: name.to_string(),
            code,
            extra: code.map(|_| "0".to_string()),
        })
    }

    #[test]
    fn test_parse_marker_bodies() {
        assert_eq!(
            OscMarker::parse("exit=127:0"),
            OscMarker {
                name: "exit".to_string(),
                code: Some(127),
                extra: Some("0".to_string()),
            }
        );
        let prompt = OscMarker::parse("prompt");
        assert!(prompt.is(PROMPT));
        assert_eq!(prompt.code, None);
        assert_eq!(OscMarker::parse("exit=-1").code, Some(-1));
        assert_eq!(OscMarker::parse("exit=abc").code, None);
    }

    #[test]
    fn test_encode_parses_back() {
        let marker = OscMarker {
            name: EXIT.to_string(),
            code: Some(2),
            extra: Some("0".to_string()),
        };
        assert_eq!(marker.encode(), "\x1b]654;exit=2:0\x07");
    }

    #[test]
    fn test_scan_single_chunk() {
        let mut scanner = OscScanner::new();
        let segments = scanner.push("out\n\x1b]654;exit=1:0\x07$ \x1b]654;prompt\x07");
        assert_eq!(
            segments,
            vec![
                Segment::Text("out\n".to_string()),
                marker("exit", Some(1)),
                Segment::Text("$ ".to_string()),
                Segment::Marker(OscMarker::parse("prompt")),
            ]
        );
        assert_eq!(scanner.finish(), None);
    }

    #[test]
    fn test_scan_marker_split_everywhere() {
        let input = "ab\x1b]654;exit=3:0\x07cd";
        for split in 1..input.len() {
            if !input.is_char_boundary(split) {
                continue;
            }
            let mut scanner = OscScanner::new();
            let mut segments = scanner.push(&input[..split]);
            segments.extend(scanner.push(&input[split..]));

            let text: String = segments
                .iter()
                .filter_map(|s| match s {
                    Segment::Text(t) => Some(t.as_str()),
                    Segment::Marker(_) => None,
                })
                .collect();
            let markers: Vec<_> = segments
                .iter()
                .filter(|s| matches!(s, Segment::Marker(_)))
                .collect();
            assert_eq!(text, "abcd", "split at {split}");
            assert_eq!(markers, vec![&marker("exit", Some(3))], "split at {split}");
        }
    }

    #[test]
    fn test_lookalike_escape_passes_through() {
        let mut scanner = OscScanner::new();
        let segments = scanner.push("\x1b]0;title\x07done");
        assert_eq!(
            segments,
            vec![Segment::Text("\x1b]0;title\x07done".to_string())]
        );
    }

    #[test]
    fn test_runaway_marker_is_flushed() {
        let mut scanner = OscScanner::new();
        let long = format!("{MARKER_PREFIX}{}", "x".repeat(MAX_MARKER_LEN + 1));
        let segments = scanner.push(&long);
        assert_eq!(segments, vec![Segment::Text(long)]);
    }

    #[test]
    fn test_strip_ansi() {
        assert_eq!(strip_ansi("\x1b[1;32mgreen\x1b[0m"), "green");
        assert_eq!(strip_ansi("a\x1b]0;title\x07b"), "ab");
        assert_eq!(strip_ansi("a\x1b]8;;x\x1b\\b"), "ab");
        assert_eq!(strip_ansi("line\r\n\tnext"), "line\r\n\tnext");
        assert_eq!(strip_ansi("bell\x07"), "bell");
    }
}
