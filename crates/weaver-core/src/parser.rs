//! Streaming parser for action tags in generated text.
//!
//! The parser is fed the cumulative text of a turn each time more of it
//! arrives. It resumes from where it stopped, so text is scanned once, and it
//! returns only the newly visible part of the text. Action bodies never reach
//! the visible output; a marker takes their place.
//!
//! ```text
//! Intro <boltAction type="shell">npm test</boltAction> Outro
//! ```
//!
//! Tags can be split across calls anywhere. Text that only looks like the
//! start of a tag is held back until it is disproven and then passed through.

use crate::action::{Action, ActionId, ActionKind};
use crate::config::ParserConfig;
use crate::patch;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, warn};

/// Opening token of an action tag.
pub const OPEN_TAG: &str = "<boltAction";

/// Closing token of an action tag.
pub const CLOSE_TAG: &str = "</boltAction>";

/// An action as seen by the parser.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedAction {
    pub id: ActionId,
    pub kind: ActionKind,
    pub path: Option<String>,
    /// Empty on open, partial while streaming, cleaned on close.
    pub content: String,
}

impl ParsedAction {
    /// The executable action for the current content.
    pub fn to_action(&self) -> Action {
        let path = self.path.clone().unwrap_or_default();
        let content = self.content.clone();
        match &self.kind {
            ActionKind::File => Action::File { path, content },
            ActionKind::Modify => Action::Modify {
                path,
                modifications: patch::parse_blocks(&content),
            },
            ActionKind::Shell => Action::Shell { command: content },
            ActionKind::Start => Action::Start { command: content },
            ActionKind::Build => Action::Build { command: content },
            ActionKind::Unknown(kind) => Action::Unknown {
                kind: kind.clone(),
                content,
            },
        }
    }
}

/// Receives action notifications while parsing.
pub trait ParserListener {
    fn action_opened(&mut self, _action: &ParsedAction) {}

    /// In-progress content of an open file action.
    fn action_stream(&mut self, _action: &ParsedAction) {}

    fn action_closed(&mut self, _action: &ParsedAction) {}
}

impl ParserListener for () {}

/// A recorded parser notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParserEvent {
    Opened(ParsedAction),
    Stream(ParsedAction),
    Closed(ParsedAction),
}

/// Collects every notification in order.
impl ParserListener for Vec<ParserEvent> {
    fn action_opened(&mut self, action: &ParsedAction) {
        self.push(ParserEvent::Opened(action.clone()));
    }

    fn action_stream(&mut self, action: &ParsedAction) {
        self.push(ParserEvent::Stream(action.clone()));
    }

    fn action_closed(&mut self, action: &ParsedAction) {
        self.push(ParserEvent::Closed(action.clone()));
    }
}

type MarkerFn = Arc<dyn Fn(&ActionId) -> String + Send + Sync>;

/// Parser behavior.
#[derive(Clone)]
pub struct ParserOptions {
    /// Emit stream notifications for open file actions.
    pub stream_file_actions: bool,
    /// Renders the visible placeholder for an action.
    pub marker: MarkerFn,
}

impl Default for ParserOptions {
    fn default() -> Self {
        Self {
            stream_file_actions: true,
            marker: Arc::new(|id: &ActionId| format!("<weaver-action id=\"{id}\"/>")),
        }
    }
}

impl ParserOptions {
    pub fn from_config(config: &ParserConfig) -> Self {
        Self {
            stream_file_actions: config.stream_file_actions,
            ..Default::default()
        }
    }

    pub fn with_marker<F>(mut self, marker: F) -> Self
    where
        F: Fn(&ActionId) -> String + Send + Sync + 'static,
    {
        self.marker = Arc::new(marker);
        self
    }
}

impl fmt::Debug for ParserOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ParserOptions")
            .field("stream_file_actions", &self.stream_file_actions)
            .finish_non_exhaustive()
    }
}

/// Cursor for one turn.
#[derive(Debug, Default)]
struct ParseState {
    /// Byte offset scanning resumes from. Inside an action this is the start
    /// of the body.
    position: usize,
    /// Inside an action, where the search for the closing tag resumes.
    search_from: usize,
    current: Option<ParsedAction>,
    next_seq: u32,
}

impl ParseState {
    fn open(&mut self, turn_id: &str, attributes: TagAttributes) -> ParsedAction {
        let id = ActionId::new(turn_id, self.next_seq);
        self.next_seq += 1;

        let kind = match attributes.kind {
            Some(kind) => ActionKind::parse(&kind),
            None => {
                warn!(action_id = %id, "Action tag without a type attribute");
                ActionKind::Unknown(String::new())
            }
        };
        if let ActionKind::Unknown(name) = &kind {
            if !name.is_empty() {
                warn!(action_id = %id, kind = %name, "Unrecognized action type");
            }
        }
        if kind.requires_path() && attributes.path.is_none() {
            warn!(action_id = %id, kind = %kind, "Action tag without a path attribute");
        }

        ParsedAction {
            id,
            kind,
            path: attributes.path,
            content: String::new(),
        }
    }
}

/// Incremental action tag parser, one cursor per turn.
#[derive(Debug, Default)]
pub struct StreamingParser {
    options: ParserOptions,
    states: HashMap<String, ParseState>,
}

impl StreamingParser {
    pub fn new(options: ParserOptions) -> Self {
        Self {
            options,
            states: HashMap::new(),
        }
    }

    /// Parse the cumulative `input` of a turn and return the new visible text.
    pub fn parse<L>(&mut self, turn_id: &str, input: &str, listener: &mut L) -> String
    where
        L: ParserListener + ?Sized,
    {
        let options = &self.options;
        let state = self.states.entry(turn_id.to_string()).or_default();
        if state.position > input.len() || !input.is_char_boundary(state.position) {
            warn!(
                turn_id,
                position = state.position,
                len = input.len(),
                "Input does not extend the text parsed so far, ignoring it"
            );
            return String::new();
        }

        let mut output = String::new();
        let mut i = state.position;

        while i < input.len() {
            if let Some(mut current) = state.current.take() {
                let from = floor_char_boundary(input, state.search_from.max(i));
                let Some(offset) = input[from..].find(CLOSE_TAG) else {
                    // Only a closing tag split across calls can start here
                    state.search_from = floor_char_boundary(
                        input,
                        input.len().saturating_sub(CLOSE_TAG.len() - 1),
                    )
                    .max(i);
                    if options.stream_file_actions && current.kind == ActionKind::File {
                        let partial = stream_content(&input[i..]);
                        if partial != current.content {
                            current.content = partial.to_string();
                            listener.action_stream(&current);
                        }
                    }
                    state.current = Some(current);
                    break;
                };

                let end = from + offset;
                state.search_from = 0;
                current.content = clean_content(&input[i..end]);
                debug!(action_id = %current.id, kind = %current.kind, "Action closed");
                listener.action_closed(&current);
                i = end + CLOSE_TAG.len();
                continue;
            }

            if input.as_bytes()[i] != b'<' {
                let next = input[i..].find('<').map_or(input.len(), |offset| i + offset);
                output.push_str(&input[i..next]);
                i = next;
                continue;
            }

            match match_open_tag(input, i) {
                OpenMatch::Incomplete => break,
                OpenMatch::Literal(end) => {
                    output.push_str(&input[i..end]);
                    i = end;
                }
                OpenMatch::Tag {
                    attributes,
                    body_start,
                } => {
                    let action = state.open(turn_id, parse_attributes(attributes));
                    debug!(action_id = %action.id, kind = %action.kind, "Action opened");
                    output.push_str(&(options.marker)(&action.id));
                    listener.action_opened(&action);
                    state.current = Some(action);
                    i = body_start;
                }
            }
        }

        state.position = i;
        output
    }

    /// Parse the final text of a turn and drop its cursor.
    ///
    /// An action still open at this point is closed with whatever body it
    /// has, and text held back as a possible tag start is released.
    pub fn finish<L>(&mut self, turn_id: &str, input: &str, listener: &mut L) -> String
    where
        L: ParserListener + ?Sized,
    {
        let mut output = self.parse(turn_id, input, listener);
        let Some(state) = self.states.remove(turn_id) else {
            return output;
        };
        let rest = input.get(state.position..).unwrap_or_default();

        match state.current {
            Some(mut current) => {
                warn!(action_id = %current.id, "Turn ended inside an action, closing it");
                current.content = clean_content(trim_partial_close(rest));
                listener.action_closed(&current);
            }
            None => output.push_str(rest),
        }
        output
    }

    /// Whether the turn is currently inside an action body.
    pub fn is_inside_action(&self, turn_id: &str) -> bool {
        self.states
            .get(turn_id)
            .is_some_and(|state| state.current.is_some())
    }
}

enum OpenMatch<'a> {
    /// Input ends before the tag could be confirmed or ruled out.
    Incomplete,
    /// Not a tag; the text up to this offset is literal.
    Literal(usize),
    Tag {
        attributes: &'a str,
        body_start: usize,
    },
}

fn match_open_tag(input: &str, start: usize) -> OpenMatch<'_> {
    let bytes = input.as_bytes();
    let token = OPEN_TAG.as_bytes();

    let mut j = start;
    for &expected in token {
        let Some(&b) = bytes.get(j) else {
            return OpenMatch::Incomplete;
        };
        if b != expected {
            // The mismatching character goes out with the literal text
            let len = input[j..].chars().next().map_or(1, char::len_utf8);
            return OpenMatch::Literal(j + len);
        }
        j += 1;
    }

    match bytes.get(j) {
        None => OpenMatch::Incomplete,
        Some(&b) if b.is_ascii_whitespace() || b == b'>' => match find_tag_end(input, j) {
            Some(gt) => OpenMatch::Tag {
                attributes: &input[j..gt],
                body_start: gt + 1,
            },
            None => OpenMatch::Incomplete,
        },
        Some(_) => OpenMatch::Literal(j),
    }
}

/// Offset of the `>` closing a tag, ignoring any inside quoted values.
fn find_tag_end(input: &str, from: usize) -> Option<usize> {
    let mut quote = None;
    for (offset, b) in input.as_bytes()[from..].iter().enumerate() {
        match (quote, *b) {
            (None, b'"' | b'\'') => quote = Some(*b),
            (Some(q), b) if b == q => quote = None,
            (None, b'>') => return Some(from + offset),
            _ => {}
        }
    }
    None
}

/// Attributes the parser cares about.
#[derive(Debug, Default, PartialEq, Eq)]
struct TagAttributes {
    kind: Option<String>,
    path: Option<String>,
}

/// Scan `name="value"` pairs out of the attribute part of a tag.
///
/// Values may be double quoted, single quoted or bare. Unknown attributes
/// are ignored.
fn parse_attributes(text: &str) -> TagAttributes {
    let bytes = text.as_bytes();
    let mut attributes = TagAttributes::default();
    let mut i = 0;

    let skip_space = |mut i: usize| {
        while i < bytes.len() && (bytes[i].is_ascii_whitespace() || bytes[i] == b'/') {
            i += 1;
        }
        i
    };

    loop {
        i = skip_space(i);
        let name_start = i;
        while i < bytes.len() && !bytes[i].is_ascii_whitespace() && !matches!(bytes[i], b'=' | b'/') {
            i += 1;
        }
        if i == name_start {
            break;
        }
        let name = &text[name_start..i];

        i = skip_space(i);
        let value = if bytes.get(i) == Some(&b'=') {
            i = skip_space(i + 1);
            match bytes.get(i) {
                Some(&q) if q == b'"' || q == b'\'' => {
                    let value_start = i + 1;
                    let value_end = bytes[value_start..]
                        .iter()
                        .position(|&b| b == q)
                        .map_or(bytes.len(), |offset| value_start + offset);
                    i = (value_end + 1).min(bytes.len());
                    &text[value_start..value_end]
                }
                _ => {
                    let value_start = i;
                    while i < bytes.len() && !bytes[i].is_ascii_whitespace() {
                        i += 1;
                    }
                    &text[value_start..i]
                }
            }
        } else {
            ""
        };

        match name {
            "type" => attributes.kind = Some(value.to_string()),
            "path" | "filePath" => attributes.path = Some(value.to_string()),
            other => debug!(attribute = other, "Ignoring action tag attribute"),
        }
    }

    attributes
}

/// Final body of a closed action: trimmed, one enclosing code fence removed,
/// one trailing newline.
pub fn clean_content(raw: &str) -> String {
    let trimmed = raw.trim();
    let inner = strip_fence(trimmed).unwrap_or(trimmed);
    format!("{inner}\n")
}

fn strip_fence(text: &str) -> Option<&str> {
    let rest = text.strip_prefix("```")?;
    let newline = rest.find('\n')?;
    if rest[..newline].contains('`') {
        return None;
    }
    let body = rest[newline + 1..].strip_suffix("```")?;
    if body.is_empty() {
        return Some(body);
    }
    let body = body.strip_suffix('\n')?;
    Some(body.strip_suffix('\r').unwrap_or(body))
}

/// Body of a still-open action for live preview: leading whitespace and an
/// opening fence line dropped, a partial closing tag held back.
fn stream_content(raw: &str) -> &str {
    let text = trim_partial_close(raw).trim_start();
    match text.strip_prefix("```") {
        Some(rest) => rest.find('\n').map_or("", |newline| &rest[newline + 1..]),
        None => text,
    }
}

/// Cumulative prefixes of `text`, growing by `chunk_size` bytes, the way a
/// streamed turn arrives.
///
/// Cuts are moved forward to the next char boundary. The last prefix is
/// always the whole text.
pub fn cumulative_chunks(text: &str, chunk_size: usize) -> impl Iterator<Item = &str> {
    let step = chunk_size.max(1);
    let mut end = 0;
    std::iter::from_fn(move || {
        if end >= text.len() {
            return None;
        }
        end = (end + step).min(text.len());
        while !text.is_char_boundary(end) {
            end += 1;
        }
        Some(&text[..end])
    })
}

/// Largest char boundary at or before `index`.
fn floor_char_boundary(text: &str, index: usize) -> usize {
    let mut index = index.min(text.len());
    while !text.is_char_boundary(index) {
        index -= 1;
    }
    index
}

/// Drop a trailing prefix of the closing tag.
fn trim_partial_close(text: &str) -> &str {
    (1..CLOSE_TAG.len())
        .rev()
        .find(|&len| text.ends_with(&CLOSE_TAG[..len]))
        .map_or(text, |len| &text[..text.len() - len])
}

#[cfg(test)]
mod tests {
    use super::*;

    const TURN: &str = "trn_1";

    fn parser() -> StreamingParser {
        StreamingParser::new(ParserOptions::default().with_marker(|_| "<marker/>".to_string()))
    }

    /// Parse `input` in chunks of `size` bytes (rounded to char boundaries).
    fn parse_chunked(input: &str, size: usize) -> (String, Vec<ParserEvent>) {
        let mut parser = parser();
        let mut events = Vec::new();
        let mut output = String::new();
        for chunk in cumulative_chunks(input, size) {
            output.push_str(&parser.parse(TURN, chunk, &mut events));
        }
        output.push_str(&parser.finish(TURN, input, &mut events));
        (output, events)
    }

    fn open_close(events: Vec<ParserEvent>) -> Vec<ParserEvent> {
        events
            .into_iter()
            .filter(|e| !matches!(e, ParserEvent::Stream(_)))
            .collect()
    }

    #[test]
    fn test_single_shell_action() {
        let input = r#"Intro <boltAction type="shell">npm test</boltAction> Outro"#;
        let mut parser = parser();
        let mut events = Vec::new();

        let output = parser.parse(TURN, input, &mut events);
        assert_eq!(output, "Intro <marker/> Outro");
        assert_eq!(events.len(), 2);

        let ParserEvent::Opened(opened) = &events[0] else {
            panic!("expected open, got {:?}", events[0]);
        };
        assert_eq!(opened.kind, ActionKind::Shell);
        assert_eq!(opened.content, "");

        let ParserEvent::Closed(closed) = &events[1] else {
            panic!("expected close, got {:?}", events[1]);
        };
        assert_eq!(closed.id, ActionId::new(TURN, 0));
        assert_eq!(closed.content, "npm test\n");
        assert_eq!(
            closed.to_action(),
            Action::Shell {
                command: "npm test\n".to_string()
            }
        );
    }

    #[test]
    fn test_file_action_fence_stripped() {
        let input = "<boltAction type=\"file\" path=\"a.txt\">```\nhello\n```</boltAction>";
        let (_, events) = parse_chunked(input, input.len());
        let Some(ParserEvent::Closed(closed)) = events.last() else {
            panic!("expected close");
        };
        assert_eq!(
            closed.to_action(),
            Action::File {
                path: "a.txt".to_string(),
                content: "hello\n".to_string()
            }
        );
    }

    #[test]
    fn test_chunk_boundary_invariance() {
        let input = concat!(
            "Let me set this up. <b>bold</b> and <boltActionX> stay.\n",
            "<boltAction type=\"file\" path=\"src/main.ts\">\n```ts\nconsole.log(\"héllo\");\n```\n</boltAction>\n",
            "Then <boltAction type='shell'>npm install</boltAction>",
            "<boltAction type=\"modify\" path=\"src/main.ts\">\n<<<<<<< SEARCH\nhéllo\n=======\nworld\n>>>>>>> REPLACE\n</boltAction>",
            " and finally <boltAction type=\"start\">npm run dev</boltAction> done. <bolt",
        );

        let (expected_output, expected_events) = parse_chunked(input, input.len());
        let expected_events = open_close(expected_events);
        assert_eq!(expected_events.len(), 8);
        assert!(expected_output.contains("<b>bold</b> and <boltActionX> stay."));
        assert!(expected_output.ends_with(" done. <bolt"));

        for size in 1..input.len() {
            let (output, events) = parse_chunked(input, size);
            assert_eq!(output, expected_output, "chunk size {size}");
            assert_eq!(open_close(events), expected_events, "chunk size {size}");
        }
    }

    #[test]
    fn test_sequence_numbers_per_turn() {
        let mut parser = parser();
        let mut events = Vec::new();
        let text = "<boltAction type=\"shell\">a</boltAction><boltAction type=\"shell\">b</boltAction>";
        parser.parse("trn_a", text, &mut events);
        parser.parse("trn_b", text, &mut events);

        let ids: Vec<String> = events
            .iter()
            .filter_map(|e| match e {
                ParserEvent::Closed(a) => Some(a.id.to_string()),
                _ => None,
            })
            .collect();
        assert_eq!(ids, ["trn_a:0", "trn_a:1", "trn_b:0", "trn_b:1"]);
    }

    #[test]
    fn test_partial_tag_held_back_then_released() {
        let mut parser = parser();
        let mut events = Vec::new();
        assert_eq!(parser.parse(TURN, "Hello <boltAc", &mut events), "Hello ");
        assert_eq!(parser.parse(TURN, "Hello <boltAct", &mut events), "");
        // Disproven: the held text comes out with the mismatching character
        assert_eq!(parser.parse(TURN, "Hello <boltActs!", &mut events), "<boltActs!");
        assert!(events.is_empty());
    }

    #[test]
    fn test_file_action_streams_content() {
        let mut parser = parser();
        let mut events = Vec::new();
        let head = "<boltAction type=\"file\" path=\"index.html\">\n<html>";
        parser.parse(TURN, head, &mut events);
        parser.parse(TURN, &format!("{head}\n<body></boltAc"), &mut events);
        parser.parse(TURN, &format!("{head}\n<body></boltAc"), &mut events);
        parser.parse(TURN, &format!("{head}\n<body></boltAction>"), &mut events);

        let streamed: Vec<&str> = events
            .iter()
            .filter_map(|e| match e {
                ParserEvent::Stream(a) => Some(a.content.as_str()),
                _ => None,
            })
            .collect();
        // Unchanged content is not streamed twice
        assert_eq!(streamed, ["<html>", "<html>\n<body>"]);
        assert!(matches!(events.last(), Some(ParserEvent::Closed(a)) if a.content == "<html>\n<body>\n"));
    }

    #[test]
    fn test_close_tag_split_across_calls() {
        let mut parser = parser();
        let mut events = Vec::new();
        let head = "<boltAction type=\"shell\">npm run build";
        parser.parse(TURN, head, &mut events);
        parser.parse(TURN, &format!("{head} -- --watch</bolt"), &mut events);
        assert!(parser.is_inside_action(TURN));

        let full = format!("{head} -- --watch</boltAction> ok");
        assert_eq!(parser.parse(TURN, &full, &mut events), " ok");
        assert!(matches!(
            events.last(),
            Some(ParserEvent::Closed(a)) if a.content == "npm run build -- --watch\n"
        ));
        assert!(!parser.is_inside_action(TURN));
    }

    #[test]
    fn test_open_body_is_not_searched_again() {
        let mut parser = StreamingParser::new(ParserOptions {
            stream_file_actions: false,
            ..Default::default()
        });
        let mut input = "<boltAction type=\"file\" path=\"big.txt\">".to_string();
        parser.parse(TURN, &input, &mut ());

        for _ in 0..100 {
            input.push_str("0123456789abcdef");
            parser.parse(TURN, &input, &mut ());
            let state = &parser.states[TURN];
            assert_eq!(state.search_from, input.len() - (CLOSE_TAG.len() - 1));
        }

        input.push_str("</boltAction>");
        let mut events = Vec::new();
        parser.parse(TURN, &input, &mut events);
        assert!(matches!(
            events.as_slice(),
            [ParserEvent::Closed(a)] if a.content.len() == 1601
        ));
        assert_eq!(parser.states[TURN].search_from, 0);
    }

    #[test]
    fn test_cumulative_chunks() {
        let chunks: Vec<&str> = cumulative_chunks("abcde", 2).collect();
        assert_eq!(chunks, vec!["ab", "abcd", "abcde"]);
        assert_eq!(cumulative_chunks("abc", 0).count(), 3);
        assert_eq!(cumulative_chunks("", 3).count(), 0);
        // Cuts move forward past multi-byte chars
        let chunks: Vec<&str> = cumulative_chunks("añb", 2).collect();
        assert_eq!(chunks, vec!["añ", "añb"]);
    }

    #[test]
    fn test_floor_char_boundary() {
        let text = "aé";
        assert_eq!(floor_char_boundary(text, 2), 1);
        assert_eq!(floor_char_boundary(text, 3), 3);
        assert_eq!(floor_char_boundary(text, 9), 3);
    }

    #[test]
    fn test_streaming_can_be_disabled() {
        let mut parser = StreamingParser::new(ParserOptions {
            stream_file_actions: false,
            ..Default::default()
        });
        let mut events = Vec::new();
        parser.parse(TURN, "<boltAction type=\"file\" path=\"a\">abc", &mut events);
        assert_eq!(events.len(), 1);
        assert!(parser.is_inside_action(TURN));
    }

    #[test]
    fn test_shell_actions_do_not_stream() {
        let mut parser = parser();
        let mut events = Vec::new();
        parser.parse(TURN, "<boltAction type=\"shell\">npm i", &mut events);
        assert!(matches!(events.as_slice(), [ParserEvent::Opened(_)]));
    }

    #[test]
    fn test_finish_flushes_unterminated_action() {
        let mut parser = parser();
        let mut events = Vec::new();
        let input = "<boltAction type=\"shell\">npm run build</boltAc";
        parser.parse(TURN, input, &mut events);
        assert_eq!(parser.finish(TURN, input, &mut events), "");

        assert!(matches!(
            events.last(),
            Some(ParserEvent::Closed(a)) if a.content == "npm run build\n"
        ));
        assert!(!parser.is_inside_action(TURN));
    }

    #[test]
    fn test_unknown_type_and_missing_path_are_tolerated() {
        let mut parser = parser();
        let mut events = Vec::new();
        parser.parse(
            TURN,
            "<boltAction type=\"deploy\">x</boltAction><boltAction type=\"file\">y</boltAction><boltAction>z</boltAction>",
            &mut events,
        );
        let closed: Vec<Action> = events
            .iter()
            .filter_map(|e| match e {
                ParserEvent::Closed(a) => Some(a.to_action()),
                _ => None,
            })
            .collect();
        assert_eq!(
            closed,
            vec![
                Action::Unknown {
                    kind: "deploy".to_string(),
                    content: "x\n".to_string()
                },
                Action::File {
                    path: String::new(),
                    content: "y\n".to_string()
                },
                Action::Unknown {
                    kind: String::new(),
                    content: "z\n".to_string()
                },
            ]
        );
    }

    #[test]
    fn test_non_cumulative_input_is_ignored() {
        let mut parser = parser();
        assert_eq!(parser.parse(TURN, "hello world", &mut ()), "hello world");
        assert_eq!(parser.parse(TURN, "hi", &mut ()), "");
    }

    #[test]
    fn test_parse_attributes() {
        assert_eq!(
            parse_attributes(r#" type="file" path='src/a b.ts' extra=1 flag"#),
            TagAttributes {
                kind: Some("file".to_string()),
                path: Some("src/a b.ts".to_string())
            }
        );
        assert_eq!(
            parse_attributes(" type = shell "),
            TagAttributes {
                kind: Some("shell".to_string()),
                path: None
            }
        );
        assert_eq!(parse_attributes(""), TagAttributes::default());
        assert_eq!(
            parse_attributes(r#" type="file"#),
            TagAttributes {
                kind: Some("file".to_string()),
                path: None
            }
        );
    }

    #[test]
    fn test_quoted_gt_does_not_end_tag() {
        let mut parser = parser();
        let mut events = Vec::new();
        let output = parser.parse(
            TURN,
            r#"<boltAction type="file" path="a>b.txt">x</boltAction>"#,
            &mut events,
        );
        assert_eq!(output, "<marker/>");
        assert!(matches!(&events[0], ParserEvent::Opened(a) if a.path.as_deref() == Some("a>b.txt")));
    }

    #[test]
    fn test_clean_content() {
        assert_eq!(clean_content("  npm test \n"), "npm test\n");
        assert_eq!(clean_content("```\nhello\n```"), "hello\n");
        assert_eq!(clean_content("```tsx\nconst a = 1;\n```\n"), "const a = 1;\n");
        assert_eq!(clean_content("```\n```"), "\n");
        // Not a single enclosing fence
        assert_eq!(clean_content("```a``` b"), "```a``` b\n");
        assert_eq!(clean_content(""), "\n");
    }

    #[test]
    fn test_stream_content() {
        assert_eq!(stream_content("\n```ts\nconst a"), "const a");
        assert_eq!(stream_content("\n```ts"), "");
        assert_eq!(stream_content("abc</bolt"), "abc");
        assert_eq!(trim_partial_close("abc<"), "abc");
        assert_eq!(trim_partial_close("a < b"), "a < b");
    }
}
