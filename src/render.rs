//! Message rendering.
//!
//! [`render`] turns a [`Message`] into a structured [`Rendered`] document:
//! user text stays opaque, assistant text is parsed as a small markdown
//! subset. [`format_terminal`] lays a document out as terminal lines, one or
//! more per source line, so that formatting the complete lines of a growing
//! reply only ever appends output. [`TerminalRenderer`] relies on that to
//! print a streamed reply line by line.

use std::io::{self, Write};

use crate::conversation::{ConversationChange, ConversationObserver};
use crate::types::{Message, Role};

/// ANSI escape code for dim text (used for code block frames and notices).
const ANSI_DIM: &str = "\x1b[2m";

/// ANSI escape code for italic text (used for unlabelled fences).
const ANSI_ITALIC: &str = "\x1b[3m";

/// ANSI escape code for bold text.
const ANSI_BOLD: &str = "\x1b[1m";

/// ANSI escape code to reset all styling.
const ANSI_RESET: &str = "\x1b[0m";

/// ANSI escape code for cyan text (used for headings).
const ANSI_CYAN: &str = "\x1b[36m";

/// ANSI escape code for yellow text (used for inline code).
const ANSI_YELLOW: &str = "\x1b[33m";

/// ANSI escape code for green text (used for code block bodies).
const ANSI_GREEN: &str = "\x1b[32m";

/// ANSI escape code for red text (used for errors).
const ANSI_RED: &str = "\x1b[31m";

/// ANSI escape code for magenta text (used for list bullets).
const ANSI_MAGENTA: &str = "\x1b[35m";

/////////////////////////////////////////// Document ////////////////////////////////////////////

/// A rendered message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Rendered {
    /// Text shown exactly as entered.
    Plain(String),
    /// Parsed assistant markup.
    Rich(Vec<Block>),
}

/// A block-level element of rendered assistant text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Block {
    /// A `#` heading.
    Heading {
        /// Number of leading `#`, 1 through 6.
        level: u8,
        /// Heading text.
        spans: Vec<Inline>,
    },
    /// A `-`, `*` or `+` list item.
    ListItem {
        /// Item text.
        spans: Vec<Inline>,
    },
    /// Consecutive text lines.
    Paragraph {
        /// One entry per source line.
        lines: Vec<Vec<Inline>>,
    },
    /// A fenced block with a declared language.
    Code {
        /// First word of the fence info string.
        language: String,
        /// Raw source lines.
        lines: Vec<String>,
        /// False while the closing fence has not arrived.
        closed: bool,
    },
    /// A fenced block without a language.
    Preformatted {
        /// Raw source lines.
        lines: Vec<String>,
        /// False while the closing fence has not arrived.
        closed: bool,
    },
}

/// An inline span.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Inline {
    /// Literal text.
    Text(String),
    /// A `code` span, without the backticks.
    Code(String),
    /// A `**strong**` span, without the asterisks.
    Strong(String),
}

/// Renders a message. User text is never interpreted as markup.
pub fn render(message: &Message) -> Rendered {
    match message.role {
        Role::User => Rendered::Plain(message.content.clone()),
        Role::Assistant => Rendered::Rich(parse_blocks(&message.content)),
    }
}

//////////////////////////////////////////// Parsing ////////////////////////////////////////////

struct OpenFence {
    language: String,
    lines: Vec<String>,
}

impl OpenFence {
    fn into_block(self, closed: bool) -> Block {
        if self.language.is_empty() {
            Block::Preformatted {
                lines: self.lines,
                closed,
            }
        } else {
            Block::Code {
                language: self.language,
                lines: self.lines,
                closed,
            }
        }
    }
}

/// Parses assistant markup into blocks.
///
/// Each line is classified from the lines before it only, so the blocks of a
/// text's complete lines match the leading blocks of any longer text, with
/// the last one possibly shorter or still open.
pub fn parse_blocks(text: &str) -> Vec<Block> {
    let mut blocks = Vec::new();
    let mut paragraph: Vec<Vec<Inline>> = Vec::new();
    let mut fence: Option<OpenFence> = None;

    for line in text.lines() {
        if fence.is_some() {
            if line.trim() == "```" {
                if let Some(open) = fence.take() {
                    blocks.push(open.into_block(true));
                }
            } else if let Some(open) = fence.as_mut() {
                open.lines.push(line.to_string());
            }
            continue;
        }
        if let Some(language) = fence_language(line) {
            flush_paragraph(&mut blocks, &mut paragraph);
            fence = Some(OpenFence {
                language: language.to_string(),
                lines: Vec::new(),
            });
            continue;
        }
        if line.trim().is_empty() {
            flush_paragraph(&mut blocks, &mut paragraph);
            continue;
        }
        if let Some((level, rest)) = heading(line) {
            flush_paragraph(&mut blocks, &mut paragraph);
            blocks.push(Block::Heading {
                level,
                spans: parse_inline(rest),
            });
            continue;
        }
        if let Some(rest) = list_item(line) {
            flush_paragraph(&mut blocks, &mut paragraph);
            blocks.push(Block::ListItem {
                spans: parse_inline(rest),
            });
            continue;
        }
        paragraph.push(parse_inline(line.trim_end()));
    }

    flush_paragraph(&mut blocks, &mut paragraph);
    if let Some(open) = fence {
        blocks.push(open.into_block(false));
    }
    blocks
}

fn flush_paragraph(blocks: &mut Vec<Block>, paragraph: &mut Vec<Vec<Inline>>) {
    if !paragraph.is_empty() {
        blocks.push(Block::Paragraph {
            lines: std::mem::take(paragraph),
        });
    }
}

fn fence_language(line: &str) -> Option<&str> {
    let info = line.trim_start().strip_prefix("```")?;
    Some(info.split_whitespace().next().unwrap_or(""))
}

fn heading(line: &str) -> Option<(u8, &str)> {
    let hashes = line.bytes().take_while(|b| *b == b'#').count();
    if hashes == 0 || hashes > 6 {
        return None;
    }
    let rest = &line[hashes..];
    if rest.is_empty() {
        return Some((hashes as u8, rest));
    }
    let rest = rest.strip_prefix(' ')?;
    Some((hashes as u8, rest.trim()))
}

fn list_item(line: &str) -> Option<&str> {
    let trimmed = line.trim_start();
    ["- ", "* ", "+ "]
        .iter()
        .find_map(|marker| trimmed.strip_prefix(marker))
        .map(str::trim_end)
}

/// Splits one line into text, `code` and `**strong**` spans.
///
/// Delimiters without a partner on the same line stay literal.
pub fn parse_inline(line: &str) -> Vec<Inline> {
    let mut spans = Vec::new();
    let mut text = String::new();
    let mut rest = line;

    while let Some(ch) = rest.chars().next() {
        if let Some(after) = rest.strip_prefix("**") {
            if let Some(end) = after.find("**").filter(|end| *end > 0) {
                push_text(&mut spans, &mut text);
                spans.push(Inline::Strong(after[..end].to_string()));
                rest = &after[end + 2..];
                continue;
            }
        } else if let Some(after) = rest.strip_prefix('`') {
            if let Some(end) = after.find('`').filter(|end| *end > 0) {
                push_text(&mut spans, &mut text);
                spans.push(Inline::Code(after[..end].to_string()));
                rest = &after[end + 1..];
                continue;
            }
        }
        text.push(ch);
        rest = &rest[ch.len_utf8()..];
    }
    push_text(&mut spans, &mut text);
    spans
}

fn push_text(spans: &mut Vec<Inline>, text: &mut String) {
    if !text.is_empty() {
        spans.push(Inline::Text(std::mem::take(text)));
    }
}

/////////////////////////////////////////// Terminal ////////////////////////////////////////////

/// Lays out a rendered message as terminal lines.
///
/// Blocks are separated by one blank line, except consecutive list items.
pub fn format_lines(rendered: &Rendered, use_color: bool) -> Vec<String> {
    match rendered {
        Rendered::Plain(text) => text.lines().map(str::to_string).collect(),
        Rendered::Rich(blocks) => {
            let mut lines = Vec::new();
            let mut previous: Option<&Block> = None;
            for block in blocks {
                let adjacent = matches!(
                    (previous, block),
                    (Some(Block::ListItem { .. }), Block::ListItem { .. })
                );
                if previous.is_some() && !adjacent {
                    lines.push(String::new());
                }
                format_block(block, use_color, &mut lines);
                previous = Some(block);
            }
            lines
        }
    }
}

/// Formats a rendered message for the terminal, one `\n` after every line.
pub fn format_terminal(rendered: &Rendered, use_color: bool) -> String {
    let mut out = String::new();
    for line in format_lines(rendered, use_color) {
        out.push_str(&line);
        out.push('\n');
    }
    out
}

fn format_block(block: &Block, use_color: bool, lines: &mut Vec<String>) {
    match block {
        Block::Heading { level, spans } => {
            let text = format_spans(spans, use_color);
            if use_color {
                lines.push(format!("{ANSI_BOLD}{ANSI_CYAN}{text}{ANSI_RESET}"));
            } else {
                lines.push(format!("{} {text}", "#".repeat(*level as usize)));
            }
        }
        Block::ListItem { spans } => {
            let text = format_spans(spans, use_color);
            if use_color {
                lines.push(format!("  {ANSI_MAGENTA}•{ANSI_RESET} {text}"));
            } else {
                lines.push(format!("  • {text}"));
            }
        }
        Block::Paragraph { lines: source } => {
            for spans in source {
                lines.push(format_spans(spans, use_color));
            }
        }
        Block::Code {
            language,
            lines: source,
            closed,
        } => {
            if use_color {
                lines.push(format!("{ANSI_DIM}┌─ {language}{ANSI_RESET}"));
                for line in source {
                    lines.push(format!("{ANSI_DIM}│{ANSI_RESET} {ANSI_GREEN}{line}{ANSI_RESET}"));
                }
                if *closed {
                    lines.push(format!("{ANSI_DIM}└─{ANSI_RESET}"));
                }
            } else {
                lines.push(format!("┌─ {language}"));
                for line in source {
                    lines.push(format!("│ {line}"));
                }
                if *closed {
                    lines.push("└─".to_string());
                }
            }
        }
        Block::Preformatted { lines: source, .. } => {
            for line in source {
                if use_color {
                    lines.push(format!("    {ANSI_ITALIC}{ANSI_YELLOW}{line}{ANSI_RESET}"));
                } else {
                    lines.push(format!("    {line}"));
                }
            }
        }
    }
}

fn format_spans(spans: &[Inline], use_color: bool) -> String {
    let mut out = String::new();
    for span in spans {
        match (span, use_color) {
            (Inline::Text(text), _) => out.push_str(text),
            (Inline::Code(code), true) => {
                out.push_str(&format!("{ANSI_YELLOW}{code}{ANSI_RESET}"));
            }
            (Inline::Code(code), false) => out.push_str(&format!("`{code}`")),
            (Inline::Strong(text), true) => {
                out.push_str(&format!("{ANSI_BOLD}{text}{ANSI_RESET}"));
            }
            (Inline::Strong(text), false) => out.push_str(text),
        }
    }
    out
}

/// Formats an informational notice.
pub fn format_info(info: &str, use_color: bool) -> String {
    if use_color {
        format!("{ANSI_DIM}{info}{ANSI_RESET}")
    } else {
        info.to_string()
    }
}

/// Formats an error notice.
pub fn format_error(error: &str, use_color: bool) -> String {
    if use_color {
        format!("{ANSI_RED}Error: {error}{ANSI_RESET}")
    } else {
        format!("Error: {error}")
    }
}

/// Prints assistant replies as they stream.
///
/// While a reply grows, only lines terminated by a newline are laid out and
/// printed; the rest of the reply is printed when the turn ends. User messages
/// are not echoed since the line editor already shows them.
pub struct TerminalRenderer {
    out: Box<dyn Write + Send>,
    use_color: bool,
    printed: usize,
}

impl TerminalRenderer {
    /// Creates a renderer writing to stdout.
    pub fn new(use_color: bool) -> Self {
        Self::with_writer(Box::new(io::stdout()), use_color)
    }

    /// Creates a renderer writing to `out`.
    pub fn with_writer(out: Box<dyn Write + Send>, use_color: bool) -> Self {
        Self {
            out,
            use_color,
            printed: 0,
        }
    }

    fn print_new_lines(&mut self, text: &str) {
        let lines = format_lines(&Rendered::Rich(parse_blocks(text)), self.use_color);
        for line in lines.iter().skip(self.printed) {
            let _ = writeln!(self.out, "{line}");
        }
        self.printed = self.printed.max(lines.len());
        self.flush();
    }

    /// Flushes the writer to ensure immediate display of streamed content.
    fn flush(&mut self) {
        let _ = self.out.flush();
    }
}

impl ConversationObserver for TerminalRenderer {
    fn on_change(&mut self, change: &ConversationChange<'_>, messages: &[Message]) {
        match change {
            ConversationChange::UserAppended { .. } => {}
            ConversationChange::AssistantStarted { .. } => {
                self.printed = 0;
            }
            ConversationChange::AssistantExtended { index, delta } => {
                if !delta.contains('\n') {
                    return;
                }
                let content = &messages[*index].content;
                if let Some(end) = content.rfind('\n') {
                    self.print_new_lines(&content[..=end]);
                }
            }
            ConversationChange::AssistantEnded { index } => {
                self.print_new_lines(&messages[*index].content);
                self.printed = 0;
            }
        }
    }
}

impl std::fmt::Debug for TerminalRenderer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TerminalRenderer")
            .field("use_color", &self.use_color)
            .field("printed", &self.printed)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use super::*;
    use crate::conversation::ConversationStore;

    #[derive(Clone, Default)]
    struct SharedBuffer(Arc<Mutex<Vec<u8>>>);

    impl Write for SharedBuffer {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    impl SharedBuffer {
        fn contents(&self) -> String {
            String::from_utf8(self.0.lock().unwrap().clone()).unwrap()
        }
    }

    const SAMPLE: &str = "# Plan\n\nFirst **do** this:\n- run `cargo`\n- wait\n\n```python\nprint('hi')\n\nx = 1\n```\n\n```\nraw text\n```\nDone, *really*.\n";

    #[test]
    fn user_text_is_opaque() {
        let message = Message::user("**not bold** and `not code`");
        assert_eq!(
            render(&message),
            Rendered::Plain("**not bold** and `not code`".to_string())
        );
    }

    #[test]
    fn plain_and_fenced_text_differ() {
        let plain = render(&Message::assistant("print('hi')"));
        let fenced = render(&Message::assistant("```python\nprint('hi')\n```"));
        assert_ne!(plain, fenced);
        assert_eq!(
            fenced,
            Rendered::Rich(vec![Block::Code {
                language: "python".to_string(),
                lines: vec!["print('hi')".to_string()],
                closed: true,
            }])
        );
    }

    #[test]
    fn render_is_idempotent() {
        let message = Message::assistant(SAMPLE);
        assert_eq!(render(&message), render(&message));
        assert_eq!(message, Message::assistant(SAMPLE));
    }

    #[test]
    fn unclosed_fence_is_an_open_block() {
        let rendered = render(&Message::assistant("Here:\n```rust title\nfn main() {"));
        assert_eq!(
            rendered,
            Rendered::Rich(vec![
                Block::Paragraph {
                    lines: vec![vec![Inline::Text("Here:".to_string())]],
                },
                Block::Code {
                    language: "rust".to_string(),
                    lines: vec!["fn main() {".to_string()],
                    closed: false,
                },
            ])
        );
    }

    #[test]
    fn fence_without_language_is_preformatted() {
        let blocks = parse_blocks("```\n  indented\n```");
        assert_eq!(
            blocks,
            vec![Block::Preformatted {
                lines: vec!["  indented".to_string()],
                closed: true,
            }]
        );
    }

    #[test]
    fn inline_spans() {
        assert_eq!(
            parse_inline("use `x` and **y** but *z"),
            vec![
                Inline::Text("use ".to_string()),
                Inline::Code("x".to_string()),
                Inline::Text(" and ".to_string()),
                Inline::Strong("y".to_string()),
                Inline::Text(" but *z".to_string()),
            ]
        );
        assert_eq!(
            parse_inline("unmatched ` and ** stay"),
            vec![Inline::Text("unmatched ` and ** stay".to_string())]
        );
        assert_eq!(
            parse_inline("empty `` pair"),
            vec![Inline::Text("empty `` pair".to_string())]
        );
    }

    #[test]
    fn block_structure() {
        let blocks = parse_blocks("## Title\ntext one\ntext two\n\n* a\n+ b\n#tag");
        assert_eq!(blocks.len(), 5);
        assert_eq!(
            blocks[0],
            Block::Heading {
                level: 2,
                spans: vec![Inline::Text("Title".to_string())],
            }
        );
        assert!(matches!(&blocks[1], Block::Paragraph { lines } if lines.len() == 2));
        assert!(matches!(blocks[2], Block::ListItem { .. }));
        assert!(matches!(blocks[3], Block::ListItem { .. }));
        assert!(matches!(&blocks[4], Block::Paragraph { lines } if lines.len() == 1));
    }

    #[test]
    fn plain_layout() {
        let rendered = render(&Message::assistant("# Hi\n- `a`\n- b\n\nok **go**"));
        assert_eq!(
            format_terminal(&rendered, false),
            "# Hi\n\n  • `a`\n  • b\n\nok go\n"
        );
        assert_eq!(format_terminal(&Rendered::Plain(String::new()), false), "");
    }

    #[test]
    fn complete_line_prefixes_format_as_prefixes() {
        for use_color in [false, true] {
            let full = format_lines(&render(&Message::assistant(SAMPLE)), use_color);
            for (end, _) in SAMPLE.match_indices('\n') {
                let prefix = &SAMPLE[..=end];
                let partial = format_lines(&render(&Message::assistant(prefix)), use_color);
                assert!(
                    full.starts_with(&partial),
                    "prefix {prefix:?} formatted to {partial:?}"
                );
            }
        }
    }

    #[test]
    fn terminal_renderer_prints_completed_lines() {
        let buffer = SharedBuffer::default();
        let mut store = ConversationStore::new();
        store.subscribe(Box::new(TerminalRenderer::with_writer(
            Box::new(buffer.clone()),
            false,
        )));

        store.append_user("hi").unwrap();
        assert_eq!(buffer.contents(), "");

        store.begin_assistant_turn().unwrap();
        store.extend_assistant_turn("Hel").unwrap();
        assert_eq!(buffer.contents(), "");
        store.extend_assistant_turn("lo\nwor").unwrap();
        assert_eq!(buffer.contents(), "Hello\n");
        store.extend_assistant_turn("ld").unwrap();
        store.end_assistant_turn();
        assert_eq!(buffer.contents(), "Hello\nworld\n");

        store.append_user("again").unwrap();
        store.begin_assistant_turn().unwrap();
        store.extend_assistant_turn("- one\n- two").unwrap();
        store.end_assistant_turn();
        assert_eq!(buffer.contents(), "Hello\nworld\n  • one\n  • two\n");
    }

    #[test]
    fn notices() {
        assert_eq!(format_error("boom", false), "Error: boom");
        assert_eq!(format_info("ok", false), "ok");
        assert!(format_error("boom", true).starts_with(ANSI_RED));
    }
}
