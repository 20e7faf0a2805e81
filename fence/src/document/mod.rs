use pulldown_cmark::{CodeBlockKind, Event, Options, Parser as CmarkParser, Tag, TagEnd};

use crate::BlockId;

/// The parser options used when the caller has no preference.
pub fn default_options() -> Options {
    Options::ENABLE_STRIKETHROUGH
        | Options::ENABLE_TABLES
        | Options::ENABLE_FOOTNOTES
        | Options::ENABLE_TASKLISTS
}

/// One piece of a collected document: either a parser event that passes
/// through untouched, or the spot where a fenced code block used to be.
///
/// A placeholder keeps the block's original events, start and end tags
/// included, so an unhighlighted block can be written exactly as the parser
/// produced it.
#[derive(Debug, Clone, PartialEq)]
pub enum Segment<'a> {
    Event(Event<'a>),
    Placeholder {
        id: BlockId,
        original: Vec<Event<'a>>,
    },
}

/// A Markdown document with every fenced code block swapped for a
/// placeholder. Segment order is document order.
#[derive(Debug, Clone, Default)]
pub struct Document<'a> {
    pub segments: Vec<Segment<'a>>,
}

impl<'a> Document<'a> {
    /// Walk `source` once, calling `register(language, code)` for each fenced
    /// code block and keeping the returned id as that block's placeholder.
    pub fn collect(
        source: &'a str,
        options: Options,
        register: &mut dyn FnMut(&str, &str) -> BlockId,
    ) -> Self {
        let mut events = CmarkParser::new_ext(source, options);
        let mut segments = Vec::new();

        while let Some(event) = events.next() {
            match event {
                Event::Start(Tag::CodeBlock(CodeBlockKind::Fenced(info))) => {
                    let language = fence_language(&info);
                    let mut original = vec![Event::Start(Tag::CodeBlock(CodeBlockKind::Fenced(
                        info.clone(),
                    )))];
                    let text = collect_text_until(&mut events, &mut original, |e| {
                        matches!(e, TagEnd::CodeBlock)
                    });
                    let id = register(language, strip_line_ending(&text));
                    segments.push(Segment::Placeholder { id, original });
                }
                other => segments.push(Segment::Event(other)),
            }
        }

        Document { segments }
    }

    /// Ids of all placeholders, in document order.
    pub fn placeholders(&self) -> impl Iterator<Item = &BlockId> {
        self.segments.iter().filter_map(|segment| match segment {
            Segment::Placeholder { id, .. } => Some(id),
            Segment::Event(_) => None,
        })
    }
}

/// The language token of a fence info string, e.g. `rust` for
/// "```rust ignore".
///
/// Splits on any whitespace, while the HTML writer's `language-*` class
/// splits on spaces only; for "```rust\tignore" this returns `rust` and the
/// writer's class is `language-rust\tignore`. Unhighlighted blocks are
/// written from their original events, so they keep the writer's class.
pub fn fence_language(info: &str) -> &str {
    info.split_whitespace().next().unwrap_or("")
}

/// The code text keeps internal newlines but not the one that precedes the
/// closing fence.
fn strip_line_ending(text: &str) -> &str {
    text.strip_suffix('\n')
        .map(|t| t.strip_suffix('\r').unwrap_or(t))
        .unwrap_or(text)
}

/// Collect all text content until a matching End tag. Every event consumed,
/// the End tag included, is appended to `seen`.
fn collect_text_until<'a>(
    events: &mut impl Iterator<Item = Event<'a>>,
    seen: &mut Vec<Event<'a>>,
    is_end: impl Fn(&TagEnd) -> bool,
) -> String {
    let mut text = String::new();
    for event in events.by_ref() {
        let done = matches!(&event, Event::End(tag_end) if is_end(tag_end));
        if let Event::Text(s) = &event {
            text.push_str(s);
        }
        seen.push(event);
        if done {
            break;
        }
    }
    text
}
