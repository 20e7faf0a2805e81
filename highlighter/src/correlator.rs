use std::collections::HashMap;
use std::collections::HashSet;

use fence::{BlockId, BlockIdentity};
use pulldown_cmark::{CodeBlockKind, CowStr, Event, Tag, TagEnd, html};

use crate::wire::Fragment;

/// Highlighted markup keyed by block id. A requested id can be missing;
/// that block falls back when resolved.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct HighlightResult {
    fragments: HashMap<BlockId, String>,
}

impl HighlightResult {
    pub fn get(&self, id: &str) -> Option<&str> {
        self.fragments.get(id).map(String::as_str)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.fragments.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.fragments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fragments.is_empty()
    }
}

/// Match response fragments to the blocks that were requested.
///
/// Matching is by id only; response order is irrelevant. Fragments for ids
/// that were not requested are dropped. When the same id appears more than
/// once, the last fragment wins.
pub fn correlate(
    requested: &[BlockIdentity],
    fragments: impl IntoIterator<Item = Fragment>,
) -> HighlightResult {
    let known: HashSet<&str> = requested.iter().map(|block| block.id.as_str()).collect();
    let mut result = HighlightResult::default();

    for fragment in fragments {
        if !known.contains(fragment.id.as_str()) {
            log::debug!("ignoring fragment for unknown block id {}", fragment.id);
            continue;
        }
        result
            .fragments
            .insert(BlockId::new(fragment.id), fragment.wrapped);
    }

    result
}

/// Markup for one block: the service's fragment when there is one,
/// otherwise whatever `fallback(block)` produces.
pub fn resolve(
    block: &BlockIdentity,
    result: &HighlightResult,
    fallback: impl FnOnce(&BlockIdentity) -> String,
) -> String {
    match result.get(block.id.as_str()) {
        Some(markup) => markup.to_string(),
        None => fallback(block),
    }
}

/// An escaped `<pre><code>` for `code`, with a `language-*` class when there
/// is a language.
///
/// Rebuilt from the stored block, so a block whose only content was a blank
/// line comes out empty. Callers holding the parsed events should write
/// those instead.
pub fn plain_markup(language: &str, code: &str) -> String {
    let text = if code.is_empty() {
        None
    } else {
        Some(Event::Text(CowStr::from(format!("{code}\n"))))
    };
    let events = std::iter::once(Event::Start(Tag::CodeBlock(CodeBlockKind::Fenced(
        CowStr::Borrowed(language),
    ))))
    .chain(text)
    .chain(std::iter::once(Event::End(TagEnd::CodeBlock)));

    let mut out = String::with_capacity(code.len() + 48);
    html::push_html(&mut out, events);
    out
}
