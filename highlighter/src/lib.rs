pub mod client;
pub mod config;
pub mod correlator;
pub mod error;
pub mod renderer;
pub mod transport;
pub mod wire;

use fence::document::{Document, Segment, default_options};
use fence::{BlockIdentity, BlockRegistry, IdGenerator, IdScheme};
use pulldown_cmark::{CowStr, Event, Options, html};

pub use client::HighlightClient;
pub use config::ClientConfig;
pub use correlator::{HighlightResult, plain_markup};
pub use error::{ConfigError, HighlightError, TransportError};
pub use renderer::{DeferredRenderer, FlushOutcome, RenderState};
pub use transport::{ReplayTransport, Transport, UreqTransport};

/// Markdown to HTML with fenced code blocks highlighted by the service.
///
/// Each call to `render` is an independent pass with its own registry and
/// id generator; the client is shared read-only.
pub struct Highlighter {
    client: HighlightClient,
    ids: IdScheme,
    options: Options,
}

impl Highlighter {
    pub fn new(client: HighlightClient) -> Self {
        let ids = client.config().ids.clone();
        Highlighter {
            client,
            ids,
            options: default_options(),
        }
    }

    pub fn with_ids(mut self, ids: IdScheme) -> Self {
        self.ids = ids;
        self
    }

    pub fn with_options(mut self, options: Options) -> Self {
        self.options = options;
        self
    }

    pub fn client(&self) -> &HighlightClient {
        &self.client
    }

    pub fn render(&self, markdown: &str) -> String {
        self.render_with(markdown, self.ids.generator())
    }

    /// Render with a caller-supplied id generator.
    pub fn render_with(&self, markdown: &str, ids: Box<dyn IdGenerator>) -> String {
        let mut renderer = DeferredRenderer::new(&self.client, ids);
        let document = Document::collect(markdown, self.options, &mut |language: &str, code: &str| {
            renderer.register(language, code)
        });

        let events = document.segments.into_iter().map(|segment| match segment {
            Segment::Event(event) => event,
            Segment::Placeholder { id, original } => {
                let markup = renderer.resolve_with(&id, |_| write_original(original));
                Event::Html(CowStr::from(block_html(markup)))
            }
        });

        let mut out = String::with_capacity(markdown.len() + markdown.len() / 2);
        html::push_html(&mut out, events);
        out
    }

    /// The fenced blocks of `markdown`, with ids, without contacting the
    /// service.
    pub fn blocks(&self, markdown: &str) -> Vec<BlockIdentity> {
        let mut registry = BlockRegistry::new(self.ids.generator());
        Document::collect(markdown, self.options, &mut |language: &str, code: &str| {
            registry.register(language, code)
        });
        registry.drain()
    }
}

/// An unhighlighted block, written from the events the parser produced.
fn write_original(original: Vec<Event<'_>>) -> String {
    let mut out = String::new();
    html::push_html(&mut out, original.into_iter());
    out
}

/// Block-level markup has to end its line so the next block starts fresh.
fn block_html(mut markup: String) -> String {
    if !markup.ends_with('\n') {
        markup.push('\n');
    }
    markup
}
