use fence::{BlockId, BlockIdentity, BlockRegistry, IdGenerator};

use crate::client::HighlightClient;
use crate::correlator::{HighlightResult, plain_markup, resolve};

/// How the single flush of a render ended.
#[derive(Debug, Clone, PartialEq)]
pub enum FlushOutcome {
    /// The service answered (possibly without some blocks), or there was
    /// nothing to send.
    Completed(HighlightResult),
    /// The request failed; every block renders with fallback markup.
    Failed,
}

#[derive(Debug, Clone, PartialEq)]
pub enum RenderState {
    /// No code block seen yet.
    Idle,
    /// Blocks are being registered; nothing has been fetched.
    Collecting,
    /// The one fetch of this render has happened (or was skipped).
    Flushed(FlushOutcome),
}

/// Per-render bridge between a tree walk and the highlighting service.
///
/// The walk calls `register` for each code block and keeps the returned id
/// as a placeholder. The first `resolve` flushes every registered block to
/// the service in one request; later calls reuse that answer.
pub struct DeferredRenderer<'c> {
    client: &'c HighlightClient,
    registry: BlockRegistry,
    state: RenderState,
    fetches: usize,
}

impl<'c> DeferredRenderer<'c> {
    pub fn new(client: &'c HighlightClient, ids: Box<dyn IdGenerator>) -> Self {
        DeferredRenderer {
            client,
            registry: BlockRegistry::new(ids),
            state: RenderState::Idle,
            fetches: 0,
        }
    }

    /// Register a code block and get the id its placeholder should carry.
    pub fn register(&mut self, language: &str, code: &str) -> BlockId {
        match self.state {
            RenderState::Idle => self.state = RenderState::Collecting,
            RenderState::Collecting => {}
            RenderState::Flushed(_) => {
                log::debug!("code block registered after flush; it will use fallback markup")
            }
        }
        self.registry.register(language, code)
    }

    /// Final markup for a placeholder. Triggers the flush on first use.
    /// Unhighlighted blocks get `plain_markup`.
    pub fn resolve(&mut self, id: &BlockId) -> String {
        self.resolve_with(id, |block| plain_markup(&block.language, &block.code))
    }

    /// Like `resolve`, with the caller producing markup for blocks the
    /// service did not highlight.
    pub fn resolve_with(
        &mut self,
        id: &BlockId,
        fallback: impl FnOnce(&BlockIdentity) -> String,
    ) -> String {
        self.flush();

        let Some(block) = self.registry.get(id.as_str()) else {
            log::warn!("no code block registered under id {id}");
            return String::new();
        };

        let empty = HighlightResult::default();
        let result = match &self.state {
            RenderState::Flushed(FlushOutcome::Completed(result)) => result,
            _ => &empty,
        };
        resolve(block, result, fallback)
    }

    /// Send the pending batch, at most once per render. An empty batch
    /// completes without contacting the service.
    pub fn flush(&mut self) {
        if matches!(self.state, RenderState::Flushed(_)) {
            return;
        }

        let batch = self.registry.drain();
        let outcome = if batch.is_empty() {
            log::debug!("no code blocks to highlight; skipping request");
            FlushOutcome::Completed(HighlightResult::default())
        } else {
            self.fetches += 1;
            match self.client.try_fetch(&batch) {
                Ok(result) => {
                    log::debug!(
                        "highlighted {} of {} code block(s)",
                        result.len(),
                        batch.len()
                    );
                    FlushOutcome::Completed(result)
                }
                Err(err) => {
                    log::warn!(
                        "highlighting failed, rendering {} code block(s) unhighlighted: {err}",
                        batch.len()
                    );
                    FlushOutcome::Failed
                }
            }
        };
        self.state = RenderState::Flushed(outcome);
    }

    pub fn state(&self) -> &RenderState {
        &self.state
    }

    /// Requests issued so far; never more than one.
    pub fn fetch_count(&self) -> usize {
        self.fetches
    }
}
