use indexmap::IndexMap;

use crate::ids::IdGenerator;
use crate::{BlockId, BlockIdentity};

/// Collects the code blocks of a single render pass, in document order.
///
/// Blocks stay addressable by id for the whole pass; only the pending batch
/// is handed out, and only once.
pub struct BlockRegistry {
    ids: Box<dyn IdGenerator>,
    blocks: IndexMap<BlockId, BlockIdentity>,
    /// Blocks registered but not yet handed to `drain`.
    pending: Vec<BlockId>,
    drained: bool,
}

impl BlockRegistry {
    pub fn new(ids: Box<dyn IdGenerator>) -> Self {
        BlockRegistry {
            ids,
            blocks: IndexMap::new(),
            pending: Vec::new(),
            drained: false,
        }
    }

    /// Record a block and return its freshly allocated id.
    pub fn register(&mut self, language: impl Into<String>, code: impl Into<String>) -> BlockId {
        let id = self.ids.next_id();
        debug_assert!(
            !self.blocks.contains_key(&id),
            "id generator produced duplicate id {id}"
        );
        self.blocks.insert(
            id.clone(),
            BlockIdentity {
                id: id.clone(),
                language: language.into(),
                code: code.into(),
            },
        );
        self.pending.push(id.clone());
        id
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    pub fn get(&self, id: &str) -> Option<&BlockIdentity> {
        self.blocks.get(id)
    }

    pub fn is_drained(&self) -> bool {
        self.drained
    }

    /// Hand out the pending batch in registration order.
    ///
    /// Only the first call returns anything; later calls in the same pass
    /// return an empty batch even if blocks were registered in between.
    pub fn drain(&mut self) -> Vec<BlockIdentity> {
        if self.drained {
            return Vec::new();
        }
        self.drained = true;
        std::mem::take(&mut self.pending)
            .into_iter()
            .filter_map(|id| self.blocks.get(&id).cloned())
            .collect()
    }

    /// All blocks registered so far, in document order.
    pub fn blocks(&self) -> impl Iterator<Item = &BlockIdentity> {
        self.blocks.values()
    }
}
