pub mod document;
pub mod ids;
pub mod registry;

use std::borrow::Borrow;
use std::fmt;

use serde::{Deserialize, Serialize};

pub use ids::{IdGenerator, IdScheme, RandomIds, SequentialIds};
pub use registry::BlockRegistry;

/// Opaque identifier of a code block within one render pass.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BlockId(String);

impl BlockId {
    pub fn new(id: impl Into<String>) -> Self {
        BlockId(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for BlockId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl Borrow<str> for BlockId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

/// A fenced code block as collected from a document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockIdentity {
    /// Assigned at registration; never changes afterwards.
    pub id: BlockId,
    /// First token of the fence info string. Empty when the fence has none.
    pub language: String,
    /// Raw block text, without the fence lines.
    pub code: String,
}
