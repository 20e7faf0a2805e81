//! JSON shapes exchanged with the highlighting service.

use fence::{BlockId, BlockIdentity};
use serde::{Deserialize, Serialize};

/// Body of `POST {endpoint}/blocks`.
#[derive(Debug, Serialize)]
pub struct BlocksRequest<'a> {
    pub blocks: Vec<RequestBlock<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub theme: Option<&'a str>,
}

#[derive(Debug, Serialize)]
pub struct RequestBlock<'a> {
    pub id: &'a BlockId,
    pub language: &'a str,
    pub code: &'a str,
}

impl<'a> BlocksRequest<'a> {
    pub fn new(blocks: &'a [BlockIdentity], theme: Option<&'a str>) -> Self {
        BlocksRequest {
            blocks: blocks
                .iter()
                .map(|block| RequestBlock {
                    id: &block.id,
                    language: &block.language,
                    code: &block.code,
                })
                .collect(),
            theme,
        }
    }
}

/// Service reply. Fields other than these are ignored; a missing `blocks`
/// array, or a fragment without `id` or `wrapped`, fails deserialization.
#[derive(Debug, Deserialize)]
pub struct BlocksResponse {
    pub blocks: Vec<Fragment>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Fragment {
    pub id: String,
    pub wrapped: String,
}
