use fence::BlockIdentity;

use crate::config::ClientConfig;
use crate::correlator::{HighlightResult, correlate};
use crate::error::HighlightError;
use crate::transport::{Transport, UreqTransport};
use crate::wire::{BlocksRequest, BlocksResponse};

/// Request/response boundary to the highlighting service.
///
/// Holds only read-only configuration and a transport, so one client can
/// serve any number of renders, including concurrent ones.
pub struct HighlightClient {
    config: ClientConfig,
    transport: Box<dyn Transport>,
}

impl HighlightClient {
    /// Client talking HTTP with the configured timeout.
    pub fn new(config: ClientConfig) -> Self {
        let transport = UreqTransport::new(config.timeout());
        Self::with_transport(config, transport)
    }

    pub fn with_transport(config: ClientConfig, transport: impl Transport + 'static) -> Self {
        HighlightClient {
            config,
            transport: Box::new(transport),
        }
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// The part of `blocks` that goes into the request, honouring `max_blocks`.
    pub fn batch<'b>(&self, blocks: &'b [BlockIdentity]) -> &'b [BlockIdentity] {
        match self.config.max_blocks {
            Some(max) if blocks.len() > max.get() => &blocks[..max.get()],
            _ => blocks,
        }
    }

    /// JSON body for one request covering `blocks`.
    pub fn request_body(&self, blocks: &[BlockIdentity]) -> Result<String, HighlightError> {
        let request = BlocksRequest::new(self.batch(blocks), self.config.theme.as_deref());
        serde_json::to_string(&request).map_err(HighlightError::Encode)
    }

    /// Highlight `blocks` with exactly one round-trip, reporting failures.
    ///
    /// `blocks` must not be empty.
    pub fn try_fetch(&self, blocks: &[BlockIdentity]) -> Result<HighlightResult, HighlightError> {
        debug_assert!(!blocks.is_empty(), "fetch called with an empty batch");

        let sent = self.batch(blocks);
        if sent.len() < blocks.len() {
            log::warn!(
                "document has {} code blocks, sending the first {} (max_blocks)",
                blocks.len(),
                sent.len()
            );
        }

        let body = self.request_body(sent)?;
        let response = self.transport.post(
            &self.config.blocks_url(),
            self.config.api_token.as_deref(),
            &body,
        )?;

        if !response.is_success() {
            return Err(HighlightError::Status {
                status: response.status,
                body: response.body,
            });
        }

        let parsed: BlocksResponse =
            serde_json::from_str(&response.body).map_err(HighlightError::MalformedBody)?;
        Ok(correlate(sent, parsed.blocks))
    }

    /// Like `try_fetch`, but any failure yields an empty result so every
    /// block renders with fallback markup.
    pub fn fetch(&self, blocks: &[BlockIdentity]) -> HighlightResult {
        self.try_fetch(blocks).unwrap_or_else(|err| {
            log::warn!("highlighting {} block(s) failed: {err}", blocks.len());
            HighlightResult::default()
        })
    }
}

#[cfg(test)]
mod tests {
    use std::num::NonZeroUsize;
    use std::sync::Arc;

    use fence::BlockId;
    use serde_json::json;

    use super::*;
    use crate::transport::ReplayTransport;

    fn blocks(n: usize) -> Vec<BlockIdentity> {
        (1..=n)
            .map(|i| BlockIdentity {
                id: BlockId::new(format!("b{i}")),
                language: "rust".into(),
                code: format!("let x = {i};"),
            })
            .collect()
    }

    fn client(transport: &Arc<ReplayTransport>) -> HighlightClient {
        HighlightClient::with_transport(
            ClientConfig::new("https://hl.local/").with_token("tok"),
            Arc::clone(transport),
        )
    }

    #[test]
    fn one_request_for_the_whole_batch() {
        let transport = Arc::new(ReplayTransport::json(json!({
            "blocks": [
                { "id": "b2", "wrapped": "<two>" },
                { "id": "b1", "wrapped": "<one>" },
            ]
        })));
        let result = client(&transport).fetch(&blocks(3));

        assert_eq!(transport.request_count(), 1);
        assert_eq!(result.get("b1"), Some("<one>"));
        assert_eq!(result.get("b2"), Some("<two>"));
        assert_eq!(result.get("b3"), None);

        let sent = &transport.requests()[0];
        assert_eq!(sent.url, "https://hl.local/blocks");
        assert_eq!(sent.token.as_deref(), Some("tok"));
        let body = sent.json();
        let ids: Vec<&str> = body["blocks"]
            .as_array()
            .unwrap()
            .iter()
            .map(|b| b["id"].as_str().unwrap())
            .collect();
        assert_eq!(ids, ["b1", "b2", "b3"]);
    }

    #[test]
    fn non_success_status_fails_soft() {
        let transport = Arc::new(ReplayTransport::respond(503, "down for maintenance"));
        let client = client(&transport);

        let err = client.try_fetch(&blocks(2)).unwrap_err();
        assert!(matches!(err, HighlightError::Status { status: 503, .. }));
        assert!(client.fetch(&blocks(2)).is_empty());
    }

    #[test]
    fn malformed_body_fails_soft() {
        let transport = Arc::new(ReplayTransport::respond(200, "<html>not json</html>"));
        let client = client(&transport);

        assert!(matches!(
            client.try_fetch(&blocks(1)),
            Err(HighlightError::MalformedBody(_))
        ));
        assert!(client.fetch(&blocks(1)).is_empty());
    }

    #[test]
    fn schema_mismatch_fails_soft() {
        let transport = Arc::new(ReplayTransport::json(json!({ "blocks": "nope" })));
        assert!(client(&transport).fetch(&blocks(1)).is_empty());
    }

    #[test]
    fn transport_failure_fails_soft() {
        let transport = Arc::new(ReplayTransport::fail("timed out"));
        let client = client(&transport);

        assert!(matches!(
            client.try_fetch(&blocks(1)),
            Err(HighlightError::Transport(_))
        ));
        assert!(client.fetch(&blocks(1)).is_empty());
    }

    #[test]
    fn max_blocks_truncates_without_a_second_request() {
        let transport = Arc::new(ReplayTransport::json(json!({
            "blocks": [
                { "id": "b1", "wrapped": "<one>" },
                { "id": "b3", "wrapped": "<three>" },
            ]
        })));
        let client = HighlightClient::with_transport(
            ClientConfig::new("http://hl").with_max_blocks(NonZeroUsize::new(2).unwrap()),
            Arc::clone(&transport),
        );

        let result = client.fetch(&blocks(3));
        assert_eq!(transport.request_count(), 1);
        assert_eq!(transport.requests()[0].json()["blocks"].as_array().unwrap().len(), 2);
        assert_eq!(result.get("b1"), Some("<one>"));
        // b3 was never requested, so its fragment is unknown.
        assert_eq!(result.get("b3"), None);
    }

    #[test]
    fn theme_is_forwarded() {
        let transport = Arc::new(ReplayTransport::json(json!({ "blocks": [] })));
        let client = HighlightClient::with_transport(
            ClientConfig::new("http://hl").with_theme("moonlight"),
            Arc::clone(&transport),
        );
        client.fetch(&blocks(1));
        assert_eq!(transport.requests()[0].json()["theme"], "moonlight");
    }
}
