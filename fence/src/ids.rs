use serde::Deserialize;
use uuid::Uuid;

use crate::BlockId;

/// Produces block identifiers for one render pass.
///
/// A generator must never hand out the same id twice between resets.
pub trait IdGenerator {
    fn next_id(&mut self) -> BlockId;

    /// Return the generator to its initial state.
    fn reset(&mut self);
}

/// Random v4 UUIDs in simple (hyphen-free) form.
#[derive(Debug, Default, Clone, Copy)]
pub struct RandomIds;

impl IdGenerator for RandomIds {
    fn next_id(&mut self) -> BlockId {
        BlockId::new(Uuid::new_v4().simple().to_string())
    }

    fn reset(&mut self) {}
}

/// `{prefix}1`, `{prefix}2`, ... for reproducible output.
#[derive(Debug, Clone)]
pub struct SequentialIds {
    prefix: String,
    start: u64,
    next: u64,
}

impl SequentialIds {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self::starting_at(prefix, 1)
    }

    /// Seed the sequence at `start` instead of 1. `reset` returns here.
    pub fn starting_at(prefix: impl Into<String>, start: u64) -> Self {
        SequentialIds {
            prefix: prefix.into(),
            start,
            next: start,
        }
    }
}

impl IdGenerator for SequentialIds {
    fn next_id(&mut self) -> BlockId {
        let id = BlockId::new(format!("{}{}", self.prefix, self.next));
        self.next += 1;
        id
    }

    fn reset(&mut self) {
        self.next = self.start;
    }
}

/// Which generator a render pass gets. Each pass builds its own instance so
/// concurrent renders never share counter state.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IdScheme {
    #[default]
    Random,
    Sequential {
        #[serde(default = "default_prefix")]
        prefix: String,
    },
}

fn default_prefix() -> String {
    "block_id_".to_string()
}

impl IdScheme {
    pub fn sequential() -> Self {
        IdScheme::Sequential {
            prefix: default_prefix(),
        }
    }

    pub fn generator(&self) -> Box<dyn IdGenerator> {
        match self {
            IdScheme::Random => Box::new(RandomIds),
            IdScheme::Sequential { prefix } => Box::new(SequentialIds::new(prefix.clone())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::collections::HashSet;

    #[test]
    fn sequential_ids_count_from_one() {
        let mut ids = SequentialIds::new("block_id_");
        assert_eq!(ids.next_id().as_str(), "block_id_1");
        assert_eq!(ids.next_id().as_str(), "block_id_2");
        assert_eq!(ids.next_id().as_str(), "block_id_3");
    }

    #[test]
    fn reset_restarts_at_seed() {
        let mut ids = SequentialIds::starting_at("b", 7);
        assert_eq!(ids.next_id().as_str(), "b7");
        assert_eq!(ids.next_id().as_str(), "b8");
        ids.reset();
        assert_eq!(ids.next_id().as_str(), "b7");
    }

    #[test]
    fn random_ids_do_not_collide() {
        let mut ids = RandomIds;
        let seen: HashSet<BlockId> = (0..500).map(|_| ids.next_id()).collect();
        assert_eq!(seen.len(), 500);
    }

    #[test]
    fn each_scheme_generator_is_independent() {
        let scheme = IdScheme::sequential();
        let mut first = scheme.generator();
        let mut second = scheme.generator();
        assert_eq!(first.next_id().as_str(), "block_id_1");
        assert_eq!(first.next_id().as_str(), "block_id_2");
        assert_eq!(second.next_id().as_str(), "block_id_1");
    }
}
