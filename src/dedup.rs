//! Per-identity regeneration gate.
//!
//! Two strategies, selected by configuration: an in-run set of seen
//! identities, or the persistent author-version check against the media
//! store. The persistent variant needs no explicit `record` call because
//! the publish path inserts the record itself.

use std::collections::HashSet;

use crate::media::{MediaError, MediaStore};

pub enum DedupGate<'a> {
    Ephemeral { seen: HashSet<String> },
    Persistent { store: &'a MediaStore },
}

impl<'a> DedupGate<'a> {
    pub fn ephemeral() -> Self {
        DedupGate::Ephemeral {
            seen: HashSet::new(),
        }
    }

    pub fn persistent(store: &'a MediaStore) -> Self {
        DedupGate::Persistent { store }
    }

    pub async fn should_skip(&self, identity: &str) -> Result<bool, MediaError> {
        match self {
            DedupGate::Ephemeral { seen } => Ok(seen.contains(identity)),
            DedupGate::Persistent { store } => store.is_current(identity).await,
        }
    }

    pub fn record(&mut self, identity: &str) {
        if let DedupGate::Ephemeral { seen } = self {
            seen.insert(identity.to_string());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn ephemeral_gate_skips_only_seen_identities() {
        let mut gate = DedupGate::ephemeral();
        assert!(!gate.should_skip("3001_Red").await.unwrap());

        gate.record("3001_Red");
        assert!(gate.should_skip("3001_Red").await.unwrap());
        assert!(!gate.should_skip("3001_Blue").await.unwrap());
    }
}
