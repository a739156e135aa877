use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

static NEXT_SOURCE_ID: AtomicU64 = AtomicU64::new(1);

/// Process-wide unique identifier handed to every source on construction.
///
/// Ids are only unique within the process that allocated them. Sources
/// reloaded from a file-backed store written by another process keep their
/// original ids.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SourceId(u64);

impl SourceId {
    pub(crate) fn next() -> Self {
        Self(NEXT_SOURCE_ID.fetch_add(1, Ordering::Relaxed))
    }

    pub fn get(&self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for SourceId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::SourceId;

    #[test]
    fn ids_are_increasing() {
        let a = SourceId::next();
        let b = SourceId::next();
        assert!(a < b);
        assert_ne!(a, b);
    }
}
