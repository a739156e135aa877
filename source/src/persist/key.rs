use data_encoding::BASE64;
use serde::{Deserialize, Serialize};

pub const STORE_KEY_LEN: usize = 32;

/// The BLAKE3 digest of a serialized source, which is the key it's stored
/// under.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StoreKey([u8; STORE_KEY_LEN]);

impl StoreKey {
    pub fn of(data: &[u8]) -> Self {
        Self(*blake3::hash(data).as_bytes())
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.0
    }
}

impl From<[u8; STORE_KEY_LEN]> for StoreKey {
    fn from(value: [u8; STORE_KEY_LEN]) -> Self {
        Self(value)
    }
}

impl From<StoreKey> for [u8; STORE_KEY_LEN] {
    fn from(value: StoreKey) -> Self {
        value.0
    }
}

impl std::fmt::Display for StoreKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "b3:{}", BASE64.encode(&self.0))
    }
}

impl std::fmt::Debug for StoreKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "b3:{}", BASE64.encode(&self.0))
    }
}
