use std::path::PathBuf;

use serde::{Deserialize, Serialize};

pub const DEFAULT_TEMP_PREFIX: &str = "fotree";
pub const DEFAULT_TEMP_SUFFIX: &str = ".tmp";
pub const DEFAULT_BUFFER_SIZE: usize = 128 * 1024;

/// Per-call settings for every factory entry point that may materialize
/// content into a temporary file (URL and archive entry dispatch).
///
/// Nothing in here is stored on the resulting sources.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct InvocationConfig {
    /// Directory temporary files are created in.
    pub temp_dir: PathBuf,
    pub temp_prefix: String,
    pub temp_suffix: String,
    /// Size of the read and write buffers used while copying streams.
    pub buffer_size: usize,
}

impl Default for InvocationConfig {
    fn default() -> Self {
        Self {
            temp_dir: std::env::temp_dir(),
            temp_prefix: DEFAULT_TEMP_PREFIX.to_string(),
            temp_suffix: DEFAULT_TEMP_SUFFIX.to_string(),
            buffer_size: DEFAULT_BUFFER_SIZE,
        }
    }
}

impl InvocationConfig {
    pub fn with_temp_dir(mut self, temp_dir: impl Into<PathBuf>) -> Self {
        self.temp_dir = temp_dir.into();
        self
    }

    /// The buffer size to actually use. A zero-sized buffer would make a
    /// buffered reader report EOF immediately, so it falls back to the default.
    pub fn effective_buffer_size(&self) -> usize {
        if self.buffer_size == 0 {
            DEFAULT_BUFFER_SIZE
        } else {
            self.buffer_size
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deserialize_partial() {
        let config: InvocationConfig =
            serde_json::from_str(r#"{"temp_dir": "/var/tmp/fotree", "buffer_size": 4096}"#)
                .expect("must parse");

        assert_eq!(PathBuf::from("/var/tmp/fotree"), config.temp_dir);
        assert_eq!(4096, config.buffer_size);
        assert_eq!(DEFAULT_TEMP_PREFIX, config.temp_prefix);
        assert_eq!(DEFAULT_TEMP_SUFFIX, config.temp_suffix);
    }

    #[test]
    fn deserialize_rejects_unknown() {
        serde_json::from_str::<InvocationConfig>(r#"{"tmpdir": "/tmp"}"#)
            .expect_err("unknown field must be rejected");
    }

    #[test]
    fn zero_buffer_falls_back() {
        let config = InvocationConfig {
            buffer_size: 0,
            ..Default::default()
        };
        assert_eq!(DEFAULT_BUFFER_SIZE, config.effective_buffer_size());
    }
}
