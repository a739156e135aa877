use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use url::Url;

use super::{Identity, Measurable, Named, SourceCore, SourceKind, Unit};
use crate::input::InputAccessor;
use crate::temp::Materialized;

/// A network resource, materialized into a temporary file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UrlSource {
    core: SourceCore,
    url: Url,
    name: String,
    backing: PathBuf,
    size: u64,
}

impl UrlSource {
    pub(crate) fn new(url: Url, materialized: Materialized) -> Self {
        Self {
            core: SourceCore::new_ephemeral(),
            name: url_name(&url),
            url,
            backing: materialized.path,
            size: materialized.size,
        }
    }

    pub fn url(&self) -> &Url {
        &self.url
    }
}

impl Unit for UrlSource {
    fn core(&self) -> &SourceCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut SourceCore {
        &mut self.core
    }

    fn kind(&self) -> SourceKind {
        SourceKind::Url
    }

    fn identity(&self) -> Identity {
        Identity::Url(self.url.as_str().to_lowercase())
    }

    fn input(&self) -> InputAccessor {
        InputAccessor::File {
            path: self.backing.clone(),
        }
    }

    fn content_len(&self) -> Option<u64> {
        Some(self.size)
    }

    fn ephemeral_backing(&self) -> Option<&Path> {
        Some(&self.backing)
    }
}

impl Measurable for UrlSource {
    fn starting_offset(&self) -> u64 {
        0
    }

    fn size(&self) -> u64 {
        self.size
    }
}

impl Named for UrlSource {
    fn name(&self) -> &str {
        &self.name
    }
}

/// The last non-empty path segment, or the host if the path has none.
pub(crate) fn url_name(url: &Url) -> String {
    url.path_segments()
        .and_then(|segments| segments.filter(|s| !s.is_empty()).last())
        .map(str::to_string)
        .or_else(|| url.host_str().map(str::to_string))
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use rstest::rstest;
    use url::Url;

    use super::url_name;

    #[rstest]
    #[case::file("https://example.org/a/b/report.pdf", "report.pdf")]
    #[case::trailing_slash("https://example.org/a/b/", "b")]
    #[case::no_path("https://example.org", "example.org")]
    #[case::file_scheme("file:///tmp/data.bin", "data.bin")]
    fn name(#[case] url: &str, #[case] exp: &str) {
        assert_eq!(exp, url_name(&Url::parse(url).unwrap()));
    }
}
