use serde::{Deserialize, Serialize};

use super::{Identity, Measurable, SourceCore, SourceKind, Unit};
use crate::input::InputAccessor;
use crate::resource::ByteRange;
use crate::SourceId;

/// A range of bytes inside its parent. Always a child, never a root.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ByteStreamSource {
    core: SourceCore,
    parent: SourceId,
    range: ByteRange,
    input: InputAccessor,
}

impl ByteStreamSource {
    pub(crate) fn new(parent: SourceId, range: ByteRange, input: InputAccessor) -> Self {
        Self {
            core: SourceCore::new(),
            parent,
            range,
            input,
        }
    }

    pub fn parent(&self) -> SourceId {
        self.parent
    }

    /// The range, relative to the parent's content.
    pub fn range(&self) -> ByteRange {
        self.range
    }
}

impl Unit for ByteStreamSource {
    fn core(&self) -> &SourceCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut SourceCore {
        &mut self.core
    }

    fn kind(&self) -> SourceKind {
        SourceKind::ByteStream
    }

    fn identity(&self) -> Identity {
        Identity::ByteStream {
            parent: self.parent,
            start: self.range.start(),
            size: self.range.size(),
        }
    }

    fn input(&self) -> InputAccessor {
        self.input.clone()
    }

    fn content_len(&self) -> Option<u64> {
        Some(self.range.size())
    }
}

impl Measurable for ByteStreamSource {
    fn starting_offset(&self) -> u64 {
        self.range.start()
    }

    fn size(&self) -> u64 {
        self.range.size()
    }

    fn ending_offset(&self) -> u64 {
        self.range.end()
    }
}
