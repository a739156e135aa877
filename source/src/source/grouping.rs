use serde::{Deserialize, Serialize};

use super::{Aggregate, Identity, SourceCore, SourceKind, Unit};
use crate::input::InputAccessor;

/// Groups units that belong together but share no backing resource.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClumpSource {
    core: SourceCore,
}

impl ClumpSource {
    pub(crate) fn new() -> Self {
        Self {
            core: SourceCore::new(),
        }
    }
}

impl Unit for ClumpSource {
    fn core(&self) -> &SourceCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut SourceCore {
        &mut self.core
    }

    fn kind(&self) -> SourceKind {
        SourceKind::Clump
    }

    fn identity(&self) -> Identity {
        Identity::Clump(self.core.id())
    }

    fn input(&self) -> InputAccessor {
        InputAccessor::Empty
    }
}

impl Aggregate for ClumpSource {}

/// The top-level grouping of several independently named inputs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileSetSource {
    core: SourceCore,
}

impl FileSetSource {
    pub(crate) fn new() -> Self {
        Self {
            core: SourceCore::new(),
        }
    }
}

impl Unit for FileSetSource {
    fn core(&self) -> &SourceCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut SourceCore {
        &mut self.core
    }

    fn kind(&self) -> SourceKind {
        SourceKind::FileSet
    }

    fn identity(&self) -> Identity {
        Identity::FileSet(self.core.id())
    }

    fn input(&self) -> InputAccessor {
        InputAccessor::Empty
    }
}

impl Aggregate for FileSetSource {}
