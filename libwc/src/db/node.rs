use crate::checksum::Checksum;
use crate::conflict::ConflictSkel;
use crate::path::WcPath;
use crate::props::Props;
use std::fmt::{self, Display, Formatter};
use std::path::Path;

/// repository revision number
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Revision(pub u64);

impl Revision {
    /// no revision; used by notifications that carry no repository side
    pub const INVALID: Self = Self(u64::MAX);

    pub fn is_valid(self) -> bool {
        self != Self::INVALID
    }
}

impl Display for Revision {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        if self.is_valid() { write!(f, "r{}", self.0) } else { write!(f, "-") }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeKind {
    File,
    Dir,
    Symlink,
}

impl NodeKind {
    pub fn is_dir(self) -> bool {
        matches!(self, NodeKind::Dir)
    }

    /// what is actually sitting on disk at `path`, if anything
    // symlinks are not followed: an unversioned symlink is its own kind of
    // obstruction, not whatever it points at
    pub fn of_disk(path: &Path) -> Option<Self> {
        let meta = std::fs::symlink_metadata(path).ok()?;
        let ft = meta.file_type();
        if ft.is_symlink() {
            Some(NodeKind::Symlink)
        } else if ft.is_dir() {
            Some(NodeKind::Dir)
        } else {
            Some(NodeKind::File)
        }
    }
}

impl Display for NodeKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let s = match self {
            NodeKind::File => "file",
            NodeKind::Dir => "dir",
            NodeKind::Symlink => "symlink",
        };
        write!(f, "{}", s)
    }
}

/// what a node-table row says about its path at one op-depth
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Presence {
    Normal,
    NotPresent,
    /// records only that a lower layer is shadowed by a delete rooted above
    BaseDeleted,
    Excluded,
    Incomplete,
    Deleted,
}

impl Presence {
    pub fn is_deletion(self) -> bool {
        matches!(self, Presence::BaseDeleted | Presence::NotPresent | Presence::Deleted)
    }
}

/// one layer of one node
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeRow {
    pub presence: Presence,
    pub kind: NodeKind,
    pub revision: Revision,
    pub repos_relpath: WcPath,
    /// pristine content address; files only
    pub checksum: Option<Checksum>,
    pub props: Props,
    /// set on the op-root row of a move source delete layer
    pub moved_to: Option<WcPath>,
    /// set on the op-root row of a move destination
    pub moved_here: bool,
}

impl NodeRow {
    pub fn normal(kind: NodeKind, revision: Revision, repos_relpath: WcPath) -> Self {
        Self {
            presence: Presence::Normal,
            kind,
            revision,
            repos_relpath,
            checksum: None,
            props: Props::new(),
            moved_to: None,
            moved_here: false,
        }
    }

    pub fn base_deleted(kind: NodeKind) -> Self {
        Self {
            presence: Presence::BaseDeleted,
            kind,
            revision: Revision::INVALID,
            repos_relpath: WcPath::EMPTY,
            checksum: None,
            props: Props::new(),
            moved_to: None,
            moved_here: false,
        }
    }

    pub fn with_checksum(mut self, checksum: Checksum) -> Self {
        self.checksum = Some(checksum);
        self
    }

    pub fn with_props(mut self, props: Props) -> Self {
        self.props = props;
        self
    }

    pub fn with_moved_to(mut self, moved_to: WcPath) -> Self {
        self.moved_to = Some(moved_to);
        self
    }

    pub fn with_moved_here(mut self) -> Self {
        self.moved_here = true;
        self
    }

    pub fn is_visible(&self) -> bool {
        self.presence == Presence::Normal
    }

    /// content identity of a layer row: what the layer-replacement
    /// postcondition compares (move linkage is location bookkeeping, not
    /// content)
    pub fn same_content(&self, other: &Self) -> bool {
        self.presence == other.presence
            && self.kind == other.kind
            && self.revision == other.revision
            && self.repos_relpath == other.repos_relpath
            && self.checksum == other.checksum
            && self.props == other.props
    }
}

/// per-path working overrides: actual props and the recorded conflict
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ActualRow {
    pub props: Option<Props>,
    pub conflict: Option<ConflictSkel>,
}

impl ActualRow {
    pub fn is_empty(&self) -> bool {
        self.props.is_none() && self.conflict.is_none()
    }
}
