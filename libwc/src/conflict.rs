use crate::checksum::Checksum;
use crate::db::{NodeKind, Revision};
use crate::path::WcPath;
use crate::props::PropConflict;
use std::fmt::{self, Display, Formatter};

/// the operation that raised a conflict
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Update,
    Switch,
    /// recorded by merges; the update-move resolver rejects these
    Merge,
}

/// a repository-side version of a node, as referenced by a conflict
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeVersion {
    pub repos_relpath: WcPath,
    pub revision: Revision,
    pub kind: Option<NodeKind>,
}

impl NodeVersion {
    pub fn new(repos_relpath: WcPath, revision: Revision, kind: Option<NodeKind>) -> Self {
        Self { repos_relpath, revision, kind }
    }

    /// the same version addressed `subpath` below this one
    pub fn subversion(&self, subpath: WcPath, kind: Option<NodeKind>) -> Self {
        Self { repos_relpath: self.repos_relpath.join(subpath), revision: self.revision, kind }
    }
}

/// why the local side is in the way of the incoming change
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConflictReason {
    Edited,
    Deleted,
    MovedAway,
    Unversioned,
}

/// what the incoming change wanted to do
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConflictAction {
    Add,
    Delete,
    Edit,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TreeConflictInfo {
    pub reason: ConflictReason,
    pub action: ConflictAction,
    /// for `MovedAway`: the op-root of the move source
    pub move_src_op_root: Option<WcPath>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextConflictInfo {
    pub old_pristine: Checksum,
    pub new_pristine: Checksum,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PropConflictInfo {
    pub conflicts: Vec<PropConflict>,
}

/// the persisted description of a pending conflict on one node
///
/// created on first detection, written at commit, and cleared only by an
/// explicit resolve
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConflictSkel {
    pub operation: Operation,
    pub old: NodeVersion,
    pub new: NodeVersion,
    pub text: Option<TextConflictInfo>,
    pub props: Option<PropConflictInfo>,
    pub tree: Option<TreeConflictInfo>,
}

impl ConflictSkel {
    pub fn new(operation: Operation, old: NodeVersion, new: NodeVersion) -> Self {
        Self { operation, old, new, text: None, props: None, tree: None }
    }

    pub fn with_tree(mut self, tree: TreeConflictInfo) -> Self {
        self.tree = Some(tree);
        self
    }

    pub fn with_text(mut self, text: TextConflictInfo) -> Self {
        self.text = Some(text);
        self
    }

    pub fn with_props(mut self, props: PropConflictInfo) -> Self {
        self.props = Some(props);
        self
    }

    /// a second tree conflict on the same node is only acceptable when it
    /// describes the same disagreement
    pub fn tree_compatible_with(&self, other: &Self) -> bool {
        match (&self.tree, &other.tree) {
            (Some(a), Some(b)) => a == b,
            _ => true,
        }
    }

    /// folds `other` into `self`, preferring newly supplied payloads
    pub fn absorb(&mut self, other: Self) {
        if other.text.is_some() {
            self.text = other.text;
        }
        if other.props.is_some() {
            self.props = other.props;
        }
        if other.tree.is_some() {
            self.tree = other.tree;
        }
    }
}

impl Display for ConflictReason {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let s = match self {
            ConflictReason::Edited => "edited",
            ConflictReason::Deleted => "deleted",
            ConflictReason::MovedAway => "moved away",
            ConflictReason::Unversioned => "unversioned",
        };
        write!(f, "{}", s)
    }
}

impl Display for ConflictAction {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let s = match self {
            ConflictAction::Add => "add",
            ConflictAction::Delete => "delete",
            ConflictAction::Edit => "edit",
        };
        write!(f, "{}", s)
    }
}
