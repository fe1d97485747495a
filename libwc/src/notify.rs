use crate::db::{NodeKind, Revision};
use crate::path::WcPath;
use std::fmt::{self, Display, Formatter};

/// what the resolver did to a path; spooled during the transaction and handed
/// to the notification sink only after commit
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotifyAction {
    UpdateAdd,
    UpdateUpdate,
    UpdateDelete,
    TreeConflict,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotifyState {
    /// the state does not apply to this action (e.g. content of a directory add)
    Inapplicable,
    Unchanged,
    Changed,
    Merged,
    Conflicted,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub path: WcPath,
    pub action: NotifyAction,
    pub kind: NodeKind,
    pub content_state: NotifyState,
    pub prop_state: NotifyState,
    pub old_revision: Revision,
    pub new_revision: Revision,
}

impl Notification {
    pub fn new(path: WcPath, action: NotifyAction, kind: NodeKind) -> Self {
        Self {
            path,
            action,
            kind,
            content_state: NotifyState::Inapplicable,
            prop_state: NotifyState::Inapplicable,
            old_revision: Revision::INVALID,
            new_revision: Revision::INVALID,
        }
    }

    pub fn with_states(mut self, content: NotifyState, props: NotifyState) -> Self {
        self.content_state = content;
        self.prop_state = props;
        self
    }

    pub fn with_revisions(mut self, old: Revision, new: Revision) -> Self {
        self.old_revision = old;
        self.new_revision = new;
        self
    }
}

impl Display for NotifyAction {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let s = match self {
            NotifyAction::UpdateAdd => "A",
            NotifyAction::UpdateUpdate => "U",
            NotifyAction::UpdateDelete => "D",
            NotifyAction::TreeConflict => "C",
        };
        write!(f, "{}", s)
    }
}

impl Display for Notification {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.action, self.path)
    }
}
