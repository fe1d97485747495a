use crate::checksum::Checksum;
use crate::path::WcPath;

/// a deferred filesystem effect
///
/// items are spooled in visit order inside the resolver's transaction and
/// performed by the external work-queue executor after commit; the executor
/// contract is idempotent on replay, so re-spooling a deletion is harmless
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WorkItem {
    /// install the file at `path`; from the pristine when given, otherwise
    /// materialize it empty
    FileInstall {
        path: WcPath,
        pristine: Option<Checksum>,
        /// re-record size/timestamp info after the install
        record_info: bool,
    },
    FileRemove {
        path: WcPath,
    },
    DirInstall {
        path: WcPath,
    },
    DirRemove {
        path: WcPath,
    },
    /// produced by the file merger: apply its three-way text merge outcome
    /// to the working file
    TextMerge {
        path: WcPath,
        old_pristine: Checksum,
        new_pristine: Checksum,
    },
    /// write conflict marker files next to the node from its recorded
    /// conflict skeleton
    ConflictMarkers {
        path: WcPath,
    },
}

impl WorkItem {
    pub fn path(&self) -> WcPath {
        match *self {
            WorkItem::FileInstall { path, .. }
            | WorkItem::FileRemove { path }
            | WorkItem::DirInstall { path }
            | WorkItem::DirRemove { path }
            | WorkItem::TextMerge { path, .. }
            | WorkItem::ConflictMarkers { path } => path,
        }
    }
}
