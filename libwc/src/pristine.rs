use crate::checksum::Checksum;
use crate::error::WcResult;
use std::path::PathBuf;

/// resolves content-addressed pristine text to a local on-disk path
///
/// the store is a collaborator: the resolver never reads pristine bytes
/// itself, it only hands resolved paths to the file merger and to install
/// work items; resolution must not perform network work
pub trait PristineStore {
    fn pristine_path(&self, checksum: &Checksum) -> WcResult<PathBuf>;

    fn has_pristine(&self, checksum: &Checksum) -> bool {
        self.pristine_path(checksum).is_ok()
    }
}
