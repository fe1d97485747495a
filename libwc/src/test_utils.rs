use crate::checksum::Checksum;
use crate::conflict::TextConflictInfo;
use crate::db::WcDb;
use crate::error::WcResult;
use crate::merge::{FileMerger, MergeOutcome, TextMergeResult};
use crate::path::WcPath;
use crate::pristine::PristineStore;
use crate::props::{PropChange, Props};
use crate::workqueue::WorkItem;
use std::cell::RefCell;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tempfile::TempDir;

/// a scratch working copy: a locked node store rooted in a temp directory
/// plus an on-disk pristine store
pub struct Fixture {
    pub db: WcDb,
    pub pristines: TestPristineStore,
    _tmp: TempDir,
}

impl Fixture {
    pub fn new() -> Self {
        let tmp = tempfile::tempdir().unwrap();
        let wc_root = tmp.path().join("wc");
        std::fs::create_dir(&wc_root).unwrap();
        let pristine_dir = tmp.path().join("pristine");
        std::fs::create_dir(&pristine_dir).unwrap();
        let mut db = WcDb::new(&wc_root);
        db.obtain_write_lock(WcPath::EMPTY);
        Self { db, pristines: TestPristineStore { dir: pristine_dir }, _tmp: tmp }
    }

    pub fn install_pristine(&self, contents: &str) -> Checksum {
        let checksum = Checksum::of_bytes(contents.as_bytes());
        std::fs::write(self.pristines.dir.join(checksum.to_string()), contents).unwrap();
        checksum
    }

    pub fn mkdir(&self, path: &str) {
        std::fs::create_dir_all(self.db.abspath(WcPath::intern(path))).unwrap();
    }

    pub fn write_working_file(&self, path: &str, contents: &str) {
        let abspath = self.db.abspath(WcPath::intern(path));
        std::fs::create_dir_all(abspath.parent().unwrap()).unwrap();
        std::fs::write(abspath, contents).unwrap();
    }

}

pub struct TestPristineStore {
    dir: PathBuf,
}

impl PristineStore for TestPristineStore {
    fn pristine_path(&self, checksum: &Checksum) -> WcResult<PathBuf> {
        let path = self.dir.join(checksum.to_string());
        ensure!(path.exists(), "pristine `{}` was never installed", checksum);
        Ok(path)
    }
}

/// canned merger: always reports the configured outcome and records which
/// working files it was invoked on
#[derive(Debug)]
pub struct TestMerger {
    wc_root: PathBuf,
    outcome: MergeOutcome,
    pub calls: RefCell<Vec<WcPath>>,
}

impl TestMerger {
    pub fn new(db: &WcDb, outcome: MergeOutcome) -> Self {
        Self { wc_root: db.root().to_path_buf(), outcome, calls: RefCell::new(vec![]) }
    }
}

impl FileMerger for TestMerger {
    fn merge_text(
        &self,
        old_pristine: &Path,
        new_pristine: &Path,
        working: &Path,
        _actual_props: &Props,
        _prop_changes: &[PropChange],
    ) -> WcResult<TextMergeResult> {
        let checksum_of = |pristine: &Path| {
            Checksum::from_str(pristine.file_name().unwrap().to_str().unwrap()).unwrap()
        };
        let old = checksum_of(old_pristine);
        let new = checksum_of(new_pristine);
        let path =
            WcPath::intern(working.strip_prefix(&self.wc_root).unwrap().to_str().unwrap());
        self.calls.borrow_mut().push(path);
        Ok(TextMergeResult {
            work_item: Some(WorkItem::TextMerge { path, old_pristine: old, new_pristine: new }),
            conflict: (self.outcome == MergeOutcome::Conflicted)
                .then(|| TextConflictInfo { old_pristine: old, new_pristine: new }),
            outcome: self.outcome,
        })
    }
}
