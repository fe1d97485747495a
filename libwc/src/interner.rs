use crate::path::WcPath;
use rustc_hash::FxHashMap;
use std::cell::RefCell;

// Interns working-copy relpaths so `WcPath` can be a `Copy` type.
// Allocations are leaked; the set of distinct relpaths a process touches is
// bounded by the working copies it opens.
#[derive(Default)]
pub(crate) struct Interner {
    map: FxHashMap<&'static str, WcPath>,
}

impl Interner {
    pub fn intern_path(&mut self, s: &str) -> WcPath {
        if let Some(&path) = self.map.get(s) {
            return path;
        }
        let interned: &'static str = Box::leak(s.to_owned().into_boxed_str());
        let path = WcPath::new(interned);
        self.map.insert(interned, path);
        path
    }
}

thread_local! {
    static INTERNER: RefCell<Interner> = RefCell::new(Interner::prefilled());
}

impl Interner {
    fn prefilled() -> Self {
        let mut interner = Self::default();
        interner.map.insert("", WcPath::EMPTY);
        interner
    }
}

pub(crate) fn with_path_interner<R>(f: impl FnOnce(&mut Interner) -> R) -> R {
    INTERNER.with(|interner| f(&mut *interner.borrow_mut()))
}
