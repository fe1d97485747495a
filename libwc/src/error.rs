use crate::db::Revision;
use crate::path::WcPath;
use std::fmt::{self, Display, Formatter};

pub type WcResult<T> = Result<T, WcGenericError>;
pub type WcGenericError = anyhow::Error;

// anyhow carries everything; this enum exists for the closed set of
// conditions callers are expected to match on (see `WcErrorExt`)
#[derive(Debug)]
#[cfg_attr(test, derive(PartialEq))]
pub enum WcError {
    /// a mutation was attempted without a verified write-lock on the op-root
    NotLocked(WcPath),
    /// the caller asked to resolve a victim that carries no tree conflict
    NotInConflict(WcPath),
    /// the recorded conflict's operation is neither update nor switch
    UnsupportedConflict(WcPath),
    /// the victim has no recorded move destination
    NotMovedAway(WcPath),
    /// the move source spans multiple revisions `{1}..{2}`
    MixedRevisionSource(WcPath, Revision, Revision),
    /// the move source is under a switched URL
    SwitchedSubtree(WcPath),
    /// attempted to record a second, incompatible tree conflict on a node
    ObstructedUpdate(WcPath),
    /// any other invariant violation
    ResolverFailure(String),
    Cancelled,
}

pub trait WcErrorExt {
    fn try_into_wc_error(self) -> WcResult<WcError>;
    fn try_into_not_locked_err(self) -> WcResult<WcPath>;
    fn try_into_obstructed_update_err(self) -> WcResult<WcPath>;
}

impl WcErrorExt for WcGenericError {
    fn try_into_wc_error(self) -> WcResult<WcError> {
        self.downcast::<WcError>()
    }

    /// tries to convert the generic error into the specific error and just
    /// returns the previous error on failure
    fn try_into_not_locked_err(self) -> WcResult<WcPath> {
        match self.try_into_wc_error()? {
            WcError::NotLocked(path) => Ok(path),
            err => Err(anyhow!(err)),
        }
    }

    fn try_into_obstructed_update_err(self) -> WcResult<WcPath> {
        match self.try_into_wc_error()? {
            WcError::ObstructedUpdate(path) => Ok(path),
            err => Err(anyhow!(err)),
        }
    }
}

pub trait WcResultExt {
    fn is_cancelled_err(&self) -> bool;
    fn is_obstruction_err(&self) -> bool;
}

macro_rules! error_ext_is_method {
    ($method:ident) => {
        fn $method(&self) -> bool {
            match self {
                Ok(..) => false,
                Err(err) => err.$method(),
            }
        }
    };
}

impl<T> WcResultExt for WcResult<T> {
    error_ext_is_method!(is_cancelled_err);

    error_ext_is_method!(is_obstruction_err);
}

impl WcResultExt for WcGenericError {
    fn is_cancelled_err(&self) -> bool {
        matches!(self.downcast_ref::<WcError>(), Some(WcError::Cancelled))
    }

    fn is_obstruction_err(&self) -> bool {
        matches!(self.downcast_ref::<WcError>(), Some(WcError::ObstructedUpdate(..)))
    }
}

impl Display for WcError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            WcError::NotLocked(path) =>
                write!(f, "no write-lock held on op-root covering `{}`", path),
            WcError::NotInConflict(path) =>
                write!(f, "`{}` is not the victim of a tree conflict", path),
            WcError::UnsupportedConflict(path) => write!(
                f,
                "the tree conflict on `{}` was not raised by an update or switch",
                path
            ),
            WcError::NotMovedAway(path) =>
                write!(f, "`{}` has no recorded move destination", path),
            WcError::MixedRevisionSource(path, lo, hi) => write!(
                f,
                "cannot apply update to move source `{}` spanning revisions {}..{}",
                path, lo, hi
            ),
            WcError::SwitchedSubtree(path) =>
                write!(f, "move source `{}` contains a switched subtree", path),
            WcError::ObstructedUpdate(path) =>
                write!(f, "`{}` already carries a different tree conflict", path),
            WcError::ResolverFailure(msg) => write!(f, "update-move resolver failure: {}", msg),
            WcError::Cancelled => write!(f, "operation cancelled"),
        }
    }
}

impl std::error::Error for WcError {
}
