#![deny(rust_2018_idioms)]

//! The update-move resolver of a versioned working copy.
//!
//! A working copy records pending local operations as stacked node layers
//! keyed by op-depth. When an incoming update touches a subtree the user has
//! moved away, the move destination must be brought up to date as if the
//! update had run before the move. This crate owns that reconciliation: the
//! node store, the lockstep tree walk, conflict detection and recording, the
//! layer replacement that finalizes the move destination, and the bump fast
//! path for moves the update can fast-forward without an editor drive.

#[macro_use]
extern crate anyhow;

#[macro_use]
extern crate log;

#[cfg(test)]
#[macro_use]
extern crate maplit;

#[cfg(test)]
#[macro_use(quickcheck)]
extern crate quickcheck_macros;

#[cfg(test)]
pub mod test_utils;

mod interner;

pub mod cancel;
pub mod checksum;
pub mod conflict;
pub mod db;
pub mod error;
pub mod merge;
pub mod notify;
pub mod path;
pub mod pristine;
pub mod props;
pub mod update_move;
pub mod workqueue;
