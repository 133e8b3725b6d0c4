//! # pagesmith-git
//!
//! Local version-control operations for task working directories.
//!
//! [`WorkingCopy`] is the seam the repository lifecycle talks to. The
//! production implementation drives the `git` binary through a
//! [`GitExecutor`]; [`MemoryWorkingCopy`] keeps history in memory for tests.

mod command;
mod memory;
mod working_copy;

pub use command::{GitCommand, GitExecutor, GitOutput, MockGitExecutor};
pub use memory::{snapshot, MemoryCommit, MemoryFactory, MemoryRemotes, MemoryWorkingCopy, Tree};
pub use working_copy::{GitCliFactory, GitWorkingCopy, WorkingCopy, WorkingCopyFactory};
