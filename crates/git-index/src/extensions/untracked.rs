//! Untracked cache extension (UNTR).
//!
//! Caches which directories have no untracked files, avoiding full directory
//! scans on `git status`. For now we preserve the raw bytes for round-trip
//! compatibility but don't interpret the data, beyond a narrow handle the
//! fsmonitor subsystem needs to coordinate with it.

use bstr::BStr;

/// Narrow stand-in for the untracked-path cache's fsmonitor-facing surface.
///
/// The untracked cache's own directory-scan bookkeeping is out of scope here;
/// this type only carries the one flag and the one invalidation call the
/// fsmonitor refresh/lifecycle logic needs to drive.
#[derive(Debug, Clone, Default)]
pub struct UntrackedCache {
    /// Whether the untracked cache currently trusts fsmonitor-reported
    /// changes instead of re-scanning the directory tree wholesale.
    pub use_fsmonitor: bool,
}

impl UntrackedCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Notify the untracked cache that `path` (file or directory, without a
    /// trailing slash) may have changed.
    pub fn invalidate_path(&mut self, _path: &BStr) {
        // The untracked directory-scan cache itself is not modeled here; the
        // call site exists so a fuller implementation can be dropped in
        // without touching the fsmonitor refresh engine.
    }
}
