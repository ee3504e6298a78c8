//! Session-level bookkeeping the fsmonitor subsystem needs from `Index`:
//! the last-update token, the dirty bitmap restored from disk, the
//! rewrite-trigger flags, and the handful of bulk entry operations a
//! refresh/reconcile pass performs against live entries.

use bstr::{BStr, BString};

use crate::{CacheChangedFlags, EwahBitmap, Index, UntrackedCache};

impl Index {
    /// The token the current dirty-set (in-memory and on-disk) is relative to.
    pub fn fsmonitor_token(&self) -> Option<&BStr> {
        self.fsmonitor_last_update.as_deref()
    }

    /// Record a new last-update token, superseding whatever dirty-set was
    /// relative to the previous one.
    pub fn set_fsmonitor_token(&mut self, token: BString) {
        self.fsmonitor_last_update = Some(token);
    }

    /// Drop the last-update token entirely. No FSMN extension is written
    /// while the token is absent.
    pub fn clear_fsmonitor_token(&mut self) {
        self.fsmonitor_last_update = None;
    }

    /// Take the bitmap restored from the on-disk FSMN extension, if any.
    /// Consumes it: a second call returns `None`.
    pub fn take_fsmonitor_restored_bitmap(&mut self) -> Option<EwahBitmap> {
        self.fsmonitor_restored_bitmap.take()
    }

    /// Whether a refresh has already run once against this in-memory index.
    pub fn fsmonitor_has_run_once(&self) -> bool {
        self.fsmonitor_has_run_once
    }

    pub fn set_fsmonitor_has_run_once(&mut self, val: bool) {
        self.fsmonitor_has_run_once = val;
    }

    /// Accumulated reasons the index needs to be rewritten before exit.
    pub fn cache_changed(&self) -> CacheChangedFlags {
        self.cache_changed
    }

    /// Record a reason the index needs to be rewritten.
    pub fn mark_cache_changed(&mut self, reason: CacheChangedFlags) {
        self.cache_changed |= reason;
    }

    /// Whether this index is a split index. Split indices suppress the
    /// bitmap-rank-vs-entry-count assertion, since the base index's entries
    /// aren't all present in this in-memory copy.
    pub fn is_split_index(&self) -> bool {
        self.split_index
    }

    pub fn set_split_index(&mut self, val: bool) {
        self.split_index = val;
    }

    /// The untracked-path cache's fsmonitor-facing handle, if the index
    /// carries one.
    pub fn untracked_cache(&self) -> Option<&UntrackedCache> {
        self.untracked.as_ref()
    }

    pub fn untracked_cache_mut(&mut self) -> Option<&mut UntrackedCache> {
        self.untracked.as_mut()
    }

    pub fn set_untracked_cache(&mut self, cache: Option<UntrackedCache>) {
        self.untracked = cache;
    }

    /// Number of live (non-tombstoned) entries. The dirty bitmap's bit
    /// positions are indices into this subsequence, not into `entries`
    /// directly.
    pub fn live_count(&self) -> usize {
        self.entries.iter().filter(|e| !e.flags.removed).count()
    }

    /// Mutable access to every entry, in index order. Used by the refresh
    /// engine to flip `fsmonitor_valid` without going through the
    /// path-keyed `add`/`get` API.
    pub fn entries_mut(&mut self) -> impl Iterator<Item = &mut crate::IndexEntry> {
        self.entries.iter_mut()
    }

    /// Clear `CE_FSMONITOR_VALID` on every live entry. Used when a trivial
    /// or failed response means "assume nothing is known to be clean".
    /// Returns whether any entry actually changed.
    pub fn clear_fsmonitor_valid_all(&mut self) -> bool {
        let mut changed = false;
        for entry in self.entries.iter_mut().filter(|e| !e.flags.removed) {
            if entry.flags.fsmonitor_valid {
                entry.flags.fsmonitor_valid = false;
                changed = true;
            }
        }
        changed
    }

    /// Set `CE_FSMONITOR_VALID` on every live entry. Used when a provider
    /// attaches and reports a token with no changed paths at all.
    pub fn set_fsmonitor_valid_all(&mut self) {
        for entry in self.entries.iter_mut().filter(|e| !e.flags.removed) {
            entry.flags.fsmonitor_valid = true;
        }
    }

    /// Clear `CE_FSMONITOR_VALID` on the single entry at `path`, if present.
    pub fn clear_fsmonitor_valid_for_path(&mut self, path: &BStr) {
        for entry in self.entries.iter_mut() {
            if entry.path[..] == path[..] {
                entry.flags.fsmonitor_valid = false;
            }
        }
    }

    /// Clear `CE_FSMONITOR_VALID` on every entry whose path starts with
    /// `prefix` followed by `/` (or equals `prefix` exactly). Used when the
    /// provider reports a directory rather than individual files.
    pub fn clear_fsmonitor_valid_for_prefix(&mut self, prefix: &BStr) {
        for entry in self.entries.iter_mut() {
            let path = &entry.path[..];
            if path == &prefix[..]
                || (path.starts_with(&prefix[..]) && path.get(prefix.len()) == Some(&b'/'))
            {
                entry.flags.fsmonitor_valid = false;
            }
        }
    }

    /// Clear `CE_FSMONITOR_VALID` on the live entries at the given bitmap
    /// positions (0-based, in live-entry order).
    pub fn clear_fsmonitor_valid_at_bitmap_positions(&mut self, positions: impl Iterator<Item = u32>) {
        let wanted: std::collections::HashSet<u32> = positions.collect();
        let mut live_idx: u32 = 0;
        for entry in self.entries.iter_mut() {
            if entry.flags.removed {
                continue;
            }
            if wanted.contains(&live_idx) {
                entry.flags.fsmonitor_valid = false;
            }
            live_idx += 1;
        }
    }
}

/// Compute the dirty bitmap fresh from the current entry flags: bit `i` is
/// set when the `i`-th live entry does *not* carry `CE_FSMONITOR_VALID`.
pub(crate) fn fill_bitmap(index: &Index) -> EwahBitmap {
    let live_count = index.live_count();
    let mut dirty_positions = Vec::new();
    let mut live_idx: u32 = 0;
    for entry in index.entries.iter().filter(|e| !e.flags.removed) {
        if !entry.flags.fsmonitor_valid {
            dirty_positions.push(live_idx);
        }
        live_idx += 1;
    }
    EwahBitmap::from_positions(live_count as u32, &dirty_positions)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entry::{EntryFlags, IndexEntry, StatData};
    use crate::Stage;
    use git_hash::ObjectId;
    use git_object::FileMode;

    fn entry(path: &str, fsmonitor_valid: bool) -> IndexEntry {
        IndexEntry {
            path: BString::from(path),
            oid: ObjectId::NULL_SHA1,
            mode: FileMode::Regular,
            stage: Stage::Normal,
            stat: StatData::default(),
            flags: EntryFlags {
                fsmonitor_valid,
                ..Default::default()
            },
        }
    }

    #[test]
    fn fill_bitmap_marks_only_invalid_entries() {
        let mut idx = Index::new();
        idx.add(entry("a", true));
        idx.add(entry("b", false));
        idx.add(entry("c", true));

        let bm = fill_bitmap(&idx);
        assert_eq!(bm.bit_size(), 3);
        let set: Vec<u32> = bm.iter_set_bits().collect();
        assert_eq!(set, vec![1]);
    }

    #[test]
    fn clear_fsmonitor_valid_for_prefix_affects_only_subtree() {
        let mut idx = Index::new();
        idx.add(entry("dir/a", true));
        idx.add(entry("dir/b", true));
        idx.add(entry("dirother", true));
        idx.add(entry("other", true));

        idx.clear_fsmonitor_valid_for_prefix(BStr::new(b"dir"));

        assert!(!idx.get(BStr::new(b"dir/a"), Stage::Normal).unwrap().flags.fsmonitor_valid);
        assert!(!idx.get(BStr::new(b"dir/b"), Stage::Normal).unwrap().flags.fsmonitor_valid);
        assert!(idx.get(BStr::new(b"dirother"), Stage::Normal).unwrap().flags.fsmonitor_valid);
        assert!(idx.get(BStr::new(b"other"), Stage::Normal).unwrap().flags.fsmonitor_valid);
    }

    #[test]
    fn cache_changed_accumulates() {
        let mut idx = Index::new();
        assert_eq!(idx.cache_changed(), CacheChangedFlags::empty());
        idx.mark_cache_changed(CacheChangedFlags::FSMONITOR_CHANGED);
        assert!(idx.cache_changed().contains(CacheChangedFlags::FSMONITOR_CHANGED));
    }
}
