//! Attach/detach/reconcile: the transitions a repository goes through when
//! `core.fsmonitor`/`core.useBuiltinFSMonitor` change between commands, or
//! when an index freshly read from disk needs its restored dirty bitmap
//! folded into entry flags before the first refresh.

use std::path::Path;

use git_index::{CacheChangedFlags, Index};

use crate::refresh;
use crate::settings::{FsmonitorSettings, Provider};
use crate::tracer;
use crate::FsmonitorError;

/// Turn fsmonitor tracking on for an index that has none yet: seeds a fresh
/// token, clears `CE_FSMONITOR_VALID` everywhere (nothing is known clean
/// relative to a token that was just invented), and runs an initial
/// refresh.
pub fn attach(index: &mut Index, settings: &FsmonitorSettings, work_tree: &Path) -> Result<(), FsmonitorError> {
    if index.fsmonitor_token().is_some() {
        return Ok(());
    }
    tracer::region_enter("attach");

    index.mark_cache_changed(CacheChangedFlags::FSMONITOR_CHANGED);
    index.set_fsmonitor_token(fresh_token());
    index.clear_fsmonitor_valid_all();

    if index.untracked_cache().is_none() {
        index.set_untracked_cache(Some(git_index::UntrackedCache::new()));
    }
    if let Some(cache) = index.untracked_cache_mut() {
        cache.use_fsmonitor = true;
    }

    refresh::refresh(index, settings, work_tree)?;
    tracer::region_leave("attach");
    Ok(())
}

/// Turn fsmonitor tracking off: drop the token so no FSMN extension is
/// written and the next attach starts clean.
pub fn detach(index: &mut Index) {
    if index.fsmonitor_token().is_none() {
        return;
    }
    tracer::region_enter("detach");
    index.mark_cache_changed(CacheChangedFlags::FSMONITOR_CHANGED);
    index.clear_fsmonitor_token();
    tracer::region_leave("detach");
}

/// Reconcile the bitmap restored from the on-disk FSMN extension (if any)
/// against the freshly loaded entries, then attach/refresh/detach per the
/// current settings. Call this once per index load, before any other
/// fsmonitor operation.
pub fn reconcile(index: &mut Index, settings: &FsmonitorSettings, work_tree: &Path) -> Result<(), FsmonitorError> {
    let enabled = !matches!(settings.provider, Provider::Disabled);

    if let Some(bitmap) = index.take_fsmonitor_restored_bitmap() {
        if enabled {
            index.set_fsmonitor_valid_all();
            index.clear_fsmonitor_valid_at_bitmap_positions(bitmap.iter_set_bits());
            refresh::refresh(index, settings, work_tree)?;
        }
    }

    if enabled {
        attach(index, settings, work_tree)
    } else {
        detach(index);
        Ok(())
    }
}

fn fresh_token() -> bstr::BString {
    let nanos = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_nanos())
        .unwrap_or(0);
    bstr::BString::from(nanos.to_string())
}
