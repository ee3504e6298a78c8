//! Thin wrapper over `tracing` for the fsmonitor-specific event names, kept
//! separate so the refresh/lifecycle code reads like the trace points it's
//! named after rather than ad hoc `tracing::debug!` calls scattered around.

use tracing::{debug, info, warn};

pub fn region_enter(label: &str) {
    debug!(target: "fsmonitor", region = label, "enter");
}

pub fn region_leave(label: &str) {
    debug!(target: "fsmonitor", region = label, "leave");
}

pub fn query_result(label: &str, response_len: usize, trivial: bool) {
    info!(
        target: "fsmonitor",
        region = label,
        response_len,
        trivial,
        "query result"
    );
}

pub fn query_failed(label: &str, reason: &str) {
    warn!(target: "fsmonitor", region = label, reason, "query failed");
}

pub fn force_update(count: usize, threshold: usize) {
    info!(
        target: "fsmonitor",
        count,
        threshold,
        "forcing index rewrite: changed-path count exceeded threshold"
    );
}
