//! The refresh engine: queries the configured provider once per in-memory
//! index and applies the response by clearing `CE_FSMONITOR_VALID` on the
//! paths it names (or on everything, for a trivial response).

use std::path::Path;

use bstr::{BStr, BString};
use git_index::{CacheChangedFlags, Index};

use crate::protocol::{self, ProviderResponse};
use crate::provider;
use crate::settings::{FsmonitorSettings, HookVersion, Provider};
use crate::tracer;
use crate::FsmonitorError;

/// Paths a single query may report before we force an eager index rewrite,
/// so the next command's relative query doesn't keep re-walking a growing
/// response.
pub const FORCE_UPDATE_THRESHOLD: usize = 100;

const IPC_FALLBACK_TOKEN: &str = "builtin:fake";

/// Run a refresh against `index` if one hasn't already run for this
/// in-memory session. No-op when no provider is configured.
pub fn refresh(
    index: &mut Index,
    settings: &FsmonitorSettings,
    work_tree: &Path,
) -> Result<(), FsmonitorError> {
    if matches!(settings.provider, Provider::Disabled) || index.fsmonitor_has_run_once() {
        return Ok(());
    }
    index.set_fsmonitor_has_run_once(true);
    tracer::region_enter("refresh");

    let last_update = index.fsmonitor_token().map(BString::from);

    let (response, next_token) = match &settings.provider {
        Provider::Disabled => unreachable!("checked above"),
        Provider::Ipc { socket_path } => query_ipc_mode(socket_path, last_update.as_ref()),
        Provider::Hook { path } => query_hook_mode(path, work_tree, last_update.as_ref(), settings.hook_version_pin),
    };

    apply_response(index, response);
    index.set_fsmonitor_token(next_token);
    tracer::region_leave("refresh");
    Ok(())
}

/// IPC never falls back to hook: a failed query (connection refused,
/// timeout, malformed response) degrades straight to the trivial branch,
/// with the token reset to the well-known fallback so the next session's
/// query is still meaningful to the daemon.
fn query_ipc_mode(socket_path: &Path, last_update: Option<&BString>) -> (Option<ProviderResponse>, BString) {
    let outcome = provider::query_ipc(socket_path, last_update).and_then(|raw| {
        let len = raw.len();
        protocol::parse_with_embedded_token(&raw).map(|resp| (resp, len))
    });

    match outcome {
        Ok((resp, len)) => {
            let token = response_token(&resp).clone();
            tracer::query_result("ipc", len, matches!(resp, ProviderResponse::Trivial { .. }));
            (Some(resp), token)
        }
        Err(e) => {
            tracer::query_failed("ipc", &e.to_string());
            (None, BString::from(IPC_FALLBACK_TOKEN))
        }
    }
}

/// Hook-mode version negotiation: `Unspecified -> V2Try -> (V2Locked |
/// V1Locked)`. A pinned version skips the trial; an unspecified one tries
/// v2 first (a hook failure, a malformed response, or an empty returned
/// token are all treated the same: fall back and lock to v1).
fn query_hook_mode(
    hook_path: &Path,
    work_tree: &Path,
    last_update: Option<&BString>,
    version_pin: Option<HookVersion>,
) -> (Option<ProviderResponse>, BString) {
    let t0 = fresh_v1_token();

    // No prior token: nothing to ask the provider relative to. The parser
    // would yield Empty here anyway, so skip the call and let apply_response
    // take the trivial branch directly.
    let Some(last_update) = last_update else {
        return (None, t0);
    };

    // A v1 pin seeds the token eagerly: v1 has no embedded token of its own,
    // so the request token doubles as the token we'll store afterward.
    let mut seeded_v1_token = (version_pin == Some(HookVersion::V1)).then(|| t0.clone());

    if version_pin != Some(HookVersion::V1) {
        let attempt = provider::query_hook(hook_path, work_tree, HookVersion::V2, &last_update.to_string())
            .map_err(|e| e.to_string())
            .and_then(|raw| {
                let len = raw.len();
                protocol::parse_with_embedded_token(&raw)
                    .map(|resp| (resp, len))
                    .map_err(|e| e.to_string())
            });

        match attempt {
            Ok((resp, len)) => {
                tracer::query_result("hook", len, matches!(resp, ProviderResponse::Trivial { .. }));
                let token = response_token(&resp).clone();
                return (Some(resp), token);
            }
            Err(reason) => tracer::query_failed("hook", &reason),
        }

        if version_pin == Some(HookVersion::V2) {
            // Pinned to v2 with no fallback defined: degrade to the trivial
            // branch, keeping whatever token we already had.
            return (None, last_update.clone());
        }
        // Unspecified and v2 failed (exec error, malformed response, or an
        // empty returned token): lock to v1 for the rest of this query.
    }

    let v1_token = seeded_v1_token.take().unwrap_or_else(|| t0.clone());
    match provider::query_hook(hook_path, work_tree, HookVersion::V1, &last_update.to_string()) {
        Ok(raw) => {
            let resp = protocol::parse_without_token(&raw, v1_token.clone());
            tracer::query_result("hook", raw.len(), matches!(resp, ProviderResponse::Trivial { .. }));
            (Some(resp), v1_token)
        }
        Err(e) => {
            tracer::query_failed("hook", &e.to_string());
            (None, v1_token)
        }
    }
}

fn response_token(resp: &ProviderResponse) -> &BString {
    match resp {
        ProviderResponse::Paths { token, .. } => token,
        ProviderResponse::Trivial { token } => token,
    }
}

fn fresh_v1_token() -> BString {
    let nanos = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_nanos())
        .unwrap_or(0);
    BString::from(nanos.to_string())
}

/// Branch A/B of the apply-results step: a path list clears validity on the
/// named entries (and forces a rewrite past the threshold); a trivial or
/// failed query clears validity on everything that had it set.
fn apply_response(index: &mut Index, response: Option<ProviderResponse>) {
    match response {
        Some(ProviderResponse::Paths { paths, .. }) => {
            for path in &paths {
                if let Some(dir) = path.strip_suffix(b"/") {
                    index.clear_fsmonitor_valid_for_prefix(BStr::new(dir));
                    if let Some(cache) = index.untracked_cache_mut() {
                        cache.invalidate_path(BStr::new(dir));
                    }
                } else {
                    index.clear_fsmonitor_valid_for_path(BStr::new(path));
                    if let Some(cache) = index.untracked_cache_mut() {
                        cache.invalidate_path(BStr::new(path));
                    }
                }
            }
            if let Some(cache) = index.untracked_cache_mut() {
                cache.use_fsmonitor = true;
            }
            if paths.len() > FORCE_UPDATE_THRESHOLD {
                tracer::force_update(paths.len(), FORCE_UPDATE_THRESHOLD);
                index.mark_cache_changed(CacheChangedFlags::FSMONITOR_CHANGED);
            }
        }
        Some(ProviderResponse::Trivial { .. }) | None => {
            if index.clear_fsmonitor_valid_all() {
                index.mark_cache_changed(CacheChangedFlags::FSMONITOR_CHANGED);
            }
            if let Some(cache) = index.untracked_cache_mut() {
                cache.use_fsmonitor = false;
            }
        }
    }
}
