//! Talks to whichever provider `FsmonitorSettings` resolved to: a hook
//! script shelled out per query, or a long-lived daemon reached over a
//! Unix domain socket.

use std::io::{Read, Write};
use std::os::unix::net::UnixStream;
use std::path::Path;
use std::time::Duration;

use bstr::BString;
use git_utils::subprocess::{GitCommand, StdioMode};

use crate::settings::{HookVersion, Provider};
use crate::FsmonitorError;

/// Hook queries are capped at this many bytes of combined stdout capture
/// before the first read; matches the provider's own framing, not a hard
/// response-size limit.
pub const HOOK_CAPTURE_CHUNK: usize = 1024;

const IPC_FALLBACK_TOKEN: &str = "builtin:fake";

const IPC_CONNECT_TIMEOUT: Duration = Duration::from_millis(500);

/// Query the IPC daemon for changes since `last_update` (or the fallback
/// token, if this is the first query of the session).
pub fn query_ipc(socket_path: &Path, last_update: Option<&BString>) -> Result<Vec<u8>, FsmonitorError> {
    let token = last_update
        .map(|t| t.to_string())
        .unwrap_or_else(|| IPC_FALLBACK_TOKEN.to_string());

    let mut stream = UnixStream::connect(socket_path)
        .map_err(|e| FsmonitorError::IpcFailed(e.to_string()))?;
    stream
        .set_read_timeout(Some(IPC_CONNECT_TIMEOUT))
        .map_err(|e| FsmonitorError::IpcFailed(e.to_string()))?;

    let mut request = token.into_bytes();
    request.push(0);
    stream
        .write_all(&request)
        .map_err(|e| FsmonitorError::IpcFailed(e.to_string()))?;
    stream
        .shutdown(std::net::Shutdown::Write)
        .map_err(|e| FsmonitorError::IpcFailed(e.to_string()))?;

    let mut raw = Vec::with_capacity(HOOK_CAPTURE_CHUNK);
    stream
        .read_to_end(&mut raw)
        .map_err(|e| FsmonitorError::IpcFailed(e.to_string()))?;

    Ok(raw)
}

/// Invoke the configured hook for a single, specific protocol version and
/// token; no negotiation happens here, that's the refresh engine's job.
///
/// The hook is run through the system shell (`sh -c '<path> "$@"'`) rather
/// than exec'd directly: `core.fsmonitor` is conventionally a path, but
/// real configurations sometimes point at a one-liner shell snippet, and
/// git's own hook invocation is shell-interpreted for the same reason.
/// Version and token are passed as positional shell parameters rather than
/// interpolated into the script text, so neither can smuggle in shell
/// syntax of its own.
pub fn query_hook(
    hook_path: &Path,
    work_tree: &Path,
    version: HookVersion,
    token: &str,
) -> Result<Vec<u8>, FsmonitorError> {
    let version_num = match version {
        HookVersion::V1 => "1",
        HookVersion::V2 => "2",
    };

    let result = GitCommand::new("sh")
        .arg("-c")
        .arg(format!("{} \"$@\"", hook_path.display()))
        .arg("fsmonitor-hook")
        .arg(version_num)
        .arg(token)
        .working_dir(work_tree)
        .stdout(StdioMode::Pipe)
        .stderr(StdioMode::Null)
        .timeout(Duration::from_secs(10))
        .run()
        .map_err(|e| FsmonitorError::HookFailed(e.to_string()))?;

    if !result.success() {
        return Err(FsmonitorError::HookFailed(format!(
            "hook exited with status {:?}",
            result.status.code()
        )));
    }
    Ok(result.stdout)
}
