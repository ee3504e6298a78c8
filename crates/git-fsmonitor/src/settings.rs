//! Loads the handful of config keys that govern whether and how the
//! refresh engine talks to a filesystem-monitor provider.

use std::path::{Path, PathBuf};

use git_config::ConfigSet;
use tracing::warn;

use crate::FsmonitorError;

/// How the refresh engine reaches the provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Provider {
    /// `core.fsmonitor` unset/empty and `core.useBuiltinFSMonitor` false.
    Disabled,
    /// `core.fsmonitor` names a hook script (or a boolean-true "external"
    /// value resolved to the standard hook path).
    Hook { path: PathBuf },
    /// `core.useBuiltinFSMonitor` is true: talk to the daemon over its
    /// well-known Unix domain socket.
    Ipc { socket_path: PathBuf },
}

/// Hook protocol version to negotiate or use. `core.fsmonitorHookVersion`
/// pins one; absent, the refresh engine probes v2 first and falls back.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HookVersion {
    V1,
    V2,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FsmonitorSettings {
    pub provider: Provider,
    pub hook_version_pin: Option<HookVersion>,
}

impl FsmonitorSettings {
    /// Resolve settings from a merged config view and the repository's
    /// `.git` directory (for the builtin daemon's default socket path).
    pub fn load(config: &ConfigSet, git_dir: &Path) -> Result<Self, FsmonitorError> {
        let hook_version_pin = match config.get_int("core.fsmonitorhookversion")? {
            Some(1) => Some(HookVersion::V1),
            Some(2) => Some(HookVersion::V2),
            Some(other) => {
                warn!(
                    target: "fsmonitor",
                    value = other,
                    "invalid core.fsmonitorHookVersion (must be 1 or 2), treating as unspecified"
                );
                None
            }
            None => None,
        };

        if config.get_bool_or("core.usebuiltinfsmonitor", false)? {
            return Ok(Self {
                provider: Provider::Ipc {
                    socket_path: git_dir.join("fsmonitor--daemon.ipc"),
                },
                hook_version_pin,
            });
        }

        // A boolean-true `core.fsmonitor` (`true`/`yes`/`on`/`1`) is a request
        // for the builtin IPC daemon, not a hook path literally named "true":
        // try the boolean parse first and only fall back to path resolution
        // when the raw value isn't boolean-shaped at all.
        let provider = match config.get_bool("core.fsmonitor") {
            Ok(Some(true)) => Provider::Ipc {
                socket_path: git_dir.join("fsmonitor--daemon.ipc"),
            },
            Ok(Some(false)) => Provider::Disabled,
            Ok(None) | Err(_) => match config.get_string("core.fsmonitor")? {
                None => Provider::Disabled,
                Some(val) if val.is_empty() => Provider::Disabled,
                Some(_) => match config.get_path("core.fsmonitor")? {
                    Some(path) => Provider::Hook { path },
                    None => Provider::Disabled,
                },
            },
        };

        Ok(Self {
            provider,
            hook_version_pin,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use git_config::{ConfigFile, ConfigScope};

    fn set_from(content: &[u8]) -> ConfigSet {
        let mut set = ConfigSet::new();
        set.add_file(ConfigFile::parse(content, None, ConfigScope::Local).unwrap());
        set
    }

    #[test]
    fn disabled_by_default() {
        let set = ConfigSet::new();
        let settings = FsmonitorSettings::load(&set, Path::new("/tmp/.git")).unwrap();
        assert_eq!(settings.provider, Provider::Disabled);
        assert_eq!(settings.hook_version_pin, None);
    }

    #[test]
    fn hook_mode_from_path() {
        let set = set_from(b"[core]\n\tfsmonitor = .git/hooks/fsmonitor-watchman\n");
        let settings = FsmonitorSettings::load(&set, Path::new("/tmp/.git")).unwrap();
        match settings.provider {
            Provider::Hook { path } => assert!(path.ends_with("fsmonitor-watchman")),
            other => panic!("expected Hook, got {other:?}"),
        }
    }

    #[test]
    fn builtin_daemon_wins_over_hook() {
        let set = set_from(
            b"[core]\n\tfsmonitor = .git/hooks/fsmonitor-watchman\n\tuseBuiltinFSMonitor = true\n",
        );
        let settings = FsmonitorSettings::load(&set, Path::new("/tmp/.git")).unwrap();
        match settings.provider {
            Provider::Ipc { socket_path } => {
                assert_eq!(socket_path, Path::new("/tmp/.git/fsmonitor--daemon.ipc"));
            }
            other => panic!("expected Ipc, got {other:?}"),
        }
    }

    #[test]
    fn boolean_true_fsmonitor_resolves_to_ipc() {
        let set = set_from(b"[core]\n\tfsmonitor = true\n");
        let settings = FsmonitorSettings::load(&set, Path::new("/tmp/.git")).unwrap();
        match settings.provider {
            Provider::Ipc { socket_path } => {
                assert_eq!(socket_path, Path::new("/tmp/.git/fsmonitor--daemon.ipc"));
            }
            other => panic!("expected Ipc, got {other:?}"),
        }
    }

    #[test]
    fn boolean_false_fsmonitor_is_disabled() {
        let set = set_from(b"[core]\n\tfsmonitor = false\n");
        let settings = FsmonitorSettings::load(&set, Path::new("/tmp/.git")).unwrap();
        assert_eq!(settings.provider, Provider::Disabled);
    }

    #[test]
    fn hook_version_pin() {
        let set = set_from(b"[core]\n\tfsmonitorHookVersion = 1\n");
        let settings = FsmonitorSettings::load(&set, Path::new("/tmp/.git")).unwrap();
        assert_eq!(settings.hook_version_pin, Some(HookVersion::V1));
    }

    #[test]
    fn invalid_hook_version_warns_and_is_treated_as_unspecified() {
        let set = set_from(b"[core]\n\tfsmonitorHookVersion = 3\n");
        let settings = FsmonitorSettings::load(&set, Path::new("/tmp/.git")).unwrap();
        assert_eq!(settings.hook_version_pin, None);
    }
}
