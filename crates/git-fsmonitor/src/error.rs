#[derive(Debug, thiserror::Error)]
pub enum FsmonitorError {
    #[error("fsmonitor hook failed: {0}")]
    HookFailed(String),

    #[error("fsmonitor IPC request failed: {0}")]
    IpcFailed(String),

    #[error("malformed fsmonitor response: {0}")]
    MalformedResponse(String),

    #[error("fsmonitor hook v2 returned an empty last-update token")]
    EmptyToken,

    #[error(transparent)]
    Config(#[from] git_config::ConfigError),

    #[error(transparent)]
    Index(#[from] git_index::IndexError),
}
