use bridge_traits::BridgeError;
use core_library::LibraryError;
use core_metadata::MetadataError;
use core_playback::PlaybackError;
use std::fmt;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CoreError {
    #[error("Core initialization failed: {0}")]
    InitializationFailed(String),

    #[error("Runtime error: {0}")]
    Runtime(#[from] core_runtime::Error),

    #[error("Library error: {0}")]
    Library(#[from] LibraryError),

    #[error("Metadata error: {0}")]
    Metadata(#[from] MetadataError),

    #[error("Playback error: {0}")]
    Playback(#[from] PlaybackError),

    #[error("Bridge error: {0}")]
    Bridge(#[from] BridgeError),
}

pub type Result<T> = std::result::Result<T, CoreError>;

/// Coarse classification shown to users.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    Network,
    Api,
    Storage,
    Player,
    Unknown,
}

impl ErrorCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCategory::Network => "network",
            ErrorCategory::Api => "api",
            ErrorCategory::Storage => "storage",
            ErrorCategory::Player => "player",
            ErrorCategory::Unknown => "unknown",
        }
    }

    pub fn user_message(&self) -> &'static str {
        match self {
            ErrorCategory::Network => "网络连接失败，请检查网络设置",
            ErrorCategory::Api => "B站接口请求失败，请稍后重试",
            ErrorCategory::Storage => "数据存储失败，请重试",
            ErrorCategory::Player => "播放器错误，请重试",
            ErrorCategory::Unknown => "发生未知错误，请重试",
        }
    }
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

fn bridge_category(error: &BridgeError) -> ErrorCategory {
    match error {
        BridgeError::Storage(_) | BridgeError::Io(_) => ErrorCategory::Storage,
        BridgeError::Player(_) => ErrorCategory::Player,
        BridgeError::OperationFailed(_) => ErrorCategory::Network,
        BridgeError::NotAvailable(_) => ErrorCategory::Unknown,
    }
}

impl CoreError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            CoreError::Bridge(e) => bridge_category(e),
            CoreError::Library(LibraryError::Bridge(e)) => bridge_category(e),
            CoreError::Library(_) => ErrorCategory::Storage,
            CoreError::Metadata(MetadataError::Transport(_)) => ErrorCategory::Network,
            CoreError::Metadata(_) => ErrorCategory::Api,
            CoreError::Playback(PlaybackError::Unavailable { .. }) => ErrorCategory::Api,
            CoreError::Playback(_) => ErrorCategory::Player,
            CoreError::InitializationFailed(_) | CoreError::Runtime(_) => ErrorCategory::Unknown,
        }
    }

    /// Short Chinese message suitable for a toast.
    pub fn user_message(&self) -> &'static str {
        self.category().user_message()
    }
}
