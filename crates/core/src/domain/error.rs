use serde::Serialize;

/// エラーコード（ジョブの error や CLI 出力で使う）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ErrorCode {
    #[serde(rename = "E_INVALID_STATE")]
    InvalidState,
    #[serde(rename = "E_INTERNAL")]
    Internal,
    #[serde(rename = "E_STORAGE")]
    Storage,
    #[serde(rename = "E_CONFIG")]
    Config,
    #[serde(rename = "E_GENERATION")]
    Generation,
    #[serde(rename = "E_CANCELLED")]
    Cancelled,
}

impl ErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::InvalidState => "E_INVALID_STATE",
            Self::Internal => "E_INTERNAL",
            Self::Storage => "E_STORAGE",
            Self::Config => "E_CONFIG",
            Self::Generation => "E_GENERATION",
            Self::Cancelled => "E_CANCELLED",
        }
    }

    /// 同じ依頼をやり直せば成功しうるか（ストレージ・内部エラーは不可）
    pub fn is_recoverable(&self) -> bool {
        !matches!(self, Self::Internal | Self::Storage)
    }
}

/// 生成ジョブまわりの共通エラー
#[derive(Debug, Clone, Serialize)]
pub struct AppError {
    pub code: ErrorCode,
    pub message: String,
    pub recoverable: bool,
}

impl AppError {
    pub fn new(code: ErrorCode, msg: impl Into<String>) -> Self {
        Self {
            code,
            message: msg.into(),
            recoverable: code.is_recoverable(),
        }
    }

    pub fn invalid_state(msg: impl Into<String>) -> Self {
        Self::new(ErrorCode::InvalidState, msg)
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::new(ErrorCode::Internal, msg)
    }

    pub fn storage(msg: impl Into<String>) -> Self {
        Self::new(ErrorCode::Storage, msg)
    }

    /// 設定不備（API キー未設定、エージェント未登録など）
    pub fn config(msg: impl Into<String>) -> Self {
        Self::new(ErrorCode::Config, msg)
    }

    pub fn generation(msg: impl Into<String>) -> Self {
        Self::new(ErrorCode::Generation, msg)
    }

    pub fn cancelled(msg: impl Into<String>) -> Self {
        Self::new(ErrorCode::Cancelled, msg)
    }
}

impl std::fmt::Display for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.code.as_str(), self.message)
    }
}

impl std::error::Error for AppError {}
