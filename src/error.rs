use thiserror::Error as TError;

/// ファイル単位で発生し、バッチ全体を中断させるエラー
#[derive(Debug, TError)]
pub enum UploadError {
    #[error("Failed to read {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("{path} is not valid UTF-8 text")]
    NotText { path: String },
}
