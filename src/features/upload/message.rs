use strum::Display;

use crate::message::Message;

use super::kind::ResourceKind;

/// 1リソースの反映結果
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadResult {
    pub success: bool,
    pub message: String,
    pub resource_kind: ResourceKind,
    pub resource_identifier: String,
}

impl UploadResult {
    pub fn succeeded(kind: ResourceKind, identifier: &str, message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
            resource_kind: kind,
            resource_identifier: identifier.to_string(),
        }
    }

    pub fn failed(kind: ResourceKind, identifier: &str, message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
            resource_kind: kind,
            resource_identifier: identifier.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CurrentResource {
    pub kind: ResourceKind,
    pub identifier: String,
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct UploadProgress {
    pub total: usize,
    pub processed: usize,
    pub current: Option<CurrentResource>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[strum(serialize_all = "lowercase")]
pub enum FeedbackType {
    Success,
    Error,
    Warning,
    Info,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Feedback {
    pub message: String,
    pub kind: FeedbackType,
}

impl Feedback {
    pub fn new(kind: FeedbackType, message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            kind,
        }
    }

    pub fn success(message: impl Into<String>) -> Self {
        Self::new(FeedbackType::Success, message)
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self::new(FeedbackType::Error, message)
    }

    pub fn warning(message: impl Into<String>) -> Self {
        Self::new(FeedbackType::Warning, message)
    }

    pub fn info(message: impl Into<String>) -> Self {
        Self::new(FeedbackType::Info, message)
    }
}

impl From<&UploadResult> for Feedback {
    fn from(result: &UploadResult) -> Self {
        if result.success {
            Self::success(&result.message)
        } else {
            Self::error(&result.message)
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UploadMessage {
    Feedback(Feedback),
    Progress(UploadProgress),
    /// バッチの終了。成功数と失敗数
    Completed { succeeded: usize, failed: usize },
}

impl From<UploadMessage> for Message {
    fn from(m: UploadMessage) -> Self {
        Self::Upload(m)
    }
}

impl From<Feedback> for Message {
    fn from(feedback: Feedback) -> Self {
        UploadMessage::Feedback(feedback).into()
    }
}

impl From<UploadProgress> for Message {
    fn from(progress: UploadProgress) -> Self {
        UploadMessage::Progress(progress).into()
    }
}
