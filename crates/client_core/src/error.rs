use shared::error::{ClassifiedError, ErrorKind};
use thiserror::Error;

/// Named stages of the submit pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmitStage {
    CoordinateValidation,
    Reauthorize,
    ExistenceCheck,
    ImageUpload,
    MetadataPersist,
}

/// The pipeline in execution order. Pure validation runs first so a
/// malformed form never causes network traffic; the remote stages keep
/// their order: credentials, registry, object storage, metadata.
pub const SUBMIT_STAGES: [SubmitStage; 5] = [
    SubmitStage::CoordinateValidation,
    SubmitStage::Reauthorize,
    SubmitStage::ExistenceCheck,
    SubmitStage::ImageUpload,
    SubmitStage::MetadataPersist,
];

#[derive(Debug, Error)]
pub enum SubmitError {
    /// A submission is already running on this form instance.
    #[error("an upload is already in progress")]
    Busy,
    /// A stage failed and the remainder of the pipeline was skipped.
    #[error("{source}")]
    Stage {
        stage: SubmitStage,
        source: ClassifiedError,
    },
}

impl SubmitError {
    pub fn stage(&self) -> Option<SubmitStage> {
        match self {
            Self::Stage { stage, .. } => Some(*stage),
            Self::Busy => None,
        }
    }

    pub fn kind(&self) -> Option<ErrorKind> {
        match self {
            Self::Stage { source, .. } => Some(source.kind),
            Self::Busy => None,
        }
    }
}

#[derive(Debug, Error)]
pub enum VerifyError {
    /// The backend rejected the credentials; carries its reason when present.
    #[error("{0}")]
    Rejected(String),
    /// The credential check never completed.
    #[error("error verifying password")]
    Transport(#[source] reqwest::Error),
    /// The check passed but the session could not be persisted.
    #[error("failed to persist session")]
    Session(#[source] anyhow::Error),
}

/// Field edits refused by the form; the form keeps its previous value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum FieldError {
    #[error("To change username, use \"change user\" first")]
    IdentityLocked,
    #[error("To change password, use \"change user\" first")]
    PasswordLocked,
    #[error("File size must be 10MB or less")]
    ImageTooLarge,
}
