/// Largest accepted image attachment (10 MiB).
pub const MAX_IMAGE_BYTES: usize = 10 * 1024 * 1024;

/// A pending image selection held in the form until submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageAttachment {
    pub filename: String,
    pub bytes: Vec<u8>,
}

/// The mutable record the user edits; single owner of truth for what will
/// be submitted.
///
/// `region` is the administrative region (the backend's `state` field).
/// `coordinates` is the raw `"<lat>, <lon>"` text, validated at submit time.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FormState {
    pub username: String,
    pub password: String,
    pub place: String,
    pub region: String,
    pub country: String,
    pub coordinates: String,
    pub image: Option<ImageAttachment>,
    pub verified: bool,
    pub uploading: bool,
}
