use std::{sync::Arc, time::Duration};

use anyhow::Result;
use async_trait::async_trait;
use reqwest::Client;
use shared::{
    domain::{normalize_username, registry_username, Coordinates, PlaceRecord},
    error::{BackendErrorBody, ClassifiedError, ErrorKind},
    protocol::{MetadataSavedResponse, PlacesResponse, UserListResponse, VerifyPasswordRequest},
    session::{SessionStore, StoredSession},
};
use tokio::sync::{Mutex, RwLock};
use tracing::{info, warn};

pub mod autocomplete;
pub mod error;
pub mod form;
pub mod media;

pub use autocomplete::{
    AddressComponent, MissingSuggestionProvider, PlaceSelection, SuggestionProvider,
    COMPONENT_ADMINISTRATIVE_REGION, COMPONENT_COUNTRY,
};
pub use error::{FieldError, SubmitError, SubmitStage, VerifyError, SUBMIT_STAGES};
pub use form::{FormState, ImageAttachment, MAX_IMAGE_BYTES};
pub use media::{MediaStore, MissingMediaStore, UnsignedMediaUpload};

/// Delay before the autocomplete provider is re-bound after a reset, giving
/// the remounted place input time to exist.
pub const AUTOCOMPLETE_REARM_DELAY: Duration = Duration::from_millis(300);
/// Delay between a successful submission and the completion callback.
pub const COMPLETION_NOTIFY_DELAY: Duration = Duration::from_millis(1500);

const MSG_VERIFIED: &str = "Password verified. You can upload now.";
const MSG_INCORRECT_PASSWORD: &str = "Incorrect password";
const MSG_VERIFY_FAILED: &str = "Error verifying password";
const MSG_NOT_AUTHORIZED: &str = "Not authorized. Please verify your credentials.";
const MSG_REVERIFY_FAILED: &str = "Error verifying credentials. Please try again.";
const MSG_USER_MISSING: &str = "User does not exist. Please register first.";
const MSG_USER_LIST_FAILED: &str = "Error checking user existence";
const MSG_BAD_COORDINATES: &str = "Invalid latitude/longitude";
const MSG_IMAGE_UPLOAD_FAILED: &str = "Image upload failed";
const MSG_METADATA_FAILED: &str = "Please try again";
const MSG_METADATA_TRANSPORT: &str = "Error uploading destination";
const MSG_SUCCESS: &str = "New destination unlocked";

/// In-memory session store; the default dependency and the test double.
#[derive(Default)]
pub struct MemorySessionStore {
    inner: RwLock<Option<StoredSession>>,
}

#[async_trait]
impl SessionStore for MemorySessionStore {
    async fn load(&self) -> Result<Option<StoredSession>> {
        Ok(self.inner.read().await.clone())
    }

    async fn save(&self, session: &StoredSession) -> Result<()> {
        *self.inner.write().await = Some(session.clone());
        Ok(())
    }

    async fn clear(&self) -> Result<()> {
        *self.inner.write().await = None;
        Ok(())
    }
}

/// Single-slot result surface: the status of the latest attempt plus the
/// stored image URL on full success. Overwritten by each new attempt.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SubmissionResult {
    pub message: Option<String>,
    pub image_url: Option<String>,
}

/// Outcome of a full pipeline run; `image_url` is the URL echoed by the
/// metadata endpoint (empty when no image was attached).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmitSuccess {
    pub image_url: String,
}

struct FormInner {
    form: FormState,
    message: Option<String>,
    image_url: Option<String>,
    /// Identity of the current place-input element; bumped on reset when
    /// the input remounts.
    place_input_generation: u64,
    /// Generation the autocomplete provider is currently bound to.
    armed_generation: Option<u64>,
}

/// Mutable state carried through the submit pipeline.
struct StageContext {
    form: FormState,
    coordinates: Option<Coordinates>,
    image_url: String,
}

/// Client-side orchestrator for publishing destinations: credential gate,
/// staged upload workflow, autocomplete adapter, and the map-read call.
pub struct DestinationClient {
    http: Client,
    backend_url: String,
    session: Arc<dyn SessionStore>,
    media: Arc<dyn MediaStore>,
    suggestions: Arc<dyn SuggestionProvider>,
    on_complete: Mutex<Option<Arc<dyn Fn() + Send + Sync>>>,
    inner: Mutex<FormInner>,
}

impl DestinationClient {
    pub fn new(backend_url: impl Into<String>) -> Arc<Self> {
        Self::new_with_dependencies(
            backend_url,
            Arc::new(MemorySessionStore::default()),
            Arc::new(MissingMediaStore),
            Arc::new(MissingSuggestionProvider),
        )
    }

    pub fn new_with_dependencies(
        backend_url: impl Into<String>,
        session: Arc<dyn SessionStore>,
        media: Arc<dyn MediaStore>,
        suggestions: Arc<dyn SuggestionProvider>,
    ) -> Arc<Self> {
        Arc::new(Self {
            http: Client::new(),
            backend_url: backend_url.into(),
            session,
            media,
            suggestions,
            on_complete: Mutex::new(None),
            inner: Mutex::new(FormInner {
                form: FormState::default(),
                message: None,
                image_url: None,
                place_input_generation: 0,
                armed_generation: None,
            }),
        })
    }

    /// Registers the callback fired a fixed delay after a successful
    /// submission (e.g. to refresh a map view).
    pub async fn set_completion_callback(&self, callback: impl Fn() + Send + Sync + 'static) {
        *self.on_complete.lock().await = Some(Arc::new(callback));
    }

    pub async fn form_state(&self) -> FormState {
        self.inner.lock().await.form.clone()
    }

    pub async fn status(&self) -> SubmissionResult {
        let guard = self.inner.lock().await;
        SubmissionResult {
            message: guard.message.clone(),
            image_url: guard.image_url.clone(),
        }
    }

    /// Hydrates credentials from the persisted session, as on a fresh mount.
    pub async fn restore_session(&self) -> Result<()> {
        if let Some(session) = self.session.load().await? {
            let mut guard = self.inner.lock().await;
            guard.form.username = session.username;
            guard.form.password = session.password;
            guard.form.verified = session.verified;
        }
        Ok(())
    }

    /// Applies a username edit. While verified, edits that normalize to a
    /// different identity than the stored one are refused with guidance.
    pub async fn set_username(&self, value: impl Into<String>) -> Result<(), FieldError> {
        let value = value.into();
        let mut guard = self.inner.lock().await;
        if guard.form.verified {
            let stored = self.session.load().await.unwrap_or(None);
            let identity = stored
                .map(|session| session.username)
                .unwrap_or_else(|| normalize_username(&guard.form.username));
            if normalize_username(&value) != identity {
                guard.message = Some(FieldError::IdentityLocked.to_string());
                return Err(FieldError::IdentityLocked);
            }
        }
        guard.form.username = value;
        Ok(())
    }

    /// Applies a password edit; locked once verified.
    pub async fn set_password(&self, value: impl Into<String>) -> Result<(), FieldError> {
        let mut guard = self.inner.lock().await;
        if guard.form.verified {
            guard.message = Some(FieldError::PasswordLocked.to_string());
            return Err(FieldError::PasswordLocked);
        }
        guard.form.password = value.into();
        Ok(())
    }

    /// Applies a place edit. Clearing the field while verified re-arms the
    /// autocomplete binding so the provider follows the input.
    pub async fn set_place(&self, value: impl Into<String>) {
        let value = value.into();
        let rearm = {
            let mut guard = self.inner.lock().await;
            let cleared = value.is_empty() && guard.form.verified;
            guard.form.place = value;
            cleared.then_some(guard.place_input_generation)
        };
        if let Some(generation) = rearm {
            self.arm_autocomplete_for(generation).await;
        }
    }

    pub async fn set_region(&self, value: impl Into<String>) {
        self.inner.lock().await.form.region = value.into();
    }

    pub async fn set_country(&self, value: impl Into<String>) {
        self.inner.lock().await.form.country = value.into();
    }

    pub async fn set_coordinates(&self, value: impl Into<String>) {
        self.inner.lock().await.form.coordinates = value.into();
    }

    /// Stores a pending image selection. Oversized files are refused and the
    /// pending image stays empty; choosing a file always clears the previous
    /// attempt's status message.
    pub async fn attach_image(
        &self,
        filename: impl Into<String>,
        bytes: Vec<u8>,
    ) -> Result<(), FieldError> {
        let mut guard = self.inner.lock().await;
        guard.message = None;
        if bytes.len() > MAX_IMAGE_BYTES {
            guard.form.image = None;
            guard.message = Some(FieldError::ImageTooLarge.to_string());
            return Err(FieldError::ImageTooLarge);
        }
        guard.form.image = Some(ImageAttachment {
            filename: filename.into(),
            bytes,
        });
        Ok(())
    }

    /// Checks the current credentials against the backend. On success the
    /// normalized identity is persisted and destination entry unlocks; on
    /// failure the session is left untouched.
    pub async fn verify_password(&self) -> Result<(), VerifyError> {
        let (username, password) = {
            let mut guard = self.inner.lock().await;
            guard.message = None;
            (
                normalize_username(&guard.form.username),
                guard.form.password.clone(),
            )
        };

        let response = match self
            .http
            .post(format!("{}/api/user/verify-password", self.backend_url))
            .json(&VerifyPasswordRequest {
                username: username.clone(),
                password: password.clone(),
            })
            .send()
            .await
        {
            Ok(response) => response,
            Err(err) => {
                warn!(username = %username, "verify: credential check failed to complete: {err}");
                let mut guard = self.inner.lock().await;
                guard.form.verified = false;
                guard.message = Some(MSG_VERIFY_FAILED.to_string());
                return Err(VerifyError::Transport(err));
            }
        };

        if response.status().is_success() {
            self.session
                .save(&StoredSession {
                    username: username.clone(),
                    password,
                    verified: true,
                })
                .await
                .map_err(VerifyError::Session)?;
            info!(username = %username, "verify: credentials accepted");
            let mut guard = self.inner.lock().await;
            guard.form.verified = true;
            guard.message = Some(MSG_VERIFIED.to_string());
            Ok(())
        } else {
            let reason = response
                .json::<BackendErrorBody>()
                .await
                .ok()
                .and_then(|body| body.error)
                .unwrap_or_else(|| MSG_INCORRECT_PASSWORD.to_string());
            warn!(username = %username, "verify: credentials rejected: {reason}");
            let mut guard = self.inner.lock().await;
            guard.form.verified = false;
            guard.message = Some(reason.clone());
            Err(VerifyError::Rejected(reason))
        }
    }

    /// "Change user": clears the persisted session, wipes the form, and
    /// re-binds the autocomplete provider once the remounted input settles.
    pub async fn reset(self: &Arc<Self>) -> Result<()> {
        self.session.clear().await?;
        if let Err(err) = self.suggestions.unbind().await {
            warn!("autocomplete: unbind failed: {err}");
        }

        let generation = {
            let mut guard = self.inner.lock().await;
            guard.form = FormState::default();
            guard.message = None;
            guard.image_url = None;
            guard.armed_generation = None;
            guard.place_input_generation += 1;
            guard.place_input_generation
        };
        info!(generation, "gate: session reset");

        let client = Arc::clone(self);
        tokio::spawn(async move {
            tokio::time::sleep(AUTOCOMPLETE_REARM_DELAY).await;
            client.arm_autocomplete_for(generation).await;
        });

        Ok(())
    }

    /// Binds the autocomplete provider to the current place-input instance.
    pub async fn arm_autocomplete(&self) {
        let generation = self.inner.lock().await.place_input_generation;
        self.arm_autocomplete_for(generation).await;
    }

    async fn arm_autocomplete_for(&self, generation: u64) {
        match self.suggestions.bind(generation).await {
            Ok(()) => {
                let mut guard = self.inner.lock().await;
                if guard.place_input_generation == generation {
                    guard.armed_generation = Some(generation);
                }
            }
            Err(err) => warn!(generation, "autocomplete: bind skipped: {err}"),
        }
    }

    /// Applies a selection delivered by the bound provider. Selections from
    /// a stale binding (the input remounted since) are dropped.
    pub async fn apply_place_selection(&self, selection: PlaceSelection) {
        let mut guard = self.inner.lock().await;
        if guard.armed_generation != Some(guard.place_input_generation) {
            warn!("autocomplete: dropping selection from stale binding");
            return;
        }

        guard.form.region = selection
            .component(COMPONENT_ADMINISTRATIVE_REGION)
            .unwrap_or_default()
            .to_string();
        guard.form.country = selection
            .component(COMPONENT_COUNTRY)
            .unwrap_or_default()
            .to_string();
        if let Some((latitude, longitude)) = selection.location {
            guard.form.coordinates = format!("{latitude}, {longitude}");
        }
        if let Some(name) = selection.name {
            if !name.is_empty() {
                guard.form.place = name;
            }
        }
    }

    /// Runs the staged pipeline over a snapshot of the form. Exactly one
    /// submission may run at a time; every exit path clears the busy flag
    /// and leaves the form fields intact for correction.
    pub async fn submit(self: &Arc<Self>) -> Result<SubmitSuccess, SubmitError> {
        let form = {
            let mut guard = self.inner.lock().await;
            if guard.form.uploading {
                return Err(SubmitError::Busy);
            }
            guard.form.uploading = true;
            guard.form.clone()
        };

        let mut ctx = StageContext {
            form,
            coordinates: None,
            image_url: String::new(),
        };

        let mut outcome = Ok(());
        for stage in SUBMIT_STAGES {
            if let Err(source) = self.run_stage(stage, &mut ctx).await {
                warn!(?stage, "submit: aborted: {source}");
                outcome = Err(SubmitError::Stage { stage, source });
                break;
            }
        }

        let mut guard = self.inner.lock().await;
        guard.form.uploading = false;
        match outcome {
            Ok(()) => {
                guard.message = Some(MSG_SUCCESS.to_string());
                guard.image_url = Some(ctx.image_url.clone());
                drop(guard);
                info!("submit: destination published");
                self.schedule_completion();
                Ok(SubmitSuccess {
                    image_url: ctx.image_url,
                })
            }
            Err(err) => {
                guard.message = Some(err.to_string());
                Err(err)
            }
        }
    }

    async fn run_stage(
        &self,
        stage: SubmitStage,
        ctx: &mut StageContext,
    ) -> Result<(), ClassifiedError> {
        match stage {
            SubmitStage::CoordinateValidation => self.stage_validate_coordinates(ctx),
            SubmitStage::Reauthorize => self.stage_reauthorize(ctx).await,
            SubmitStage::ExistenceCheck => self.stage_check_user_exists(ctx).await,
            SubmitStage::ImageUpload => self.stage_upload_image(ctx).await,
            SubmitStage::MetadataPersist => self.stage_persist_metadata(ctx).await,
        }
    }

    fn stage_validate_coordinates(&self, ctx: &mut StageContext) -> Result<(), ClassifiedError> {
        match Coordinates::parse(&ctx.form.coordinates) {
            Some(coordinates) => {
                ctx.coordinates = Some(coordinates);
                Ok(())
            }
            None => Err(ClassifiedError::new(
                ErrorKind::Validation,
                MSG_BAD_COORDINATES,
            )),
        }
    }

    /// Re-runs the credential check regardless of the `verified` flag, so a
    /// stale or forged client state cannot author records.
    async fn stage_reauthorize(&self, ctx: &StageContext) -> Result<(), ClassifiedError> {
        let response = self
            .http
            .post(format!("{}/api/user/verify-password", self.backend_url))
            .json(&VerifyPasswordRequest {
                username: normalize_username(&ctx.form.username),
                password: ctx.form.password.clone(),
            })
            .send()
            .await
            .map_err(|err| {
                warn!("submit: re-authorization failed to complete: {err}");
                ClassifiedError::new(ErrorKind::Upstream, MSG_REVERIFY_FAILED)
            })?;

        if response.status().is_success() {
            return Ok(());
        }
        let reason = response
            .json::<BackendErrorBody>()
            .await
            .ok()
            .and_then(|body| body.error)
            .unwrap_or_else(|| MSG_NOT_AUTHORIZED.to_string());
        Err(ClassifiedError::new(ErrorKind::Authorization, reason))
    }

    /// Confirms the registry knows the user, preventing orphaned records
    /// attributed to a never-registered identity.
    async fn stage_check_user_exists(&self, ctx: &StageContext) -> Result<(), ClassifiedError> {
        let listing: UserListResponse = self
            .http
            .get(format!("{}/api/user/list", self.backend_url))
            .send()
            .await
            .and_then(|response| response.error_for_status())
            .map_err(|err| {
                warn!("submit: user list fetch failed: {err}");
                ClassifiedError::new(ErrorKind::Upstream, MSG_USER_LIST_FAILED)
            })?
            .json()
            .await
            .map_err(|err| {
                warn!("submit: user list unreadable: {err}");
                ClassifiedError::new(ErrorKind::Upstream, MSG_USER_LIST_FAILED)
            })?;

        let expected = registry_username(&ctx.form.username);
        if listing.users.iter().any(|user| user == &expected) {
            Ok(())
        } else {
            Err(ClassifiedError::new(ErrorKind::NotFound, MSG_USER_MISSING))
        }
    }

    async fn stage_upload_image(&self, ctx: &mut StageContext) -> Result<(), ClassifiedError> {
        let Some(image) = ctx.form.image.clone() else {
            // No image attached: skip with an empty URL.
            return Ok(());
        };

        match self.media.upload(&image.filename, image.bytes).await {
            Ok(Some(secure_url)) => {
                info!(url = %secure_url, "submit: image stored");
                ctx.image_url = secure_url;
                Ok(())
            }
            Ok(None) => Err(ClassifiedError::new(
                ErrorKind::Upstream,
                MSG_IMAGE_UPLOAD_FAILED,
            )),
            Err(err) => {
                warn!("submit: image upload failed: {err}");
                Err(ClassifiedError::new(
                    ErrorKind::Upstream,
                    MSG_IMAGE_UPLOAD_FAILED,
                ))
            }
        }
    }

    async fn stage_persist_metadata(&self, ctx: &mut StageContext) -> Result<(), ClassifiedError> {
        let Some(coordinates) = ctx.coordinates.clone() else {
            return Err(ClassifiedError::new(
                ErrorKind::Validation,
                MSG_BAD_COORDINATES,
            ));
        };

        let payload = reqwest::multipart::Form::new()
            .text("username", ctx.form.username.clone())
            .text("place", ctx.form.place.clone())
            .text("state", ctx.form.region.clone())
            .text("country", ctx.form.country.clone())
            .text("latitude", coordinates.latitude)
            .text("longitude", coordinates.longitude)
            .text("imageUrl", ctx.image_url.clone());

        let response = self
            .http
            .post(format!("{}/api/upload/metadata", self.backend_url))
            .multipart(payload)
            .send()
            .await
            .map_err(|err| {
                warn!("submit: metadata persist failed to complete: {err}");
                ClassifiedError::new(ErrorKind::Upstream, MSG_METADATA_TRANSPORT)
            })?;

        if response.status().is_success() {
            let saved: MetadataSavedResponse = response.json().await.map_err(|err| {
                warn!("submit: metadata response unreadable: {err}");
                ClassifiedError::new(ErrorKind::Upstream, MSG_METADATA_TRANSPORT)
            })?;
            info!(place = %ctx.form.place, "submit: destination stored");
            ctx.image_url = saved.image_url;
            Ok(())
        } else {
            let reason = response
                .json::<BackendErrorBody>()
                .await
                .ok()
                .and_then(|body| body.error)
                .unwrap_or_else(|| MSG_METADATA_FAILED.to_string());
            Err(ClassifiedError::new(ErrorKind::Upstream, reason))
        }
    }

    fn schedule_completion(self: &Arc<Self>) {
        let client = Arc::clone(self);
        tokio::spawn(async move {
            tokio::time::sleep(COMPLETION_NOTIFY_DELAY).await;
            let callback = client.on_complete.lock().await.clone();
            if let Some(callback) = callback {
                callback();
            }
        });
    }

    /// Reads the destinations persisted for `username`. Any failure degrades
    /// to an empty list so the map still renders.
    pub async fn fetch_places(&self, username: &str) -> Vec<PlaceRecord> {
        match self.fetch_places_impl(username).await {
            Ok(places) => places,
            Err(err) => {
                warn!(username, "fetch places failed: {err}");
                Vec::new()
            }
        }
    }

    async fn fetch_places_impl(&self, username: &str) -> Result<Vec<PlaceRecord>> {
        let response: PlacesResponse = self
            .http
            .get(format!("{}/api/fetch/user/{username}", self.backend_url))
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        Ok(response.places)
    }
}

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;
