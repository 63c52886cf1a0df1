use chrono::Utc;
use log::{error, info, warn};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::fs;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::config::AppSettings;
use crate::models::{
    KycSlot, OtpInputDto, OtpMode, Registration, RegistrationView, StoredImage,
    UpdateAccountDto, UpdatePersonalDto, WizardError,
};
use crate::services::users::{NewAccount, UserDirectory};
use crate::services::EmailService;
use crate::utils::generate_otp;

#[derive(Debug, Clone)]
pub struct RegistrationSettings {
    pub otp_mode: OtpMode,
    pub otp_cooldown_secs: u32,
    pub submission_delay: Duration,
    pub draft_ttl: Duration,
}

impl From<&AppSettings> for RegistrationSettings {
    fn from(settings: &AppSettings) -> Self {
        RegistrationSettings {
            otp_mode: settings.otp_mode,
            otp_cooldown_secs: settings.otp_cooldown_secs,
            submission_delay: settings.submission_delay,
            draft_ttl: settings.draft_ttl,
        }
    }
}

#[derive(Debug, PartialEq, Eq)]
pub enum RegistrationError {
    NotFound,
    EmailTaken,
    Wizard(WizardError),
}

impl From<WizardError> for RegistrationError {
    fn from(e: WizardError) -> Self {
        RegistrationError::Wizard(e)
    }
}

type Drafts = Arc<RwLock<HashMap<Uuid, Registration>>>;
type Completed = Arc<RwLock<HashMap<Uuid, RegistrationView>>>;

/// Deletes uploaded KYC files that no draft refers to any more.
pub async fn remove_images(images: Vec<StoredImage>) {
    for image in images {
        if let Err(e) = fs::remove_file(&image.path).await {
            warn!("Could not remove {}: {}", image.path, e);
        }
    }
}

/// Owns every in-progress registration and drives the wizard.
///
/// Finished registrations leave the draft store; only their final view is
/// kept, for status polling and the admin panel. Lock order is drafts,
/// then users, then completed.
pub struct RegistrationService {
    drafts: Drafts,
    completed: Completed,
    users: Arc<UserDirectory>,
    settings: RegistrationSettings,
}

impl RegistrationService {
    pub fn new(users: Arc<UserDirectory>, settings: RegistrationSettings) -> Self {
        RegistrationService {
            drafts: Arc::new(RwLock::new(HashMap::new())),
            completed: Arc::new(RwLock::new(HashMap::new())),
            users,
            settings,
        }
    }

    pub async fn create(&self) -> RegistrationView {
        self.purge_idle().await;

        let registration = Registration::new(self.settings.otp_mode, self.settings.otp_cooldown_secs);
        let view = registration.view(Utc::now());
        self.drafts.write().await.insert(registration.id, registration);
        info!("Registration {} started", view.id);
        view
    }

    /// Drops drafts untouched for longer than the configured TTL.
    pub async fn purge_idle(&self) -> usize {
        let now = Utc::now();
        let ttl = self.settings.draft_ttl;
        let expired: Vec<Registration> = {
            let mut drafts = self.drafts.write().await;
            let ids: Vec<Uuid> = drafts
                .values()
                .filter(|r| r.is_idle(now, ttl))
                .map(|r| r.id)
                .collect();
            ids.iter().filter_map(|id| drafts.remove(id)).collect()
        };

        if !expired.is_empty() {
            info!("Expired {} idle registration(s)", expired.len());
        }
        let count = expired.len();
        remove_images(expired.iter().flat_map(Registration::images).collect()).await;
        count
    }

    pub async fn get(&self, id: Uuid) -> Option<RegistrationView> {
        let draft = self.drafts.read().await.get(&id).map(|r| r.view(Utc::now()));
        match draft {
            Some(view) => Some(view),
            None => self.completed.read().await.get(&id).cloned(),
        }
    }

    pub async fn list(&self) -> Vec<RegistrationView> {
        let now = Utc::now();
        let mut views: Vec<RegistrationView> =
            self.drafts.read().await.values().map(|r| r.view(now)).collect();
        views.extend(self.completed.read().await.values().cloned());
        views.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        views
    }

    pub async fn discard(&self, id: Uuid) -> bool {
        let removed = self.drafts.write().await.remove(&id);
        match removed {
            Some(registration) => {
                remove_images(registration.images()).await;
                true
            }
            None => self.completed.write().await.remove(&id).is_some(),
        }
    }

    async fn missing(&self, id: Uuid) -> RegistrationError {
        if self.completed.read().await.contains_key(&id) {
            RegistrationError::Wizard(WizardError::Completed)
        } else {
            RegistrationError::NotFound
        }
    }

    async fn apply_with<T, F>(&self, id: Uuid, f: F) -> Result<(T, RegistrationView), RegistrationError>
    where
        F: FnOnce(&mut Registration) -> Result<T, WizardError>,
    {
        let mut drafts = self.drafts.write().await;
        if !drafts.contains_key(&id) {
            drop(drafts);
            return Err(self.missing(id).await);
        }
        let registration = drafts.get_mut(&id).ok_or(RegistrationError::NotFound)?;
        let output = f(registration)?;
        Ok((output, registration.view(Utc::now())))
    }

    async fn apply<F>(&self, id: Uuid, f: F) -> Result<RegistrationView, RegistrationError>
    where
        F: FnOnce(&mut Registration) -> Result<(), WizardError>,
    {
        self.apply_with(id, f).await.map(|(_, view)| view)
    }

    pub async fn update_account(
        &self,
        id: Uuid,
        dto: UpdateAccountDto,
    ) -> Result<RegistrationView, RegistrationError> {
        self.apply(id, |r| r.update_account(dto)).await
    }

    pub async fn update_personal(
        &self,
        id: Uuid,
        dto: UpdatePersonalDto,
    ) -> Result<RegistrationView, RegistrationError> {
        self.apply(id, |r| r.update_personal(dto)).await
    }

    /// Stores `image` in `slot` and deletes the file it replaces.
    pub async fn attach_image(
        &self,
        id: Uuid,
        slot: KycSlot,
        image: StoredImage,
    ) -> Result<RegistrationView, RegistrationError> {
        let (previous, view) = self.apply_with(id, |r| r.attach_image(slot, image)).await?;
        if let Some(previous) = previous {
            remove_images(vec![previous]).await;
        }
        Ok(view)
    }

    pub async fn input_otp(
        &self,
        id: Uuid,
        dto: OtpInputDto,
    ) -> Result<RegistrationView, RegistrationError> {
        self.apply(id, |r| r.input_otp(dto)).await
    }

    /// Starts the OTP countdown and mails the code.
    pub async fn send_otp(&self, id: Uuid) -> Result<RegistrationView, RegistrationError> {
        let email = self.drafts.read().await.get(&id).map(|r| r.account.email.clone());
        let Some(email) = email else {
            return Err(self.missing(id).await);
        };
        if self.users.email_taken(&email).await {
            return Err(RegistrationError::EmailTaken);
        }

        let code = generate_otp();
        let issued = code.clone();
        let view = self.apply(id, |r| r.send_otp(issued, Utc::now())).await?;

        if self.settings.otp_mode == OtpMode::Demo {
            info!("Demo OTP for registration {}: {}", id, code);
        }

        let email = view.email.clone();
        tokio::spawn(async move {
            EmailService::send_otp_email(&email, &code).await;
        });
        Ok(view)
    }

    /// Steps back one page; a no-op where there is nowhere to go.
    pub async fn back(&self, id: Uuid) -> Result<RegistrationView, RegistrationError> {
        let result = self
            .apply(id, |r| {
                r.back();
                Ok(())
            })
            .await;

        match result {
            Err(RegistrationError::Wizard(WizardError::Completed)) => {
                self.get(id).await.ok_or(RegistrationError::NotFound)
            }
            other => other,
        }
    }

    /// Moves forward one step. Leaving the KYC step schedules the
    /// simulated submission, which lands on the success step after
    /// the configured delay.
    ///
    /// The email is claimed at that point: it must not belong to an
    /// account or to another submission in flight.
    pub async fn next(&self, id: Uuid) -> Result<RegistrationView, RegistrationError> {
        let mut drafts = self.drafts.write().await;
        if !drafts.contains_key(&id) {
            drop(drafts);
            return Err(self.missing(id).await);
        }

        let registration = drafts.get(&id).ok_or(RegistrationError::NotFound)?;
        if registration.ready_to_submit() {
            let email = registration.account.email.as_str();
            let in_flight = drafts.values().any(|other| {
                other.id != id && other.submitting && other.account.email.eq_ignore_ascii_case(email)
            });
            if in_flight || self.users.email_taken(email).await {
                warn!("Registration {} blocked: {} already claimed", id, email);
                return Err(RegistrationError::EmailTaken);
            }
        }

        let registration = drafts.get_mut(&id).ok_or(RegistrationError::NotFound)?;
        registration.next()?;
        let view = registration.view(Utc::now());
        drop(drafts);

        if view.submitting {
            info!("Registration {} submitting", id);
            self.schedule_completion(id);
        } else {
            info!("Registration {} moved to step {}", id, view.step_number);
        }
        Ok(view)
    }

    fn schedule_completion(&self, id: Uuid) {
        let drafts = Arc::clone(&self.drafts);
        let completed = Arc::clone(&self.completed);
        let users = Arc::clone(&self.users);
        let delay = self.settings.submission_delay;

        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            complete_submission(drafts, completed, users, id).await;
        });
    }
}

/// Creates the account for a submitted draft. The draft lock is held
/// throughout so no other submission can claim the same email meanwhile;
/// on failure the draft returns to the KYC step with the reason.
async fn complete_submission(drafts: Drafts, completed: Completed, users: Arc<UserDirectory>, id: Uuid) {
    let mut drafts = drafts.write().await;
    let Some(mut registration) = drafts.remove(&id) else {
        warn!("Registration {} discarded before submission finished", id);
        return;
    };
    if !registration.submitting {
        drafts.insert(id, registration);
        return;
    }

    let new_account = NewAccount {
        email: registration.account.email.clone(),
        password: registration.account.password.clone(),
        first_name: registration.personal.first_name.clone(),
        last_name: registration.personal.last_name.clone(),
        national_id: registration.personal.national_id.clone(),
    };

    match users.register(new_account).await {
        Ok(account) => {
            registration.complete_submission();
            completed.write().await.insert(id, registration.view(Utc::now()));
            drop(drafts);

            info!("✓ Account {} created for {} (registration {})", account.id, account.email, id);
            EmailService::send_welcome_email(&account.email, &account.first_name).await;
        }
        Err(e) => {
            error!("✗ Could not create account for registration {}: {}", id, e);
            registration.fail_submission(e.to_string());
            drafts.insert(id, registration);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::WizardStep;
    use crate::services::users::DirectoryError;
    use std::path::PathBuf;

    fn service_with(delay_ms: u64, draft_ttl: Duration) -> RegistrationService {
        RegistrationService::new(
            Arc::new(UserDirectory::empty(4)),
            RegistrationSettings {
                otp_mode: OtpMode::Demo,
                otp_cooldown_secs: 60,
                submission_delay: Duration::from_millis(delay_ms),
                draft_ttl,
            },
        )
    }

    fn service(delay_ms: u64) -> RegistrationService {
        service_with(delay_ms, Duration::from_secs(3600))
    }

    fn image(name: &str) -> StoredImage {
        StoredImage {
            path: format!("uploads/kyc/{name}.jpg"),
            content_type: "image/jpeg".to_string(),
            size: 2048,
        }
    }

    fn image_on_disk(dir: &PathBuf, name: &str) -> StoredImage {
        let path = dir.join(format!("{name}.jpg"));
        std::fs::write(&path, b"jpeg").unwrap();
        StoredImage {
            path: path.to_string_lossy().into_owned(),
            content_type: "image/jpeg".to_string(),
            size: 4,
        }
    }

    fn scratch_dir() -> PathBuf {
        let dir = std::env::temp_dir().join(format!("farmrent-kyc-{}", Uuid::new_v4()));
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    async fn ready_for_submission(service: &RegistrationService, email: &str) -> Uuid {
        let id = service.create().await.id;
        service
            .update_account(
                id,
                UpdateAccountDto {
                    email: Some(email.into()),
                    password: Some("abcd1234".into()),
                    confirm_password: Some("abcd1234".into()),
                },
            )
            .await
            .unwrap();
        let view = service.send_otp(id).await.unwrap();
        assert_eq!(view.email, email);
        service
            .input_otp(id, OtpInputDto::Paste { value: "123456".into() })
            .await
            .unwrap();
        service.next(id).await.unwrap();
        service
            .update_personal(
                id,
                UpdatePersonalDto {
                    national_id: Some("1234567890121".into()),
                    first_name: Some("Malee".into()),
                    last_name: Some("Rakthai".into()),
                },
            )
            .await
            .unwrap();
        service.next(id).await.unwrap();
        service.attach_image(id, KycSlot::IdCard, image("card")).await.unwrap();
        service.attach_image(id, KycSlot::Selfie, image("selfie")).await.unwrap();
        id
    }

    #[tokio::test]
    async fn unknown_registration_is_not_found() {
        let service = service(0);
        assert_eq!(
            service.next(Uuid::new_v4()).await.unwrap_err(),
            RegistrationError::NotFound
        );
    }

    #[tokio::test]
    async fn submission_finishes_after_delay_and_creates_account() {
        let service = service(100);
        let id = ready_for_submission(&service, "malee@farm.co.th").await;

        let view = service.next(id).await.unwrap();
        assert!(view.submitting);
        assert_eq!(view.step, WizardStep::KycUpload);
        assert_eq!(
            service.back(id).await.unwrap().step,
            WizardStep::KycUpload
        );

        tokio::time::sleep(Duration::from_millis(400)).await;
        let view = service.get(id).await.unwrap();
        assert_eq!(view.step, WizardStep::Success);
        assert!(!view.submitting);
        assert!(service.users.authenticate("malee@farm.co.th", "abcd1234").await.is_some());

        // the draft itself is gone; only its final view remains
        assert!(service.drafts.read().await.is_empty());
        assert_eq!(service.list().await.len(), 1);
        assert_eq!(service.back(id).await.unwrap().step, WizardStep::Success);
        assert_eq!(
            service.update_account(id, UpdateAccountDto::default()).await.unwrap_err(),
            RegistrationError::Wizard(WizardError::Completed)
        );
    }

    #[tokio::test]
    async fn registered_email_cannot_request_otp() {
        let service = service(0);
        let first = ready_for_submission(&service, "malee@farm.co.th").await;
        service.next(first).await.unwrap();
        tokio::time::sleep(Duration::from_millis(200)).await;

        let id = service.create().await.id;
        service
            .update_account(
                id,
                UpdateAccountDto {
                    email: Some("malee@farm.co.th".into()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert!(matches!(
            service.send_otp(id).await,
            Err(RegistrationError::EmailTaken)
        ));
    }

    #[tokio::test]
    async fn second_draft_with_same_email_cannot_submit() {
        let service = service(100);
        let first = ready_for_submission(&service, "dup@farm.co.th").await;
        let second = ready_for_submission(&service, "Dup@farm.co.th").await;

        assert!(service.next(first).await.unwrap().submitting);
        assert_eq!(service.next(second).await.unwrap_err(), RegistrationError::EmailTaken);

        tokio::time::sleep(Duration::from_millis(400)).await;
        assert_eq!(service.next(second).await.unwrap_err(), RegistrationError::EmailTaken);

        let view = service.get(second).await.unwrap();
        assert_eq!(view.step, WizardStep::KycUpload);
        assert!(!view.submitting);
        assert_eq!(service.users.list().await.len(), 1);
    }

    #[tokio::test]
    async fn rejected_account_sends_draft_back_to_kyc() {
        let service = service(150);
        let id = ready_for_submission(&service, "late@farm.co.th").await;
        service.next(id).await.unwrap();

        // someone else takes the address while the submission is pending
        service
            .users
            .register(NewAccount {
                email: "late@farm.co.th".into(),
                password: "other-pass".into(),
                first_name: "Other".into(),
                last_name: "Person".into(),
                national_id: "1101700230708".into(),
            })
            .await
            .unwrap();

        tokio::time::sleep(Duration::from_millis(500)).await;
        let view = service.get(id).await.unwrap();
        assert_eq!(view.step, WizardStep::KycUpload);
        assert!(!view.submitting);
        assert_eq!(
            view.submission_error.as_deref(),
            Some(DirectoryError::EmailTaken.to_string().as_str())
        );
        assert!(service.users.authenticate("late@farm.co.th", "abcd1234").await.is_none());
    }

    #[tokio::test]
    async fn idle_drafts_expire() {
        let service = service_with(0, Duration::from_millis(20));
        let stale = service.create().await.id;
        tokio::time::sleep(Duration::from_millis(60)).await;

        let fresh = service.create().await.id;
        assert!(service.get(stale).await.is_none());
        assert!(service.get(fresh).await.is_some());
        assert_eq!(service.drafts.read().await.len(), 1);
    }

    #[tokio::test]
    async fn replaced_and_discarded_images_are_deleted() {
        let service = service(0);
        let dir = scratch_dir();
        let id = ready_for_submission(&service, "files@farm.co.th").await;

        let first = image_on_disk(&dir, "first");
        let second = image_on_disk(&dir, "second");
        service.attach_image(id, KycSlot::IdCard, first.clone()).await.unwrap();
        service.attach_image(id, KycSlot::IdCard, second.clone()).await.unwrap();
        assert!(!PathBuf::from(&first.path).exists());
        assert!(PathBuf::from(&second.path).exists());

        assert!(service.discard(id).await);
        assert!(!PathBuf::from(&second.path).exists());
    }

    #[tokio::test]
    async fn discarded_registration_is_gone() {
        let service = service(0);
        let id = service.create().await.id;
        assert!(service.discard(id).await);
        assert!(service.get(id).await.is_none());
        assert!(!service.discard(id).await);
    }
}
