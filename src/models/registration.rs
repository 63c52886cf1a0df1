use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use rocket_okapi::okapi::schemars;
use rocket_okapi::okapi::schemars::JsonSchema;
use std::fmt;
use uuid::Uuid;
use validator::{Validate, ValidationErrors};

use crate::models::{OtpError, OtpFlow, OtpInputDto, OtpMode, OtpView};
use crate::utils::{
    check_email, check_national_id, check_not_blank, field_errors, format_thai_national_id,
    national_id_digits, passwords_match, validate_email, FieldErrors,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum WizardStep {
    Account = 1,
    PersonalInfo = 2,
    KycUpload = 3,
    Success = 4,
}

impl WizardStep {
    pub fn number(self) -> u8 {
        self as u8
    }

    fn previous(self) -> Option<WizardStep> {
        match self {
            WizardStep::PersonalInfo => Some(WizardStep::Account),
            WizardStep::KycUpload => Some(WizardStep::PersonalInfo),
            WizardStep::Account | WizardStep::Success => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WizardError {
    Invalid(FieldErrors),
    Submitting,
    Completed,
    Otp(OtpError),
    WrongStep { expected: WizardStep, current: WizardStep },
}

impl fmt::Display for WizardError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WizardError::Invalid(errors) => write!(f, "{} field(s) need attention", errors.len()),
            WizardError::Submitting => write!(f, "Registration is being submitted"),
            WizardError::Completed => write!(f, "Registration is already complete"),
            WizardError::Otp(e) => write!(f, "{}", e),
            WizardError::WrongStep { expected, current } => write!(
                f,
                "This belongs to step {} but the registration is on step {}",
                expected.number(),
                current.number()
            ),
        }
    }
}

impl From<OtpError> for WizardError {
    fn from(e: OtpError) -> Self {
        WizardError::Otp(e)
    }
}

/// An uploaded KYC image. `path` is where the file sits on disk; it is
/// not served over HTTP.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, JsonSchema)]
pub struct StoredImage {
    pub path: String,
    pub content_type: String,
    pub size: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KycSlot {
    IdCard,
    Selfie,
}

impl KycSlot {
    pub fn parse(value: &str) -> Option<KycSlot> {
        match value {
            "id-card" => Some(KycSlot::IdCard),
            "selfie" => Some(KycSlot::Selfie),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Default, Validate)]
pub struct AccountDetails {
    #[validate(custom = "check_email")]
    pub email: String,
    #[validate(length(min = 8, message = "Password must be at least 8 characters"))]
    pub password: String,
    pub confirm_password: String,
}

#[derive(Debug, Clone, Default, Validate)]
pub struct PersonalDetails {
    /// Digits only; separators are added when rendering.
    #[validate(custom = "check_national_id")]
    pub national_id: String,
    #[validate(custom = "check_not_blank")]
    pub first_name: String,
    #[validate(custom = "check_not_blank")]
    pub last_name: String,
}

#[derive(Debug, Clone, Default, Validate)]
pub struct KycDocuments {
    #[validate(required(message = "Upload a photo of your ID card"))]
    pub id_card_image: Option<StoredImage>,
    #[validate(required(message = "Upload a selfie holding your ID card"))]
    pub selfie_image: Option<StoredImage>,
}

fn into_errors(result: Result<(), ValidationErrors>) -> ValidationErrors {
    result.err().unwrap_or_default()
}

/// An in-progress registration: the draft plus where the wizard stands.
#[derive(Debug, Clone)]
pub struct Registration {
    pub id: Uuid,
    pub step: WizardStep,
    pub submitting: bool,
    pub account: AccountDetails,
    pub otp: OtpFlow,
    pub personal: PersonalDetails,
    pub kyc: KycDocuments,
    /// Why the last submission was turned back, if it was.
    pub submission_error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Registration {
    pub fn new(otp_mode: OtpMode, otp_cooldown_secs: u32) -> Self {
        let now = Utc::now();
        Registration {
            id: Uuid::new_v4(),
            step: WizardStep::Account,
            submitting: false,
            account: AccountDetails::default(),
            otp: OtpFlow::new(otp_mode, otp_cooldown_secs),
            personal: PersonalDetails::default(),
            kyc: KycDocuments::default(),
            submission_error: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Errors blocking `next` from `step`; empty when the step is complete.
    pub fn step_errors(&self, step: WizardStep) -> FieldErrors {
        match step {
            WizardStep::Account => {
                let mut errors = field_errors(&into_errors(self.account.validate()));
                if !self.otp.is_verified() {
                    errors.insert("otp".to_string(), "Verify your email address".to_string());
                }
                if let Err(e) = passwords_match(&self.account.password, &self.account.confirm_password) {
                    let message = e.message.map(|m| m.into_owned()).unwrap_or_default();
                    errors.insert("confirm_password".to_string(), message);
                }
                errors
            }
            WizardStep::PersonalInfo => field_errors(&into_errors(self.personal.validate())),
            WizardStep::KycUpload => field_errors(&into_errors(self.kyc.validate())),
            WizardStep::Success => FieldErrors::new(),
        }
    }

    fn ensure_editable(&self, expected: WizardStep) -> Result<(), WizardError> {
        if self.submitting {
            return Err(WizardError::Submitting);
        }
        if self.step == WizardStep::Success {
            return Err(WizardError::Completed);
        }
        if self.step != expected {
            return Err(WizardError::WrongStep { expected, current: self.step });
        }
        Ok(())
    }

    pub fn update_account(&mut self, dto: UpdateAccountDto) -> Result<(), WizardError> {
        self.ensure_editable(WizardStep::Account)?;

        if let Some(email) = dto.email {
            let email = email.trim().to_string();
            if email != self.account.email {
                self.otp.reset();
                self.account.email = email;
            }
        }
        if let Some(password) = dto.password {
            self.account.password = password;
        }
        if let Some(confirm) = dto.confirm_password {
            self.account.confirm_password = confirm;
        }
        self.updated_at = Utc::now();
        Ok(())
    }

    pub fn update_personal(&mut self, dto: UpdatePersonalDto) -> Result<(), WizardError> {
        self.ensure_editable(WizardStep::PersonalInfo)?;

        if let Some(national_id) = dto.national_id {
            self.personal.national_id = national_id_digits(&national_id);
        }
        if let Some(first_name) = dto.first_name {
            self.personal.first_name = first_name.trim().to_string();
        }
        if let Some(last_name) = dto.last_name {
            self.personal.last_name = last_name.trim().to_string();
        }
        self.updated_at = Utc::now();
        Ok(())
    }

    /// Fills `slot`, handing back the image it replaced.
    pub fn attach_image(
        &mut self,
        slot: KycSlot,
        image: StoredImage,
    ) -> Result<Option<StoredImage>, WizardError> {
        self.ensure_editable(WizardStep::KycUpload)?;

        let target = match slot {
            KycSlot::IdCard => &mut self.kyc.id_card_image,
            KycSlot::Selfie => &mut self.kyc.selfie_image,
        };
        let previous = target.replace(image);
        self.updated_at = Utc::now();
        Ok(previous)
    }

    pub fn images(&self) -> Vec<StoredImage> {
        [&self.kyc.id_card_image, &self.kyc.selfie_image]
            .into_iter()
            .flatten()
            .cloned()
            .collect()
    }

    /// True when `next` would start the submission.
    pub fn ready_to_submit(&self) -> bool {
        !self.submitting
            && self.step == WizardStep::KycUpload
            && self.step_errors(WizardStep::KycUpload).is_empty()
    }

    pub fn send_otp(&mut self, code: String, now: DateTime<Utc>) -> Result<(), WizardError> {
        self.ensure_editable(WizardStep::Account)?;
        self.otp.send(validate_email(&self.account.email), code, now)?;
        self.updated_at = now;
        Ok(())
    }

    pub fn input_otp(&mut self, dto: OtpInputDto) -> Result<(), WizardError> {
        self.ensure_editable(WizardStep::Account)?;
        match dto {
            OtpInputDto::Type { index, value } => self.otp.type_digit(index, value)?,
            OtpInputDto::Backspace { index } => self.otp.backspace(index)?,
            OtpInputDto::Paste { value } => self.otp.paste(&value)?,
        };
        self.updated_at = Utc::now();
        Ok(())
    }

    /// Advances one step when the current one validates.
    ///
    /// Leaving the KYC step only raises `submitting`; the caller finishes
    /// the move with [`Registration::complete_submission`].
    pub fn next(&mut self) -> Result<WizardStep, WizardError> {
        if self.submitting {
            return Err(WizardError::Submitting);
        }
        if self.step == WizardStep::Success {
            return Err(WizardError::Completed);
        }

        let errors = self.step_errors(self.step);
        if !errors.is_empty() {
            return Err(WizardError::Invalid(errors));
        }

        match self.step {
            WizardStep::Account => self.step = WizardStep::PersonalInfo,
            WizardStep::PersonalInfo => self.step = WizardStep::KycUpload,
            WizardStep::KycUpload => {
                self.submitting = true;
                self.submission_error = None;
            }
            WizardStep::Success => {}
        }
        self.updated_at = Utc::now();
        Ok(self.step)
    }

    pub fn back(&mut self) -> WizardStep {
        if self.submitting {
            return self.step;
        }
        if let Some(previous) = self.step.previous() {
            self.step = previous;
            self.updated_at = Utc::now();
        }
        self.step
    }

    /// Ends the simulated submission; a no-op unless one is in flight.
    pub fn complete_submission(&mut self) -> bool {
        if !self.submitting {
            return false;
        }
        self.submitting = false;
        self.step = WizardStep::Success;
        self.updated_at = Utc::now();
        true
    }

    /// Drops back to the KYC step, data intact, after a rejected submission.
    pub fn fail_submission(&mut self, reason: impl Into<String>) {
        if !self.submitting {
            return;
        }
        self.submitting = false;
        self.submission_error = Some(reason.into());
        self.updated_at = Utc::now();
    }

    /// Whether nothing has touched the draft for longer than `ttl`.
    pub fn is_idle(&self, now: DateTime<Utc>, ttl: std::time::Duration) -> bool {
        !self.submitting
            && now
                .signed_duration_since(self.updated_at)
                .to_std()
                .is_ok_and(|idle| idle > ttl)
    }

    pub fn view(&self, now: DateTime<Utc>) -> RegistrationView {
        RegistrationView {
            id: self.id,
            step: self.step,
            step_number: self.step.number(),
            submitting: self.submitting,
            email: self.account.email.clone(),
            otp: OtpView::new(&self.otp, now),
            national_id: format_thai_national_id(&self.personal.national_id),
            first_name: self.personal.first_name.clone(),
            last_name: self.personal.last_name.clone(),
            id_card_image: self.kyc.id_card_image.clone(),
            selfie_image: self.kyc.selfie_image.clone(),
            submission_error: self.submission_error.clone(),
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

#[derive(Debug, Default, Deserialize, JsonSchema)]
pub struct UpdateAccountDto {
    pub email: Option<String>,
    pub password: Option<String>,
    pub confirm_password: Option<String>,
}

#[derive(Debug, Default, Deserialize, JsonSchema)]
pub struct UpdatePersonalDto {
    pub national_id: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
}

/// Registration as shown to the client; passwords are never included.
#[derive(Debug, Clone, Serialize, JsonSchema)]
pub struct RegistrationView {
    pub id: Uuid,
    pub step: WizardStep,
    pub step_number: u8,
    pub submitting: bool,
    pub email: String,
    pub otp: OtpView,
    pub national_id: String,
    pub first_name: String,
    pub last_name: String,
    pub id_card_image: Option<StoredImage>,
    pub selfie_image: Option<StoredImage>,
    pub submission_error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, JsonSchema)]
pub struct NationalIdCheck {
    pub digits: String,
    pub formatted: String,
    pub valid: bool,
}
