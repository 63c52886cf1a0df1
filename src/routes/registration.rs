use rocket::fs::TempFile;
use rocket::serde::json::Json;
use rocket::State;
use rocket_okapi::openapi;
use std::path::Path;
use tokio::fs;
use uuid::Uuid;

use crate::config::AppSettings;
use crate::models::{
    KycSlot, NationalIdCheck, OtpError, OtpInputDto, RegistrationView, StoredImage,
    UpdateAccountDto, UpdatePersonalDto, WizardError, WizardStep,
};
use crate::services::registration::remove_images;
use crate::services::{RegistrationError, RegistrationService};
use crate::utils::{
    format_thai_national_id, normalize_digits, validate_thai_national_id, ApiError, ApiResponse,
    FieldErrors,
};

const MAX_IMAGE_BYTES: u64 = 10 * 1024 * 1024;

impl From<RegistrationError> for ApiError {
    fn from(e: RegistrationError) -> Self {
        match e {
            RegistrationError::NotFound => ApiError::not_found("Registration not found"),
            RegistrationError::EmailTaken => {
                ApiError::conflict("An account with this email already exists")
            }
            RegistrationError::Wizard(WizardError::Invalid(errors)) => ApiError::validation(errors),
            RegistrationError::Wizard(WizardError::Otp(otp)) => otp.into(),
            RegistrationError::Wizard(other) => ApiError::conflict(other.to_string()),
        }
    }
}

impl From<OtpError> for ApiError {
    fn from(e: OtpError) -> Self {
        let single = |field: &str| {
            let mut errors = FieldErrors::new();
            errors.insert(field.to_string(), e.to_string());
            ApiError::validation(errors)
        };
        match e {
            OtpError::InvalidEmail => single("email"),
            OtpError::InvalidCode => single("otp"),
            OtpError::Cooldown { .. } => ApiError::too_many_requests(e.to_string()),
            OtpError::NotSent | OtpError::AlreadyVerified => ApiError::conflict(e.to_string()),
        }
    }
}

fn parse_id(id: &str) -> Result<Uuid, ApiError> {
    Uuid::parse_str(id).map_err(|_| ApiError::bad_request("Invalid registration id"))
}

fn image_extension(file: &TempFile<'_>) -> Option<String> {
    if let Some(ext) = file
        .raw_name()
        .map(|n| n.dangerous_unsafe_unsanitized_raw().as_str())
        .and_then(|n| Path::new(n).extension())
        .and_then(|e| e.to_str())
    {
        return Some(ext.to_lowercase());
    }

    match file.content_type().map(|ct| ct.to_string()).as_deref() {
        Some("image/jpeg") | Some("image/jpg") => Some("jpg".to_string()),
        Some("image/png") => Some("png".to_string()),
        Some("image/webp") => Some("webp".to_string()),
        _ => None,
    }
}

fn is_valid_image_extension(ext: &str) -> bool {
    matches!(ext, "jpg" | "jpeg" | "png" | "webp")
}

async fn store_kyc_image(file: &mut TempFile<'_>, upload_dir: &str) -> Result<StoredImage, ApiError> {
    if file.len() == 0 {
        return Err(ApiError::bad_request("Uploaded file is empty"));
    }
    if file.len() > MAX_IMAGE_BYTES {
        return Err(ApiError::bad_request("Image must be 10MB or smaller"));
    }

    let extension = image_extension(file)
        .ok_or_else(|| ApiError::bad_request("Cannot determine file type"))?;
    if !is_valid_image_extension(&extension) {
        return Err(ApiError::bad_request(format!(
            "Only image files (JPEG, PNG, WebP) are allowed. Received: '{}'",
            extension
        )));
    }

    let dir = format!("{}/kyc", upload_dir.trim_end_matches('/'));
    fs::create_dir_all(&dir)
        .await
        .map_err(|e| ApiError::internal_error(format!("Failed to create directory: {}", e)))?;

    let filename = format!(
        "{}_{}.{}",
        Uuid::new_v4(),
        chrono::Utc::now().timestamp(),
        extension
    );
    let filepath = format!("{}/{}", dir, filename);
    let size = file.len();
    let content_type = file
        .content_type()
        .map(|ct| ct.to_string())
        .unwrap_or_else(|| format!("image/{}", extension));

    file.persist_to(&filepath)
        .await
        .map_err(|e| ApiError::internal_error(format!("Failed to save file: {}", e)))?;

    Ok(StoredImage {
        path: filepath,
        content_type,
        size,
    })
}

/// --------------------
/// Wizard lifecycle
/// --------------------
#[openapi(tag = "Registration")]
#[post("/registrations")]
pub async fn create_registration(
    registrations: &State<RegistrationService>,
) -> Json<ApiResponse<RegistrationView>> {
    Json(ApiResponse::success(registrations.create().await))
}

#[openapi(tag = "Registration")]
#[get("/registrations/<id>")]
pub async fn get_registration(
    registrations: &State<RegistrationService>,
    id: &str,
) -> Result<Json<ApiResponse<RegistrationView>>, ApiError> {
    let view = registrations
        .get(parse_id(id)?)
        .await
        .ok_or_else(|| ApiError::not_found("Registration not found"))?;
    Ok(Json(ApiResponse::success(view)))
}

#[openapi(tag = "Registration")]
#[delete("/registrations/<id>")]
pub async fn discard_registration(
    registrations: &State<RegistrationService>,
    id: &str,
) -> Result<Json<ApiResponse<serde_json::Value>>, ApiError> {
    if !registrations.discard(parse_id(id)?).await {
        return Err(ApiError::not_found("Registration not found"));
    }
    Ok(Json(ApiResponse::success_with_message(
        "Registration discarded".to_string(),
        serde_json::json!({ "id": id }),
    )))
}

#[openapi(tag = "Registration")]
#[post("/registrations/<id>/next")]
pub async fn next_step(
    registrations: &State<RegistrationService>,
    id: &str,
) -> Result<Json<ApiResponse<RegistrationView>>, ApiError> {
    let view = registrations.next(parse_id(id)?).await?;
    Ok(Json(ApiResponse::success(view)))
}

#[openapi(tag = "Registration")]
#[post("/registrations/<id>/back")]
pub async fn previous_step(
    registrations: &State<RegistrationService>,
    id: &str,
) -> Result<Json<ApiResponse<RegistrationView>>, ApiError> {
    let view = registrations.back(parse_id(id)?).await?;
    Ok(Json(ApiResponse::success(view)))
}

/// --------------------
/// Step 1: account + OTP
/// --------------------
#[openapi(tag = "Registration")]
#[put("/registrations/<id>/account", data = "<dto>")]
pub async fn update_account(
    registrations: &State<RegistrationService>,
    id: &str,
    dto: Json<UpdateAccountDto>,
) -> Result<Json<ApiResponse<RegistrationView>>, ApiError> {
    let view = registrations.update_account(parse_id(id)?, dto.into_inner()).await?;
    Ok(Json(ApiResponse::success(view)))
}

#[openapi(tag = "Registration")]
#[post("/registrations/<id>/otp/send")]
pub async fn send_otp(
    registrations: &State<RegistrationService>,
    id: &str,
) -> Result<Json<ApiResponse<RegistrationView>>, ApiError> {
    let view = registrations.send_otp(parse_id(id)?).await?;
    Ok(Json(ApiResponse::success_with_message(
        "Verification code sent".to_string(),
        view,
    )))
}

#[openapi(tag = "Registration")]
#[post("/registrations/<id>/otp/input", data = "<dto>")]
pub async fn input_otp(
    registrations: &State<RegistrationService>,
    id: &str,
    dto: Json<OtpInputDto>,
) -> Result<Json<ApiResponse<RegistrationView>>, ApiError> {
    let view = registrations.input_otp(parse_id(id)?, dto.into_inner()).await?;
    Ok(Json(ApiResponse::success(view)))
}

/// --------------------
/// Step 2: personal info
/// --------------------
#[openapi(tag = "Registration")]
#[put("/registrations/<id>/personal", data = "<dto>")]
pub async fn update_personal(
    registrations: &State<RegistrationService>,
    id: &str,
    dto: Json<UpdatePersonalDto>,
) -> Result<Json<ApiResponse<RegistrationView>>, ApiError> {
    let view = registrations.update_personal(parse_id(id)?, dto.into_inner()).await?;
    Ok(Json(ApiResponse::success(view)))
}

/// --------------------
/// Step 3: KYC images
/// --------------------
#[openapi(tag = "Registration")]
#[post("/registrations/<id>/kyc/<slot>", data = "<file>")]
pub async fn upload_kyc_image(
    registrations: &State<RegistrationService>,
    settings: &State<AppSettings>,
    id: &str,
    slot: &str,
    mut file: TempFile<'_>,
) -> Result<Json<ApiResponse<RegistrationView>>, ApiError> {
    let id = parse_id(id)?;
    let slot = KycSlot::parse(slot)
        .ok_or_else(|| ApiError::bad_request("Image slot must be 'id-card' or 'selfie'"))?;

    // Reject before touching the disk when the draft cannot take an image.
    let current = registrations
        .get(id)
        .await
        .ok_or_else(|| ApiError::not_found("Registration not found"))?;
    if current.submitting || current.step != WizardStep::KycUpload {
        return Err(ApiError::conflict("Images can only be uploaded on the KYC step"));
    }

    let image = store_kyc_image(&mut file, &settings.upload_dir).await?;
    match registrations.attach_image(id, slot, image.clone()).await {
        Ok(view) => Ok(Json(ApiResponse::success(view))),
        Err(e) => {
            // the draft moved on (or vanished) while the file was being written
            remove_images(vec![image]).await;
            Err(e.into())
        }
    }
}

/// --------------------
/// National ID helper
/// --------------------
#[openapi(tag = "Registration")]
#[get("/national-id/check?<value>")]
pub async fn national_id_check(value: &str) -> Json<ApiResponse<NationalIdCheck>> {
    Json(ApiResponse::success(NationalIdCheck {
        digits: normalize_digits(value),
        formatted: format_thai_national_id(value),
        valid: validate_thai_national_id(value),
    }))
}
