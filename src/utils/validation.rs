use regex::Regex;
use std::borrow::Cow;
use std::sync::LazyLock;
use validator::{ValidationError, ValidationErrors};

use super::FieldErrors;

static EMAIL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[a-zA-Z0-9._%+-]+@[a-zA-Z0-9.-]+\.[a-zA-Z]{2,}$").expect("email regex")
});

pub const NATIONAL_ID_LEN: usize = 13;

/// Separator positions of the displayed form `X-XXXX-XXXXX-XX-X`.
const NATIONAL_ID_BREAKS: [usize; 4] = [1, 5, 10, 12];

pub fn validate_email(email: &str) -> bool {
    EMAIL_RE.is_match(email)
}

pub fn normalize_digits(input: &str) -> String {
    input.chars().filter(char::is_ascii_digit).collect()
}

/// Checks the weighted mod-11 check digit of a Thai national ID.
///
/// Separators and other non-digits are ignored; anything that does not
/// leave exactly 13 digits is rejected.
pub fn validate_thai_national_id(input: &str) -> bool {
    let digits: Vec<u32> = input.chars().filter_map(|c| c.to_digit(10)).collect();
    if digits.len() != NATIONAL_ID_LEN {
        return false;
    }

    let sum: u32 = digits[..12]
        .iter()
        .zip((2..=13).rev())
        .map(|(d, weight)| d * weight)
        .sum();
    let check = (11 - sum % 11) % 10;

    check == digits[12]
}

/// Digits of a national ID as entered, capped at 13 like the input box.
pub fn national_id_digits(input: &str) -> String {
    normalize_digits(input).chars().take(NATIONAL_ID_LEN).collect()
}

/// Renders up to 13 digits with separators inserted as they are typed.
pub fn format_thai_national_id(input: &str) -> String {
    let digits = national_id_digits(input);

    let mut formatted = String::with_capacity(digits.len() + NATIONAL_ID_BREAKS.len());
    for (i, c) in digits.chars().enumerate() {
        if NATIONAL_ID_BREAKS.contains(&i) {
            formatted.push('-');
        }
        formatted.push(c);
    }
    formatted
}

pub fn generate_otp() -> String {
    use rand::Rng;
    let mut rng = rand::thread_rng();
    let otp: u32 = rng.gen_range(100000..=999999);
    otp.to_string()
}

fn field_error(code: &'static str, message: &'static str) -> ValidationError {
    let mut error = ValidationError::new(code);
    error.message = Some(Cow::Borrowed(message));
    error
}

// `validator` custom rules

pub fn check_email(email: &str) -> Result<(), ValidationError> {
    if validate_email(email) {
        Ok(())
    } else {
        Err(field_error("email", "Please enter a valid email address"))
    }
}

pub fn check_national_id(national_id: &str) -> Result<(), ValidationError> {
    if validate_thai_national_id(national_id) {
        Ok(())
    } else {
        Err(field_error("national_id", "Invalid national ID number"))
    }
}

pub fn check_not_blank(value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        Err(field_error("required", "This field is required"))
    } else {
        Ok(())
    }
}

pub fn passwords_match(password: &str, confirm: &str) -> Result<(), ValidationError> {
    if password == confirm {
        Ok(())
    } else {
        Err(field_error("must_match", "Passwords do not match"))
    }
}

/// Flattens `validator` output to the first message of each field.
pub fn field_errors(errors: &ValidationErrors) -> FieldErrors {
    errors
        .field_errors()
        .into_iter()
        .filter_map(|(field, list)| {
            list.first().map(|e| {
                let message = e
                    .message
                    .as_ref()
                    .map(|m| m.to_string())
                    .unwrap_or_else(|| format!("Invalid {}", field.replace('_', " ")));
                (field.to_string(), message)
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn check_digit(digits: &str) -> u32 {
        let d: Vec<u32> = digits.chars().filter_map(|c| c.to_digit(10)).collect();
        let sum: u32 = (0..12).map(|i| d[i] * (13 - i as u32)).sum();
        (11 - sum % 11) % 10
    }

    #[test]
    fn national_id_checksum_vectors() {
        // sum = 146, 146 % 11 = 3, check digit = 8
        assert!(!validate_thai_national_id("1101700230705"));
        assert!(validate_thai_national_id("1101700230708"));
        assert!(validate_thai_national_id("1234567890121"));
        assert!(validate_thai_national_id("1-2345-67890-12-1"));
    }

    #[test]
    fn national_id_accepts_only_the_computed_check_digit() {
        for prefix in ["110170023070", "123456789012", "310040012345", "999999999999"] {
            let expected = check_digit(&format!("{prefix}0"));
            for last in 0..10 {
                let id = format!("{prefix}{last}");
                assert_eq!(validate_thai_national_id(&id), last == expected, "{id}");
            }
        }
    }

    #[test]
    fn national_id_rejects_wrong_length() {
        assert!(!validate_thai_national_id(""));
        assert!(!validate_thai_national_id("123456789012"));
        assert!(!validate_thai_national_id("12345678901210"));
        assert!(!validate_thai_national_id("abc-defg-hijkl-mn-o"));
    }

    #[test]
    fn national_id_digits_match_what_is_displayed() {
        assert_eq!(national_id_digits("1-1017-00230-70-89"), "1101700230708");
        assert_eq!(
            normalize_digits(&format_thai_national_id("1-1017-00230-70-89")),
            national_id_digits("1-1017-00230-70-89")
        );
        assert_eq!(national_id_digits("11-017"), "11017");
    }

    #[test]
    fn national_id_formatting() {
        assert_eq!(format_thai_national_id(""), "");
        assert_eq!(format_thai_national_id("1"), "1");
        assert_eq!(format_thai_national_id("11017"), "1-1017");
        assert_eq!(format_thai_national_id("110170023"), "1-1017-0023");
        assert_eq!(format_thai_national_id("1101700230"), "1-1017-00230");
        assert_eq!(format_thai_national_id("110170023070"), "1-1017-00230-70");
        assert_eq!(format_thai_national_id("1101700230708"), "1-1017-00230-70-8");
        assert_eq!(format_thai_national_id("1101700230708999"), "1-1017-00230-70-8");
    }

    #[test]
    fn formatting_is_idempotent_and_keeps_digits() {
        for raw in ["", "1", "11017002", "1-1017-0023", "1101700230708", "12 34x56"] {
            let once = format_thai_national_id(raw);
            assert_eq!(format_thai_national_id(&once), once);
            assert!(normalize_digits(raw).starts_with(&normalize_digits(&once)));
        }
    }

    #[test]
    fn email_pattern() {
        assert!(validate_email("somchai@example.co.th"));
        assert!(!validate_email("somchai@"));
        assert!(!validate_email("no-at-sign.com"));
        assert!(check_email("a.b@farm.io").is_ok());
    }

    #[test]
    fn password_pairs() {
        assert!(passwords_match("abcd1234", "abcd1234").is_ok());
        let err = passwords_match("abcd1234", "abcd1235").unwrap_err();
        assert_eq!(err.code, "must_match");
    }

    #[test]
    fn otp_is_six_digits() {
        let otp = generate_otp();
        assert_eq!(otp.len(), 6);
        assert!(otp.chars().all(|c| c.is_ascii_digit()));
    }
}
