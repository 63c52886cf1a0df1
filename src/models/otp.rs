use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use rocket_okapi::okapi::schemars;
use rocket_okapi::okapi::schemars::JsonSchema;
use std::fmt;

pub const OTP_LENGTH: usize = 6;

/// How an entered code is checked once all slots are filled.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum OtpMode {
    /// Any six digits verify; nothing is checked server side.
    #[default]
    Demo,
    /// The entered code must equal the one issued on send.
    Issued,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OtpStatus {
    NotSent,
    Sent { at: DateTime<Utc> },
    Verified,
}

impl OtpStatus {
    pub fn label(&self) -> &'static str {
        match self {
            OtpStatus::NotSent => "not_sent",
            OtpStatus::Sent { .. } => "sent",
            OtpStatus::Verified => "verified",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OtpError {
    InvalidEmail,
    Cooldown { seconds_remaining: u32 },
    NotSent,
    AlreadyVerified,
    InvalidCode,
}

impl fmt::Display for OtpError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OtpError::InvalidEmail => write!(f, "Enter a valid email before requesting a code"),
            OtpError::Cooldown { seconds_remaining } => {
                write!(f, "Please wait {}s before requesting a new code", seconds_remaining)
            }
            OtpError::NotSent => write!(f, "Request a verification code first"),
            OtpError::AlreadyVerified => write!(f, "Email is already verified"),
            OtpError::InvalidCode => write!(f, "The verification code is incorrect"),
        }
    }
}

/// Six single-digit slots with a cursor.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OtpInput {
    slots: [Option<char>; OTP_LENGTH],
    focus: usize,
}

impl OtpInput {
    pub fn slots(&self) -> &[Option<char>; OTP_LENGTH] {
        &self.slots
    }

    pub fn focus(&self) -> usize {
        self.focus
    }

    /// Returns false (and changes nothing) for a non-digit or an out of
    /// range slot.
    pub fn type_digit(&mut self, index: usize, ch: char) -> bool {
        if index >= OTP_LENGTH || !ch.is_ascii_digit() {
            return false;
        }
        self.slots[index] = Some(ch);
        self.focus = (index + 1).min(OTP_LENGTH - 1);
        true
    }

    pub fn backspace(&mut self, index: usize) {
        if index >= OTP_LENGTH {
            return;
        }
        if self.slots[index].is_some() {
            self.slots[index] = None;
            self.focus = index;
        } else if index > 0 {
            self.focus = index - 1;
        }
    }

    /// Spreads pasted digits across the slots from the first one.
    pub fn paste(&mut self, text: &str) -> bool {
        let digits: Vec<char> = text.chars().filter(|c| !c.is_whitespace()).collect();
        if digits.is_empty() || !digits.iter().all(char::is_ascii_digit) {
            return false;
        }

        for (slot, digit) in self.slots.iter_mut().zip(digits.iter()) {
            *slot = Some(*digit);
        }
        self.focus = digits.len().min(OTP_LENGTH) - 1;
        true
    }

    pub fn is_complete(&self) -> bool {
        self.slots.iter().all(Option::is_some)
    }

    pub fn code(&self) -> Option<String> {
        self.slots.iter().copied().collect()
    }

    pub fn clear(&mut self) {
        *self = OtpInput::default();
    }
}

/// Email verification inside the account step.
#[derive(Debug, Clone)]
pub struct OtpFlow {
    status: OtpStatus,
    input: OtpInput,
    mode: OtpMode,
    cooldown_secs: u32,
    issued_code: Option<String>,
}

impl OtpFlow {
    pub fn new(mode: OtpMode, cooldown_secs: u32) -> Self {
        OtpFlow {
            status: OtpStatus::NotSent,
            input: OtpInput::default(),
            mode,
            cooldown_secs,
            issued_code: None,
        }
    }

    pub fn status(&self) -> &OtpStatus {
        &self.status
    }

    pub fn input(&self) -> &OtpInput {
        &self.input
    }

    pub fn is_verified(&self) -> bool {
        self.status == OtpStatus::Verified
    }

    /// Countdown shown next to the resend button, one tick per second.
    pub fn seconds_remaining(&self, now: DateTime<Utc>) -> u32 {
        match self.status {
            OtpStatus::Sent { at } => {
                let elapsed = (now - at).num_seconds().max(0);
                let elapsed = u32::try_from(elapsed).unwrap_or(u32::MAX);
                self.cooldown_secs.saturating_sub(elapsed)
            }
            _ => 0,
        }
    }

    /// Starts (or restarts) the countdown. `code` is the value that was
    /// delivered to the user; it is only consulted in [`OtpMode::Issued`].
    pub fn send(&mut self, email_valid: bool, code: String, now: DateTime<Utc>) -> Result<(), OtpError> {
        if !email_valid {
            return Err(OtpError::InvalidEmail);
        }
        match self.status {
            OtpStatus::Verified => return Err(OtpError::AlreadyVerified),
            OtpStatus::Sent { .. } => {
                let seconds_remaining = self.seconds_remaining(now);
                if seconds_remaining > 0 {
                    return Err(OtpError::Cooldown { seconds_remaining });
                }
            }
            OtpStatus::NotSent => {}
        }

        self.status = OtpStatus::Sent { at: now };
        self.input.clear();
        self.issued_code = Some(code);
        Ok(())
    }

    /// Forgets any sent code, e.g. after the email address changed.
    pub fn reset(&mut self) {
        self.status = OtpStatus::NotSent;
        self.input.clear();
        self.issued_code = None;
    }

    pub fn type_digit(&mut self, index: usize, ch: char) -> Result<&OtpStatus, OtpError> {
        self.ensure_accepting()?;
        self.input.type_digit(index, ch);
        self.settle()
    }

    pub fn backspace(&mut self, index: usize) -> Result<&OtpStatus, OtpError> {
        self.ensure_accepting()?;
        self.input.backspace(index);
        Ok(&self.status)
    }

    pub fn paste(&mut self, text: &str) -> Result<&OtpStatus, OtpError> {
        self.ensure_accepting()?;
        self.input.paste(text);
        self.settle()
    }

    fn ensure_accepting(&self) -> Result<(), OtpError> {
        match self.status {
            OtpStatus::Sent { .. } => Ok(()),
            OtpStatus::NotSent => Err(OtpError::NotSent),
            OtpStatus::Verified => Err(OtpError::AlreadyVerified),
        }
    }

    fn settle(&mut self) -> Result<&OtpStatus, OtpError> {
        let Some(entered) = self.input.code() else {
            return Ok(&self.status);
        };

        let accepted = match self.mode {
            OtpMode::Demo => true,
            OtpMode::Issued => self.issued_code.as_deref() == Some(entered.as_str()),
        };

        if accepted {
            self.status = OtpStatus::Verified;
            self.issued_code = None;
            Ok(&self.status)
        } else {
            self.input.clear();
            Err(OtpError::InvalidCode)
        }
    }
}

/// Snapshot of the OTP sub-flow returned to clients.
#[derive(Debug, Clone, Serialize, JsonSchema)]
pub struct OtpView {
    pub status: String,
    pub seconds_remaining: u32,
    pub can_resend: bool,
    pub slots: Vec<Option<char>>,
    pub focus: usize,
}

impl OtpView {
    pub fn new(flow: &OtpFlow, now: DateTime<Utc>) -> Self {
        let seconds_remaining = flow.seconds_remaining(now);
        OtpView {
            status: flow.status().label().to_string(),
            seconds_remaining,
            can_resend: !flow.is_verified() && seconds_remaining == 0,
            slots: flow.input().slots().to_vec(),
            focus: flow.input().focus(),
        }
    }
}

#[derive(Debug, Deserialize, JsonSchema)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum OtpInputDto {
    Type { index: usize, value: char },
    Backspace { index: usize },
    Paste { value: String },
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn sent_flow(mode: OtpMode) -> (OtpFlow, DateTime<Utc>) {
        let now = Utc::now();
        let mut flow = OtpFlow::new(mode, 60);
        flow.send(true, "482913".to_string(), now).unwrap();
        (flow, now)
    }

    #[test]
    fn send_requires_valid_email() {
        let mut flow = OtpFlow::new(OtpMode::Demo, 60);
        assert_eq!(
            flow.send(false, "000000".into(), Utc::now()),
            Err(OtpError::InvalidEmail)
        );
        assert_eq!(flow.status(), &OtpStatus::NotSent);
    }

    #[test]
    fn countdown_blocks_resend_until_zero() {
        let (mut flow, at) = sent_flow(OtpMode::Demo);
        assert_eq!(flow.seconds_remaining(at), 60);
        assert_eq!(flow.seconds_remaining(at + Duration::milliseconds(1500)), 59);
        assert_eq!(
            flow.send(true, "111111".into(), at + Duration::seconds(59)),
            Err(OtpError::Cooldown { seconds_remaining: 1 })
        );
        assert_eq!(flow.seconds_remaining(at + Duration::seconds(90)), 0);
        assert!(flow.send(true, "111111".into(), at + Duration::seconds(60)).is_ok());
    }

    #[test]
    fn typing_advances_focus_and_ignores_non_digits() {
        let mut input = OtpInput::default();
        assert!(input.type_digit(0, '4'));
        assert_eq!(input.focus(), 1);
        assert!(!input.type_digit(1, 'x'));
        assert_eq!(input.slots()[1], None);
        assert!(input.type_digit(5, '9'));
        assert_eq!(input.focus(), 5);
    }

    #[test]
    fn backspace_on_empty_slot_moves_back() {
        let mut input = OtpInput::default();
        input.type_digit(0, '1');
        input.type_digit(1, '2');
        input.backspace(2);
        assert_eq!(input.focus(), 1);
        input.backspace(1);
        assert_eq!(input.slots()[1], None);
        assert_eq!(input.focus(), 1);
        input.backspace(0);
        input.backspace(0);
        assert_eq!(input.focus(), 0);
    }

    #[test]
    fn demo_mode_verifies_when_all_slots_filled() {
        let (mut flow, _) = sent_flow(OtpMode::Demo);
        for (i, c) in "12345".chars().enumerate() {
            assert_eq!(flow.type_digit(i, c).unwrap().label(), "sent");
        }
        assert_eq!(flow.type_digit(5, '6').unwrap(), &OtpStatus::Verified);
        assert_eq!(flow.type_digit(0, '1'), Err(OtpError::AlreadyVerified));
    }

    #[test]
    fn paste_triggers_verification() {
        let (mut flow, _) = sent_flow(OtpMode::Demo);
        assert_eq!(flow.paste(" 123 456 ").unwrap(), &OtpStatus::Verified);
    }

    #[test]
    fn paste_rejects_non_digits() {
        let (mut flow, _) = sent_flow(OtpMode::Demo);
        assert_eq!(flow.paste("12a456").unwrap().label(), "sent");
        assert!(flow.input().slots().iter().all(Option::is_none));
    }

    #[test]
    fn issued_mode_checks_the_code() {
        let (mut flow, _) = sent_flow(OtpMode::Issued);
        assert_eq!(flow.paste("000000"), Err(OtpError::InvalidCode));
        assert!(flow.input().slots().iter().all(Option::is_none));
        assert_eq!(flow.paste("482913").unwrap(), &OtpStatus::Verified);
    }

    #[test]
    fn input_before_send_is_rejected() {
        let mut flow = OtpFlow::new(OtpMode::Demo, 60);
        assert_eq!(flow.type_digit(0, '1'), Err(OtpError::NotSent));
    }
}
