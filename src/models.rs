use chrono::{DateTime, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

/// Template used when none is configured.
pub const DEFAULT_TEMPLATE: &str = "Parabéns [NOME]! Desejamos um feliz aniversário! 🎉";

/// Template stored in a fresh configuration.
pub const INITIAL_TEMPLATE: &str = "Parabéns [NOME]! Desejamos um feliz aniversário! 🎉🎂 Que este novo ano de vida seja repleto de alegrias, conquistas e momentos especiais!";

fn yes() -> bool {
    true
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Contact {
    pub id: String,
    pub name: String,
    pub birth_date: String,
    pub phone: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default = "yes")]
    pub has_messaging_app: bool,
    #[serde(default = "yes")]
    pub active: bool,
}

impl Contact {
    /// Parses the stored birth date. Accepts plain ISO dates as well as
    /// ISO date-times, keeping only the calendar part.
    pub fn birthday(&self) -> Option<NaiveDate> {
        parse_birth_date(&self.birth_date)
    }

    pub fn phone_digits(&self) -> String {
        crate::utils::digits_only(&self.phone)
    }

    /// Whether an automatic or bulk send may target this contact.
    pub fn is_dispatch_eligible(&self) -> bool {
        self.active
            && self.has_messaging_app
            && !self.name.trim().is_empty()
            && !self.phone_digits().is_empty()
    }
}

pub fn parse_birth_date(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();
    if let Ok(date) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        return Some(date);
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.date_naive());
    }
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S")
        .ok()
        .map(|dt| dt.date())
}

/// Fields supplied when creating a contact.
#[derive(Debug, Clone, Default)]
pub struct ContactDraft {
    pub name: String,
    pub birth_date: String,
    pub phone: String,
    pub email: Option<String>,
    pub has_messaging_app: bool,
    pub active: bool,
}

/// Partial update applied by `ContactStore::edit`.
#[derive(Debug, Clone, Default)]
pub struct ContactPatch {
    pub name: Option<String>,
    pub birth_date: Option<String>,
    pub phone: Option<String>,
    pub email: Option<Option<String>>,
    pub has_messaging_app: Option<bool>,
    pub active: Option<bool>,
}

impl ContactPatch {
    pub fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.birth_date.is_none()
            && self.phone.is_none()
            && self.email.is_none()
            && self.has_messaging_app.is_none()
            && self.active.is_none()
    }
}

/// Advisory channel flags, surfaced to the user only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct NotificationPreferences {
    pub email_enabled: bool,
    pub sms_enabled: bool,
    pub chat_enabled: bool,
}

impl Default for NotificationPreferences {
    fn default() -> Self {
        Self {
            email_enabled: false,
            sms_enabled: false,
            chat_enabled: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AutoSendConfig {
    pub enabled: bool,
    /// Local wall-clock time as `HH:MM`.
    pub time_of_day: String,
}

impl Default for AutoSendConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            time_of_day: "09:00".to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DispatchRecord {
    pub last_auto_send_date: Option<NaiveDate>,
}

/// The persisted configuration blob. Every field falls back to its default
/// so blobs written by older versions keep loading.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Configuration {
    pub contacts: Vec<Contact>,
    pub preferences: NotificationPreferences,
    pub message_template: String,
    pub image_url: Option<String>,
    pub auto_send: AutoSendConfig,
    pub dispatch: DispatchRecord,
}

impl Default for Configuration {
    fn default() -> Self {
        Self {
            contacts: Vec::new(),
            preferences: NotificationPreferences::default(),
            message_template: INITIAL_TEMPLATE.to_string(),
            image_url: None,
            auto_send: AutoSendConfig::default(),
            dispatch: DispatchRecord::default(),
        }
    }
}
