use log::{error, info};
use std::sync::Arc;
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::models::{
    AutoSendConfig, Configuration, Contact, ContactDraft, ContactPatch, DispatchRecord,
    NotificationPreferences, parse_birth_date,
};
use crate::storage::KeyValueStore;
use crate::utils::{digits_only, parse_time_of_day};

pub const CONFIG_KEY: &str = "birthday_notifier_configuration";

/// Owner of the contact list and user preferences. Every mutation is written
/// back to the key-value store before returning.
pub struct ContactStore {
    store: Arc<dyn KeyValueStore>,
    config: Configuration,
}

impl ContactStore {
    /// Reads the configuration blob. Missing, unreadable or corrupt blobs
    /// fall back to the defaults.
    pub fn load(store: Arc<dyn KeyValueStore>) -> Self {
        let config = read_stored(store.as_ref()).unwrap_or_default();
        Self { store, config }
    }

    /// Picks up changes other writers saved since this store was loaded. An
    /// unreadable blob keeps the in-memory copy.
    pub fn reload(&mut self) {
        if let Some(config) = read_stored(self.store.as_ref()) {
            self.config = config;
        }
    }

    pub fn configuration(&self) -> &Configuration {
        &self.config
    }

    fn save(&self) -> Result<()> {
        let raw = serde_json::to_string(&self.config)?;
        self.store.set(CONFIG_KEY, &raw)?;
        Ok(())
    }

    /// Applies `change` on top of the latest stored configuration and only
    /// keeps it once it has been persisted.
    fn commit<T>(&mut self, change: impl FnOnce(&mut Configuration) -> Result<T>) -> Result<T> {
        self.reload();
        let previous = self.config.clone();
        let out = change(&mut self.config)?;
        if let Err(e) = self.save() {
            self.config = previous;
            return Err(e);
        }
        Ok(out)
    }

    pub fn list(&self) -> &[Contact] {
        &self.config.contacts
    }

    pub fn get(&self, id: &str) -> Option<&Contact> {
        self.config.contacts.iter().find(|c| c.id == id)
    }

    pub fn add(&mut self, draft: ContactDraft) -> Result<Contact> {
        let contact = Contact {
            id: Uuid::new_v4().to_string(),
            name: draft.name.trim().to_string(),
            birth_date: draft.birth_date.trim().to_string(),
            phone: draft.phone.trim().to_string(),
            email: draft.email.filter(|e| !e.trim().is_empty()),
            has_messaging_app: draft.has_messaging_app,
            active: draft.active,
        };
        validate(&contact)?;
        let added = contact.clone();
        self.commit(move |cfg| {
            cfg.contacts.push(contact);
            Ok(())
        })?;
        info!("added contact {} ({})", added.name, added.id);
        Ok(added)
    }

    pub fn edit(&mut self, id: &str, patch: ContactPatch) -> Result<Contact> {
        self.commit(|cfg| {
            let contact = cfg
                .contacts
                .iter_mut()
                .find(|c| c.id == id)
                .ok_or_else(|| Error::ContactNotFound(id.to_string()))?;
            let mut updated = contact.clone();
            if let Some(name) = patch.name {
                updated.name = name.trim().to_string();
            }
            if let Some(birth_date) = patch.birth_date {
                updated.birth_date = birth_date.trim().to_string();
            }
            if let Some(phone) = patch.phone {
                updated.phone = phone.trim().to_string();
            }
            if let Some(email) = patch.email {
                updated.email = email.filter(|e| !e.trim().is_empty());
            }
            if let Some(has_app) = patch.has_messaging_app {
                updated.has_messaging_app = has_app;
            }
            if let Some(active) = patch.active {
                updated.active = active;
            }
            validate(&updated)?;
            *contact = updated.clone();
            Ok(updated)
        })
    }

    pub fn set_active(&mut self, id: &str, active: bool) -> Result<Contact> {
        self.edit(
            id,
            ContactPatch {
                active: Some(active),
                ..ContactPatch::default()
            },
        )
    }

    pub fn remove(&mut self, id: &str) -> Result<Contact> {
        let removed = self.commit(|cfg| {
            let idx = cfg
                .contacts
                .iter()
                .position(|c| c.id == id)
                .ok_or_else(|| Error::ContactNotFound(id.to_string()))?;
            Ok(cfg.contacts.remove(idx))
        })?;
        info!("removed contact {} ({})", removed.name, removed.id);
        Ok(removed)
    }

    pub fn set_template(&mut self, template: &str) -> Result<()> {
        let template = template.to_string();
        self.commit(|cfg| {
            cfg.message_template = template;
            Ok(())
        })
    }

    pub fn set_image_url(&mut self, image_url: Option<String>) -> Result<()> {
        self.commit(|cfg| {
            cfg.image_url = image_url.filter(|u| !u.trim().is_empty());
            Ok(())
        })
    }

    pub fn set_preferences(&mut self, preferences: NotificationPreferences) -> Result<()> {
        self.commit(|cfg| {
            cfg.preferences = preferences;
            Ok(())
        })
    }

    pub fn set_auto_send(&mut self, auto_send: AutoSendConfig) -> Result<()> {
        let time = parse_time_of_day(&auto_send.time_of_day)?;
        self.commit(|cfg| {
            cfg.auto_send = AutoSendConfig {
                enabled: auto_send.enabled,
                time_of_day: time.format("%H:%M").to_string(),
            };
            Ok(())
        })
    }

    /// Persists the dispatch record produced by the gate.
    pub fn record_dispatch(&mut self, record: DispatchRecord) -> Result<()> {
        self.commit(|cfg| {
            cfg.dispatch = record;
            Ok(())
        })
    }
}

/// `None` when the blob cannot be read or decoded; defaults when it was never
/// written.
fn read_stored(store: &dyn KeyValueStore) -> Option<Configuration> {
    match store.get(CONFIG_KEY) {
        Ok(Some(raw)) => match serde_json::from_str::<Configuration>(&raw) {
            Ok(config) => Some(config),
            Err(e) => {
                error!("stored configuration is corrupt, using defaults: {e}");
                None
            }
        },
        Ok(None) => Some(Configuration::default()),
        Err(e) => {
            error!("cannot read configuration: {e}");
            None
        }
    }
}

fn validate(contact: &Contact) -> Result<()> {
    if contact.name.is_empty() {
        return Err(Error::InvalidContact("name is required".into()));
    }
    if digits_only(&contact.phone).is_empty() {
        return Err(Error::InvalidContact("phone number is required".into()));
    }
    if parse_birth_date(&contact.birth_date).is_none() {
        return Err(Error::InvalidContact(format!(
            "birth date {:?} is not YYYY-MM-DD",
            contact.birth_date
        )));
    }
    Ok(())
}
