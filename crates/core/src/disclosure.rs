//! Field-by-field assembly of non-owner payloads.
//!
//! [`disclose`] never serializes the aggregate wholesale: each field is
//! offered to a [`Disclosure`] builder, which asks the classifier for the
//! field's effective tier and drops whatever the caller's role does not
//! admit. Gated fields with a value are listed under `"gated"` so a client
//! knows a reveal call exists, without carrying the value itself.

use serde::Serialize;
use serde_json::{Map, Value};

use crate::booklet::{Booklet, BookletStatus};
use crate::visibility::{effective_tier, CallerRole, Field, Tier};

/// Accumulates admitted fields for one caller.
pub struct Disclosure {
    role: CallerRole,
    status: BookletStatus,
    payload: Map<String, Value>,
    gated: Vec<&'static str>,
}

impl Disclosure {
    pub fn new(role: CallerRole, status: BookletStatus) -> Self {
        Self {
            role,
            status,
            payload: Map::new(),
            gated: Vec::new(),
        }
    }

    fn tier(&self, field: Field) -> Tier {
        effective_tier(field, self.role, self.status)
    }

    /// Offer a text field; blank text is omitted.
    pub fn text(&mut self, field: Field, value: &str) -> &mut Self {
        if value.trim().is_empty() {
            return self;
        }
        self.value(field, Value::String(value.to_string()))
    }

    /// Offer an optional text field.
    pub fn optional_text(&mut self, field: Field, value: Option<&str>) -> &mut Self {
        match value {
            Some(v) => self.text(field, v),
            None => self,
        }
    }

    /// Offer a list field; empty lists are omitted.
    pub fn list<T: Serialize>(&mut self, field: Field, items: &[T]) -> &mut Self {
        if items.is_empty() {
            return self;
        }
        match serde_json::to_value(items) {
            Ok(value) => self.value(field, value),
            Err(err) => {
                tracing::warn!(field = field.path(), error = %err, "Skipping unserializable field");
                self
            }
        }
    }

    /// Offer one entry of a collection whose entries are classified
    /// individually. Admitted entries are appended to `key`.
    pub fn entry<T: Serialize>(&mut self, field: Field, key: &str, entry: &T) -> &mut Self {
        if !self.tier(field).admits(self.role) {
            return self;
        }
        if let Ok(value) = serde_json::to_value(entry) {
            let slot = self
                .payload
                .entry(key.to_string())
                .or_insert_with(|| Value::Array(Vec::new()));
            if let Value::Array(items) = slot {
                items.push(value);
            }
        }
        self
    }

    fn value(&mut self, field: Field, value: Value) -> &mut Self {
        let tier = self.tier(field);
        if tier.admits(self.role) {
            insert_path(&mut self.payload, field.path(), value);
        } else if tier == Tier::Gated && tier.admits_on_reveal(self.role) {
            self.gated.push(field.path());
        }
        self
    }

    pub fn finish(mut self) -> Value {
        if !self.gated.is_empty() {
            let gated = self.gated.into_iter().map(Value::from).collect();
            self.payload.insert("gated".to_string(), Value::Array(gated));
        }
        Value::Object(self.payload)
    }
}

fn insert_path(map: &mut Map<String, Value>, path: &str, value: Value) {
    match path.split_once('.') {
        Some((section, rest)) => {
            let child = map
                .entry(section.to_string())
                .or_insert_with(|| Value::Object(Map::new()));
            if let Value::Object(child) = child {
                insert_path(child, rest, value);
            }
        }
        None => {
            map.insert(path.to_string(), value);
        }
    }
}

/// Build the payload `role` may see for `booklet`.
pub fn disclose(booklet: &Booklet, role: CallerRole) -> Value {
    let mut d = Disclosure::new(role, booklet.status);

    let identity = &booklet.identity;
    d.text(Field::PropertyName, &identity.property_name)
        .text(Field::HostName, &identity.host_name)
        .text(Field::WelcomeMessage, &identity.welcome_message)
        .text(Field::Address, &identity.address)
        .optional_text(Field::CoverImage, identity.cover_image_url.as_deref());

    let practical = &booklet.practical;
    d.text(Field::CheckInTime, &practical.check_in_time)
        .text(Field::CheckOutTime, &practical.check_out_time)
        .text(Field::ArrivalInstructions, &practical.arrival_instructions)
        .text(Field::Parking, &practical.parking)
        .text(Field::HouseRules, &practical.house_rules);

    d.text(Field::WifiSsid, &booklet.connectivity.ssid)
        .text(Field::WifiPassword, &booklet.connectivity.password);

    d.list(Field::Equipment, &booklet.equipment);

    d.text(Field::CleaningInstructions, &booklet.cleaning.instructions)
        .text(Field::CleaningSupplies, &booklet.cleaning.supplies_location);

    d.list(Field::Places, &booklet.places);

    d.optional_text(Field::ContactPhone, booklet.contacts.phone.as_deref())
        .optional_text(Field::ContactEmail, booklet.contacts.email.as_deref());

    for entry in &booklet.faq {
        let field = if entry.is_favorite {
            Field::FaqFavorite
        } else {
            Field::FaqUnlisted
        };
        d.entry(field, "faq", entry);
    }

    d.text(Field::LegalNotices, &booklet.legal.notices)
        .text(Field::SafetyInformation, &booklet.legal.safety_information);

    d.text(Field::Theme, &booklet.appearance.theme)
        .optional_text(Field::AccentColor, booklet.appearance.accent_color.as_deref());

    let mut gallery = booklet.gallery.clone();
    gallery.sort_by_key(|g| g.order);
    d.list(Field::Gallery, &gallery);

    d.finish()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
