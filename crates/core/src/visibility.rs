//! Visibility tiers: the single gate deciding what each caller may see.
//!
//! [`classify`] maps a field and a caller role to a [`Tier`]. It is closed:
//! a field path or role name that is not enumerated here classifies as
//! [`Tier::Private`]. Every non-owner response is assembled field by field
//! through [`effective_tier`] (see [`crate::disclosure`]).

use serde::{Deserialize, Serialize};

use crate::booklet::BookletStatus;

// ---------------------------------------------------------------------------
// Tier
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Tier {
    /// Serialized into any response the role receives.
    Public,
    /// Structure visible, value only returned by an explicit reveal call.
    Gated,
    /// Never leaves the owner's authenticated session.
    Private,
    /// Only used as grounding context by the assistant.
    AssistantOnly,
}

impl Tier {
    /// Whether a value of this tier goes into a regular response for `role`.
    pub fn admits(self, role: CallerRole) -> bool {
        match role {
            CallerRole::Owner => true,
            CallerRole::Guest => self == Tier::Public,
            CallerRole::Assistant => matches!(self, Tier::Public | Tier::AssistantOnly),
        }
    }

    /// Whether a value of this tier may be returned by the reveal call.
    pub fn admits_on_reveal(self, role: CallerRole) -> bool {
        match role {
            CallerRole::Guest => matches!(self, Tier::Public | Tier::Gated),
            other => self.admits(other),
        }
    }
}

// ---------------------------------------------------------------------------
// Caller roles
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CallerRole {
    /// The authenticated creator of the booklet.
    Owner,
    /// An unauthenticated caller holding only an access code.
    Guest,
    /// The conversational assistant collaborator.
    Assistant,
}

impl CallerRole {
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "owner" => Some(Self::Owner),
            "guest" => Some(Self::Guest),
            "assistant" => Some(Self::Assistant),
            _ => None,
        }
    }
}

// ---------------------------------------------------------------------------
// Fields
// ---------------------------------------------------------------------------

/// Every classified booklet field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Field {
    PropertyName,
    HostName,
    WelcomeMessage,
    Address,
    CoverImage,
    CheckInTime,
    CheckOutTime,
    ArrivalInstructions,
    Parking,
    HouseRules,
    WifiSsid,
    WifiPassword,
    Equipment,
    CleaningInstructions,
    CleaningSupplies,
    Places,
    ContactPhone,
    ContactEmail,
    FaqFavorite,
    FaqUnlisted,
    LegalNotices,
    SafetyInformation,
    Theme,
    AccentColor,
    Gallery,
}

/// Field paths in declaration order.
const FIELD_PATHS: &[(Field, &str)] = &[
    (Field::PropertyName, "identity.property_name"),
    (Field::HostName, "identity.host_name"),
    (Field::WelcomeMessage, "identity.welcome_message"),
    (Field::Address, "identity.address"),
    (Field::CoverImage, "identity.cover_image_url"),
    (Field::CheckInTime, "practical.check_in_time"),
    (Field::CheckOutTime, "practical.check_out_time"),
    (Field::ArrivalInstructions, "practical.arrival_instructions"),
    (Field::Parking, "practical.parking"),
    (Field::HouseRules, "practical.house_rules"),
    (Field::WifiSsid, "connectivity.ssid"),
    (Field::WifiPassword, "connectivity.password"),
    (Field::Equipment, "equipment"),
    (Field::CleaningInstructions, "cleaning.instructions"),
    (Field::CleaningSupplies, "cleaning.supplies_location"),
    (Field::Places, "places"),
    (Field::ContactPhone, "contacts.phone"),
    (Field::ContactEmail, "contacts.email"),
    (Field::FaqFavorite, "faq.favorite"),
    (Field::FaqUnlisted, "faq.unlisted"),
    (Field::LegalNotices, "legal.notices"),
    (Field::SafetyInformation, "legal.safety_information"),
    (Field::Theme, "appearance.theme"),
    (Field::AccentColor, "appearance.accent_color"),
    (Field::Gallery, "gallery"),
];

impl Field {
    /// Dotted path of the field; the first segment is the section.
    pub fn path(self) -> &'static str {
        FIELD_PATHS
            .iter()
            .find(|(field, _)| *field == self)
            .map(|(_, path)| *path)
            .unwrap_or("")
    }

    pub fn from_path(path: &str) -> Option<Self> {
        FIELD_PATHS
            .iter()
            .find(|(_, p)| *p == path)
            .map(|(field, _)| *field)
    }

    pub fn all() -> impl Iterator<Item = Field> {
        FIELD_PATHS.iter().map(|(field, _)| *field)
    }
}

// ---------------------------------------------------------------------------
// Classification
// ---------------------------------------------------------------------------

/// Tier of `field` for `role`, ignoring lifecycle.
pub fn classify(field: Field, role: CallerRole) -> Tier {
    match field {
        Field::WifiPassword => match role {
            CallerRole::Owner => Tier::Public,
            CallerRole::Guest | CallerRole::Assistant => Tier::Gated,
        },
        Field::ContactPhone | Field::ContactEmail => Tier::Private,
        Field::FaqUnlisted => Tier::AssistantOnly,
        Field::PropertyName
        | Field::HostName
        | Field::WelcomeMessage
        | Field::Address
        | Field::CoverImage
        | Field::CheckInTime
        | Field::CheckOutTime
        | Field::ArrivalInstructions
        | Field::Parking
        | Field::HouseRules
        | Field::WifiSsid
        | Field::Equipment
        | Field::CleaningInstructions
        | Field::CleaningSupplies
        | Field::Places
        | Field::FaqFavorite
        | Field::LegalNotices
        | Field::SafetyInformation
        | Field::Theme
        | Field::AccentColor
        | Field::Gallery => Tier::Public,
    }
}

/// Classify by path and role name. Anything unknown is private.
pub fn classify_path(path: &str, role: &str) -> Tier {
    match (Field::from_path(path), CallerRole::from_name(role)) {
        (Some(field), Some(role)) => classify(field, role),
        _ => Tier::Private,
    }
}

/// Tier of `field` for `role` given the booklet's lifecycle. Only the owner
/// sees anything of a booklet that is not published.
pub fn effective_tier(field: Field, role: CallerRole, status: BookletStatus) -> Tier {
    if role != CallerRole::Owner && status != BookletStatus::Published {
        return Tier::Private;
    }
    classify(field, role)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
