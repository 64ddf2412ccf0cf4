//! The booklet aggregate and its content sections.
//!
//! A [`Booklet`] owns every child collection. It is created as a draft on
//! step 1 and afterwards only changes through [`SectionPatch`]es applied by
//! the autosave engine (content) or through the publication protocol
//! (status and access codes).

use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::error::CoreError;
use crate::patch::SectionPatch;
use crate::steps::{deserialize_steps, Step};
use crate::types::{BookletId, DbId, Timestamp};
use crate::wizard::MIN_STEP;

// ---------------------------------------------------------------------------
// Lifecycle status
// ---------------------------------------------------------------------------

/// Lifecycle of a booklet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BookletStatus {
    Draft,
    Published,
    Disabled,
}

impl BookletStatus {
    /// Parse a status string from the database.
    pub fn from_str_db(s: &str) -> Result<Self, CoreError> {
        match s {
            "draft" => Ok(Self::Draft),
            "published" => Ok(Self::Published),
            "disabled" => Ok(Self::Disabled),
            _ => Err(CoreError::Validation(format!(
                "Invalid booklet status '{s}'. Must be one of: draft, published, disabled"
            ))),
        }
    }

    /// Convert to a database-compatible string.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Draft => "draft",
            Self::Published => "published",
            Self::Disabled => "disabled",
        }
    }
}

// ---------------------------------------------------------------------------
// Sections
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct IdentitySection {
    #[validate(length(max = 200))]
    pub property_name: String,
    #[validate(length(max = 200))]
    pub host_name: String,
    #[validate(length(max = 5000))]
    pub welcome_message: String,
    #[validate(length(max = 500))]
    pub address: String,
    #[validate(url)]
    pub cover_image_url: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PracticalInfo {
    pub check_in_time: String,
    pub check_out_time: String,
    pub arrival_instructions: String,
    pub parking: String,
    pub house_rules: String,
}

/// Wi-Fi credentials. The password is only handed to guests through the
/// reveal call.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Connectivity {
    pub ssid: String,
    pub password: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
pub struct EquipmentItem {
    #[serde(default = "Uuid::new_v4")]
    pub id: Uuid,
    #[validate(length(min = 1, max = 200))]
    pub name: String,
    #[serde(default)]
    #[validate(length(max = 100))]
    pub category: String,
    #[serde(default, deserialize_with = "deserialize_steps")]
    pub steps: Vec<Step>,
    #[serde(default)]
    #[validate(url)]
    pub manual_url: Option<String>,
}

impl EquipmentItem {
    /// Case-insensitive `(name, category)` identity used for uniqueness.
    pub fn identity_key(&self) -> (String, String) {
        (
            self.name.trim().to_lowercase(),
            self.category.trim().to_lowercase(),
        )
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CleaningSection {
    pub instructions: String,
    pub supplies_location: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NearbyPlace {
    #[serde(default = "Uuid::new_v4")]
    pub id: Uuid,
    pub name: String,
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub address: String,
    #[serde(default)]
    pub distance: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct Contacts {
    #[validate(length(max = 40))]
    pub phone: Option<String>,
    #[validate(email)]
    pub email: Option<String>,
}

/// A question/answer pair. Favorites are shown to guests; the rest only
/// ground the assistant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FaqEntry {
    #[serde(default = "Uuid::new_v4")]
    pub id: Uuid,
    pub question: String,
    #[serde(default)]
    pub answer: String,
    #[serde(default)]
    pub is_favorite: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LegalSection {
    pub notices: String,
    pub safety_information: String,
}

/// Default theme applied to new booklets.
pub const DEFAULT_THEME: &str = "classic";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Appearance {
    pub theme: String,
    pub accent_color: Option<String>,
}

impl Default for Appearance {
    fn default() -> Self {
        Self {
            theme: DEFAULT_THEME.to_string(),
            accent_color: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
pub struct GalleryItem {
    #[serde(default = "Uuid::new_v4")]
    pub id: Uuid,
    #[validate(length(min = 1))]
    pub url: String,
    #[serde(default)]
    pub alt: Option<String>,
    #[serde(default)]
    pub caption: Option<String>,
    /// Dense position, reassigned on every reorder.
    #[serde(default)]
    pub order: i32,
}

// ---------------------------------------------------------------------------
// Aggregate
// ---------------------------------------------------------------------------

/// One property's welcome booklet.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Booklet {
    pub id: BookletId,
    pub owner_id: DbId,
    pub status: BookletStatus,
    pub wizard_step: u8,
    pub identity: IdentitySection,
    pub practical: PracticalInfo,
    pub connectivity: Connectivity,
    pub equipment: Vec<EquipmentItem>,
    pub cleaning: CleaningSection,
    pub places: Vec<NearbyPlace>,
    pub contacts: Contacts,
    pub faq: Vec<FaqEntry>,
    pub legal: LegalSection,
    pub appearance: Appearance,
    pub gallery: Vec<GalleryItem>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl Booklet {
    /// A fresh draft positioned on the first wizard step.
    pub fn new(owner_id: DbId) -> Self {
        let now = chrono::Utc::now();
        Self {
            id: Uuid::now_v7(),
            owner_id,
            status: BookletStatus::Draft,
            wizard_step: MIN_STEP,
            identity: IdentitySection::default(),
            practical: PracticalInfo::default(),
            connectivity: Connectivity::default(),
            equipment: Vec::new(),
            cleaning: CleaningSection::default(),
            places: Vec::new(),
            contacts: Contacts::default(),
            faq: Vec::new(),
            legal: LegalSection::default(),
            appearance: Appearance::default(),
            gallery: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Whether any guest-facing content has been entered at all.
    pub fn has_content(&self) -> bool {
        let texts = [
            &self.identity.property_name,
            &self.identity.welcome_message,
            &self.identity.address,
            &self.practical.check_in_time,
            &self.practical.check_out_time,
            &self.practical.arrival_instructions,
            &self.practical.parking,
            &self.practical.house_rules,
            &self.connectivity.ssid,
            &self.cleaning.instructions,
            &self.legal.notices,
        ];
        texts.iter().any(|t| !t.trim().is_empty())
            || !self.equipment.is_empty()
            || !self.places.is_empty()
            || self.faq.iter().any(|f| f.is_favorite)
            || !self.gallery.is_empty()
    }

    /// Whether any child collection holds an entity with `id`.
    pub fn holds_child(&self, id: Uuid) -> bool {
        self.equipment.iter().any(|e| e.id == id)
            || self.places.iter().any(|p| p.id == id)
            || self.faq.iter().any(|f| f.id == id)
            || self.gallery.iter().any(|g| g.id == id)
    }

    /// Verify that `item` would not duplicate another item's
    /// `(name, category)` pair.
    pub fn ensure_equipment_unique(&self, item: &EquipmentItem) -> Result<(), CoreError> {
        let key = item.identity_key();
        let clash = self
            .equipment
            .iter()
            .any(|other| other.id != item.id && other.identity_key() == key);
        if clash {
            return Err(CoreError::Conflict(format!(
                "Equipment '{}' already exists in category '{}'",
                item.name.trim(),
                item.category.trim()
            )));
        }
        Ok(())
    }

    /// Apply one section snapshot. Child collections are upserted by id.
    pub fn apply(&mut self, patch: &SectionPatch) {
        match patch {
            SectionPatch::Identity(section) => self.identity = section.clone(),
            SectionPatch::Practical(section) => self.practical = section.clone(),
            SectionPatch::Connectivity(section) => self.connectivity = section.clone(),
            SectionPatch::Cleaning(section) => self.cleaning = section.clone(),
            SectionPatch::Contacts(section) => self.contacts = section.clone(),
            SectionPatch::Legal(section) => self.legal = section.clone(),
            SectionPatch::Appearance(section) => self.appearance = section.clone(),
            SectionPatch::Equipment(item) => upsert_by_id(&mut self.equipment, item, |i| i.id),
            SectionPatch::RemoveEquipment { id } => self.equipment.retain(|i| i.id != *id),
            SectionPatch::Place(place) => upsert_by_id(&mut self.places, place, |p| p.id),
            SectionPatch::RemovePlace { id } => self.places.retain(|p| p.id != *id),
            SectionPatch::Faq(entry) => upsert_by_id(&mut self.faq, entry, |f| f.id),
            SectionPatch::RemoveFaq { id } => self.faq.retain(|f| f.id != *id),
            SectionPatch::GalleryItem(item) => self.upsert_gallery_item(item),
            SectionPatch::RemoveGalleryItem { id } => {
                self.gallery.retain(|g| g.id != *id);
                densify(&mut self.gallery);
            }
            SectionPatch::GalleryOrder { ids } => reorder_gallery(&mut self.gallery, ids),
        }
        self.updated_at = chrono::Utc::now();
    }

    fn upsert_gallery_item(&mut self, item: &GalleryItem) {
        match self.gallery.iter_mut().find(|g| g.id == item.id) {
            Some(existing) => {
                let order = existing.order;
                *existing = item.clone();
                existing.order = order;
            }
            None => {
                let mut item = item.clone();
                item.order = self.gallery.len() as i32;
                self.gallery.push(item);
            }
        }
    }
}

fn upsert_by_id<T: Clone>(items: &mut Vec<T>, item: &T, id: impl Fn(&T) -> Uuid) {
    let key = id(item);
    match items.iter_mut().find(|existing| id(existing) == key) {
        Some(existing) => *existing = item.clone(),
        None => items.push(item.clone()),
    }
}

fn densify(gallery: &mut [GalleryItem]) {
    gallery.sort_by_key(|g| g.order);
    for (position, item) in gallery.iter_mut().enumerate() {
        item.order = position as i32;
    }
}

/// Reassign dense positions following `ids`. Items missing from `ids` keep
/// their relative order after the listed ones.
pub(crate) fn reorder_gallery(gallery: &mut [GalleryItem], ids: &[Uuid]) {
    let listed = ids.len() as i32;
    for item in gallery.iter_mut() {
        item.order = match ids.iter().position(|id| *id == item.id) {
            Some(position) => position as i32,
            None => listed + item.order,
        };
    }
    densify(gallery);
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
