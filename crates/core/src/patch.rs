//! Autosave scopes and the section patches filed under them.
//!
//! A [`Scope`] is the unit of debouncing and upsert: either a whole field
//! group (identity, practical info, ...) or a single child entity by id.
//! A [`SectionPatch`] is a snapshot of exactly one scope, so the latest
//! patch for a scope always carries everything that scope needs.

use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::booklet::{
    Appearance, CleaningSection, Connectivity, Contacts, EquipmentItem, FaqEntry, GalleryItem,
    IdentitySection, LegalSection, NearbyPlace, PracticalInfo,
};
use crate::wizard::WizardStep;

// ---------------------------------------------------------------------------
// Scope
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum Scope {
    Identity,
    Practical,
    Connectivity,
    Equipment(Uuid),
    Cleaning,
    Place(Uuid),
    Contacts,
    Faq(Uuid),
    Legal,
    Appearance,
    GalleryItem(Uuid),
    GalleryOrder,
}

impl Scope {
    /// The wizard step whose form edits this scope.
    pub fn step(self) -> WizardStep {
        match self {
            Self::Identity => WizardStep::Identity,
            Self::Practical => WizardStep::PracticalInfo,
            Self::Connectivity => WizardStep::Connectivity,
            Self::Equipment(_) => WizardStep::Equipment,
            Self::Cleaning => WizardStep::Cleaning,
            Self::Place(_) => WizardStep::NearbyPlaces,
            Self::Contacts => WizardStep::Contacts,
            Self::Faq(_) => WizardStep::Faq,
            Self::Legal => WizardStep::Legal,
            Self::Appearance | Self::GalleryItem(_) | Self::GalleryOrder => WizardStep::Appearance,
        }
    }

    /// Structured list entries debounce on the shorter interval.
    pub fn is_list(self) -> bool {
        matches!(
            self,
            Self::Equipment(_)
                | Self::Place(_)
                | Self::Faq(_)
                | Self::GalleryItem(_)
                | Self::GalleryOrder
        )
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Identity => f.write_str("identity"),
            Self::Practical => f.write_str("practical"),
            Self::Connectivity => f.write_str("connectivity"),
            Self::Equipment(id) => write!(f, "equipment:{id}"),
            Self::Cleaning => f.write_str("cleaning"),
            Self::Place(id) => write!(f, "place:{id}"),
            Self::Contacts => f.write_str("contacts"),
            Self::Faq(id) => write!(f, "faq:{id}"),
            Self::Legal => f.write_str("legal"),
            Self::Appearance => f.write_str("appearance"),
            Self::GalleryItem(id) => write!(f, "gallery:{id}"),
            Self::GalleryOrder => f.write_str("gallery_order"),
        }
    }
}

// ---------------------------------------------------------------------------
// SectionPatch
// ---------------------------------------------------------------------------

/// A partial update of the booklet covering exactly one [`Scope`].
///
/// Wire form: `{ "scope": "equipment", "value": { ... } }`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "scope", content = "value", rename_all = "snake_case")]
pub enum SectionPatch {
    Identity(IdentitySection),
    Practical(PracticalInfo),
    Connectivity(Connectivity),
    Equipment(EquipmentItem),
    RemoveEquipment { id: Uuid },
    Cleaning(CleaningSection),
    Place(NearbyPlace),
    RemovePlace { id: Uuid },
    Contacts(Contacts),
    Faq(FaqEntry),
    RemoveFaq { id: Uuid },
    Legal(LegalSection),
    Appearance(Appearance),
    GalleryItem(GalleryItem),
    RemoveGalleryItem { id: Uuid },
    GalleryOrder { ids: Vec<Uuid> },
}

impl SectionPatch {
    /// The scope this patch is debounced and upserted under. Removals share
    /// the scope of the entity they remove, so a removal supersedes a
    /// pending edit of the same item.
    pub fn scope(&self) -> Scope {
        match self {
            Self::Identity(_) => Scope::Identity,
            Self::Practical(_) => Scope::Practical,
            Self::Connectivity(_) => Scope::Connectivity,
            Self::Equipment(item) => Scope::Equipment(item.id),
            Self::RemoveEquipment { id } => Scope::Equipment(*id),
            Self::Cleaning(_) => Scope::Cleaning,
            Self::Place(place) => Scope::Place(place.id),
            Self::RemovePlace { id } => Scope::Place(*id),
            Self::Contacts(_) => Scope::Contacts,
            Self::Faq(entry) => Scope::Faq(entry.id),
            Self::RemoveFaq { id } => Scope::Faq(*id),
            Self::Legal(_) => Scope::Legal,
            Self::Appearance(_) => Scope::Appearance,
            Self::GalleryItem(item) => Scope::GalleryItem(item.id),
            Self::RemoveGalleryItem { id } => Scope::GalleryItem(*id),
            Self::GalleryOrder { .. } => Scope::GalleryOrder,
        }
    }

    /// Canonicalize list-like fields before the patch is written.
    pub fn normalized(mut self) -> Self {
        if let Self::Equipment(item) = &mut self {
            item.steps = crate::steps::normalize_steps(std::mem::take(&mut item.steps));
            item.name = item.name.trim().to_string();
            item.category = item.category.trim().to_string();
        }
        self
    }
}
