//! The `booklets` table.

use hostbook_core::booklet::{
    Appearance, Booklet, BookletStatus, CleaningSection, Connectivity, Contacts, EquipmentItem,
    FaqEntry, GalleryItem, IdentitySection, LegalSection, NearbyPlace, PracticalInfo,
};
use hostbook_core::error::CoreError;
use hostbook_core::types::{BookletId, DbId, Timestamp};
use sqlx::types::Json;
use sqlx::FromRow;

/// A row from the `booklets` table. Singular sections are JSONB columns.
#[derive(Debug, Clone, FromRow)]
pub struct BookletRow {
    pub id: BookletId,
    pub owner_id: DbId,
    pub status: String,
    pub wizard_step: i16,
    pub identity: Json<IdentitySection>,
    pub practical: Json<PracticalInfo>,
    pub connectivity: Json<Connectivity>,
    pub cleaning: Json<CleaningSection>,
    pub contacts: Json<Contacts>,
    pub legal: Json<LegalSection>,
    pub appearance: Json<Appearance>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

/// Child collections loaded alongside a [`BookletRow`].
#[derive(Debug, Default)]
pub struct BookletChildren {
    pub equipment: Vec<EquipmentItem>,
    pub places: Vec<NearbyPlace>,
    pub faq: Vec<FaqEntry>,
    pub gallery: Vec<GalleryItem>,
}

impl BookletRow {
    pub fn into_booklet(self, children: BookletChildren) -> Result<Booklet, CoreError> {
        Ok(Booklet {
            id: self.id,
            owner_id: self.owner_id,
            status: BookletStatus::from_str_db(&self.status)?,
            wizard_step: u8::try_from(self.wizard_step).map_err(|_| {
                CoreError::Internal(format!("wizard_step {} out of range", self.wizard_step))
            })?,
            identity: self.identity.0,
            practical: self.practical.0,
            connectivity: self.connectivity.0,
            equipment: children.equipment,
            cleaning: self.cleaning.0,
            places: children.places,
            contacts: self.contacts.0,
            faq: children.faq,
            legal: self.legal.0,
            appearance: self.appearance.0,
            gallery: children.gallery,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}
