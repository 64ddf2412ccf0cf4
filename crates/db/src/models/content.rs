//! Child collection tables: equipment, places, FAQ and gallery.

use hostbook_core::booklet::{EquipmentItem, FaqEntry, GalleryItem, NearbyPlace};
use hostbook_core::steps::normalize_value;
use hostbook_core::types::BookletId;
use sqlx::FromRow;
use uuid::Uuid;

/// A row from `equipment_items`. `steps` may hold any legacy
/// representation; it is normalized on the way out.
#[derive(Debug, Clone, FromRow)]
pub struct EquipmentRow {
    pub id: Uuid,
    pub booklet_id: BookletId,
    pub name: String,
    pub category: String,
    pub steps: serde_json::Value,
    pub manual_url: Option<String>,
}

impl From<EquipmentRow> for EquipmentItem {
    fn from(row: EquipmentRow) -> Self {
        Self {
            id: row.id,
            name: row.name,
            category: row.category,
            steps: normalize_value(row.steps),
            manual_url: row.manual_url,
        }
    }
}

#[derive(Debug, Clone, FromRow)]
pub struct PlaceRow {
    pub id: Uuid,
    pub booklet_id: BookletId,
    pub name: String,
    pub category: String,
    pub description: String,
    pub address: String,
    pub distance: Option<String>,
}

impl From<PlaceRow> for NearbyPlace {
    fn from(row: PlaceRow) -> Self {
        Self {
            id: row.id,
            name: row.name,
            category: row.category,
            description: row.description,
            address: row.address,
            distance: row.distance,
        }
    }
}

#[derive(Debug, Clone, FromRow)]
pub struct FaqRow {
    pub id: Uuid,
    pub booklet_id: BookletId,
    pub question: String,
    pub answer: String,
    pub is_favorite: bool,
}

impl From<FaqRow> for FaqEntry {
    fn from(row: FaqRow) -> Self {
        Self {
            id: row.id,
            question: row.question,
            answer: row.answer,
            is_favorite: row.is_favorite,
        }
    }
}

#[derive(Debug, Clone, FromRow)]
pub struct GalleryRow {
    pub id: Uuid,
    pub booklet_id: BookletId,
    pub url: String,
    pub alt: Option<String>,
    pub caption: Option<String>,
    pub sort_order: i32,
}

impl From<GalleryRow> for GalleryItem {
    fn from(row: GalleryRow) -> Self {
        Self {
            id: row.id,
            url: row.url,
            alt: row.alt,
            caption: row.caption,
            order: row.sort_order,
        }
    }
}
