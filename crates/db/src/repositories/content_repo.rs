//! Repositories for the child collections of a booklet.
//!
//! Every write is an upsert keyed by the entity id, so replaying the same
//! snapshot leaves the table unchanged. Upserts return the affected row
//! count; an id already owned by another booklet affects none.

use hostbook_core::booklet::{EquipmentItem, FaqEntry, GalleryItem, NearbyPlace};
use hostbook_core::types::BookletId;
use sqlx::types::Json;
use sqlx::{PgConnection, PgPool};
use uuid::Uuid;

use crate::models::content::{EquipmentRow, FaqRow, GalleryRow, PlaceRow};

// ---------------------------------------------------------------------------
// Equipment
// ---------------------------------------------------------------------------

const EQUIPMENT_COLUMNS: &str = "id, booklet_id, name, category, steps, manual_url";

pub struct EquipmentRepo;

impl EquipmentRepo {
    pub async fn list_for_booklet(
        pool: &PgPool,
        booklet_id: BookletId,
    ) -> Result<Vec<EquipmentRow>, sqlx::Error> {
        let query = format!(
            "SELECT {EQUIPMENT_COLUMNS} FROM equipment_items \
             WHERE booklet_id = $1 ORDER BY created_at, id"
        );
        sqlx::query_as::<_, EquipmentRow>(&query)
            .bind(booklet_id)
            .fetch_all(pool)
            .await
    }

    /// Insert or replace one item. A clash on the case-insensitive
    /// `(name, category)` index surfaces as a unique violation.
    pub async fn upsert(
        conn: &mut PgConnection,
        booklet_id: BookletId,
        item: &EquipmentItem,
    ) -> Result<u64, sqlx::Error> {
        let result = sqlx::query(
            "INSERT INTO equipment_items (id, booklet_id, name, category, steps, manual_url) \
             VALUES ($1, $2, $3, $4, $5, $6) \
             ON CONFLICT (id) DO UPDATE SET \
                name = EXCLUDED.name, \
                category = EXCLUDED.category, \
                steps = EXCLUDED.steps, \
                manual_url = EXCLUDED.manual_url, \
                updated_at = now() \
             WHERE equipment_items.booklet_id = EXCLUDED.booklet_id",
        )
        .bind(item.id)
        .bind(booklet_id)
        .bind(&item.name)
        .bind(&item.category)
        .bind(Json(&item.steps))
        .bind(&item.manual_url)
        .execute(&mut *conn)
        .await?;
        Ok(result.rows_affected())
    }

    pub async fn delete(
        conn: &mut PgConnection,
        booklet_id: BookletId,
        id: Uuid,
    ) -> Result<u64, sqlx::Error> {
        let result = sqlx::query("DELETE FROM equipment_items WHERE id = $1 AND booklet_id = $2")
            .bind(id)
            .bind(booklet_id)
            .execute(&mut *conn)
            .await?;
        Ok(result.rows_affected())
    }
}

// ---------------------------------------------------------------------------
// Nearby places
// ---------------------------------------------------------------------------

const PLACE_COLUMNS: &str = "id, booklet_id, name, category, description, address, distance";

pub struct PlaceRepo;

impl PlaceRepo {
    pub async fn list_for_booklet(
        pool: &PgPool,
        booklet_id: BookletId,
    ) -> Result<Vec<PlaceRow>, sqlx::Error> {
        let query = format!(
            "SELECT {PLACE_COLUMNS} FROM nearby_places \
             WHERE booklet_id = $1 ORDER BY created_at, id"
        );
        sqlx::query_as::<_, PlaceRow>(&query)
            .bind(booklet_id)
            .fetch_all(pool)
            .await
    }

    pub async fn upsert(
        conn: &mut PgConnection,
        booklet_id: BookletId,
        place: &NearbyPlace,
    ) -> Result<u64, sqlx::Error> {
        let result = sqlx::query(
            "INSERT INTO nearby_places \
                (id, booklet_id, name, category, description, address, distance) \
             VALUES ($1, $2, $3, $4, $5, $6, $7) \
             ON CONFLICT (id) DO UPDATE SET \
                name = EXCLUDED.name, \
                category = EXCLUDED.category, \
                description = EXCLUDED.description, \
                address = EXCLUDED.address, \
                distance = EXCLUDED.distance, \
                updated_at = now() \
             WHERE nearby_places.booklet_id = EXCLUDED.booklet_id",
        )
        .bind(place.id)
        .bind(booklet_id)
        .bind(&place.name)
        .bind(&place.category)
        .bind(&place.description)
        .bind(&place.address)
        .bind(&place.distance)
        .execute(&mut *conn)
        .await?;
        Ok(result.rows_affected())
    }

    pub async fn delete(
        conn: &mut PgConnection,
        booklet_id: BookletId,
        id: Uuid,
    ) -> Result<u64, sqlx::Error> {
        let result = sqlx::query("DELETE FROM nearby_places WHERE id = $1 AND booklet_id = $2")
            .bind(id)
            .bind(booklet_id)
            .execute(&mut *conn)
            .await?;
        Ok(result.rows_affected())
    }
}

// ---------------------------------------------------------------------------
// FAQ
// ---------------------------------------------------------------------------

const FAQ_COLUMNS: &str = "id, booklet_id, question, answer, is_favorite";

pub struct FaqRepo;

impl FaqRepo {
    pub async fn list_for_booklet(
        pool: &PgPool,
        booklet_id: BookletId,
    ) -> Result<Vec<FaqRow>, sqlx::Error> {
        let query = format!(
            "SELECT {FAQ_COLUMNS} FROM faq_entries WHERE booklet_id = $1 ORDER BY created_at, id"
        );
        sqlx::query_as::<_, FaqRow>(&query)
            .bind(booklet_id)
            .fetch_all(pool)
            .await
    }

    pub async fn upsert(
        conn: &mut PgConnection,
        booklet_id: BookletId,
        entry: &FaqEntry,
    ) -> Result<u64, sqlx::Error> {
        let result = sqlx::query(
            "INSERT INTO faq_entries (id, booklet_id, question, answer, is_favorite) \
             VALUES ($1, $2, $3, $4, $5) \
             ON CONFLICT (id) DO UPDATE SET \
                question = EXCLUDED.question, \
                answer = EXCLUDED.answer, \
                is_favorite = EXCLUDED.is_favorite, \
                updated_at = now() \
             WHERE faq_entries.booklet_id = EXCLUDED.booklet_id",
        )
        .bind(entry.id)
        .bind(booklet_id)
        .bind(&entry.question)
        .bind(&entry.answer)
        .bind(entry.is_favorite)
        .execute(&mut *conn)
        .await?;
        Ok(result.rows_affected())
    }

    pub async fn delete(
        conn: &mut PgConnection,
        booklet_id: BookletId,
        id: Uuid,
    ) -> Result<u64, sqlx::Error> {
        let result = sqlx::query("DELETE FROM faq_entries WHERE id = $1 AND booklet_id = $2")
            .bind(id)
            .bind(booklet_id)
            .execute(&mut *conn)
            .await?;
        Ok(result.rows_affected())
    }
}

// ---------------------------------------------------------------------------
// Gallery
// ---------------------------------------------------------------------------

const GALLERY_COLUMNS: &str = "id, booklet_id, url, alt, caption, sort_order";

pub struct GalleryRepo;

impl GalleryRepo {
    pub async fn list_for_booklet(
        pool: &PgPool,
        booklet_id: BookletId,
    ) -> Result<Vec<GalleryRow>, sqlx::Error> {
        let query = format!(
            "SELECT {GALLERY_COLUMNS} FROM gallery_items \
             WHERE booklet_id = $1 ORDER BY sort_order, created_at"
        );
        sqlx::query_as::<_, GalleryRow>(&query)
            .bind(booklet_id)
            .fetch_all(pool)
            .await
    }

    /// Update an existing item in place or append a new one at the end.
    pub async fn upsert(
        conn: &mut PgConnection,
        booklet_id: BookletId,
        item: &GalleryItem,
    ) -> Result<u64, sqlx::Error> {
        let result = sqlx::query(
            "INSERT INTO gallery_items (id, booklet_id, url, alt, caption, sort_order) \
             VALUES ($1, $2, $3, $4, $5, \
                (SELECT COALESCE(MAX(sort_order) + 1, 0) FROM gallery_items WHERE booklet_id = $2)) \
             ON CONFLICT (id) DO UPDATE SET \
                url = EXCLUDED.url, \
                alt = EXCLUDED.alt, \
                caption = EXCLUDED.caption, \
                updated_at = now() \
             WHERE gallery_items.booklet_id = EXCLUDED.booklet_id",
        )
        .bind(item.id)
        .bind(booklet_id)
        .bind(&item.url)
        .bind(&item.alt)
        .bind(&item.caption)
        .execute(&mut *conn)
        .await?;
        Ok(result.rows_affected())
    }

    pub async fn delete(
        conn: &mut PgConnection,
        booklet_id: BookletId,
        id: Uuid,
    ) -> Result<u64, sqlx::Error> {
        let result = sqlx::query("DELETE FROM gallery_items WHERE id = $1 AND booklet_id = $2")
            .bind(id)
            .bind(booklet_id)
            .execute(&mut *conn)
            .await?;
        Self::densify(conn, booklet_id).await?;
        Ok(result.rows_affected())
    }

    /// Assign positions following `ids`; unlisted items keep their relative
    /// order after the listed ones.
    pub async fn reorder(
        conn: &mut PgConnection,
        booklet_id: BookletId,
        ids: &[Uuid],
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            "UPDATE gallery_items SET sort_order = sort_order + $2 \
             WHERE booklet_id = $1 AND NOT (id = ANY($3))",
        )
        .bind(booklet_id)
        .bind(ids.len() as i32)
        .bind(ids)
        .execute(&mut *conn)
        .await?;

        sqlx::query(
            "UPDATE gallery_items g SET sort_order = (t.ord - 1)::int, updated_at = now() \
             FROM UNNEST($2::uuid[]) WITH ORDINALITY AS t(id, ord) \
             WHERE g.id = t.id AND g.booklet_id = $1",
        )
        .bind(booklet_id)
        .bind(ids)
        .execute(&mut *conn)
        .await?;

        Self::densify(conn, booklet_id).await
    }

    async fn densify(conn: &mut PgConnection, booklet_id: BookletId) -> Result<(), sqlx::Error> {
        sqlx::query(
            "UPDATE gallery_items g SET sort_order = (r.position - 1)::int \
             FROM (SELECT id, ROW_NUMBER() OVER (ORDER BY sort_order, created_at) AS position \
                   FROM gallery_items WHERE booklet_id = $1) r \
             WHERE g.id = r.id",
        )
        .bind(booklet_id)
        .execute(&mut *conn)
        .await?;
        Ok(())
    }
}
