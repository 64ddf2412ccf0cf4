//! Repository for the `booklets` table.

use hostbook_core::booklet::Booklet;
use hostbook_core::types::{BookletId, DbId};
use sqlx::types::Json;
use sqlx::{PgConnection, PgPool};

use crate::models::booklet::BookletRow;

/// Column list for `booklets` queries.
const COLUMNS: &str = "id, owner_id, status, wizard_step, identity, practical, connectivity, \
    cleaning, contacts, legal, appearance, created_at, updated_at";

/// The JSONB column holding one singular section.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SectionColumn {
    Identity,
    Practical,
    Connectivity,
    Cleaning,
    Contacts,
    Legal,
    Appearance,
}

impl SectionColumn {
    fn name(self) -> &'static str {
        match self {
            Self::Identity => "identity",
            Self::Practical => "practical",
            Self::Connectivity => "connectivity",
            Self::Cleaning => "cleaning",
            Self::Contacts => "contacts",
            Self::Legal => "legal",
            Self::Appearance => "appearance",
        }
    }
}

pub struct BookletRepo;

impl BookletRepo {
    pub async fn insert(pool: &PgPool, booklet: &Booklet) -> Result<(), sqlx::Error> {
        sqlx::query(
            "INSERT INTO booklets \
                (id, owner_id, status, wizard_step, identity, practical, connectivity, \
                 cleaning, contacts, legal, appearance, created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)",
        )
        .bind(booklet.id)
        .bind(booklet.owner_id)
        .bind(booklet.status.as_str())
        .bind(i16::from(booklet.wizard_step))
        .bind(Json(&booklet.identity))
        .bind(Json(&booklet.practical))
        .bind(Json(&booklet.connectivity))
        .bind(Json(&booklet.cleaning))
        .bind(Json(&booklet.contacts))
        .bind(Json(&booklet.legal))
        .bind(Json(&booklet.appearance))
        .bind(booklet.created_at)
        .bind(booklet.updated_at)
        .execute(pool)
        .await?;
        Ok(())
    }

    pub async fn find_by_id(pool: &PgPool, id: BookletId) -> Result<Option<BookletRow>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM booklets WHERE id = $1");
        sqlx::query_as::<_, BookletRow>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// Booklets of one owner, newest first.
    pub async fn list_by_owner(pool: &PgPool, owner_id: DbId) -> Result<Vec<BookletRow>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM booklets WHERE owner_id = $1 ORDER BY created_at DESC"
        );
        sqlx::query_as::<_, BookletRow>(&query)
            .bind(owner_id)
            .fetch_all(pool)
            .await
    }

    /// Lock the row for the rest of the transaction. Returns `false` if the
    /// booklet does not exist.
    pub async fn lock(conn: &mut PgConnection, id: BookletId) -> Result<bool, sqlx::Error> {
        let found: Option<BookletId> =
            sqlx::query_scalar("SELECT id FROM booklets WHERE id = $1 FOR UPDATE")
                .bind(id)
                .fetch_optional(&mut *conn)
                .await?;
        Ok(found.is_some())
    }

    /// Record the wizard step and bump `updated_at`. Returns rows affected.
    pub async fn touch(
        conn: &mut PgConnection,
        id: BookletId,
        wizard_step: i16,
    ) -> Result<u64, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE booklets SET wizard_step = $2, updated_at = now() WHERE id = $1",
        )
        .bind(id)
        .bind(wizard_step)
        .execute(&mut *conn)
        .await?;
        Ok(result.rows_affected())
    }

    /// Overwrite one singular section.
    pub async fn update_section(
        conn: &mut PgConnection,
        id: BookletId,
        column: SectionColumn,
        value: &serde_json::Value,
    ) -> Result<u64, sqlx::Error> {
        let query = format!(
            "UPDATE booklets SET {} = $2, updated_at = now() WHERE id = $1",
            column.name()
        );
        let result = sqlx::query(&query)
            .bind(id)
            .bind(value)
            .execute(&mut *conn)
            .await?;
        Ok(result.rows_affected())
    }

    pub async fn set_wizard_step(pool: &PgPool, id: BookletId, step: i16) -> Result<u64, sqlx::Error> {
        let mut conn = pool.acquire().await?;
        Self::touch(&mut *conn, id, step).await
    }

    pub async fn set_status(
        conn: &mut PgConnection,
        id: BookletId,
        status: &str,
    ) -> Result<u64, sqlx::Error> {
        let result = sqlx::query("UPDATE booklets SET status = $2, updated_at = now() WHERE id = $1")
            .bind(id)
            .bind(status)
            .execute(&mut *conn)
            .await?;
        Ok(result.rows_affected())
    }

    /// Hard delete; child rows cascade.
    pub async fn delete(conn: &mut PgConnection, id: BookletId) -> Result<u64, sqlx::Error> {
        let result = sqlx::query("DELETE FROM booklets WHERE id = $1")
            .bind(id)
            .execute(&mut *conn)
            .await?;
        Ok(result.rows_affected())
    }
}
