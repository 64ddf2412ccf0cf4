//! Integration tests for `PgDraftStore` against a real database.
//!
//! Exercises:
//! - Section upserts and wizard step persistence
//! - Child collections, equipment uniqueness and gallery ordering
//! - Child ids that already belong to another booklet
//! - Access code rotation and the active-code uniqueness rule
//! - Delete protection while a code is active
//!
//! Run with `DATABASE_URL` set and `cargo test -- --ignored`.

use assert_matches::assert_matches;
use hostbook_core::booklet::{
    Booklet, BookletStatus, EquipmentItem, FaqEntry, GalleryItem, IdentitySection,
};
use hostbook_core::patch::SectionPatch;
use hostbook_core::steps::Step;
use hostbook_core::store::{DraftStore, PinStatus, StoreError};
use hostbook_db::PgDraftStore;
use sqlx::PgPool;
use uuid::Uuid;

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

async fn new_draft(store: &PgDraftStore, owner_id: i64) -> Booklet {
    let booklet = Booklet::new(owner_id);
    store.insert_booklet(&booklet).await.unwrap();
    booklet
}

fn equipment(name: &str, category: &str) -> EquipmentItem {
    EquipmentItem {
        id: Uuid::new_v4(),
        name: name.to_string(),
        category: category.to_string(),
        steps: vec![Step::new("Press the power button")],
        manual_url: None,
    }
}

fn photo(url: &str) -> GalleryItem {
    GalleryItem {
        id: Uuid::new_v4(),
        url: url.to_string(),
        alt: None,
        caption: None,
        order: 0,
    }
}

// ---------------------------------------------------------------------------
// Test: sections and wizard step
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "./migrations")]
#[ignore = "requires DATABASE_URL"]
async fn test_upsert_identity_records_step(pool: PgPool) {
    let store = PgDraftStore::new(pool);
    let booklet = new_draft(&store, 7).await;

    let identity = IdentitySection {
        property_name: "Sea View".to_string(),
        ..Default::default()
    };
    store
        .upsert_section(booklet.id, &SectionPatch::Identity(identity.clone()), 1)
        .await
        .unwrap();
    // Replaying the same snapshot is harmless.
    store
        .upsert_section(booklet.id, &SectionPatch::Identity(identity.clone()), 1)
        .await
        .unwrap();
    store.set_wizard_step(booklet.id, 4).await.unwrap();

    let loaded = store.find_booklet(booklet.id).await.unwrap().unwrap();
    assert_eq!(loaded.identity, identity);
    assert_eq!(loaded.wizard_step, 4);
    assert_eq!(loaded.status, BookletStatus::Draft);
}

#[sqlx::test(migrations = "./migrations")]
#[ignore = "requires DATABASE_URL"]
async fn test_upsert_unknown_booklet_is_not_found(pool: PgPool) {
    let store = PgDraftStore::new(pool);
    let result = store
        .upsert_section(
            Uuid::new_v4(),
            &SectionPatch::Identity(IdentitySection::default()),
            1,
        )
        .await;
    assert_matches!(result, Err(StoreError::NotFound { .. }));
}

#[sqlx::test(migrations = "./migrations")]
#[ignore = "requires DATABASE_URL"]
async fn test_list_booklets_by_owner(pool: PgPool) {
    let store = PgDraftStore::new(pool);
    new_draft(&store, 1).await;
    new_draft(&store, 1).await;
    new_draft(&store, 2).await;

    assert_eq!(store.list_booklets(1).await.unwrap().len(), 2);
    assert_eq!(store.list_booklets(2).await.unwrap().len(), 1);
    assert!(store.list_booklets(3).await.unwrap().is_empty());
}

// ---------------------------------------------------------------------------
// Test: child collections
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "./migrations")]
#[ignore = "requires DATABASE_URL"]
async fn test_equipment_identity_is_case_insensitive(pool: PgPool) {
    let store = PgDraftStore::new(pool);
    let booklet = new_draft(&store, 7).await;

    store
        .upsert_section(booklet.id, &SectionPatch::Equipment(equipment("Oven", "Kitchen")), 4)
        .await
        .unwrap();
    let clash = store
        .upsert_section(booklet.id, &SectionPatch::Equipment(equipment(" oven", "KITCHEN ")), 4)
        .await;
    assert_matches!(clash, Err(StoreError::Conflict(_)));
}

#[sqlx::test(migrations = "./migrations")]
#[ignore = "requires DATABASE_URL"]
async fn test_child_id_of_another_booklet_conflicts(pool: PgPool) {
    let store = PgDraftStore::new(pool);
    let first = new_draft(&store, 7).await;
    let second = new_draft(&store, 8).await;
    let item = equipment("Oven", "Kitchen");

    store
        .upsert_section(first.id, &SectionPatch::Equipment(item.clone()), 4)
        .await
        .unwrap();
    let hijack = EquipmentItem {
        name: "Kettle".to_string(),
        ..item
    };
    let result = store
        .upsert_section(second.id, &SectionPatch::Equipment(hijack), 4)
        .await;
    assert_matches!(result, Err(StoreError::Conflict(_)));

    let loaded = store.find_booklet(first.id).await.unwrap().unwrap();
    assert_eq!(loaded.equipment[0].name, "Oven");
    let other = store.find_booklet(second.id).await.unwrap().unwrap();
    assert!(other.equipment.is_empty());
}

#[sqlx::test(migrations = "./migrations")]
#[ignore = "requires DATABASE_URL"]
async fn test_faq_upsert_and_remove(pool: PgPool) {
    let store = PgDraftStore::new(pool);
    let booklet = new_draft(&store, 7).await;
    let mut entry = FaqEntry {
        id: Uuid::new_v4(),
        question: "Pets?".to_string(),
        answer: "No".to_string(),
        is_favorite: false,
    };

    store
        .upsert_section(booklet.id, &SectionPatch::Faq(entry.clone()), 8)
        .await
        .unwrap();
    entry.is_favorite = true;
    store
        .upsert_section(booklet.id, &SectionPatch::Faq(entry.clone()), 8)
        .await
        .unwrap();

    let loaded = store.find_booklet(booklet.id).await.unwrap().unwrap();
    assert_eq!(loaded.faq, vec![entry.clone()]);

    store
        .upsert_section(booklet.id, &SectionPatch::RemoveFaq { id: entry.id }, 8)
        .await
        .unwrap();
    let loaded = store.find_booklet(booklet.id).await.unwrap().unwrap();
    assert!(loaded.faq.is_empty());
}

#[sqlx::test(migrations = "./migrations")]
#[ignore = "requires DATABASE_URL"]
async fn test_gallery_order_stays_dense(pool: PgPool) {
    let store = PgDraftStore::new(pool);
    let booklet = new_draft(&store, 7).await;
    let (a, b, c) = (photo("/media/a.jpg"), photo("/media/b.jpg"), photo("/media/c.jpg"));
    for item in [&a, &b, &c] {
        store
            .upsert_section(booklet.id, &SectionPatch::GalleryItem(item.clone()), 10)
            .await
            .unwrap();
    }

    store
        .upsert_section(
            booklet.id,
            &SectionPatch::GalleryOrder {
                ids: vec![c.id, a.id, b.id],
            },
            10,
        )
        .await
        .unwrap();
    store
        .upsert_section(booklet.id, &SectionPatch::RemoveGalleryItem { id: a.id }, 10)
        .await
        .unwrap();

    let loaded = store.find_booklet(booklet.id).await.unwrap().unwrap();
    let ids: Vec<_> = loaded.gallery.iter().map(|g| g.id).collect();
    let orders: Vec<_> = loaded.gallery.iter().map(|g| g.order).collect();
    assert_eq!(ids, vec![c.id, b.id]);
    assert_eq!(orders, vec![0, 1]);
}

// ---------------------------------------------------------------------------
// Test: access codes
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "./migrations")]
#[ignore = "requires DATABASE_URL"]
async fn test_rotate_pin_revokes_previous(pool: PgPool) {
    let store = PgDraftStore::new(pool);
    let booklet = new_draft(&store, 7).await;

    let first = store
        .rotate_pin(booklet.id, "ABCDEF", Some(BookletStatus::Published))
        .await
        .unwrap();
    let second = store.rotate_pin(booklet.id, "GHJKLM", None).await.unwrap();

    assert_eq!(store.active_pin(booklet.id).await.unwrap(), Some(second.clone()));
    assert!(store.find_active_pin_by_code("ABCDEF").await.unwrap().is_none());

    let history = store.list_pins(booklet.id).await.unwrap();
    assert_eq!(history.len(), 2);
    let revoked = history.iter().find(|p| p.id == first.id).unwrap();
    assert_eq!(revoked.status, PinStatus::Revoked);
    assert!(revoked.revoked_at.is_some());

    let loaded = store.find_booklet(booklet.id).await.unwrap().unwrap();
    assert_eq!(loaded.status, BookletStatus::Published);
}

#[sqlx::test(migrations = "./migrations")]
#[ignore = "requires DATABASE_URL"]
async fn test_active_code_is_unique_across_booklets(pool: PgPool) {
    let store = PgDraftStore::new(pool);
    let one = new_draft(&store, 7).await;
    let two = new_draft(&store, 8).await;

    store.rotate_pin(one.id, "ABCDEF", None).await.unwrap();
    let clash = store.rotate_pin(two.id, "ABCDEF", None).await;
    assert_matches!(clash, Err(StoreError::Conflict(_)));
    // The failed rotation rolled back entirely.
    assert!(store.active_pin(two.id).await.unwrap().is_none());
}

#[sqlx::test(migrations = "./migrations")]
#[ignore = "requires DATABASE_URL"]
async fn test_delete_blocked_by_active_pin(pool: PgPool) {
    let store = PgDraftStore::new(pool);
    let booklet = new_draft(&store, 7).await;
    store.rotate_pin(booklet.id, "ABCDEF", None).await.unwrap();

    let result = store.delete_booklet(booklet.id).await;
    assert_matches!(result, Err(StoreError::Conflict(_)));

    let draft = new_draft(&store, 7).await;
    store
        .upsert_section(draft.id, &SectionPatch::Equipment(equipment("Oven", "")), 4)
        .await
        .unwrap();
    store.delete_booklet(draft.id).await.unwrap();
    assert!(store.find_booklet(draft.id).await.unwrap().is_none());
}
