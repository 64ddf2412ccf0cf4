/// External user ids (issued by the auth provider) are 64-bit integers.
pub type DbId = i64;

/// Booklets are keyed by UUID so drafts can be created before the store
/// assigns anything.
pub type BookletId = uuid::Uuid;

/// All timestamps are UTC.
pub type Timestamp = chrono::DateTime<chrono::Utc>;
