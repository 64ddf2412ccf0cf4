//! Booklet lifecycle and guest access.
//!
//! `draft --publish--> published --disable--> disabled --enable--> published`
//!
//! Owner operations verify ownership first and report precise errors. Guest
//! operations resolve an access code and fail with the undifferentiated
//! [`CoreError::UnknownAccessCode`] whatever went wrong, so a caller can
//! never tell a revoked code from one that never existed.

use std::sync::Arc;

use serde::Serialize;
use serde_json::Value;

use crate::access_code::{
    generate_code, normalize_code, validate_code_length, MAX_COLLISION_RETRIES,
};
use crate::booklet::{Booklet, BookletStatus};
use crate::disclosure::disclose;
use crate::error::CoreError;
use crate::store::{load_owned, DraftStore, Pin, StoreError};
use crate::types::{BookletId, DbId};
use crate::visibility::{effective_tier, CallerRole, Field};

/// The revealed Wi-Fi credentials.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WifiCredentials {
    pub ssid: String,
    pub password: String,
}

#[derive(Clone)]
pub struct PublicationProtocol {
    store: Arc<dyn DraftStore>,
    code_length: usize,
}

impl PublicationProtocol {
    pub fn new(store: Arc<dyn DraftStore>, code_length: usize) -> Result<Self, CoreError> {
        validate_code_length(code_length)?;
        Ok(Self { store, code_length })
    }

    // -- owner operations ---------------------------------------------------

    /// Publish and issue a fresh access code, revoking any previous one.
    pub async fn publish(&self, booklet_id: BookletId, owner_id: DbId) -> Result<Pin, CoreError> {
        let booklet = load_owned(self.store.as_ref(), booklet_id, owner_id).await?;
        if booklet.status == BookletStatus::Disabled {
            return Err(CoreError::Conflict(
                "Booklet is disabled; enable it instead of publishing again".to_string(),
            ));
        }
        if !booklet.has_content() {
            return Err(CoreError::Validation(
                "Booklet has no content to publish".to_string(),
            ));
        }

        let pin = self
            .issue(booklet_id, Some(BookletStatus::Published))
            .await?;
        tracing::info!(%booklet_id, owner_id, "Booklet published");
        Ok(pin)
    }

    /// Replace the active access code. The status is left untouched.
    pub async fn regenerate(
        &self,
        booklet_id: BookletId,
        owner_id: DbId,
    ) -> Result<Pin, CoreError> {
        load_owned(self.store.as_ref(), booklet_id, owner_id).await?;
        if self.store.active_pin(booklet_id).await?.is_none() {
            return Err(CoreError::Validation(
                "Booklet has never been published".to_string(),
            ));
        }

        let pin = self.issue(booklet_id, None).await?;
        tracing::info!(%booklet_id, owner_id, "Access code regenerated");
        Ok(pin)
    }

    /// Take a published booklet offline. The active code survives.
    pub async fn disable(
        &self,
        booklet_id: BookletId,
        owner_id: DbId,
    ) -> Result<BookletStatus, CoreError> {
        let booklet = load_owned(self.store.as_ref(), booklet_id, owner_id).await?;
        match booklet.status {
            BookletStatus::Draft => Err(CoreError::Validation(
                "Booklet has never been published".to_string(),
            )),
            BookletStatus::Disabled => Ok(BookletStatus::Disabled),
            BookletStatus::Published => {
                self.store
                    .set_status(booklet_id, BookletStatus::Disabled)
                    .await?;
                tracing::info!(%booklet_id, owner_id, "Booklet disabled");
                Ok(BookletStatus::Disabled)
            }
        }
    }

    /// Put a disabled booklet back online under its existing code.
    pub async fn enable(
        &self,
        booklet_id: BookletId,
        owner_id: DbId,
    ) -> Result<BookletStatus, CoreError> {
        let booklet = load_owned(self.store.as_ref(), booklet_id, owner_id).await?;
        match booklet.status {
            BookletStatus::Draft => Err(CoreError::Validation(
                "Booklet has never been published".to_string(),
            )),
            BookletStatus::Published => Ok(BookletStatus::Published),
            BookletStatus::Disabled => {
                self.store
                    .set_status(booklet_id, BookletStatus::Published)
                    .await?;
                tracing::info!(%booklet_id, owner_id, "Booklet enabled");
                Ok(BookletStatus::Published)
            }
        }
    }

    async fn issue(
        &self,
        booklet_id: BookletId,
        status: Option<BookletStatus>,
    ) -> Result<Pin, CoreError> {
        let mut attempt = 0;
        loop {
            attempt += 1;
            let code = generate_code(self.code_length);
            match self.store.rotate_pin(booklet_id, &code, status).await {
                Ok(pin) => return Ok(pin),
                Err(StoreError::Conflict(msg)) if attempt < MAX_COLLISION_RETRIES => {
                    tracing::warn!(%booklet_id, attempt, reason = %msg, "Access code collision, retrying");
                }
                Err(err) => return Err(err.into()),
            }
        }
    }

    // -- guest operations ---------------------------------------------------

    /// Resolve a typed code to its published booklet.
    pub async fn resolve(&self, code: &str) -> Result<Booklet, CoreError> {
        let code = normalize_code(code);
        if code.is_empty() {
            return Err(CoreError::UnknownAccessCode);
        }

        let pin = self
            .store
            .find_active_pin_by_code(&code)
            .await
            .map_err(guest_failure)?
            .ok_or(CoreError::UnknownAccessCode)?;
        let booklet = self
            .store
            .find_booklet(pin.booklet_id)
            .await
            .map_err(guest_failure)?
            .ok_or(CoreError::UnknownAccessCode)?;

        if booklet.status != BookletStatus::Published {
            return Err(CoreError::UnknownAccessCode);
        }
        Ok(booklet)
    }

    /// The classifier-filtered payload a guest receives.
    pub async fn guest_view(&self, code: &str) -> Result<Value, CoreError> {
        let booklet = self.resolve(code).await?;
        Ok(disclose(&booklet, CallerRole::Guest))
    }

    /// The explicit second request returning the gated Wi-Fi password.
    pub async fn reveal_connectivity(&self, code: &str) -> Result<WifiCredentials, CoreError> {
        let booklet = self.resolve(code).await?;
        let admitted = [Field::WifiSsid, Field::WifiPassword].into_iter().all(|field| {
            effective_tier(field, CallerRole::Guest, booklet.status)
                .admits_on_reveal(CallerRole::Guest)
        });
        if !admitted {
            return Err(CoreError::UnknownAccessCode);
        }

        tracing::debug!(booklet_id = %booklet.id, "Wi-Fi credentials revealed");
        Ok(WifiCredentials {
            ssid: booklet.connectivity.ssid,
            password: booklet.connectivity.password,
        })
    }
}

fn guest_failure(err: StoreError) -> CoreError {
    tracing::warn!(error = %err, "Guest lookup failed in store");
    CoreError::UnknownAccessCode
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
