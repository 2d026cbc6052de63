//! Typed operations on cellars, bottles and users.
//!
//! All of them go through [`SessionClient::call`], so they share its
//! refresh-and-retry behavior. Success markers follow the API: creates and
//! updates must echo an `id`, deletes must answer 200 or 204.

use std::collections::BTreeMap;

use reqwest::StatusCode;
use serde::Serialize;
use serde_json::Value as JsonValue;

use crate::aggregate::{Aggregator, BottleRecord, BottleRow};
use crate::client::{SessionClient, expect_created};
use crate::error::Error;
use crate::models::{Bottle, BottleForm, Cellar, CellarForm, User, UserUpdate};
use crate::transport::{ApiResponse, Transport};
use crate::types::{BottleId, CellarId, UserId};

/// Every bottle the user owns, merged across cellars.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct BottleOverview {
    pub rows: Vec<BottleRow>,
    pub cellar_names: BTreeMap<CellarId, String>,
    /// Cellars whose bottles could not be fetched; their bottles are missing from `rows`.
    pub failed_cellars: Vec<CellarId>,
}

impl BottleOverview {
    /// Display name of a cellar, or `Cellar #<id prefix>` when unknown.
    #[must_use]
    pub fn cellar_label(&self, id: &CellarId) -> String {
        self.cellar_names.get(id).cloned().unwrap_or_else(|| {
            let prefix: String = id.as_str().chars().take(8).collect();
            format!("Cellar #{prefix}")
        })
    }

    /// Labels of the cellars holding a row, in row order.
    #[must_use]
    pub fn cellar_labels(&self, row: &BottleRow) -> Vec<String> {
        row.parent_ids.iter().map(|id| self.cellar_label(id)).collect()
    }

    #[must_use]
    pub fn total_quantity(&self) -> u64 {
        self.rows.iter().map(|row| row.quantity).sum()
    }
}

impl<T: Transport> SessionClient<T> {
    // ── Cellars ────────────────────────────────────────────────────────

    pub async fn list_cellars(&self) -> Result<Vec<Cellar>, Error> {
        self.get("/cellars").await?.into_result()?.json()
    }

    pub async fn get_cellar(&self, id: &CellarId) -> Result<Cellar, Error> {
        self.get(&cellar_path(id)).await?.into_result()?.json()
    }

    /// # Errors
    ///
    /// [`Error::Validation`] before sending if the form is invalid; otherwise
    /// the errors of [`SessionClient::call`], or [`Error::Upstream`] if the
    /// API did not return the created cellar.
    pub async fn create_cellar(&self, form: CellarForm) -> Result<Cellar, Error> {
        let form = form.validated()?;
        let response = self.post_json("/cellars", &form).await?;
        let cellar: Cellar = expect_created(response)?;
        tracing::info!(cellar_id = %cellar.id, "cellar created");
        Ok(cellar)
    }

    pub async fn update_cellar(&self, id: &CellarId, form: CellarForm) -> Result<Cellar, Error> {
        let form = form.validated()?;
        let response = self.put_json(&cellar_path(id), &form).await?;
        if response.status != StatusCode::OK {
            return Err(response.into_upstream_error());
        }
        expect_created(response)
    }

    pub async fn delete_cellar(&self, id: &CellarId) -> Result<(), Error> {
        expect_deleted(self.delete(&cellar_path(id)).await?)?;
        tracing::info!(cellar_id = %id, "cellar deleted");
        Ok(())
    }

    // ── Bottles ────────────────────────────────────────────────────────

    pub async fn list_bottles(&self, cellar: &CellarId) -> Result<Vec<Bottle>, Error> {
        self.get(&bottles_path(cellar)).await?.into_result()?.json()
    }

    /// Lists a cellar's bottles without requiring every entry to be well formed.
    ///
    /// # Errors
    ///
    /// [`Error::InvalidResponse`] if the body is not a JSON array; otherwise
    /// the errors of [`SessionClient::call`] and [`ApiResponse::into_result`].
    pub async fn list_bottle_records(&self, cellar: &CellarId) -> Result<Vec<BottleRecord>, Error> {
        let json = self
            .get(&bottles_path(cellar))
            .await?
            .into_result()?
            .json_value()?;
        if !json.is_array() {
            return Err(Error::InvalidResponse("bottle list is not an array".into()));
        }
        Ok(BottleRecord::list_from_json(&json))
    }

    pub async fn get_bottle(&self, id: &BottleId) -> Result<Bottle, Error> {
        self.get(&bottle_path(id)).await?.into_result()?.json()
    }

    pub async fn create_bottle(&self, cellar: &CellarId, form: BottleForm) -> Result<Bottle, Error> {
        let form = form.validated()?;
        let response = self.post_json(&bottles_path(cellar), &form).await?;
        let bottle: Bottle = expect_created(response)?;
        tracing::info!(bottle_id = %bottle.id, cellar_id = %cellar, "bottle created");
        Ok(bottle)
    }

    pub async fn update_bottle(&self, id: &BottleId, form: BottleForm) -> Result<Bottle, Error> {
        let form = form.validated()?;
        expect_created(self.put_json(&bottle_path(id), &form).await?)
    }

    pub async fn delete_bottle(&self, id: &BottleId) -> Result<(), Error> {
        expect_deleted(self.delete(&bottle_path(id)).await?)?;
        tracing::info!(bottle_id = %id, "bottle deleted");
        Ok(())
    }

    // ── Users ──────────────────────────────────────────────────────────

    pub async fn get_user(&self, id: &UserId) -> Result<User, Error> {
        self.get(&user_path(id)).await?.into_result()?.json()
    }

    /// The user the session belongs to.
    ///
    /// # Errors
    ///
    /// [`Error::NotAuthenticated`] if the session does not know its user.
    pub async fn current_user(&self) -> Result<User, Error> {
        let user_id = self
            .session()
            .snapshot()
            .await
            .and_then(|s| s.user_id)
            .ok_or(Error::NotAuthenticated)?;
        self.get_user(&user_id).await
    }

    pub async fn update_user(&self, id: &UserId, update: &UserUpdate) -> Result<User, Error> {
        expect_created(self.put_json(&user_path(id), update).await?)
    }

    pub async fn delete_user(&self, id: &UserId) -> Result<(), Error> {
        expect_deleted(self.delete(&user_path(id)).await?)
    }

    // ── Aggregated views ───────────────────────────────────────────────

    /// Fetches every cellar and its bottles, merging identical wines.
    ///
    /// Cellars are fetched one after another, in the order the API lists
    /// them. A cellar whose bottles cannot be fetched is skipped and reported
    /// in [`BottleOverview::failed_cellars`], unless the failure means the
    /// user must log in again, which aborts the whole overview.
    ///
    /// # Errors
    ///
    /// Errors from listing the cellars, and [`Error::NotAuthenticated`] or
    /// [`Error::SessionExpired`] from any bottle fetch.
    pub async fn bottle_overview(&self) -> Result<BottleOverview, Error> {
        let json = self.get("/cellars").await?.into_result()?.json_value()?;
        let Some(entries) = json.as_array() else {
            return Err(Error::InvalidResponse("cellar list is not an array".into()));
        };

        let mut overview = BottleOverview::default();
        let mut cellar_ids = Vec::with_capacity(entries.len());
        for entry in entries {
            let Some(id) = entry.get("id").and_then(id_text) else {
                tracing::debug!(entry = %entry, "skipping cellar without id");
                continue;
            };
            let id = CellarId(id);
            if let Some(name) = entry.get("name").and_then(JsonValue::as_str) {
                overview.cellar_names.insert(id.clone(), name.to_owned());
            }
            cellar_ids.push(id);
        }

        let mut aggregator = Aggregator::new();
        for id in cellar_ids {
            match self.list_bottle_records(&id).await {
                Ok(records) => aggregator.push(id, records),
                Err(e) if e.requires_login() => return Err(e),
                Err(e) => {
                    tracing::warn!(cellar_id = %id, error = %e, "failed to fetch cellar bottles");
                    overview.failed_cellars.push(id);
                }
            }
        }

        overview.rows = aggregator.finish();
        Ok(overview)
    }
}

fn expect_deleted(response: ApiResponse) -> Result<(), Error> {
    match response.status {
        StatusCode::OK | StatusCode::NO_CONTENT => Ok(()),
        _ => Err(response.into_upstream_error()),
    }
}

fn id_text(value: &JsonValue) -> Option<String> {
    match value {
        JsonValue::String(s) if !s.is_empty() => Some(s.clone()),
        JsonValue::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn cellar_path(id: &CellarId) -> String {
    format!("/cellars/{}", urlencoding::encode(id.as_str()))
}

fn bottles_path(cellar: &CellarId) -> String {
    format!("/cellars/{}/bottles", urlencoding::encode(cellar.as_str()))
}

fn bottle_path(id: &BottleId) -> String {
    format!("/bottles/{}", urlencoding::encode(id.as_str()))
}

fn user_path(id: &UserId) -> String {
    format!("/users/{}", urlencoding::encode(&id.0))
}
