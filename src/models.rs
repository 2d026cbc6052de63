//! Wire types for the inventory API and the form payloads sent to it.
//!
//! Forms are validated locally with the same presence and range checks the
//! web frontend applies before anything is sent. `validated()` trims string
//! fields and returns the cleaned form, or [`Error::Validation`] keyed by
//! field name.

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::api_error::ErrorDetail;
use crate::error::Error;
use crate::types::{BottleId, CellarId, UserId};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[non_exhaustive]
pub struct Cellar {
    pub id: CellarId,
    pub name: String,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub capacity: Option<i64>,
    #[serde(default)]
    pub user_id: Option<UserId>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[non_exhaustive]
pub struct Bottle {
    pub id: BottleId,
    #[serde(default)]
    pub cellar_id: Option<CellarId>,
    pub name: String,
    pub vintage: i32,
    pub wine_type: String,
    #[serde(default)]
    pub region: Option<String>,
    #[serde(default)]
    pub country: Option<String>,
    #[serde(default)]
    pub price: Option<f64>,
    #[serde(default = "default_quantity")]
    pub quantity: i64,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub image_url: Option<String>,
}

fn default_quantity() -> i64 {
    1
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[non_exhaustive]
pub struct User {
    pub id: UserId,
    pub email: String,
    pub username: String,
    #[serde(default)]
    pub is_active: Option<bool>,
}

/// Payload for creating or updating a cellar.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct CellarForm {
    pub name: String,
    pub location: String,
    pub capacity: i64,
}

impl CellarForm {
    /// # Errors
    ///
    /// Returns [`Error::Validation`] if the name is empty or the capacity negative.
    pub fn validated(mut self) -> Result<Self, Error> {
        self.name = self.name.trim().to_owned();
        self.location = self.location.trim().to_owned();

        let mut detail = ErrorDetail::default();
        if self.name.is_empty() {
            detail = detail.with_field("name", "name is required");
        }
        if self.capacity < 0 {
            detail = detail.with_field("capacity", "capacity must not be negative");
        }
        finish(self, detail)
    }
}

/// Payload for creating or updating a bottle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BottleForm {
    pub name: String,
    pub vintage: i32,
    pub wine_type: String,
    pub region: String,
    pub country: String,
    pub price: f64,
    pub quantity: i64,
    pub notes: String,
}

impl Default for BottleForm {
    fn default() -> Self {
        Self {
            name: String::new(),
            vintage: OffsetDateTime::now_utc().year(),
            wine_type: String::new(),
            region: String::new(),
            country: "France".into(),
            price: 0.0,
            quantity: 1,
            notes: String::new(),
        }
    }
}

impl BottleForm {
    /// Validates against the current calendar year.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Validation`] listing every offending field.
    pub fn validated(self) -> Result<Self, Error> {
        let year = OffsetDateTime::now_utc().year();
        self.validated_for_year(year)
    }

    /// Validates with an explicit current year (vintage must be in `(1900, year]`).
    ///
    /// # Errors
    ///
    /// Returns [`Error::Validation`] listing every offending field.
    pub fn validated_for_year(mut self, current_year: i32) -> Result<Self, Error> {
        self.name = self.name.trim().to_owned();
        self.wine_type = self.wine_type.trim().to_owned();
        self.region = self.region.trim().to_owned();
        self.country = self.country.trim().to_owned();
        self.notes = self.notes.trim().to_owned();

        let mut detail = ErrorDetail::default();
        for (field, value) in [
            ("name", &self.name),
            ("wine_type", &self.wine_type),
            ("region", &self.region),
            ("country", &self.country),
        ] {
            if value.is_empty() {
                detail = detail.with_field(field, format!("{field} is required"));
            }
        }
        if self.vintage <= 1900 || self.vintage > current_year {
            detail = detail.with_field(
                "vintage",
                format!("vintage must be between 1901 and {current_year}"),
            );
        }
        if !self.price.is_finite() || self.price < 0.0 {
            detail = detail.with_field("price", "price must not be negative");
        }
        if self.quantity <= 0 {
            detail = detail.with_field("quantity", "quantity must be positive");
        }
        finish(self, detail)
    }
}

/// Registration payload.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewUser {
    pub email: String,
    pub username: String,
    pub password: String,
}

impl std::fmt::Debug for NewUser {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NewUser")
            .field("email", &self.email)
            .field("username", &self.username)
            .finish_non_exhaustive()
    }
}

impl NewUser {
    /// # Errors
    ///
    /// Returns [`Error::Validation`] if a field is empty or the email malformed.
    pub fn validated(mut self) -> Result<Self, Error> {
        self.email = self.email.trim().to_owned();
        self.username = self.username.trim().to_owned();

        if self.email.is_empty() || self.username.is_empty() || self.password.is_empty() {
            return Err(Error::Validation(ErrorDetail::message(
                "all fields are required",
            )));
        }
        if !is_plausible_email(&self.email) {
            return Err(Error::Validation(
                ErrorDetail::default().with_field("email", "email is not valid"),
            ));
        }
        Ok(self)
    }
}

/// Partial user update; absent fields are left untouched by the API.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct UserUpdate {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
}

fn finish<T>(form: T, detail: ErrorDetail) -> Result<T, Error> {
    if detail.is_empty() {
        Ok(form)
    } else {
        Err(Error::Validation(detail))
    }
}

fn is_plausible_email(email: &str) -> bool {
    let Some((local, domain)) = email.split_once('@') else {
        return false;
    };
    !local.is_empty()
        && !domain.contains('@')
        && !email.chars().any(char::is_whitespace)
        && domain
            .split_once('.')
            .is_some_and(|(host, tld)| !host.is_empty() && !tld.is_empty())
}
