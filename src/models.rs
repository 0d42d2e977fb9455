use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use ts_rs::TS;
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

// --- Validation ---

/// ValidationError
///
/// A single rejected form field. Rendered as `422 Unprocessable Entity`.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{field}: {message}")]
pub struct ValidationError {
    pub field: &'static str,
    pub message: String,
}

impl ValidationError {
    fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

const NAME_MAX: usize = 120;

fn required(field: &'static str, value: &str, max: usize) -> Result<String, ValidationError> {
    let value = value.trim();
    if value.is_empty() {
        return Err(ValidationError::new(field, "is required"));
    }
    if value.chars().count() > max {
        return Err(ValidationError::new(
            field,
            format!("must be at most {max} characters"),
        ));
    }
    Ok(value.to_string())
}

fn optional(field: &'static str, value: Option<String>, max: usize) -> Result<Option<String>, ValidationError> {
    match value.as_deref().map(str::trim) {
        None | Some("") => Ok(None),
        Some(v) => required(field, v, max).map(Some),
    }
}

fn email(field: &'static str, value: &str) -> Result<String, ValidationError> {
    let value = required(field, value, 254)?.to_lowercase();
    let well_formed = match value.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty()
                && !domain.contains('@')
                && domain.contains('.')
                && !domain.starts_with('.')
                && !domain.ends_with('.')
                && !value.contains(char::is_whitespace)
        }
        None => false,
    };
    if well_formed {
        Ok(value)
    } else {
        Err(ValidationError::new(field, "is not a valid email address"))
    }
}

fn optional_email(field: &'static str, value: Option<String>) -> Result<Option<String>, ValidationError> {
    match value.as_deref().map(str::trim) {
        None | Some("") => Ok(None),
        Some(v) => email(field, v).map(Some),
    }
}

fn school_code(value: &str) -> Result<String, ValidationError> {
    let code = value.trim().to_uppercase();
    let len = code.chars().count();
    if !(2..=20).contains(&len) || !code.chars().all(|c| c.is_ascii_alphanumeric()) {
        return Err(ValidationError::new(
            "code",
            "must be 2 to 20 letters or digits",
        ));
    }
    Ok(code)
}

fn gender(value: Option<String>) -> Result<Option<String>, ValidationError> {
    match value.as_deref().map(|g| g.trim().to_uppercase()) {
        None => Ok(None),
        Some(g) if g.is_empty() => Ok(None),
        Some(g) if g == "M" || g == "F" => Ok(Some(g)),
        Some(_) => Err(ValidationError::new("gender", "must be M or F")),
    }
}

// --- Schools ---

/// School
///
/// A customer school, row of the `schools` table.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, FromRow, Default)]
#[ts(export)]
pub struct School {
    pub id: Uuid,
    pub name: String,
    /// Short unique code used on invoices and student id numbers.
    pub code: String,
    pub city: Option<String>,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub is_active: bool,
    #[ts(type = "string")]
    pub created_at: DateTime<Utc>,
    #[ts(type = "string")]
    pub updated_at: DateTime<Utc>,
}

/// CreateSchoolRequest
///
/// Input payload for `POST /schools`.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct CreateSchoolRequest {
    pub name: String,
    pub code: String,
    pub city: Option<String>,
    pub phone: Option<String>,
    pub email: Option<String>,
}

impl CreateSchoolRequest {
    /// Returns the trimmed, normalized payload or the first invalid field.
    pub fn validate(self) -> Result<Self, ValidationError> {
        Ok(Self {
            name: required("name", &self.name, NAME_MAX)?,
            code: school_code(&self.code)?,
            city: optional("city", self.city, NAME_MAX)?,
            phone: optional("phone", self.phone, 32)?,
            email: optional_email("email", self.email)?,
        })
    }
}

/// UpdateSchoolRequest
///
/// Partial update for `PUT /schools/{id}`. Absent fields keep their stored value.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct UpdateSchoolRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub city: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_active: Option<bool>,
}

impl UpdateSchoolRequest {
    pub fn validate(self) -> Result<Self, ValidationError> {
        Ok(Self {
            name: self.name.map(|n| required("name", &n, NAME_MAX)).transpose()?,
            code: self.code.map(|c| school_code(&c)).transpose()?,
            city: optional("city", self.city, NAME_MAX)?,
            phone: optional("phone", self.phone, 32)?,
            email: optional_email("email", self.email)?,
            is_active: self.is_active,
        })
    }
}

// --- Users ---

/// UserProfile
///
/// An operator or school staff member: row of `profiles` joined with their roles.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, FromRow, Default)]
#[ts(export)]
pub struct UserProfile {
    // Same UUID as the identity provider's user.
    pub id: Uuid,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub phone: Option<String>,
    pub school_id: Option<Uuid>,
    /// Role values from `user_roles`, e.g. `super_admin`.
    pub roles: Vec<String>,
    #[ts(type = "string")]
    pub created_at: DateTime<Utc>,
}

/// UpdateUserRequest
///
/// Partial profile update for `PUT /users/{id}`.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct UpdateUserRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub first_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub school_id: Option<Uuid>,
}

impl UpdateUserRequest {
    pub fn validate(self) -> Result<Self, ValidationError> {
        Ok(Self {
            first_name: self
                .first_name
                .map(|n| required("first_name", &n, NAME_MAX))
                .transpose()?,
            last_name: self
                .last_name
                .map(|n| required("last_name", &n, NAME_MAX))
                .transpose()?,
            phone: optional("phone", self.phone, 32)?,
            school_id: self.school_id,
        })
    }
}

// --- Students ---

/// Student
///
/// A student enrolled in one school, row of `students`.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, FromRow, Default)]
#[ts(export)]
pub struct Student {
    pub id: Uuid,
    pub school_id: Uuid,
    pub first_name: String,
    pub last_name: String,
    /// The school-issued registration number (matricule). Unique.
    pub id_number: String,
    pub gender: Option<String>,
    #[ts(type = "string | null")]
    pub date_of_birth: Option<NaiveDate>,
    #[ts(type = "string")]
    pub created_at: DateTime<Utc>,
    #[ts(type = "string")]
    pub updated_at: DateTime<Utc>,
}

/// CreateStudentRequest
///
/// Input payload for `POST /students`.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct CreateStudentRequest {
    pub school_id: Uuid,
    pub first_name: String,
    pub last_name: String,
    pub id_number: String,
    pub gender: Option<String>,
    #[ts(type = "string | null")]
    pub date_of_birth: Option<NaiveDate>,
}

impl CreateStudentRequest {
    pub fn validate(self) -> Result<Self, ValidationError> {
        if self.school_id.is_nil() {
            return Err(ValidationError::new("school_id", "is required"));
        }
        if let Some(dob) = self.date_of_birth
            && dob > Utc::now().date_naive()
        {
            return Err(ValidationError::new("date_of_birth", "cannot be in the future"));
        }
        Ok(Self {
            school_id: self.school_id,
            first_name: required("first_name", &self.first_name, NAME_MAX)?,
            last_name: required("last_name", &self.last_name, NAME_MAX)?,
            id_number: required("id_number", &self.id_number, 32)?.to_uppercase(),
            gender: gender(self.gender)?,
            date_of_birth: self.date_of_birth,
        })
    }
}

/// UpdateStudentRequest
///
/// Partial update for `PUT /students/{id}`.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct UpdateStudentRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub first_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id_number: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gender: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    #[ts(type = "string | null")]
    pub date_of_birth: Option<NaiveDate>,
}

impl UpdateStudentRequest {
    pub fn validate(self) -> Result<Self, ValidationError> {
        if let Some(dob) = self.date_of_birth
            && dob > Utc::now().date_naive()
        {
            return Err(ValidationError::new("date_of_birth", "cannot be in the future"));
        }
        Ok(Self {
            first_name: self
                .first_name
                .map(|n| required("first_name", &n, NAME_MAX))
                .transpose()?,
            last_name: self
                .last_name
                .map(|n| required("last_name", &n, NAME_MAX))
                .transpose()?,
            id_number: self
                .id_number
                .map(|n| required("id_number", &n, 32).map(|n| n.to_uppercase()))
                .transpose()?,
            gender: gender(self.gender)?,
            date_of_birth: self.date_of_birth,
        })
    }
}

// --- Listing ---

pub const DEFAULT_PER_PAGE: i64 = 20;
pub const MAX_PER_PAGE: i64 = 100;
/// Highest page whose offset still fits an `i64` at the largest page size.
pub const MAX_PAGE: i64 = i64::MAX / MAX_PER_PAGE;

/// ListQuery
///
/// Search and pagination parameters shared by the school and user listings.
#[derive(Debug, Clone, Default, Deserialize, IntoParams)]
pub struct ListQuery {
    /// Case-insensitive match on names, codes and emails.
    pub search: Option<String>,
    /// 1-based page number.
    pub page: Option<i64>,
    pub per_page: Option<i64>,
}

/// StudentQuery
///
/// `ListQuery` plus an optional school filter.
#[derive(Debug, Clone, Default, Deserialize, IntoParams)]
pub struct StudentQuery {
    pub school_id: Option<Uuid>,
    pub search: Option<String>,
    pub page: Option<i64>,
    pub per_page: Option<i64>,
}

/// Pagination
///
/// Clamped page window derived from raw query parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pagination {
    pub page: i64,
    pub per_page: i64,
}

impl Pagination {
    pub fn new(page: Option<i64>, per_page: Option<i64>) -> Self {
        Self {
            page: page.unwrap_or(1).clamp(1, MAX_PAGE),
            per_page: per_page.unwrap_or(DEFAULT_PER_PAGE).clamp(1, MAX_PER_PAGE),
        }
    }

    pub fn offset(&self) -> i64 {
        (self.page - 1) * self.per_page
    }
}

/// Normalizes a search string: trimmed, `None` when blank.
pub fn search_term(search: Option<&str>) -> Option<String> {
    search
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

/// Page
///
/// One page of a listing plus the total row count behind it.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total: i64,
    pub page: i64,
    pub per_page: i64,
}

// --- Dashboard ---

/// DashboardStats
///
/// Headline counters shown on `GET /dashboard`.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default, PartialEq)]
#[ts(export)]
pub struct DashboardStats {
    pub total_schools: i64,
    pub active_schools: i64,
    pub total_students: i64,
    pub total_users: i64,
}

// --- Auth forms ---

/// SignInForm
///
/// Body of `POST /sign-in` (form-encoded).
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct SignInForm {
    pub email: String,
    pub password: String,
}

impl SignInForm {
    pub fn validate(self) -> Result<Self, ValidationError> {
        if self.password.is_empty() {
            return Err(ValidationError::new("password", "is required"));
        }
        Ok(Self {
            email: email("email", &self.email)?,
            password: self.password,
        })
    }
}

/// ForgotPasswordForm
///
/// Body of `POST /forgot-password` (form-encoded).
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct ForgotPasswordForm {
    pub email: String,
}

impl ForgotPasswordForm {
    pub fn validate(self) -> Result<Self, ValidationError> {
        Ok(Self {
            email: email("email", &self.email)?,
        })
    }
}
