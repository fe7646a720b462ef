//! User Directory: profiles, registration status and preferences.

use rusqlite::{params, Connection, OptionalExtension, Result, Row};
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumString};

use crate::storage::db::now_timestamp;

/// Registration progress of a user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString, AsRefStr)]
pub enum AccountStatus {
    #[strum(serialize = "incomplete")]
    #[serde(rename = "incomplete")]
    Incomplete,
    #[strum(serialize = "phoneShared")]
    #[serde(rename = "phoneShared")]
    PhoneShared,
    #[strum(serialize = "complete")]
    #[serde(rename = "complete")]
    Complete,
}

/// A user profile as stored in the `users` table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    /// Telegram user id
    pub id: i64,
    /// Display name (Telegram first name unless changed in the web app)
    pub name: String,
    pub username: Option<String>,
    pub phone: Option<String>,
    pub account_status: AccountStatus,
    /// Preference string, `gender/min-max/city`
    pub preferences: Option<String>,
    pub age: Option<u32>,
    pub city: Option<String>,
    pub country: Option<String>,
    pub gender: Option<String>,
    pub birthdate: Option<String>,
    pub points: u32,
}

impl User {
    pub fn is_complete(&self) -> bool {
        self.account_status == AccountStatus::Complete
    }

    pub fn has_phone(&self) -> bool {
        self.phone.as_deref().is_some_and(|p| !p.is_empty())
    }

    pub(crate) fn from_row(row: &Row<'_>) -> Result<Self> {
        let status: String = row.get("account_status")?;
        let account_status = status.parse::<AccountStatus>().map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(0, rusqlite::types::Type::Text, Box::new(e))
        })?;

        Ok(Self {
            id: row.get("id")?,
            name: row.get("name")?,
            username: row.get("username")?,
            phone: row.get("phone")?,
            account_status,
            preferences: row.get("preferences")?,
            age: row.get("age")?,
            city: row.get("city")?,
            country: row.get("country")?,
            gender: row.get("gender")?,
            birthdate: row.get("birthdate")?,
            points: row.get("points")?,
        })
    }
}

/// Column list shared by every `SELECT` that builds a [`User`].
pub(crate) const USER_COLUMNS: &str =
    "id, name, username, phone, account_status, preferences, age, city, country, gender, birthdate, points";

/// Partial profile update; `None` leaves the column untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct UserUpdate {
    pub name: Option<String>,
    pub preferences: Option<String>,
    pub age: Option<u32>,
    pub city: Option<String>,
    pub country: Option<String>,
    pub gender: Option<String>,
    pub birthdate: Option<String>,
    pub account_status: Option<AccountStatus>,
}

impl UserUpdate {
    pub fn is_empty(&self) -> bool {
        self == &Self::default()
    }
}

/// Creates a user on first contact with status `incomplete` and no phone.
///
/// Returns `false` if the user already existed (nothing is changed then).
pub fn create_user(conn: &Connection, id: i64, name: &str, username: Option<&str>) -> Result<bool> {
    let now = now_timestamp();
    let inserted = conn.execute(
        "INSERT OR IGNORE INTO users (id, name, username, account_status, points, created_at, updated_at)
         VALUES (?1, ?2, ?3, 'incomplete', 0, ?4, ?4)",
        params![id, name, username, now],
    )?;
    Ok(inserted > 0)
}

/// Fetches a user by Telegram id.
///
/// Returns `Ok(None)` if the user is unknown.
pub fn get_user(conn: &Connection, id: i64) -> Result<Option<User>> {
    let sql = format!("SELECT {} FROM users WHERE id = ?1", USER_COLUMNS);
    conn.query_row(&sql, [id], User::from_row).optional()
}

/// Stores the shared phone number and moves the account to `phoneShared`.
///
/// A `complete` account keeps its status. Returns `false` for unknown users.
pub fn set_phone(conn: &Connection, id: i64, phone: &str) -> Result<bool> {
    let updated = conn.execute(
        "UPDATE users
         SET phone = ?1,
             account_status = CASE WHEN account_status = 'complete' THEN 'complete' ELSE 'phoneShared' END,
             updated_at = ?2
         WHERE id = ?3",
        params![phone, now_timestamp(), id],
    )?;
    Ok(updated > 0)
}

/// Applies a partial profile update. Returns `false` for unknown users.
pub fn update_user(conn: &Connection, id: i64, update: &UserUpdate) -> Result<bool> {
    let status = update.account_status.map(|s| s.to_string());
    let updated = conn.execute(
        "UPDATE users
         SET name = COALESCE(?1, name),
             preferences = COALESCE(?2, preferences),
             age = COALESCE(?3, age),
             city = COALESCE(?4, city),
             country = COALESCE(?5, country),
             gender = COALESCE(?6, gender),
             birthdate = COALESCE(?7, birthdate),
             account_status = COALESCE(?8, account_status),
             updated_at = ?9
         WHERE id = ?10",
        params![
            update.name,
            update.preferences,
            update.age,
            update.city,
            update.country,
            update.gender,
            update.birthdate,
            status,
            now_timestamp(),
            id
        ],
    )?;
    Ok(updated > 0)
}
