use serde::{Deserialize, Serialize, Serializer};
use serde_json::{Map, Value};
use time::macros::format_description;
use time::OffsetDateTime;

use crate::users::error::UserError;
use crate::users::repo::UserRecord;

/// The full field set a create or update payload must carry, extracted
/// from an untyped JSON body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserFields {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub password: String,
}

impl UserFields {
    /// Shape-check a raw payload. Strings pass through, numbers and
    /// booleans coerce to their text form; anything else is malformed.
    pub fn from_value(payload: &Value) -> Result<Self, UserError> {
        let fields = payload.as_object().ok_or_else(|| {
            UserError::MalformedInput("payload must be a JSON object".into())
        })?;

        let parsed = Self {
            first_name: text_field(fields, "first_name")?,
            last_name: text_field(fields, "last_name")?,
            email: text_field(fields, "email")?,
            password: text_field(fields, "password")?,
        };

        if parsed.first_name.is_empty() {
            return Err(UserError::MalformedInput("`first_name` must not be empty".into()));
        }
        if parsed.last_name.is_empty() {
            return Err(UserError::MalformedInput("`last_name` must not be empty".into()));
        }

        Ok(parsed)
    }
}

fn text_field(fields: &Map<String, Value>, name: &str) -> Result<String, UserError> {
    match fields.get(name) {
        None | Some(Value::Null) => Err(UserError::MalformedInput(format!(
            "missing field `{name}`"
        ))),
        Some(Value::String(s)) => Ok(s.clone()),
        Some(Value::Number(n)) => Ok(n.to_string()),
        Some(Value::Bool(b)) => Ok(b.to_string()),
        Some(_) => Err(UserError::MalformedInput(format!(
            "field `{name}` is not text"
        ))),
    }
}

/// Public part of a user record returned to the client. The password
/// never leaves the store boundary.
#[derive(Debug, Serialize)]
pub struct PublicUser {
    pub id: i64,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    #[serde(serialize_with = "date_pair")]
    pub created_at: OffsetDateTime,
    pub deleted: bool,
}

impl From<UserRecord> for PublicUser {
    fn from(record: UserRecord) -> Self {
        Self {
            id: record.id,
            first_name: record.first_name,
            last_name: record.last_name,
            email: record.email,
            created_at: record.created_at,
            deleted: record.deleted,
        }
    }
}

/// Serialize a timestamp as the wire pair `["YYYY-MM-DD", "HH:MM:SS"]`.
fn date_pair<S>(value: &OffsetDateTime, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    let date = value
        .format(format_description!("[year]-[month]-[day]"))
        .map_err(serde::ser::Error::custom)?;
    let time = value
        .format(format_description!("[hour]:[minute]:[second]"))
        .map_err(serde::ser::Error::custom)?;
    [date, time].serialize(serializer)
}

/// Confirmation returned by a soft-delete.
#[derive(Debug, Serialize)]
pub struct Deleted {
    pub id: i64,
    pub message: String,
}

/// Query parameters for the listing route.
#[derive(Debug, Deserialize)]
pub struct ListParams {
    #[serde(default)]
    pub include_deleted: bool,
}
