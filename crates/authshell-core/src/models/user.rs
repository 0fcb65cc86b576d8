use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Loose field bag returned by profile writes.
pub type ProfileFields = Map<String, Value>;

/// Identity record of the signed-in user.
///
/// Only `username` and `email` are required. `id` and `role` are kept as
/// whatever JSON the server sends, and every other field lands in `extra`,
/// so all of it survives persistence and merges untouched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
pub struct User {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<Value>,
    pub username: String,
    pub email: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<Value>,
    #[serde(flatten)]
    #[cfg_attr(feature = "ts", ts(skip))]
    pub extra: Map<String, Value>,
}

impl User {
    /// Overlay `fields` onto this user, key by key.
    ///
    /// Keys absent from `fields` keep their current value. On error the user
    /// is left unchanged.
    pub fn merge(&mut self, fields: &ProfileFields) -> Result<(), serde_json::Error> {
        let mut current = match serde_json::to_value(&*self)? {
            Value::Object(map) => map,
            _ => Map::new(),
        };
        for (key, value) in fields {
            current.insert(key.clone(), value.clone());
        }
        *self = serde_json::from_value(Value::Object(current))?;
        Ok(())
    }

    /// Name to greet the user with
    pub fn display_name(&self) -> &str {
        if self.username.is_empty() {
            &self.email
        } else {
            &self.username
        }
    }
}

/// Login form payload
#[derive(Debug, Clone, Serialize)]
pub struct Credentials {
    pub email: String,
    pub password: String,
}

/// Registration form payload
#[derive(Debug, Clone, Serialize)]
pub struct Registration {
    pub username: String,
    pub email: String,
    pub password: String,
}

/// Partial profile edit. Unset fields are not sent.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ProfileUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl ProfileUpdate {
    pub fn is_empty(&self) -> bool {
        self.username.is_none() && self.email.is_none() && self.extra.is_empty()
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PasswordChange {
    pub current_password: String,
    pub new_password: String,
}
