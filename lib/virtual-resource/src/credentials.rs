//! Credential bundle handed to providers when a session logs in.

use std::fmt;

use serde_json::Value;

use crate::resource::ValueMap;

/// Attribute name under which the user id is exposed.
pub const USER_ATTRIBUTE: &str = "user.name";

/// Attribute name of the password; always hidden from attribute lookups.
pub const PASSWORD_ATTRIBUTE: &str = "user.password";

#[derive(Clone, Default)]
pub struct Credentials {
    user: Option<String>,
    password: Option<String>,
    attributes: ValueMap,
}

impl Credentials {
    /// Credentials of an anonymous session.
    pub fn anonymous() -> Self {
        Self::default()
    }

    pub fn user(user: impl Into<String>, password: impl Into<String>) -> Self {
        let user = user.into();
        let mut attributes = ValueMap::new();
        attributes.insert(USER_ATTRIBUTE.to_string(), Value::from(user.clone()));
        Self {
            user: Some(user),
            password: Some(password.into()),
            attributes,
        }
    }

    pub fn with_attribute(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.attributes.insert(name.into(), value.into());
        self
    }

    pub fn user_id(&self) -> Option<&str> {
        self.user.as_deref()
    }

    pub fn password(&self) -> Option<&str> {
        self.password.as_deref()
    }

    pub fn attribute(&self, name: &str) -> Option<&Value> {
        self.attributes.get(name)
    }

    pub fn attribute_names(&self) -> impl Iterator<Item = &str> {
        self.attributes.keys().map(String::as_str)
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("user", &self.user)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .field("attributes", &self.attributes.keys().collect::<Vec<_>>())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn debug_never_prints_password() {
        let creds = Credentials::user("admin", "s3cret");
        let printed = format!("{creds:?}");
        assert!(printed.contains("admin"));
        assert!(!printed.contains("s3cret"));
    }

    #[test]
    fn user_id_is_exposed_as_attribute() {
        let creds = Credentials::user("alice", "pw").with_attribute("tenant", "acme");
        assert_eq!(creds.attribute(USER_ATTRIBUTE), Some(&Value::from("alice")));
        let names: Vec<&str> = creds.attribute_names().collect();
        assert_eq!(names, vec!["tenant", USER_ATTRIBUTE]);
    }
}
