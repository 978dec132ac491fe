use serde::{Deserialize, Serialize};
use std::fmt;

macro_rules! string_id {
    ($name:ident) => {
        #[derive(Debug, Clone, Ord, PartialOrd, Eq, PartialEq, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub String);

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                $name(value.to_owned())
            }
        }

        impl $name {
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }
    };
}

// Backend-issued identifiers are opaque strings.
string_id!(UserId);
string_id!(ConnectionId);
string_id!(ConnectionRequestId);
string_id!(MessageId);
string_id!(SparkId);
string_id!(DeviceId);

impl DeviceId {
    pub fn new_random() -> Self {
        DeviceId(uuid::Uuid::new_v4().to_string())
    }
}
