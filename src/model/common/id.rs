use std::fmt::{Display, Formatter};
use std::{ops::Deref, str::FromStr};

use data_encoding::HEXLOWER;
use rand::Rng;
use rocket::{
    http::{
        impl_from_uri_param_identity,
        uri::fmt::{Path, UriDisplay},
    },
    request::FromParam,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Number of random bytes in a freshly generated ID.
const ID_BYTES: usize = 16;

/// Opaque identifier for stored records.
///
/// New IDs are 128 random bits rendered as lowercase hex, but any non-empty
/// string is accepted so that existing data files keep working.
#[derive(Debug, Clone, Hash, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Id(String);

impl Id {
    /// Generate a new random ID.
    #[allow(clippy::new_without_default)]
    pub fn new() -> Self {
        let bytes: [u8; ID_BYTES] = rand::thread_rng().gen();
        Self(HEXLOWER.encode(&bytes))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Deref for Id {
    type Target = str;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl Display for Id {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("IDs cannot be empty")]
pub struct EmptyIdError;

impl FromStr for Id {
    type Err = EmptyIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if trimmed.is_empty() {
            Err(EmptyIdError)
        } else {
            Ok(Self(trimmed.to_string()))
        }
    }
}

impl From<&str> for Id {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<Id> for String {
    fn from(id: Id) -> Self {
        id.0
    }
}

impl<'a> FromParam<'a> for Id {
    type Error = EmptyIdError;

    fn from_param(param: &'a str) -> Result<Self, Self::Error> {
        param.parse()
    }
}

impl UriDisplay<Path> for Id {
    fn fmt(&self, formatter: &mut rocket::http::uri::fmt::Formatter<'_, Path>) -> std::fmt::Result {
        formatter.write_value(&self.0)
    }
}

impl_from_uri_param_identity!([Path] Id);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_ids_are_unique_hex() {
        let a = Id::new();
        let b = Id::new();
        assert_ne!(a, b);
        assert_eq!(a.len(), ID_BYTES * 2);
        assert!(a.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn parse_rejects_blank() {
        assert_eq!("   ".parse::<Id>(), Err(EmptyIdError));
        assert_eq!("abc".parse::<Id>().unwrap().as_str(), "abc");
    }
}
