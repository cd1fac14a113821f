use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Errors that can occur when parsing an account key.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum AccountKeyError {
    #[error("account key must be {min}..={max} characters, got {actual}")]
    InvalidLength {
        min: usize,
        max: usize,
        actual: usize,
    },
    #[error("account key contains invalid character {0:?}")]
    InvalidCharacter(char),
}

pub const MIN_ACCOUNT_KEY_LENGTH: usize = 3;
pub const MAX_ACCOUNT_KEY_LENGTH: usize = 20;

/// Username-style account identifier, also used to index per-app state.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct AccountKey(String);

impl AccountKey {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn as_bytes(&self) -> &[u8] {
        self.0.as_bytes()
    }
}

impl FromStr for AccountKey {
    type Err = AccountKeyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if !(MIN_ACCOUNT_KEY_LENGTH..=MAX_ACCOUNT_KEY_LENGTH).contains(&s.len()) {
            return Err(AccountKeyError::InvalidLength {
                min: MIN_ACCOUNT_KEY_LENGTH,
                max: MAX_ACCOUNT_KEY_LENGTH,
                actual: s.len(),
            });
        }
        if let Some(bad) = s
            .chars()
            .find(|c| !(c.is_ascii_lowercase() || c.is_ascii_digit() || *c == '.' || *c == '-'))
        {
            return Err(AccountKeyError::InvalidCharacter(bad));
        }
        Ok(Self(s.to_string()))
    }
}

impl TryFrom<String> for AccountKey {
    type Error = AccountKeyError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<AccountKey> for String {
    fn from(key: AccountKey) -> Self {
        key.0
    }
}

impl fmt::Display for AccountKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
