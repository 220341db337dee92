use std::{borrow::Borrow, fmt, sync::Arc};

use crate::Value;

/// Canonical member name, produced by [`to_member_key`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MemberKey(Arc<str>);

impl MemberKey {
    pub fn new(name: &str) -> Self {
        Self(Arc::from(name))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Borrow<str> for MemberKey {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl From<&str> for MemberKey {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

impl From<String> for MemberKey {
    fn from(name: String) -> Self {
        Self(Arc::from(name))
    }
}

impl fmt::Display for MemberKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// The value cannot denote a member name.
#[derive(Debug, Clone)]
pub struct CoercionError {
    pub value: Value,
}

impl fmt::Display for CoercionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?} cannot be used as a member name", self.value)
    }
}

impl std::error::Error for CoercionError {}

/// Convert a dynamic name to its canonical key.
///
/// Strings are used as is, booleans and integers by their textual spelling.
pub fn to_member_key(name: &Value) -> Result<MemberKey, CoercionError> {
    match name {
        Value::Str(name) => Ok(MemberKey(name.clone())),
        Value::Bool(value) => Ok(MemberKey::new(if *value {
            "true"
        } else {
            "false"
        })),
        Value::Int(value) => Ok(MemberKey::from(value.to_string())),
        other => Err(CoercionError {
            value: other.clone(),
        }),
    }
}
