use std::fmt;

use crate::{CoercionError, MemberError, SourceLocation, Value};

/// A property read that could not be satisfied.
///
/// Carries the name exactly as it was supplied, before coercion, and the
/// location of the call site that attempted the read.
#[derive(Debug, Clone)]
pub struct UndefinedNameError {
    pub name: Value,
    pub location: SourceLocation,
}

impl UndefinedNameError {
    pub fn new(name: Value, location: SourceLocation) -> Self {
        Self { name, location }
    }
}

impl fmt::Display for UndefinedNameError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Undefined property: {} at {}", self.name, self.location)
    }
}

impl std::error::Error for UndefinedNameError {}

/// Internal cause behind an [`UndefinedNameError`]; only ever logged.
#[derive(Debug)]
pub(crate) enum ReadFailure {
    Coercion(CoercionError),
    Member(MemberError),
    NoMembers,
}

impl From<CoercionError> for ReadFailure {
    fn from(err: CoercionError) -> Self {
        ReadFailure::Coercion(err)
    }
}

impl From<MemberError> for ReadFailure {
    fn from(err: MemberError) -> Self {
        ReadFailure::Member(err)
    }
}

impl fmt::Display for ReadFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReadFailure::Coercion(err) => write!(f, "{err}"),
            ReadFailure::Member(err) => write!(f, "{err}"),
            ReadFailure::NoMembers => write!(f, "receiver has no members"),
        }
    }
}
