use crate::{
    CapabilityHandle, CoercionError, Generation, MemberKey, ObjectRef, Value,
    to_member_key,
};

/// The value chosen to satisfy a read.
#[derive(Debug, Clone)]
pub enum Target {
    /// No role claimed the member; the read goes to the receiver.
    Receiver(Value),
    /// The role at `index` (insertion order) claimed the member.
    Role { index: usize, value: Value },
}

impl Target {
    #[inline]
    pub fn value(&self) -> &Value {
        match self {
            Target::Receiver(value) => value,
            Target::Role { value, .. } => value,
        }
    }

    #[inline]
    pub fn is_receiver(&self) -> bool {
        matches!(self, Target::Receiver(_))
    }
}

/// The result of a role lookup.
#[derive(Debug, Clone)]
pub enum LookupResult {
    /// The name could not be coerced to a member key.
    Unresolved(CoercionError),
    Found {
        key: MemberKey,
        target: Target,
        /// Generation of the role snapshot that was scanned.
        generation: Generation,
    },
}

/// Resolve `name` against `receiver` and its roles.
///
/// Roles are scanned from the most recently added to the oldest; the first
/// one reporting the member wins. If none does the receiver itself is the
/// target, whether or not it has the member: absence only surfaces when the
/// target is read.
pub fn lookup_target(receiver: &ObjectRef, name: &Value) -> LookupResult {
    let key = match to_member_key(name) {
        Ok(key) => key,
        Err(err) => return LookupResult::Unresolved(err),
    };

    let snapshot = receiver.roles();
    let target = snapshot
        .roles()
        .iter()
        .enumerate()
        .rev()
        .find(|(_, role)| CapabilityHandle::of(role).has_member(role, &key))
        .map(|(index, role)| Target::Role {
            index,
            value: role.clone(),
        })
        .unwrap_or_else(|| Target::Receiver(Value::Object(receiver.clone())));

    LookupResult::Found {
        key,
        target,
        generation: snapshot.generation(),
    }
}
