use std::fmt;

use crate::{MemberKey, Value};

/// Why a target could not produce a member.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemberError {
    /// The target kind does not support member reads at all.
    Unsupported,
    /// The target supports reads but has no such member.
    NotFound,
}

impl fmt::Display for MemberError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MemberError::Unsupported => write!(f, "member reads unsupported"),
            MemberError::NotFound => write!(f, "member not found"),
        }
    }
}

impl std::error::Error for MemberError {}

/// Member access for host objects wrapped in [`Value::Foreign`].
pub trait Members: fmt::Debug + Send + Sync {
    fn has_members(&self) -> bool {
        true
    }

    fn is_member_existing(&self, key: &MemberKey) -> bool;

    fn read_member(&self, key: &MemberKey) -> Result<Value, MemberError>;
}

/// Tag selecting the capability handler for a value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TargetKind {
    Object,
    Foreign,
    Primitive,
}

impl TargetKind {
    #[inline]
    pub fn of(value: &Value) -> Self {
        match value {
            Value::Object(_) => TargetKind::Object,
            Value::Foreign(_) => TargetKind::Foreign,
            _ => TargetKind::Primitive,
        }
    }
}

trait Capability: Sync {
    fn has_members(&self, target: &Value) -> bool;
    fn has_member(&self, target: &Value, key: &MemberKey) -> bool;
    fn read_member(
        &self,
        target: &Value,
        key: &MemberKey,
    ) -> Result<Value, MemberError>;
}

struct ObjectCapability;
struct ForeignCapability;
struct PrimitiveCapability;

static OBJECT_CAPABILITY: ObjectCapability = ObjectCapability;
static FOREIGN_CAPABILITY: ForeignCapability = ForeignCapability;
static PRIMITIVE_CAPABILITY: PrimitiveCapability = PrimitiveCapability;

impl Capability for ObjectCapability {
    fn has_members(&self, target: &Value) -> bool {
        target.as_object().is_some()
    }

    fn has_member(&self, target: &Value, key: &MemberKey) -> bool {
        target.as_object().is_some_and(|object| object.contains(key))
    }

    fn read_member(
        &self,
        target: &Value,
        key: &MemberKey,
    ) -> Result<Value, MemberError> {
        let object = target.as_object().ok_or(MemberError::Unsupported)?;
        object.get(key).ok_or(MemberError::NotFound)
    }
}

impl Capability for ForeignCapability {
    fn has_members(&self, target: &Value) -> bool {
        match target {
            Value::Foreign(host) => host.has_members(),
            _ => false,
        }
    }

    fn has_member(&self, target: &Value, key: &MemberKey) -> bool {
        match target {
            Value::Foreign(host) => host.is_member_existing(key),
            _ => false,
        }
    }

    fn read_member(
        &self,
        target: &Value,
        key: &MemberKey,
    ) -> Result<Value, MemberError> {
        match target {
            Value::Foreign(host) => host.read_member(key),
            _ => Err(MemberError::Unsupported),
        }
    }
}

impl Capability for PrimitiveCapability {
    fn has_members(&self, _target: &Value) -> bool {
        false
    }

    fn has_member(&self, _target: &Value, _key: &MemberKey) -> bool {
        false
    }

    fn read_member(
        &self,
        _target: &Value,
        _key: &MemberKey,
    ) -> Result<Value, MemberError> {
        Err(MemberError::Unsupported)
    }
}

/// Capability handler bound to one target kind.
///
/// A handle is only meaningful for values it [`accepts`](Self::accepts);
/// any other value is reported as unsupported.
#[derive(Clone, Copy)]
pub struct CapabilityHandle {
    kind: TargetKind,
    ops: &'static dyn Capability,
}

impl CapabilityHandle {
    pub fn for_kind(kind: TargetKind) -> Self {
        let ops: &'static dyn Capability = match kind {
            TargetKind::Object => &OBJECT_CAPABILITY,
            TargetKind::Foreign => &FOREIGN_CAPABILITY,
            TargetKind::Primitive => &PRIMITIVE_CAPABILITY,
        };
        Self { kind, ops }
    }

    #[inline]
    pub fn of(value: &Value) -> Self {
        Self::for_kind(TargetKind::of(value))
    }

    #[inline]
    pub fn kind(&self) -> TargetKind {
        self.kind
    }

    #[inline]
    pub fn accepts(&self, value: &Value) -> bool {
        TargetKind::of(value) == self.kind
    }

    pub fn has_members(&self, target: &Value) -> bool {
        self.accepts(target) && self.ops.has_members(target)
    }

    pub fn has_member(&self, target: &Value, key: &MemberKey) -> bool {
        self.accepts(target) && self.ops.has_member(target, key)
    }

    pub fn read_member(
        &self,
        target: &Value,
        key: &MemberKey,
    ) -> Result<Value, MemberError> {
        if !self.accepts(target) {
            return Err(MemberError::Unsupported);
        }
        self.ops.read_member(target, key)
    }
}

impl fmt::Debug for CapabilityHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("CapabilityHandle").field(&self.kind).finish()
    }
}
