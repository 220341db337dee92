use std::{collections::HashMap, fmt, sync::Arc};

use log::debug;
use parking_lot::RwLock;

use crate::{Generation, MemberError, MemberKey, Members, Value};

pub type ObjectRef = Arc<Object>;

/// Roles of a receiver together with the generation they were published
/// under. A snapshot is immutable; mutations publish a new one.
#[derive(Debug)]
pub struct RoleSnapshot {
    roles: Vec<Value>,
    generation: Generation,
}

impl RoleSnapshot {
    fn empty() -> Self {
        Self {
            roles: Vec::new(),
            generation: Generation::fresh(),
        }
    }

    /// Roles in insertion order.
    #[inline]
    pub fn roles(&self) -> &[Value] {
        &self.roles
    }

    #[inline]
    pub fn generation(&self) -> Generation {
        self.generation
    }

    #[inline]
    pub(crate) fn len(&self) -> usize {
        self.roles.len()
    }
}

/// A receiver that can play roles.
///
/// Own members live in a plain table. Roles are kept as a published
/// [`RoleSnapshot`]; the role list and its generation are always swapped
/// together so readers never pair a new list with an old generation.
pub struct Object {
    members: RwLock<HashMap<MemberKey, Value>>,
    roles: RwLock<Arc<RoleSnapshot>>,
}

impl Object {
    pub fn new() -> ObjectRef {
        Arc::new(Self {
            members: RwLock::new(HashMap::new()),
            roles: RwLock::new(Arc::new(RoleSnapshot::empty())),
        })
    }

    pub fn with_members<K: Into<MemberKey>>(
        members: impl IntoIterator<Item = (K, Value)>,
    ) -> ObjectRef {
        let object = Self::new();
        for (key, value) in members {
            object.define(key, value);
        }
        object
    }

    /// Define or overwrite an own member. Does not touch the generation.
    pub fn define(&self, key: impl Into<MemberKey>, value: Value) {
        self.members.write().insert(key.into(), value);
    }

    pub fn get(&self, key: &MemberKey) -> Option<Value> {
        self.members.read().get(key).cloned()
    }

    pub fn contains(&self, key: &MemberKey) -> bool {
        self.members.read().contains_key(key)
    }

    #[inline]
    pub fn roles(&self) -> Arc<RoleSnapshot> {
        self.roles.read().clone()
    }

    #[inline]
    pub fn generation(&self) -> Generation {
        self.roles.read().generation
    }

    pub fn add_role(&self, role: Value) {
        let mut current = self.roles.write();
        let mut roles = current.roles.clone();
        roles.push(role);
        let next = RoleSnapshot {
            roles,
            generation: Generation::fresh(),
        };
        debug!(
            "role added: {} -> {} ({} roles)",
            current.generation,
            next.generation,
            next.len()
        );
        *current = Arc::new(next);
    }

    /// Remove the most recently added role identical to `role`.
    ///
    /// Returns `false` and keeps the generation if no such role exists.
    pub fn remove_role(&self, role: &Value) -> bool {
        let mut current = self.roles.write();
        let Some(index) = current.roles.iter().rposition(|r| r.is_identical(role))
        else {
            return false;
        };
        let mut roles = current.roles.clone();
        roles.remove(index);
        let next = RoleSnapshot {
            roles,
            generation: Generation::fresh(),
        };
        debug!(
            "role removed: {} -> {} ({} roles)",
            current.generation,
            next.generation,
            next.len()
        );
        *current = Arc::new(next);
        true
    }
}

impl fmt::Debug for Object {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let roles = self.roles();
        f.debug_struct("Object")
            .field("members", &self.members.read().len())
            .field("roles", &roles.len())
            .field("generation", &roles.generation)
            .finish()
    }
}

/// A plain host record: members, but no role composition.
#[derive(Debug, Default)]
pub struct Record {
    members: HashMap<MemberKey, Value>,
}

impl Record {
    pub fn new<K: Into<MemberKey>>(
        members: impl IntoIterator<Item = (K, Value)>,
    ) -> Self {
        Self {
            members: members
                .into_iter()
                .map(|(key, value)| (key.into(), value))
                .collect(),
        }
    }
}

impl Members for Record {
    fn is_member_existing(&self, key: &MemberKey) -> bool {
        self.members.contains_key(key)
    }

    fn read_member(&self, key: &MemberKey) -> Result<Value, MemberError> {
        self.members.get(key).cloned().ok_or(MemberError::NotFound)
    }
}
