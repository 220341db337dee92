use log::debug;
use smallvec::SmallVec;

use crate::{
    CapabilityHandle, Generation, MemberError, MemberKey, ObjectRef, Target,
    Value,
};

/// A memoized dispatch decision for one (receiver, name) pair.
///
/// Lines are immutable once built. A line whose generation no longer
/// matches its receiver is discarded and replaced, never patched.
#[derive(Debug)]
pub struct CacheLine {
    receiver: ObjectRef,
    name: Value,
    generation: Generation,
    key: MemberKey,
    target: Target,
    handle: CapabilityHandle,
}

impl CacheLine {
    pub fn new(
        receiver: ObjectRef,
        name: Value,
        key: MemberKey,
        target: Target,
        generation: Generation,
    ) -> Self {
        let handle = CapabilityHandle::of(target.value());
        Self {
            receiver,
            name,
            generation,
            key,
            target,
            handle,
        }
    }

    /// Same receiver and name, regardless of generation.
    #[inline]
    pub fn is_for(&self, receiver: &ObjectRef, name: &Value) -> bool {
        ObjectRef::ptr_eq(&self.receiver, receiver)
            && self.name.is_identical(name)
    }

    #[inline]
    pub fn matches(
        &self,
        receiver: &ObjectRef,
        name: &Value,
        generation: Generation,
    ) -> bool {
        self.generation == generation && self.is_for(receiver, name)
    }

    /// The receiver's role list has not changed since this line was built.
    #[inline]
    pub fn is_current(&self) -> bool {
        self.receiver.generation() == self.generation
    }

    #[inline]
    pub fn receiver(&self) -> &ObjectRef {
        &self.receiver
    }

    #[inline]
    pub fn name(&self) -> &Value {
        &self.name
    }

    #[inline]
    pub fn generation(&self) -> Generation {
        self.generation
    }

    #[inline]
    pub fn target(&self) -> &Target {
        &self.target
    }

    pub fn read(&self) -> Result<Value, MemberError> {
        self.handle.read_member(self.target.value(), &self.key)
    }
}

/// Bounded cache of capability handles, keyed by target kind only.
///
/// Once more kinds than `limit` have been seen the cache stops growing and
/// handles are selected uncached from then on.
#[derive(Debug)]
pub struct HandleCache {
    handles: SmallVec<[CapabilityHandle; 4]>,
    limit: usize,
    megamorphic: bool,
}

impl HandleCache {
    pub fn new(limit: usize) -> Self {
        Self {
            handles: SmallVec::new(),
            limit,
            megamorphic: false,
        }
    }

    pub fn handle_for(&mut self, value: &Value) -> CapabilityHandle {
        if let Some(handle) = self.handles.iter().find(|h| h.accepts(value)) {
            return *handle;
        }
        let handle = CapabilityHandle::of(value);
        if self.megamorphic {
            return handle;
        }
        if self.handles.len() < self.limit {
            self.handles.push(handle);
        } else {
            debug!(
                "capability cache megamorphic after {} kinds",
                self.handles.len()
            );
            self.megamorphic = true;
        }
        handle
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.handles.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }

    #[inline]
    pub fn is_megamorphic(&self) -> bool {
        self.megamorphic
    }
}
