use std::sync::Arc;

use log::{debug, trace};
use parking_lot::{Mutex, RwLock};
use smallvec::SmallVec;

use crate::error::ReadFailure;
use crate::{
    CacheLine, Generation, HandleCache, LookupResult, ObjectRef, SourceLocation,
    Target, UndefinedNameError, Value, lookup_target, to_member_key,
};

/// Cache lines a call site holds before it goes generic.
pub const CACHE_LINE_LIMIT: usize = 3;
/// Capability handles cached per call site on the generic paths.
pub const CAPABILITY_HANDLE_LIMIT: usize = 3;
/// Upper bound accepted for `cache_line_limit`.
pub const MAX_CACHE_LINES: usize = 16;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DispatchSettings {
    /// Distinct (receiver, name) pairs cached before promotion to generic.
    /// Zero sends every role-bearing read straight to the generic path.
    pub cache_line_limit: usize,
    /// Target kinds whose capability handle is cached on generic paths.
    pub capability_handle_limit: usize,
}

impl Default for DispatchSettings {
    fn default() -> Self {
        Self {
            cache_line_limit: CACHE_LINE_LIMIT,
            capability_handle_limit: CAPABILITY_HANDLE_LIMIT,
        }
    }
}

impl DispatchSettings {
    pub fn validate(&self) -> Result<(), &'static str> {
        if self.cache_line_limit > MAX_CACHE_LINES {
            return Err("cache_line_limit exceeds MAX_CACHE_LINES");
        }
        Ok(())
    }
}

type CacheLines = SmallVec<[Arc<CacheLine>; CACHE_LINE_LIMIT]>;

#[derive(Debug)]
enum SiteState {
    Empty,
    Caching(CacheLines),
    Generic,
}

/// Observable dispatch tier of a call site.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SiteTier {
    Empty,
    Caching(usize),
    Generic,
}

enum Probe {
    Hit(Arc<CacheLine>),
    Miss,
    Generic,
}

/// Call site reading `receiver[name]` where the receiver may play roles.
///
/// Role-bearing receivers are served from identity-keyed cache lines until
/// more than `cache_line_limit` pairs have been seen; after that the site
/// re-resolves on every read. Receivers without roles are read directly.
#[derive(Debug)]
pub struct ReadRolePropertyNode {
    location: SourceLocation,
    settings: DispatchSettings,
    state: RwLock<SiteState>,
    target_handles: Mutex<HandleCache>,
    plain_handles: Mutex<HandleCache>,
}

impl ReadRolePropertyNode {
    pub fn new(location: SourceLocation) -> Self {
        Self::with_settings(location, DispatchSettings::default())
    }

    pub fn with_settings(
        location: SourceLocation,
        settings: DispatchSettings,
    ) -> Self {
        settings.validate().expect("Invalid Dispatch Settings");
        Self {
            location,
            settings,
            state: RwLock::new(SiteState::Empty),
            target_handles: Mutex::new(HandleCache::new(
                settings.capability_handle_limit,
            )),
            plain_handles: Mutex::new(HandleCache::new(
                settings.capability_handle_limit,
            )),
        }
    }

    #[inline]
    pub fn location(&self) -> SourceLocation {
        self.location
    }

    #[inline]
    pub fn settings(&self) -> DispatchSettings {
        self.settings
    }

    pub fn tier(&self) -> SiteTier {
        match &*self.state.read() {
            SiteState::Empty => SiteTier::Empty,
            SiteState::Caching(lines) => SiteTier::Caching(lines.len()),
            SiteState::Generic => SiteTier::Generic,
        }
    }

    pub fn cached_lines(&self) -> usize {
        match &*self.state.read() {
            SiteState::Caching(lines) => lines.len(),
            _ => 0,
        }
    }

    /// Read `name` from `receiver`.
    pub fn execute(
        &self,
        receiver: &Value,
        name: &Value,
    ) -> Result<Value, UndefinedNameError> {
        match receiver {
            Value::Object(object) => self.read_role_bearing(object, name),
            other => self.read_plain(other, name),
        }
    }

    fn read_role_bearing(
        &self,
        receiver: &ObjectRef,
        name: &Value,
    ) -> Result<Value, UndefinedNameError> {
        let generation = receiver.generation();
        match self.probe(receiver, name, generation) {
            Probe::Hit(line) => {
                trace!("{}: cache hit for {:?}", self.location, name);
                line.read().map_err(|err| self.undefined(name, err.into()))
            }
            Probe::Miss => self.read_and_cache(receiver, name),
            Probe::Generic => self.read_uncached(receiver, name),
        }
    }

    fn probe(
        &self,
        receiver: &ObjectRef,
        name: &Value,
        generation: Generation,
    ) -> Probe {
        match &*self.state.read() {
            SiteState::Empty => Probe::Miss,
            SiteState::Caching(lines) => lines
                .iter()
                .find(|line| line.matches(receiver, name, generation))
                .map_or(Probe::Miss, |line| Probe::Hit(line.clone())),
            SiteState::Generic => Probe::Generic,
        }
    }

    fn read_and_cache(
        &self,
        receiver: &ObjectRef,
        name: &Value,
    ) -> Result<Value, UndefinedNameError> {
        trace!("{}: cache miss for {:?}", self.location, name);
        let (key, target, generation) = match lookup_target(receiver, name) {
            LookupResult::Unresolved(err) => {
                return Err(self.undefined(name, err.into()));
            }
            LookupResult::Found {
                key,
                target,
                generation,
            } => (key, target, generation),
        };
        match &target {
            Target::Role { index, .. } => {
                trace!("{}: {key} resolved to role #{index}", self.location)
            }
            Target::Receiver(_) => {
                trace!("{}: {key} resolved to receiver", self.location)
            }
        }
        let line = Arc::new(CacheLine::new(
            receiver.clone(),
            name.clone(),
            key,
            target,
            generation,
        ));
        self.install(line.clone());
        line.read().map_err(|err| self.undefined(name, err.into()))
    }

    fn install(&self, line: Arc<CacheLine>) {
        let limit = self.settings.cache_line_limit;
        let mut state = self.state.write();
        let next = match &mut *state {
            SiteState::Generic => None,
            SiteState::Empty if limit == 0 => Some(SiteState::Generic),
            SiteState::Empty => {
                let mut lines = CacheLines::new();
                lines.push(line);
                Some(SiteState::Caching(lines))
            }
            SiteState::Caching(lines) => {
                let cached = lines.len();
                lines.retain(|l| l.is_current());
                if lines.len() < cached {
                    debug!(
                        "{}: dropped {} invalidated lines",
                        self.location,
                        cached - lines.len()
                    );
                }
                let current = lines
                    .iter()
                    .any(|l| l.is_for(line.receiver(), line.name()));
                if current {
                    // a racing reader already installed a valid line
                    None
                } else if lines.len() >= limit {
                    Some(SiteState::Generic)
                } else {
                    lines.push(line);
                    None
                }
            }
        };
        if let Some(next) = next {
            if matches!(next, SiteState::Generic) {
                debug!(
                    "{}: promoted to generic after {} cache lines",
                    self.location, limit
                );
            }
            *state = next;
        }
    }

    fn read_uncached(
        &self,
        receiver: &ObjectRef,
        name: &Value,
    ) -> Result<Value, UndefinedNameError> {
        match lookup_target(receiver, name) {
            LookupResult::Unresolved(err) => Err(self.undefined(name, err.into())),
            LookupResult::Found { key, target, .. } => {
                let handle = self.target_handles.lock().handle_for(target.value());
                handle
                    .read_member(target.value(), &key)
                    .map_err(|err| self.undefined(name, err.into()))
            }
        }
    }

    fn read_plain(
        &self,
        receiver: &Value,
        name: &Value,
    ) -> Result<Value, UndefinedNameError> {
        let handle = self.plain_handles.lock().handle_for(receiver);
        if !handle.has_members(receiver) {
            return Err(self.undefined(name, ReadFailure::NoMembers));
        }
        let key =
            to_member_key(name).map_err(|err| self.undefined(name, err.into()))?;
        handle
            .read_member(receiver, &key)
            .map_err(|err| self.undefined(name, err.into()))
    }

    fn undefined(&self, name: &Value, cause: ReadFailure) -> UndefinedNameError {
        trace!("{}: undefined property {:?}: {}", self.location, name, cause);
        UndefinedNameError::new(name.clone(), self.location)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{MemberError, MemberKey, Members, Object, Record};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::thread;

    fn site() -> ReadRolePropertyNode {
        ReadRolePropertyNode::new(SourceLocation::new(2, 5))
    }

    fn role(name: &str, value: i64) -> Value {
        Value::from(Object::with_members([(name, Value::Int(value))]))
    }

    /// Host object whose reads always fail as unsupported.
    #[derive(Debug)]
    struct WriteOnly;

    impl Members for WriteOnly {
        fn is_member_existing(&self, _key: &MemberKey) -> bool {
            true
        }

        fn read_member(&self, _key: &MemberKey) -> Result<Value, MemberError> {
            Err(MemberError::Unsupported)
        }
    }

    /// Host object that exposes no members at all.
    #[derive(Debug)]
    struct Opaque;

    impl Members for Opaque {
        fn has_members(&self) -> bool {
            false
        }

        fn is_member_existing(&self, _key: &MemberKey) -> bool {
            true
        }

        fn read_member(&self, _key: &MemberKey) -> Result<Value, MemberError> {
            Ok(Value::Nil)
        }
    }

    /// Host object that counts existence checks.
    #[derive(Debug, Default)]
    struct Counting {
        checks: AtomicUsize,
    }

    impl Members for Counting {
        fn is_member_existing(&self, _key: &MemberKey) -> bool {
            self.checks.fetch_add(1, Ordering::Relaxed);
            false
        }

        fn read_member(&self, _key: &MemberKey) -> Result<Value, MemberError> {
            Err(MemberError::NotFound)
        }
    }

    #[test]
    fn most_recent_role_wins() {
        let receiver = Object::new();
        receiver.add_role(role("x", 1));
        receiver.add_role(role("x", 2));

        let site = site();
        let value = site.execute(&receiver.into(), &"x".into());
        assert_eq!(value.expect("x is defined"), Value::Int(2));
    }

    #[test]
    fn removing_shadowing_role_exposes_older_one() {
        let receiver = Object::new();
        let b = role("x", 2);
        receiver.add_role(role("x", 1));
        receiver.add_role(b.clone());

        let site = site();
        let recv = Value::from(receiver.clone());
        assert_eq!(site.execute(&recv, &"x".into()).ok(), Some(Value::Int(2)));

        assert!(receiver.remove_role(&b));
        assert_eq!(site.execute(&recv, &"x".into()).ok(), Some(Value::Int(1)));
        assert_eq!(site.tier(), SiteTier::Caching(1), "stale line replaced");
    }

    #[test]
    fn receiver_members_without_roles() {
        let receiver = Value::from(Object::with_members([("y", Value::Int(5))]));
        let site = site();

        assert_eq!(site.execute(&receiver, &"y".into()).ok(), Some(Value::Int(5)));

        let err = site
            .execute(&receiver, &"z".into())
            .expect_err("z is undefined");
        assert_eq!(err.name, Value::str("z"));
        assert_eq!(err.location, site.location());
    }

    #[test]
    fn uncoercible_name_reports_original_value() {
        let receiver = Value::from(Object::with_members([("y", Value::Int(5))]));
        let name = Value::from(Object::new());
        let site = site();

        let err = site.execute(&receiver, &name).expect_err("not a key");
        assert_eq!(err.name, name);
        assert_eq!(site.tier(), SiteTier::Empty, "nothing cached");
    }

    #[test]
    fn unreadable_role_is_undefined() {
        let receiver = Object::with_members([("x", Value::Int(1))]);
        receiver.add_role(Value::foreign(WriteOnly));

        let err = site()
            .execute(&receiver.into(), &"x".into())
            .expect_err("role claims x but cannot read it");
        assert_eq!(err.name, Value::str("x"));
    }

    #[test]
    fn repeated_reads_hit_without_mutating_receiver() {
        let counting = Arc::new(Counting::default());
        let receiver = Object::with_members([("x", Value::Int(7))]);
        receiver.add_role(Value::Foreign(counting.clone()));
        let generation = receiver.generation();

        let site = site();
        let recv = Value::from(receiver.clone());
        for _ in 0..5 {
            assert_eq!(site.execute(&recv, &"x".into()).ok(), Some(Value::Int(7)));
        }

        assert_eq!(counting.checks.load(Ordering::Relaxed), 1, "one lookup");
        assert_eq!(receiver.generation(), generation);
        assert_eq!(receiver.roles().len(), 1);
        assert_eq!(site.tier(), SiteTier::Caching(1));
    }

    #[test]
    fn new_role_invalidates_cached_target() {
        let receiver = Object::with_members([("x", Value::Int(0))]);
        let recv = Value::from(receiver.clone());
        let site = site();

        assert_eq!(site.execute(&recv, &"x".into()).ok(), Some(Value::Int(0)));
        receiver.add_role(role("x", 42));
        assert_eq!(site.execute(&recv, &"x".into()).ok(), Some(Value::Int(42)));
    }

    #[test]
    fn invalidation_reaches_every_call_site() {
        let receiver = Object::new();
        receiver.add_role(role("x", 1));
        let recv = Value::from(receiver.clone());
        let sites = [site(), site(), site()];

        for site in &sites {
            assert_eq!(site.execute(&recv, &"x".into()).ok(), Some(Value::Int(1)));
        }
        receiver.add_role(role("x", 2));
        for site in &sites {
            assert_eq!(site.execute(&recv, &"x".into()).ok(), Some(Value::Int(2)));
        }
    }

    #[test]
    fn invalidated_lines_free_their_slot() {
        let site = site();
        let receivers: Vec<_> = (0..CACHE_LINE_LIMIT as i64 + 1)
            .map(|i| {
                let receiver = Object::new();
                receiver.add_role(role("x", i));
                receiver
            })
            .collect();

        for receiver in &receivers[..CACHE_LINE_LIMIT] {
            site.execute(&receiver.clone().into(), &"x".into())
                .expect("x is defined");
        }
        assert_eq!(site.tier(), SiteTier::Caching(CACHE_LINE_LIMIT));

        receivers[0].add_role(Value::Nil);
        let last = &receivers[CACHE_LINE_LIMIT];
        let value = site.execute(&last.clone().into(), &"x".into());
        assert_eq!(value.ok(), Some(Value::Int(CACHE_LINE_LIMIT as i64)));
        assert_eq!(
            site.tier(),
            SiteTier::Caching(CACHE_LINE_LIMIT),
            "stale line dropped instead of promoting"
        );

        let value = site.execute(&receivers[0].clone().into(), &"x".into());
        assert_eq!(value.ok(), Some(Value::Int(0)));
        assert_eq!(site.tier(), SiteTier::Generic);
    }

    #[test]
    fn promotes_to_generic_past_limit() {
        let site = site();
        let receivers: Vec<_> = (0..CACHE_LINE_LIMIT as i64 + 2)
            .map(|i| {
                let receiver = Object::new();
                receiver.add_role(role("x", i));
                receiver
            })
            .collect();

        for (i, receiver) in receivers.iter().enumerate() {
            let value = site.execute(&receiver.clone().into(), &"x".into());
            assert_eq!(value.ok(), Some(Value::Int(i as i64)));
            if i < CACHE_LINE_LIMIT {
                assert_eq!(site.tier(), SiteTier::Caching(i + 1));
            }
        }
        assert_eq!(site.tier(), SiteTier::Generic);
        assert_eq!(site.cached_lines(), 0);

        // old and new pairs agree with the uncached computation
        for (i, receiver) in receivers.iter().enumerate() {
            let value = site.execute(&receiver.clone().into(), &"x".into());
            assert_eq!(value.ok(), Some(Value::Int(i as i64)));
        }
        receivers[0].add_role(role("x", 100));
        let value = site.execute(&receivers[0].clone().into(), &"x".into());
        assert_eq!(value.ok(), Some(Value::Int(100)));
        assert_eq!(site.tier(), SiteTier::Generic, "promotion is permanent");
    }

    #[test]
    fn distinct_names_take_separate_lines() {
        let receiver = Object::with_members([
            ("a", Value::Int(1)),
            ("b", Value::Int(2)),
        ]);
        let recv = Value::from(receiver);
        let site = site();

        assert_eq!(site.execute(&recv, &"a".into()).ok(), Some(Value::Int(1)));
        assert_eq!(site.execute(&recv, &"b".into()).ok(), Some(Value::Int(2)));
        assert_eq!(site.tier(), SiteTier::Caching(2));
    }

    #[test]
    fn zero_limit_goes_generic_immediately() {
        let site = ReadRolePropertyNode::with_settings(
            SourceLocation::synthetic(),
            DispatchSettings {
                cache_line_limit: 0,
                ..Default::default()
            },
        );
        let receiver = Value::from(Object::with_members([("x", Value::Int(3))]));

        assert_eq!(site.execute(&receiver, &"x".into()).ok(), Some(Value::Int(3)));
        assert_eq!(site.tier(), SiteTier::Generic);
        assert_eq!(site.execute(&receiver, &"x".into()).ok(), Some(Value::Int(3)));
    }

    #[test]
    fn generic_path_reports_undefined_names() {
        let site = ReadRolePropertyNode::with_settings(
            SourceLocation::synthetic(),
            DispatchSettings {
                cache_line_limit: 0,
                capability_handle_limit: 1,
            },
        );
        let receiver = Object::new();
        receiver.add_role(Value::foreign(WriteOnly));
        let recv = Value::from(receiver);

        let err = site.execute(&recv, &"x".into()).expect_err("unreadable");
        assert_eq!(err.name, Value::str("x"));
        let err = site.execute(&recv, &Value::Nil).expect_err("not a key");
        assert_eq!(err.name, Value::Nil);
    }

    #[test]
    fn plain_receivers_bypass_role_machinery() {
        let record = Value::foreign(Record::new([("k", Value::str("v"))]));
        let site = site();

        assert_eq!(site.execute(&record, &"k".into()).ok(), Some(Value::str("v")));
        assert_eq!(site.tier(), SiteTier::Empty, "no cache lines for plain");
        let err = site.execute(&record, &"q".into()).expect_err("missing");
        assert_eq!(err.name, Value::str("q"));
    }

    #[test]
    fn receivers_without_members_are_undefined() {
        let site = site();
        for receiver in [Value::Nil, Value::Int(1), Value::str("s")] {
            let err = site
                .execute(&receiver, &"len".into())
                .expect_err("scalars have no members");
            assert_eq!(err.name, Value::str("len"));
        }
    }

    #[test]
    fn host_without_members_is_undefined() {
        let host = Value::foreign(Opaque);
        let site = site();

        let err = site.execute(&host, &"x".into()).expect_err("no members");
        assert_eq!(err.name, Value::str("x"));
        assert_eq!(err.location, site.location());
        assert_eq!(site.tier(), SiteTier::Empty);
    }

    #[test]
    fn integer_names_are_coerced() {
        let receiver = Value::from(Object::with_members([("0", Value::Bool(true))]));
        let site = site();

        assert_eq!(site.execute(&receiver, &Value::Int(0)).ok(), Some(Value::Bool(true)));
        let err = site.execute(&receiver, &Value::Int(1)).expect_err("missing");
        assert_eq!(err.name, Value::Int(1), "name is reported uncoerced");
    }

    #[test]
    #[should_panic(expected = "Invalid Dispatch Settings")]
    fn oversized_cache_is_rejected() {
        ReadRolePropertyNode::with_settings(
            SourceLocation::synthetic(),
            DispatchSettings {
                cache_line_limit: MAX_CACHE_LINES + 1,
                ..Default::default()
            },
        );
    }

    #[test]
    fn concurrent_readers_agree_and_respect_limit() {
        let site = Arc::new(site());
        let receivers: Arc<Vec<_>> = Arc::new(
            (0..8)
                .map(|i| {
                    let receiver = Object::new();
                    receiver.add_role(role("x", i));
                    receiver
                })
                .collect(),
        );

        let handles: Vec<_> = (0..4)
            .map(|t| {
                let site = site.clone();
                let receivers = receivers.clone();
                thread::spawn(move || {
                    for round in 0..200 {
                        let i = (round + t) % receivers.len();
                        let recv = Value::from(receivers[i].clone());
                        let value = site.execute(&recv, &"x".into());
                        assert_eq!(value.ok(), Some(Value::Int(i as i64)));
                        assert!(site.cached_lines() <= CACHE_LINE_LIMIT);
                    }
                })
            })
            .collect();

        for handle in handles {
            handle.join().expect("reader panicked");
        }
        assert_eq!(site.tier(), SiteTier::Generic);
    }
}
