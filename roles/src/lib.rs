mod cache;
mod coerce;
mod error;
mod generation;
mod location;
mod lookup;
mod member;
mod object;
mod site;
mod value;

pub use cache::{CacheLine, HandleCache};
pub use coerce::{CoercionError, MemberKey, to_member_key};
pub use error::UndefinedNameError;
pub use generation::Generation;
pub use location::SourceLocation;
pub use lookup::{LookupResult, Target, lookup_target};
pub use member::{CapabilityHandle, MemberError, Members, TargetKind};
pub use object::{Object, ObjectRef, Record, RoleSnapshot};
pub use site::{
    CACHE_LINE_LIMIT, CAPABILITY_HANDLE_LIMIT, DispatchSettings,
    MAX_CACHE_LINES, ReadRolePropertyNode, SiteTier,
};
pub use value::Value;
