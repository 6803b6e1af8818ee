//! Expected access levels

use edutest_bytecode::access;
use std::fmt;
use std::ops::{BitOr, BitOrAssign};

/// A set of access levels a member may have
///
/// Sets combine with `|`: `AccessSet::PUBLIC | AccessSet::PROTECTED`
/// accepts either.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct AccessSet(u8);

const NAMES: [(AccessSet, &str); 4] = [
    (AccessSet::PUBLIC, "public"),
    (AccessSet::PROTECTED, "protected"),
    (AccessSet::PRIVATE, "private"),
    (AccessSet::PACKAGE_PRIVATE, "package_private"),
];

impl AccessSet {
    /// No access level
    pub const EMPTY: AccessSet = AccessSet(0);
    /// `public`
    pub const PUBLIC: AccessSet = AccessSet(1);
    /// `protected`
    pub const PROTECTED: AccessSet = AccessSet(1 << 1);
    /// `private`
    pub const PRIVATE: AccessSet = AccessSet(1 << 2);
    /// No visibility modifier
    pub const PACKAGE_PRIVATE: AccessSet = AccessSet(1 << 3);

    /// The access level encoded in member or class flags
    pub fn of_flags(flags: u16) -> AccessSet {
        if flags & access::PUBLIC != 0 {
            AccessSet::PUBLIC
        } else if flags & access::PROTECTED != 0 {
            AccessSet::PROTECTED
        } else if flags & access::PRIVATE != 0 {
            AccessSet::PRIVATE
        } else {
            AccessSet::PACKAGE_PRIVATE
        }
    }

    /// Whether every level in `other` is in `self`
    pub fn contains(self, other: AccessSet) -> bool {
        self.0 & other.0 == other.0
    }

    /// Whether the set is empty
    pub fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// Whether a member with `flags` has one of the levels in the set
    pub fn matches(self, flags: u16) -> bool {
        self.0 & Self::of_flags(flags).0 != 0
    }
}

impl BitOr for AccessSet {
    type Output = AccessSet;

    fn bitor(self, rhs: AccessSet) -> AccessSet {
        AccessSet(self.0 | rhs.0)
    }
}

impl BitOrAssign for AccessSet {
    fn bitor_assign(&mut self, rhs: AccessSet) {
        self.0 |= rhs.0;
    }
}

/// `"public/protected/private/package_private"`, restricted to the levels in
/// `set`; empty for the empty set
pub fn access_modifiers_to_string(set: AccessSet) -> String {
    NAMES
        .iter()
        .filter(|(level, _)| set.contains(*level))
        .map(|(_, name)| *name)
        .collect::<Vec<_>>()
        .join("/")
}

impl fmt::Display for AccessSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&access_modifiers_to_string(*self))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_modifiers_to_string() {
        assert_eq!(access_modifiers_to_string(AccessSet::EMPTY), "");
        assert_eq!(access_modifiers_to_string(AccessSet::PRIVATE), "private");
        assert_eq!(
            access_modifiers_to_string(AccessSet::PACKAGE_PRIVATE | AccessSet::PUBLIC),
            "public/package_private"
        );
        let all = AccessSet::PUBLIC
            | AccessSet::PROTECTED
            | AccessSet::PRIVATE
            | AccessSet::PACKAGE_PRIVATE;
        assert_eq!(all.to_string(), "public/protected/private/package_private");
    }

    #[test]
    fn test_matches_flags() {
        let public_or_protected = AccessSet::PUBLIC | AccessSet::PROTECTED;
        assert!(public_or_protected.matches(access::PUBLIC | access::STATIC));
        assert!(public_or_protected.matches(access::PROTECTED));
        assert!(!public_or_protected.matches(access::PRIVATE));
        assert!(!public_or_protected.matches(0));
        assert!(AccessSet::PACKAGE_PRIVATE.matches(access::STATIC | access::FINAL));
        assert!(!AccessSet::EMPTY.matches(access::PUBLIC));
    }

    #[test]
    fn test_of_flags() {
        assert_eq!(AccessSet::of_flags(access::PRIVATE), AccessSet::PRIVATE);
        assert_eq!(AccessSet::of_flags(access::ABSTRACT), AccessSet::PACKAGE_PRIVATE);
    }
}
