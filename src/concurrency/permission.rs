//! Lock permissions.

use std::fmt;

/// Access level a transaction requests on a page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Permission {
    /// Read access; any number of transactions may share it.
    Shared,
    /// Write access; excludes every other holder.
    Exclusive,
}

impl Permission {
    /// Whether holding `self` already satisfies a request for `other`.
    #[inline]
    pub fn covers(self, other: Permission) -> bool {
        self == Permission::Exclusive || other == Permission::Shared
    }
}

impl fmt::Display for Permission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Permission::Shared => write!(f, "shared"),
            Permission::Exclusive => write!(f, "exclusive"),
        }
    }
}
