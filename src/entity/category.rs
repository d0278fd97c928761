//! Entity classification: category, role bitmask, symbol-map groups.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::BitOr;

/// What kind of declaration an entity is.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Category {
    Namespace,
    Use,
    Struct,
    Interface,
    Component,
    Composition,
    Method,
    Using,
    Enum,
    Expression,
    Builtin,
    Extern,
    Reference,
}

impl Category {
    pub fn as_str(self) -> &'static str {
        match self {
            Category::Namespace => "namespace",
            Category::Use => "use",
            Category::Struct => "struct",
            Category::Interface => "interface",
            Category::Component => "component",
            Category::Composition => "composition",
            Category::Method => "method",
            Category::Using => "using",
            Category::Enum => "enum",
            Category::Expression => "expression",
            Category::Builtin => "builtin",
            Category::Extern => "extern",
            Category::Reference => "reference",
        }
    }

    /// Whether instances of this category may appear in inheritance lists.
    pub fn is_inheritable(self) -> bool {
        matches!(
            self,
            Category::Struct | Category::Interface | Category::Component | Category::Builtin
        )
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Bitmask describing which of the value/type/meta roles an entity plays.
///
/// Most entities carry exactly one role; `using` aliases of meta types and
/// builtin meta operations combine them.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Role(u8);

impl Role {
    pub const NONE: Role = Role(0);
    /// The entity denotes a runtime value (expressions).
    pub const VALUE: Role = Role(1 << 0);
    /// The entity denotes a type (structs, interfaces, components, aliases).
    pub const TYPE: Role = Role(1 << 1);
    /// The entity steers compilation and leaves no runtime trace.
    pub const META: Role = Role(1 << 2);

    pub const fn contains(self, other: Role) -> bool {
        self.0 & other.0 == other.0
    }

    pub const fn intersects(self, other: Role) -> bool {
        self.0 & other.0 != 0
    }

    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }
}

impl BitOr for Role {
    type Output = Role;

    fn bitor(self, rhs: Role) -> Role {
        Role(self.0 | rhs.0)
    }
}

impl fmt::Debug for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut parts = Vec::new();
        if self.contains(Role::VALUE) {
            parts.push("value");
        }
        if self.contains(Role::TYPE) {
            parts.push("type");
        }
        if self.contains(Role::META) {
            parts.push("meta");
        }
        write!(f, "Role({})", parts.join("|"))
    }
}

/// Bitmask recording which symbol-map groups an entry belongs to.
///
/// Groups drive resolver exclusion (config lookups must not see composition
/// entries), anonymous FQN synthesis (composition entries get globally
/// unique names), and the view layer's interface id table.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Group(u8);

impl Group {
    pub const NONE: Group = Group(0);
    /// Top-level declarations of a unit.
    pub const GLOBAL: Group = Group(1 << 0);
    /// Members of a `config` body.
    pub const CONFIG: Group = Group(1 << 1);
    /// Members of an `interface` body.
    pub const INTERFACE: Group = Group(1 << 2);
    /// Members of a `composition` body (and top-level composition entries).
    pub const COMPOSITION: Group = Group(1 << 3);
    /// Pre-registered builtins.
    pub const BUILTIN: Group = Group(1 << 4);

    pub const fn contains(self, other: Group) -> bool {
        self.0 & other.0 == other.0
    }

    pub const fn intersects(self, other: Group) -> bool {
        self.0 & other.0 != 0
    }
}

impl BitOr for Group {
    type Output = Group;

    fn bitor(self, rhs: Group) -> Group {
        Group(self.0 | rhs.0)
    }
}

impl fmt::Debug for Group {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut parts = Vec::new();
        for (mask, name) in [
            (Group::GLOBAL, "global"),
            (Group::CONFIG, "config"),
            (Group::INTERFACE, "interface"),
            (Group::COMPOSITION, "composition"),
            (Group::BUILTIN, "builtin"),
        ] {
            if self.contains(mask) {
                parts.push(name);
            }
        }
        write!(f, "Group({})", parts.join("|"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_combination() {
        let role = Role::TYPE | Role::META;
        assert!(role.contains(Role::TYPE));
        assert!(role.contains(Role::META));
        assert!(!role.contains(Role::VALUE));
        assert!(role.intersects(Role::META));
    }

    #[test]
    fn test_group_exclusion_check() {
        let group = Group::GLOBAL | Group::COMPOSITION;
        assert!(group.intersects(Group::COMPOSITION));
        assert!(!group.intersects(Group::CONFIG));
    }

    #[test]
    fn test_inheritable_categories() {
        assert!(Category::Interface.is_inheritable());
        assert!(Category::Struct.is_inheritable());
        assert!(!Category::Composition.is_inheritable());
        assert!(!Category::Expression.is_inheritable());
    }
}
