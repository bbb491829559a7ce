//! Relationship metadata.
//!
//! Relationships are declared as static metadata on each `Model` through the
//! const builder on [`RelationshipInfo`]. The cascade engine resolves them
//! into descriptors (key placement, inverse, flags) the first time a type is
//! used; nothing here touches the store.

use crate::model::ModelInfo;
use std::fmt;
use std::ops::{BitOr, BitOrAssign};

/// The type of relationship between two models.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum RelationshipKind {
    /// One-to-one: `Student` has one `Passport`.
    OneToOne,
    /// Many-to-one: many `Order`s belong to one `Customer`.
    #[default]
    ManyToOne,
    /// One-to-many: one `Customer` has many `Order`s.
    OneToMany,
    /// Many-to-many: `Student`s attend many `Course`s via a junction table.
    ManyToMany,
}

impl RelationshipKind {
    /// Whether the relationship holds at most one related instance.
    pub const fn is_single_valued(self) -> bool {
        matches!(self, RelationshipKind::OneToOne | RelationshipKind::ManyToOne)
    }

    /// The kind an inverse relationship must have.
    pub const fn inverse_kind(self) -> RelationshipKind {
        match self {
            RelationshipKind::OneToOne => RelationshipKind::OneToOne,
            RelationshipKind::ManyToOne => RelationshipKind::OneToMany,
            RelationshipKind::OneToMany => RelationshipKind::ManyToOne,
            RelationshipKind::ManyToMany => RelationshipKind::ManyToMany,
        }
    }
}

/// The cascade phases a relationship takes part in.
///
/// A small bit set over `INSERT`, `READ` and `DELETE`. Unknown bits cannot
/// be constructed through the public API.
#[derive(Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct CascadeOps(u8);

impl CascadeOps {
    /// No cascading.
    pub const NONE: CascadeOps = CascadeOps(0);
    /// Insert, insert-or-replace and update traverse the relationship.
    pub const INSERT: CascadeOps = CascadeOps(0b001);
    /// Recursive reads traverse the relationship.
    pub const READ: CascadeOps = CascadeOps(0b010);
    /// Recursive deletes traverse the relationship.
    pub const DELETE: CascadeOps = CascadeOps(0b100);
    /// Every cascade phase.
    pub const ALL: CascadeOps = CascadeOps(0b111);

    /// Build from raw bits, rejecting bits outside `ALL`.
    pub const fn from_bits(bits: u8) -> Option<CascadeOps> {
        if bits & !Self::ALL.0 == 0 {
            Some(CascadeOps(bits))
        } else {
            None
        }
    }

    /// Raw bits.
    pub const fn bits(self) -> u8 {
        self.0
    }

    /// Const-friendly union.
    #[must_use]
    pub const fn union(self, other: CascadeOps) -> CascadeOps {
        CascadeOps(self.0 | other.0)
    }

    /// Whether every phase in `other` is enabled.
    pub const fn contains(self, other: CascadeOps) -> bool {
        self.0 & other.0 == other.0
    }

    /// Whether no phase is enabled.
    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }
}

impl BitOr for CascadeOps {
    type Output = CascadeOps;

    fn bitor(self, rhs: CascadeOps) -> CascadeOps {
        self.union(rhs)
    }
}

impl BitOrAssign for CascadeOps {
    fn bitor_assign(&mut self, rhs: CascadeOps) {
        *self = self.union(rhs);
    }
}

impl fmt::Debug for CascadeOps {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_empty() {
            return f.write_str("NONE");
        }
        let names = [
            (CascadeOps::INSERT, "INSERT"),
            (CascadeOps::READ, "READ"),
            (CascadeOps::DELETE, "DELETE"),
        ];
        let parts: Vec<&str> = names
            .iter()
            .filter(|(op, _)| self.contains(*op))
            .map(|(_, name)| *name)
            .collect();
        f.write_str(&parts.join(" | "))
    }
}

/// How the reciprocal relationship on the target type is found.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Inverse {
    /// Look for the single relationship on the target pointing back at this
    /// type with a compatible kind.
    #[default]
    Auto,
    /// The named relationship field on the target.
    Field(&'static str),
    /// The relationship has no inverse.
    Disabled,
}

/// A relationship declared on a model.
#[derive(Debug, Clone, Copy)]
pub struct RelationshipInfo {
    /// Name of the relationship field.
    pub name: &'static str,

    /// Kind of relationship.
    pub kind: RelationshipKind,

    /// Explicit foreign-key column.
    ///
    /// ManyToOne: on this model. OneToMany: on the target. OneToOne: on
    /// either side, this model checked first. ManyToMany: the junction column
    /// pointing at this model.
    pub foreign_key: Option<&'static str>,

    /// Junction column pointing at the target (ManyToMany only).
    pub inverse_foreign_key: Option<&'static str>,

    /// The reciprocal relationship on the target.
    pub inverse: Inverse,

    /// Cascade phases that traverse this relationship.
    pub cascade: CascadeOps,

    /// Populated on reads, never written from this side.
    pub read_only: bool,

    target_fn: fn() -> ModelInfo,
    through_fn: Option<fn() -> ModelInfo>,
}

impl RelationshipInfo {
    /// Create a new relationship with required fields.
    #[must_use]
    pub const fn new(
        name: &'static str,
        target: fn() -> ModelInfo,
        kind: RelationshipKind,
    ) -> Self {
        Self {
            name,
            kind,
            foreign_key: None,
            inverse_foreign_key: None,
            inverse: Inverse::Auto,
            cascade: CascadeOps::NONE,
            read_only: false,
            target_fn: target,
            through_fn: None,
        }
    }

    /// Declare a OneToOne relationship.
    #[must_use]
    pub const fn one_to_one(name: &'static str, target: fn() -> ModelInfo) -> Self {
        Self::new(name, target, RelationshipKind::OneToOne)
    }

    /// Declare a OneToMany relationship.
    #[must_use]
    pub const fn one_to_many(name: &'static str, target: fn() -> ModelInfo) -> Self {
        Self::new(name, target, RelationshipKind::OneToMany)
    }

    /// Declare a ManyToOne relationship.
    #[must_use]
    pub const fn many_to_one(name: &'static str, target: fn() -> ModelInfo) -> Self {
        Self::new(name, target, RelationshipKind::ManyToOne)
    }

    /// Declare a ManyToMany relationship through a junction model.
    #[must_use]
    pub const fn many_to_many(
        name: &'static str,
        target: fn() -> ModelInfo,
        through: fn() -> ModelInfo,
    ) -> Self {
        let mut info = Self::new(name, target, RelationshipKind::ManyToMany);
        info.through_fn = Some(through);
        info
    }

    /// Set the junction model.
    #[must_use]
    pub const fn through(mut self, through: fn() -> ModelInfo) -> Self {
        self.through_fn = Some(through);
        self
    }

    /// Set the explicit foreign-key column.
    #[must_use]
    pub const fn foreign_key(mut self, column: &'static str) -> Self {
        self.foreign_key = Some(column);
        self
    }

    /// Set the junction column pointing at the target.
    #[must_use]
    pub const fn inverse_foreign_key(mut self, column: &'static str) -> Self {
        self.inverse_foreign_key = Some(column);
        self
    }

    /// Name the reciprocal relationship on the target.
    #[must_use]
    pub const fn inverse(mut self, field: &'static str) -> Self {
        self.inverse = Inverse::Field(field);
        self
    }

    /// Declare that the relationship has no inverse.
    #[must_use]
    pub const fn no_inverse(mut self) -> Self {
        self.inverse = Inverse::Disabled;
        self
    }

    /// Set the cascade phases.
    #[must_use]
    pub const fn cascade(mut self, ops: CascadeOps) -> Self {
        self.cascade = ops;
        self
    }

    /// Mark the relationship read-only.
    #[must_use]
    pub const fn read_only(mut self) -> Self {
        self.read_only = true;
        self
    }

    /// The related model.
    pub fn target(&self) -> ModelInfo {
        (self.target_fn)()
    }

    /// The junction model, if declared.
    pub fn through_model(&self) -> Option<ModelInfo> {
        self.through_fn.map(|f| f())
    }
}
