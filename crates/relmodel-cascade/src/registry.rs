//! Relationship descriptor registry.
//!
//! [`describe`] turns the static [`RelationshipInfo`] declarations of a model
//! into [`RelationshipDescriptor`]s: where the foreign key lives, which
//! relationship on the target is the inverse, and the cascade flags. The
//! result is computed once per type and cached for the life of the process.
//!
//! Resolution only reads static metadata (fields and declarations of the
//! model, its targets and junction types); it never describes another type,
//! so mutually referencing models resolve without recursion.
//!
//! # Foreign key inference
//!
//! An explicit `foreign_key` always wins and must name a column on the side
//! the relationship kind expects. Without one, the resolver tries in order:
//!
//! 1. the inverse relationship's explicit key, when it lives on the right side;
//! 2. a single column on that side whose `foreign_key` references the other
//!    table;
//! 3. naming conventions: `<relationship>_id`, `<entity>_id`, `<entity>_key`,
//!    `<Entity>Id` and `<Entity>Key`, where `<entity>` is the type whose key
//!    is referenced.
//!
//! A ManyToMany that cannot be resolved is a configuration error. Any other
//! relationship is kept with [`Placement::Unresolved`] and fails with
//! `MissingForeignKey` when it is used.

use relmodel_core::error::RelationshipErrorKind;
use relmodel_core::identifiers::to_snake_case;
use relmodel_core::{
    CascadeOps, Error, Inverse, ModelInfo, RelationshipInfo, RelationshipKind, Result,
    is_valid_identifier,
};
use std::any::TypeId;
use std::collections::HashMap;
use std::sync::{Arc, OnceLock, PoisonError, RwLock};

/// Where the key linking the two sides of a relationship is stored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Placement {
    /// A column on the declaring model holds the target's key.
    Local { column: &'static str },
    /// A column on the target holds the declaring model's key.
    Remote { column: &'static str },
    /// Rows of a junction model hold both keys.
    Junction {
        model: ModelInfo,
        local_column: &'static str,
        remote_column: &'static str,
    },
    /// No key could be found; the message explains what was tried.
    Unresolved(String),
}

/// A resolved relationship.
#[derive(Debug, Clone)]
pub struct RelationshipDescriptor {
    /// Position in the declaring model's `RELATIONSHIPS`.
    pub index: usize,
    pub name: &'static str,
    pub kind: RelationshipKind,
    /// The declaring model.
    pub owner: ModelInfo,
    pub target: ModelInfo,
    pub placement: Placement,
    /// Position of the inverse relationship in the target's `RELATIONSHIPS`.
    pub inverse: Option<usize>,
    pub cascade: CascadeOps,
    pub read_only: bool,
}

impl RelationshipDescriptor {
    /// Whether the relationship takes part in the given cascade phase.
    pub fn cascades(&self, op: CascadeOps) -> bool {
        self.cascade.contains(op)
    }

    /// The inverse relationship's declaration on the target.
    pub fn inverse_info(&self) -> Option<&'static RelationshipInfo> {
        let relationships = self.target.relationships;
        self.inverse.map(|i| &relationships[i])
    }

    /// The `MissingForeignKey` error for an unresolved placement.
    pub fn missing_foreign_key(&self) -> Option<Error> {
        match &self.placement {
            Placement::Unresolved(reason) => Some(Error::relationship(
                RelationshipErrorKind::MissingForeignKey,
                self.owner.name,
                self.name,
                reason.clone(),
            )),
            _ => None,
        }
    }
}

#[derive(Default)]
struct Registry {
    descriptors: HashMap<TypeId, Arc<[RelationshipDescriptor]>>,
    /// Junction columns holding keys of a model, keyed by that model.
    incoming: HashMap<TypeId, Vec<(ModelInfo, &'static str)>>,
}

impl Registry {
    fn register(&mut self, model: &ModelInfo, descriptors: Arc<[RelationshipDescriptor]>) {
        if self.descriptors.contains_key(&model.type_id()) {
            return;
        }
        for d in descriptors.iter() {
            if let Placement::Junction {
                model: junction,
                remote_column,
                ..
            } = d.placement
            {
                let columns = self.incoming.entry(d.target.type_id()).or_default();
                if !columns.contains(&(junction, remote_column)) {
                    columns.push((junction, remote_column));
                }
            }
        }
        self.descriptors.insert(model.type_id(), descriptors);
    }
}

fn registry() -> &'static RwLock<Registry> {
    static REGISTRY: OnceLock<RwLock<Registry>> = OnceLock::new();
    REGISTRY.get_or_init(|| RwLock::new(Registry::default()))
}

/// Resolve the relationships of `model`.
///
/// Cached per type. Errors are not cached, so a misconfigured model reports
/// the same error on every use.
pub fn describe(model: &ModelInfo) -> Result<Arc<[RelationshipDescriptor]>> {
    if let Some(found) = registry()
        .read()
        .unwrap_or_else(PoisonError::into_inner)
        .descriptors
        .get(&model.type_id())
    {
        return Ok(Arc::clone(found));
    }

    let descriptors: Arc<[RelationshipDescriptor]> = resolve(model)?.into();
    tracing::debug!(
        model = model.name,
        relationships = descriptors.len(),
        "Registered relationship descriptors"
    );

    let mut guard = registry().write().unwrap_or_else(PoisonError::into_inner);
    guard.register(model, descriptors);
    match guard.descriptors.get(&model.type_id()) {
        Some(found) => Ok(Arc::clone(found)),
        None => Err(config(model, "descriptors missing after registration")),
    }
}

/// Junction columns that hold keys of `model`, as `(junction, column)`
/// pairs: its own ManyToMany relationships plus those of every registered
/// model targeting it, whether or not `model` declares the inverse.
///
/// A model is registered once it has been described, which every cascade
/// operation on it does.
pub fn junction_columns(model: &ModelInfo) -> Result<Vec<(ModelInfo, &'static str)>> {
    let mut columns: Vec<(ModelInfo, &'static str)> = Vec::new();
    for d in describe(model)?.iter() {
        if let Placement::Junction {
            model: junction,
            local_column,
            ..
        } = d.placement
        {
            if !columns.contains(&(junction, local_column)) {
                columns.push((junction, local_column));
            }
        }
    }

    let guard = registry().read().unwrap_or_else(PoisonError::into_inner);
    for pair in guard.incoming.get(&model.type_id()).into_iter().flatten() {
        if !columns.contains(pair) {
            columns.push(*pair);
        }
    }
    Ok(columns)
}

fn config(model: &ModelInfo, message: impl std::fmt::Display) -> Error {
    Error::config(format!("{}: {message}", model.name))
}

fn check_entity(model: &ModelInfo) -> Result<()> {
    if !is_valid_identifier(model.table) {
        return Err(config(model, format!("invalid table name {:?}", model.table)));
    }
    for field in model.fields() {
        if !is_valid_identifier(field.column_name) {
            return Err(config(
                model,
                format!("invalid column name {:?}", field.column_name),
            ));
        }
    }
    match model.primary_key {
        [pk] if model.field(pk).is_some() => Ok(()),
        [pk] => Err(config(model, format!("primary key column {pk} is not a field"))),
        keys => Err(config(
            model,
            format!("expected exactly one primary key, found {}", keys.len()),
        )),
    }
}

fn resolve(model: &ModelInfo) -> Result<Vec<RelationshipDescriptor>> {
    check_entity(model)?;

    let mut descriptors = Vec::with_capacity(model.relationships.len());
    for (index, rel) in model.relationships.iter().enumerate() {
        if !is_valid_identifier(rel.name) {
            return Err(config(model, format!("invalid relationship name {:?}", rel.name)));
        }
        let target = rel.target();
        check_entity(&target)
            .map_err(|e| config(model, format!("relationship {}: {e}", rel.name)))?;

        let inverse = resolve_inverse(model, index, rel, &target)?;
        let inverse_info = inverse.map(|i| &target.relationships[i]);
        let placement = resolve_placement(model, rel, &target, inverse_info)?;
        if let Placement::Unresolved(reason) = &placement {
            tracing::warn!(
                model = model.name,
                relationship = rel.name,
                reason = %reason,
                "Foreign key not resolved"
            );
        }

        descriptors.push(RelationshipDescriptor {
            index,
            name: rel.name,
            kind: rel.kind,
            owner: *model,
            target,
            placement,
            inverse,
            cascade: rel.cascade,
            read_only: rel.read_only,
        });
    }
    Ok(descriptors)
}

fn resolve_inverse(
    model: &ModelInfo,
    index: usize,
    rel: &RelationshipInfo,
    target: &ModelInfo,
) -> Result<Option<usize>> {
    let wanted = rel.kind.inverse_kind();
    match rel.inverse {
        Inverse::Disabled => Ok(None),
        Inverse::Field(name) => {
            let Some(i) = target.relationship_index(name) else {
                return Err(config(
                    model,
                    format!("inverse {name} of {} not found on {}", rel.name, target.name),
                ));
            };
            let candidate = &target.relationships[i];
            if candidate.kind != wanted || candidate.target() != *model {
                return Err(config(
                    model,
                    format!(
                        "inverse {}.{name} of {} must be a {wanted:?} relationship to {}",
                        target.name, rel.name, model.name
                    ),
                ));
            }
            Ok(Some(i))
        }
        Inverse::Auto => {
            let same_type = target == model;
            let mut candidates = target
                .relationships
                .iter()
                .enumerate()
                .filter(|(i, r)| {
                    r.kind == wanted
                        && !matches!(r.inverse, Inverse::Disabled)
                        && r.target() == *model
                        && !(same_type && *i == index)
                })
                .map(|(i, _)| i);
            match (candidates.next(), candidates.next()) {
                (Some(i), None) => Ok(Some(i)),
                _ => Ok(None),
            }
        }
    }
}

/// Column names a key referencing `entity` conventionally takes.
fn conventional_columns(entity: &ModelInfo, relationship: Option<&str>) -> Vec<String> {
    let snake = to_snake_case(entity.name);
    let mut names = Vec::with_capacity(5);
    if let Some(rel) = relationship {
        names.push(format!("{rel}_id"));
    }
    names.push(format!("{snake}_id"));
    names.push(format!("{snake}_key"));
    names.push(format!("{}Id", entity.name));
    names.push(format!("{}Key", entity.name));
    names
}

/// The column on `side` holding the key of `referenced`, by declaration or
/// convention.
fn infer_column(
    side: &ModelInfo,
    referenced: &ModelInfo,
    relationship: Option<&str>,
    exclude: Option<&str>,
) -> Option<&'static str> {
    let pk = side.primary_key_column();
    let usable = |column: &str| Some(column) != exclude && Some(column) != pk;

    let mut declared = side
        .fields()
        .iter()
        .filter(|f| usable(f.column_name) && f.references_table() == Some(referenced.table));
    if let (Some(field), None) = (declared.next(), declared.next()) {
        return Some(field.column_name);
    }

    conventional_columns(referenced, relationship)
        .iter()
        .find_map(|name| {
            side.fields()
                .iter()
                .find(|f| usable(f.column_name) && f.column_name == name)
        })
        .map(|f| f.column_name)
}

fn has_column(model: &ModelInfo, column: &str) -> Option<&'static str> {
    model.field(column).map(|f| f.column_name)
}

fn resolve_placement(
    model: &ModelInfo,
    rel: &RelationshipInfo,
    target: &ModelInfo,
    inverse: Option<&RelationshipInfo>,
) -> Result<Placement> {
    let inverse_key = inverse.and_then(|inv| inv.foreign_key);
    let missing = || {
        Placement::Unresolved(format!(
            "no foreign key found for {:?} relationship {}.{} -> {}",
            rel.kind, model.name, rel.name, target.name
        ))
    };

    match rel.kind {
        RelationshipKind::ManyToOne => {
            if let Some(fk) = rel.foreign_key {
                return has_column(model, fk)
                    .map(|column| Placement::Local { column })
                    .ok_or_else(|| {
                        config(model, format!("foreign key {fk} of {} is not a field", rel.name))
                    });
            }
            Ok(inverse_key
                .and_then(|fk| has_column(model, fk))
                .or_else(|| infer_column(model, target, Some(rel.name), None))
                .map_or_else(missing, |column| Placement::Local { column }))
        }
        RelationshipKind::OneToMany => {
            if let Some(fk) = rel.foreign_key {
                return has_column(target, fk)
                    .map(|column| Placement::Remote { column })
                    .ok_or_else(|| {
                        config(
                            model,
                            format!(
                                "foreign key {fk} of {} is not a field of {}",
                                rel.name, target.name
                            ),
                        )
                    });
            }
            let inverse_name = inverse.map(|inv| inv.name);
            Ok(inverse_key
                .and_then(|fk| has_column(target, fk))
                .or_else(|| infer_column(target, model, inverse_name, None))
                .map_or_else(missing, |column| Placement::Remote { column }))
        }
        RelationshipKind::OneToOne => {
            if let Some(fk) = rel.foreign_key {
                if let Some(column) = has_column(model, fk) {
                    return Ok(Placement::Local { column });
                }
                return has_column(target, fk)
                    .map(|column| Placement::Remote { column })
                    .ok_or_else(|| {
                        config(
                            model,
                            format!("foreign key {fk} of {} is on neither side", rel.name),
                        )
                    });
            }
            if let Some(fk) = inverse_key {
                // The inverse declared from the other side: its local is our remote.
                if let Some(column) = has_column(target, fk) {
                    return Ok(Placement::Remote { column });
                }
                if let Some(column) = has_column(model, fk) {
                    return Ok(Placement::Local { column });
                }
            }
            if let Some(column) = infer_column(model, target, Some(rel.name), None) {
                return Ok(Placement::Local { column });
            }
            let inverse_name = inverse.map(|inv| inv.name);
            Ok(infer_column(target, model, inverse_name, None)
                .map_or_else(missing, |column| Placement::Remote { column }))
        }
        RelationshipKind::ManyToMany => resolve_junction(model, rel, target, inverse),
    }
}

fn resolve_junction(
    model: &ModelInfo,
    rel: &RelationshipInfo,
    target: &ModelInfo,
    inverse: Option<&RelationshipInfo>,
) -> Result<Placement> {
    let Some(junction) = rel.through_model() else {
        return Err(config(
            model,
            format!("many-to-many relationship {} has no junction type", rel.name),
        ));
    };
    if !is_valid_identifier(junction.table) {
        return Err(config(model, format!("invalid junction table {:?}", junction.table)));
    }

    let explicit = |column: Option<&'static str>| -> Result<Option<&'static str>> {
        match column {
            Some(c) => has_column(&junction, c).map(Some).ok_or_else(|| {
                config(
                    model,
                    format!(
                        "junction column {c} of {} is not a field of {}",
                        rel.name, junction.name
                    ),
                )
            }),
            None => Ok(None),
        }
    };

    let mut local = explicit(rel.foreign_key)?;
    let mut remote = explicit(rel.inverse_foreign_key)?;

    // The inverse names the same columns the other way round.
    if let Some(inv) = inverse {
        if local.is_none() {
            local = inv.inverse_foreign_key.and_then(|c| has_column(&junction, c));
        }
        if remote.is_none() {
            remote = inv.foreign_key.and_then(|c| has_column(&junction, c));
        }
    }

    let self_referencing = model == target;
    let (local, remote) = match (local, remote) {
        (Some(l), Some(r)) => (Some(l), Some(r)),
        (Some(l), None) => (Some(l), infer_column(&junction, target, None, Some(l))),
        (None, Some(r)) => (infer_column(&junction, model, None, Some(r)), Some(r)),
        (None, None) if self_referencing => (None, None),
        (None, None) => {
            let l = infer_column(&junction, model, None, None);
            let r = infer_column(&junction, target, None, l);
            (l, r)
        }
    };

    match (local, remote) {
        (Some(local_column), Some(remote_column)) if local_column != remote_column => {
            Ok(Placement::Junction {
                model: junction,
                local_column,
                remote_column,
            })
        }
        _ if self_referencing => Err(config(
            model,
            format!(
                "self-referencing many-to-many {} through {} needs explicit junction keys",
                rel.name, junction.name
            ),
        )),
        _ => Err(config(
            model,
            format!(
                "cannot resolve the junction keys of {} through {}",
                rel.name, junction.name
            ),
        )),
    }
}
