//! Arena storage for object graphs.
//!
//! Entities live in a [`Graph`] as [`Node`]s addressed by [`NodeId`].
//! Relationships are stored as links between ids rather than owning
//! references, so cyclic graphs (a user following a user who follows them
//! back) need no shared mutable aliasing.
//!
//! Every node carries one [`Link`] per relationship its model declares, in
//! declaration order. A link starts out [`Link::Unset`]: "not loaded". That
//! is distinct from a loaded relationship with no related rows, which is
//! `Link::One(None)` or an empty `Link::Many`.
//!
//! ```ignore
//! let mut graph = Graph::new();
//! let customer = graph.add(&Customer::new("John"));
//! let order = graph.add(&Order::new(20.0));
//! graph.push(customer, "orders", order)?;
//! store.insert_with_children(&cx, &mut graph, customer, true).await;
//! let saved: Customer = graph.entity(customer)?;
//! ```

use relmodel_core::error::{RelationshipErrorKind, TypeError};
use relmodel_core::{Error, Key, Model, ModelInfo, RelationshipInfo, Result, Row, Value};
use std::fmt;

/// Handle to a node inside one [`Graph`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(usize);

impl NodeId {
    /// Position of the node in its graph.
    pub fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// The state of one relationship on one node.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum Link {
    /// Not loaded or never assigned.
    #[default]
    Unset,
    /// A single-valued relationship; `None` when nothing is related.
    One(Option<NodeId>),
    /// A collection relationship.
    Many(Vec<NodeId>),
}

impl Link {
    /// Whether the relationship has been loaded or assigned.
    pub fn is_set(&self) -> bool {
        !matches!(self, Link::Unset)
    }

    /// Related node ids, in order. Empty for `Unset`.
    pub fn ids(&self) -> &[NodeId] {
        match self {
            Link::Unset | Link::One(None) => &[],
            Link::One(Some(id)) => std::slice::from_ref(id),
            Link::Many(ids) => ids,
        }
    }

    /// Whether at least one node is related.
    pub fn is_populated(&self) -> bool {
        !self.ids().is_empty()
    }
}

/// One entity: its model, its column values and its relationship links.
#[derive(Debug, Clone)]
pub struct Node {
    model: ModelInfo,
    values: Vec<(&'static str, Value)>,
    links: Vec<Link>,
}

impl Node {
    fn new(model: ModelInfo, values: Vec<(&'static str, Value)>) -> Self {
        let links = vec![Link::Unset; model.relationships.len()];
        Self {
            model,
            values,
            links,
        }
    }

    /// The node's model.
    pub fn model(&self) -> ModelInfo {
        self.model
    }

    /// Column values, in the order produced by `Model::to_row`.
    pub fn values(&self) -> &[(&'static str, Value)] {
        &self.values
    }

    /// A column value by name.
    pub fn value(&self, column: &str) -> Option<&Value> {
        self.values
            .iter()
            .find(|(c, _)| *c == column)
            .map(|(_, v)| v)
    }

    /// The primary key, if set.
    pub fn key(&self) -> Option<Key> {
        self.model
            .primary_key_column()
            .and_then(|pk| self.value(pk))
            .and_then(Key::from_set_value)
    }

    /// Links, aligned with `model().relationships`.
    pub fn links(&self) -> &[Link] {
        &self.links
    }
}

/// An arena of entity nodes and the links between them.
#[derive(Debug, Clone, Default)]
pub struct Graph {
    nodes: Vec<Node>,
}

impl Graph {
    /// Create an empty graph.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of nodes.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Whether the graph has no nodes.
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// All node ids, in insertion order.
    pub fn ids(&self) -> impl Iterator<Item = NodeId> + '_ {
        (0..self.nodes.len()).map(NodeId)
    }

    /// Ids of every node holding a `T`.
    pub fn nodes_of<T: Model>(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.nodes
            .iter()
            .enumerate()
            .filter(|(_, n)| n.model.is::<T>())
            .map(|(i, _)| NodeId(i))
    }

    /// Add an entity. All of its relationships start out unset.
    pub fn add<T: Model>(&mut self, entity: &T) -> NodeId {
        self.push_node(Node::new(ModelInfo::of::<T>(), entity.to_row()))
    }

    /// Add a node from a fetched row, keeping exactly the model's columns.
    pub(crate) fn add_row(&mut self, model: ModelInfo, row: &Row) -> NodeId {
        let values = model
            .fields()
            .iter()
            .map(|f| {
                let value = row.get_by_name(f.column_name).cloned().unwrap_or(Value::Null);
                (f.column_name, value)
            })
            .collect();
        self.push_node(Node::new(model, values))
    }

    fn push_node(&mut self, node: Node) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(node);
        id
    }

    /// Borrow a node.
    ///
    /// # Panics
    ///
    /// Panics if `id` belongs to another graph and is out of range.
    pub fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id.0]
    }

    /// The model of a node.
    pub fn model(&self, id: NodeId) -> ModelInfo {
        self.node(id).model
    }

    /// Decode a node back into its entity type.
    pub fn entity<T: Model>(&self, id: NodeId) -> Result<T> {
        let node = self.node(id);
        if !node.model.is::<T>() {
            return Err(Error::Type(TypeError {
                expected: std::any::type_name::<T>(),
                actual: node.model.name.to_string(),
                column: None,
                rust_type: Some(std::any::type_name::<T>()),
            }));
        }
        T::from_row(&Row::from_pairs(&node.values))
    }

    /// Overwrite a node's column values from an entity, keeping its links.
    ///
    /// A primary key, once set, never changes: an entity with an unset key
    /// inherits the node's key, and one with a different key is rejected.
    pub fn replace<T: Model>(&mut self, id: NodeId, entity: &T) -> Result<()> {
        let node = &mut self.nodes[id.0];
        if !node.model.is::<T>() {
            return Err(Error::Type(TypeError {
                expected: node.model.name,
                actual: std::any::type_name::<T>().to_string(),
                column: None,
                rust_type: Some(std::any::type_name::<T>()),
            }));
        }

        let mut values = entity.to_row();
        if let (Some(current), Some(pk)) = (node.key(), node.model.primary_key_column()) {
            let position = values.iter().position(|(c, _)| *c == pk);
            let incoming = position.and_then(|i| Key::from_set_value(&values[i].1));
            match (incoming, position) {
                (Some(incoming), _) if incoming != current => {
                    return Err(Error::Custom(format!(
                        "cannot change primary key of {} {id} from {current} to {incoming}",
                        node.model.name
                    )));
                }
                (Some(_), _) => {}
                (None, Some(i)) => values[i].1 = current.to_value(),
                (None, None) => values.push((pk, current.to_value())),
            }
        }
        node.values = values;
        Ok(())
    }

    /// A column value.
    pub fn value(&self, id: NodeId, column: &str) -> Option<&Value> {
        self.node(id).value(column)
    }

    /// Set a column value, appending the column if the node lacks it.
    pub fn set_value(&mut self, id: NodeId, column: &'static str, value: Value) {
        let values = &mut self.nodes[id.0].values;
        match values.iter_mut().find(|(c, _)| *c == column) {
            Some((_, slot)) => *slot = value,
            None => values.push((column, value)),
        }
    }

    /// The node's primary key, if set.
    pub fn key(&self, id: NodeId) -> Option<Key> {
        self.node(id).key()
    }

    /// Link of a relationship by position.
    pub(crate) fn link_at(&self, id: NodeId, index: usize) -> &Link {
        &self.nodes[id.0].links[index]
    }

    pub(crate) fn set_link_at(&mut self, id: NodeId, index: usize, link: Link) {
        self.nodes[id.0].links[index] = link;
    }

    fn relationship(&self, id: NodeId, name: &str) -> Result<(usize, &'static RelationshipInfo)> {
        let model = self.model(id);
        let relationships = model.relationships;
        relationships
            .iter()
            .position(|r| r.name == name)
            .map(|i| (i, &relationships[i]))
            .ok_or_else(|| {
                Error::relationship(
                    RelationshipErrorKind::UnknownRelationship,
                    model.name,
                    name,
                    format!("{} declares no relationship named {name}", model.name),
                )
            })
    }

    fn check_target(&self, id: NodeId, rel: &RelationshipInfo, related: NodeId) -> Result<()> {
        let target = rel.target();
        let actual = self.model(related);
        if actual == target {
            Ok(())
        } else {
            Err(Error::relationship(
                RelationshipErrorKind::TargetMismatch,
                self.model(id).name,
                rel.name,
                format!("expected a {} node, got {}", target.name, actual.name),
            ))
        }
    }

    fn single_valued(&self, id: NodeId, rel: &RelationshipInfo) -> Result<()> {
        if rel.kind.is_single_valued() {
            Ok(())
        } else {
            Err(Error::relationship(
                RelationshipErrorKind::NotSingleValued,
                self.model(id).name,
                rel.name,
                format!("{:?} relationship holds a collection", rel.kind),
            ))
        }
    }

    fn collection(&self, id: NodeId, rel: &RelationshipInfo) -> Result<()> {
        if rel.kind.is_single_valued() {
            Err(Error::relationship(
                RelationshipErrorKind::NotCollection,
                self.model(id).name,
                rel.name,
                format!("{:?} relationship holds a single node", rel.kind),
            ))
        } else {
            Ok(())
        }
    }

    /// The link of a relationship by name.
    pub fn link(&self, id: NodeId, name: &str) -> Result<&Link> {
        let (index, _) = self.relationship(id, name)?;
        Ok(self.link_at(id, index))
    }

    /// Assign a single-valued relationship. `None` means "related to nothing".
    pub fn set_one(&mut self, id: NodeId, name: &str, related: Option<NodeId>) -> Result<()> {
        let (index, rel) = self.relationship(id, name)?;
        self.single_valued(id, rel)?;
        if let Some(related) = related {
            self.check_target(id, rel, related)?;
        }
        self.set_link_at(id, index, Link::One(related));
        Ok(())
    }

    /// Assign a collection relationship.
    pub fn set_many(&mut self, id: NodeId, name: &str, related: Vec<NodeId>) -> Result<()> {
        let (index, rel) = self.relationship(id, name)?;
        self.collection(id, rel)?;
        for &r in &related {
            self.check_target(id, rel, r)?;
        }
        self.set_link_at(id, index, Link::Many(related));
        Ok(())
    }

    /// Append to a collection relationship, turning an unset link into a
    /// one-element collection.
    pub fn push(&mut self, id: NodeId, name: &str, related: NodeId) -> Result<()> {
        let (index, rel) = self.relationship(id, name)?;
        self.collection(id, rel)?;
        self.check_target(id, rel, related)?;
        match &mut self.nodes[id.0].links[index] {
            Link::Many(ids) => ids.push(related),
            slot => *slot = Link::Many(vec![related]),
        }
        Ok(())
    }

    /// Reset a relationship to the not-loaded state.
    pub fn unset(&mut self, id: NodeId, name: &str) -> Result<()> {
        let (index, _) = self.relationship(id, name)?;
        self.set_link_at(id, index, Link::Unset);
        Ok(())
    }

    /// The node related through a single-valued relationship.
    ///
    /// `None` both when nothing is related and when the link is unset; use
    /// [`Graph::link`] to tell them apart.
    pub fn one(&self, id: NodeId, name: &str) -> Result<Option<NodeId>> {
        let (index, rel) = self.relationship(id, name)?;
        self.single_valued(id, rel)?;
        Ok(match self.link_at(id, index) {
            Link::One(related) => *related,
            _ => None,
        })
    }

    /// The nodes related through a collection relationship, or `None` when
    /// the collection is unset.
    pub fn many(&self, id: NodeId, name: &str) -> Result<Option<&[NodeId]>> {
        let (index, rel) = self.relationship(id, name)?;
        self.collection(id, rel)?;
        Ok(match self.link_at(id, index) {
            Link::Unset => None,
            link => Some(link.ids()),
        })
    }

    /// Decode every node of a collection relationship.
    pub fn many_entities<T: Model>(&self, id: NodeId, name: &str) -> Result<Vec<T>> {
        match self.many(id, name)? {
            Some(ids) => ids.iter().map(|&c| self.entity(c)).collect(),
            None => Ok(Vec::new()),
        }
    }
}
