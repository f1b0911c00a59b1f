//! Assembly tree builder.
//!
//! Produces a flat, parent-linked node list for hierarchical display. Every
//! occurrence becomes its own node; unlike the BOM, nothing is deduplicated.

use serde::{Serialize, Serializer};

use crate::assembly::{AssemblyHost, AssemblyResult, Component, Design, Occurrence};

/// Marker used in place of a parent identifier for top-level nodes.
pub const ROOT_MARKER: &str = "#";

/// Role of a node in the tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeKind {
    /// The design's root component.
    Root,
    /// An occurrence with child occurrences (a sub-assembly).
    Group,
    /// An occurrence without children.
    Leaf,
}

/// Back-reference from a node to its parent, by component identifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParentRef {
    /// No parent: the node sits at the top of the tree.
    Root,
    /// Identifier of the parent component.
    Component(String),
}

impl ParentRef {
    /// The identifier as shown to consumers (`#` for the root marker).
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::Root => ROOT_MARKER,
            Self::Component(id) => id,
        }
    }
}

impl Serialize for ParentRef {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

/// One component or occurrence in a traversal result.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ComponentNode {
    /// Component display name.
    pub name: String,
    /// Component part number.
    pub part_number: String,
    /// Host identifier of the component.
    pub local_id: String,
    /// Component revision identifier.
    pub revision_id: String,
    /// Number of occurrences this node stands for.
    pub instance_count: u32,
    /// Parent back-reference.
    pub parent_ref: ParentRef,
    /// Node role.
    pub node_kind: NodeKind,
}

/// Builds a node describing `component` with an instance count of one.
#[must_use]
pub fn component_info(
    component: &Component,
    parent_ref: ParentRef,
    node_kind: NodeKind,
) -> ComponentNode {
    ComponentNode {
        name: component.name.clone(),
        part_number: component.part_number.clone(),
        local_id: component.id.clone(),
        revision_id: component.revision_id.clone(),
        instance_count: 1,
        parent_ref,
        node_kind,
    }
}

/// Builds the assembly tree of the host's active design.
///
/// If no design is active, notifies the user and returns an empty list.
///
/// # Errors
///
/// Returns an error if an occurrence refers to an unknown component.
pub fn build_tree(host: &dyn AssemblyHost) -> AssemblyResult<Vec<ComponentNode>> {
    let Some(design) = host.active_design() else {
        host.notify("Component tree", "No active design");
        return Ok(Vec::new());
    };
    build_design_tree(design)
}

/// Builds the tree of `design`, depth-first in pre-order.
///
/// The first node is the root component; each following node's `parent_ref`
/// names its parent component. Children keep host order.
///
/// # Errors
///
/// Returns an error if the root or any occurrence refers to an unknown component.
pub fn build_design_tree(design: &Design) -> AssemblyResult<Vec<ComponentNode>> {
    let (_, root) = design.root_component()?;

    let mut nodes = vec![component_info(root, ParentRef::Root, NodeKind::Root)];
    append_occurrences(design, design.occurrences(), &root.id, &mut nodes)?;

    tracing::debug!(nodes = nodes.len(), root = %root.id, "Built component tree");
    Ok(nodes)
}

fn append_occurrences(
    design: &Design,
    occurrences: &[Occurrence],
    parent_id: &str,
    nodes: &mut Vec<ComponentNode>,
) -> AssemblyResult<()> {
    for occurrence in occurrences {
        let (_, component) = design.component(&occurrence.component)?;
        let parent = ParentRef::Component(parent_id.to_string());

        if occurrence.children.is_empty() {
            nodes.push(component_info(component, parent, NodeKind::Leaf));
        } else {
            nodes.push(component_info(component, parent, NodeKind::Group));
            append_occurrences(design, &occurrence.children, &component.id, nodes)?;
        }
    }
    Ok(())
}
