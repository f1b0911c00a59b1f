//! CAD assembly graph.
//!
//! This module models the read-only view of a CAD design that the BOM and
//! tree builders walk:
//!
//! - A [`Design`] owns a set of [`Component`]s (reusable definitions with
//!   identity, part number, revision and bodies) and the root component's
//!   child [`Occurrence`]s.
//! - Each occurrence places one component and may carry its own child
//!   occurrences, forming a nested assembly graph.
//!
//! # Component Identity
//!
//! Components are unique by `id` within a design. Each one is addressed by a
//! [`ComponentKey`], its position in the design's component table. Two
//! components with equal names but distinct ids are distinct components.
//!
//! # Host Access
//!
//! The [`AssemblyHost`] trait is the seam to the CAD application: it exposes
//! the active design (if any) and a way to show a notice to the user.
//! [`SnapshotHost`] implements it over a JSON export of a design.

pub mod error;
mod snapshot;

pub use error::{AssemblyError, AssemblyResult};
pub use snapshot::{Notice, SnapshotHost};

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// A body owned by a component.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Body {
    /// Whether the body is a closed solid.
    #[serde(default)]
    pub is_solid: bool,

    /// Body volume in cm³, as reported by the host.
    #[serde(default)]
    pub volume: f64,
}

impl Body {
    /// Creates a solid body with the given volume.
    #[must_use]
    pub const fn solid(volume: f64) -> Self {
        Self {
            is_solid: true,
            volume,
        }
    }

    /// Creates a non-solid (surface) body.
    #[must_use]
    pub const fn surface(volume: f64) -> Self {
        Self {
            is_solid: false,
            volume,
        }
    }
}

/// A reusable component definition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Component {
    /// Host identifier of the component.
    pub id: String,

    /// Display name.
    pub name: String,

    /// Part number.
    #[serde(default)]
    pub part_number: String,

    /// Revision identifier.
    #[serde(default)]
    pub revision_id: String,

    /// Bodies owned by the component.
    #[serde(default)]
    pub bodies: Vec<Body>,
}

impl Component {
    /// Creates a component without bodies.
    #[must_use]
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            part_number: String::new(),
            revision_id: String::new(),
            bodies: Vec::new(),
        }
    }

    /// Sets the part number.
    #[must_use]
    pub fn with_part_number(mut self, part_number: impl Into<String>) -> Self {
        self.part_number = part_number.into();
        self
    }

    /// Sets the revision identifier.
    #[must_use]
    pub fn with_revision(mut self, revision_id: impl Into<String>) -> Self {
        self.revision_id = revision_id.into();
        self
    }

    /// Adds a body.
    #[must_use]
    pub fn with_body(mut self, body: Body) -> Self {
        self.bodies.push(body);
        self
    }

    /// Sum of the volumes of all solid bodies (zero if there are none).
    #[must_use]
    pub fn solid_volume(&self) -> f64 {
        self.bodies
            .iter()
            .filter(|body| body.is_solid)
            .map(|body| body.volume)
            .sum()
    }
}

/// Placement of a component within an assembly.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Occurrence {
    /// Identifier of the placed component.
    pub component: String,

    /// Whether the component is an external reference (linked from another document).
    #[serde(default)]
    pub is_referenced_component: bool,

    /// Child occurrences, in host order.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<Occurrence>,
}

impl Occurrence {
    /// Creates an occurrence of a component with no children.
    #[must_use]
    pub fn of(component: impl Into<String>) -> Self {
        Self {
            component: component.into(),
            is_referenced_component: false,
            children: Vec::new(),
        }
    }

    /// Marks the occurrence as referencing an externally managed component.
    #[must_use]
    pub const fn linked(mut self) -> Self {
        self.is_referenced_component = true;
        self
    }

    /// Adds a child occurrence.
    #[must_use]
    pub fn with_child(mut self, child: Self) -> Self {
        self.children.push(child);
        self
    }
}

/// Identity of a component inside one [`Design`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ComponentKey(usize);

/// Serialised form of a design, validated into a [`Design`].
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct DesignFile {
    root: String,
    components: Vec<Component>,
    #[serde(default)]
    occurrences: Vec<Occurrence>,
}

/// An assembly design: the component table plus the root's occurrences.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(try_from = "DesignFile")]
pub struct Design {
    /// Identifier of the root component.
    root: String,

    /// Component definitions.
    components: Vec<Component>,

    /// Occurrences placed directly in the root component.
    occurrences: Vec<Occurrence>,

    #[serde(skip)]
    index: HashMap<String, ComponentKey>,
}

impl TryFrom<DesignFile> for Design {
    type Error = AssemblyError;

    fn try_from(file: DesignFile) -> AssemblyResult<Self> {
        Self::new(file.root, file.components, file.occurrences)
    }
}

impl Design {
    /// Creates a design.
    ///
    /// # Errors
    ///
    /// Returns [`AssemblyError::DuplicateComponent`] if two components share an id.
    /// References from occurrences are resolved lazily during traversal.
    pub fn new(
        root: impl Into<String>,
        components: Vec<Component>,
        occurrences: Vec<Occurrence>,
    ) -> AssemblyResult<Self> {
        let mut index = HashMap::with_capacity(components.len());
        for (position, component) in components.iter().enumerate() {
            if index
                .insert(component.id.clone(), ComponentKey(position))
                .is_some()
            {
                return Err(AssemblyError::DuplicateComponent {
                    id: component.id.clone(),
                });
            }
        }

        Ok(Self {
            root: root.into(),
            components,
            occurrences,
            index,
        })
    }

    /// Resolves a component by host identifier.
    ///
    /// # Errors
    ///
    /// Returns [`AssemblyError::UnknownComponent`] if no component has this id.
    pub fn component(&self, id: &str) -> AssemblyResult<(ComponentKey, &Component)> {
        let key = *self
            .index
            .get(id)
            .ok_or_else(|| AssemblyError::unknown_component(id))?;
        Ok((key, &self.components[key.0]))
    }

    /// Resolves the root component.
    ///
    /// # Errors
    ///
    /// Returns [`AssemblyError::UnknownComponent`] if the root id is not defined.
    pub fn root_component(&self) -> AssemblyResult<(ComponentKey, &Component)> {
        self.component(&self.root)
    }

    /// Occurrences placed directly in the root component, in host order.
    #[must_use]
    pub fn occurrences(&self) -> &[Occurrence] {
        &self.occurrences
    }

    /// All occurrences at every depth, flattened depth-first in pre-order.
    #[must_use]
    pub fn all_occurrences(&self) -> Vec<&Occurrence> {
        fn collect<'a>(occurrences: &'a [Occurrence], out: &mut Vec<&'a Occurrence>) {
            for occurrence in occurrences {
                out.push(occurrence);
                collect(&occurrence.children, out);
            }
        }

        let mut out = Vec::new();
        collect(&self.occurrences, &mut out);
        out
    }

    /// Number of component definitions.
    #[must_use]
    pub fn component_count(&self) -> usize {
        self.components.len()
    }
}

/// Access to the CAD application.
///
/// Implementations only read the assembly graph; they never mutate CAD state.
pub trait AssemblyHost {
    /// The active design, or `None` if no assembly is open.
    fn active_design(&self) -> Option<&Design>;

    /// Shows a user-facing notice.
    fn notify(&self, title: &str, message: &str);
}
