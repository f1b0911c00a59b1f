//! Bill of materials aggregation.
//!
//! Walks the flattened occurrence list of the active design and produces one
//! entry per distinct component, in order of first appearance, with the
//! number of occurrences and the component's solid volume.

use indexmap::IndexMap;
use serde::Serialize;

use crate::assembly::{AssemblyHost, AssemblyResult, ComponentKey, Design};
use crate::report::{self, ErrorSink};
use crate::tree::{component_info, ComponentNode, NodeKind, ParentRef};

/// One BOM row: a distinct component and how often it occurs.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BomEntry {
    /// Component description and instance count.
    #[serde(flatten)]
    pub node: ComponentNode,

    /// Sum of the component's solid-body volumes in cm³ (not multiplied by the count).
    pub volume: f64,

    /// Whether the component is referenced from another document.
    pub is_linked: bool,
}

/// Extracts the BOM of the host's active design.
///
/// If no design is active, notifies the user and returns an empty BOM.
/// Traversal failures are reported to `sink` and returned unchanged.
///
/// # Errors
///
/// Returns an error if an occurrence refers to an unknown component.
pub fn extract_bom(
    host: &dyn AssemblyHost,
    sink: &dyn ErrorSink,
) -> AssemblyResult<Vec<BomEntry>> {
    let Some(design) = host.active_design() else {
        host.notify("Extract BOM", "No active design");
        return Ok(Vec::new());
    };

    aggregate(design).map_err(|e| report::capture(sink, e))
}

/// Aggregates the occurrences of `design` into BOM entries.
///
/// Deduplication is by component identity, not by name.
///
/// # Errors
///
/// Returns an error if an occurrence refers to an unknown component.
pub fn aggregate(design: &Design) -> AssemblyResult<Vec<BomEntry>> {
    let occurrences = design.all_occurrences();
    let mut entries: IndexMap<ComponentKey, BomEntry> = IndexMap::new();

    for occurrence in &occurrences {
        let (key, component) = design.component(&occurrence.component)?;

        if let Some(entry) = entries.get_mut(&key) {
            entry.node.instance_count += 1;
            continue;
        }

        entries.insert(
            key,
            BomEntry {
                node: component_info(component, ParentRef::Root, NodeKind::Leaf),
                volume: component.solid_volume(),
                is_linked: occurrence.is_referenced_component,
            },
        );
    }

    tracing::debug!(
        occurrences = occurrences.len(),
        entries = entries.len(),
        "Aggregated BOM"
    );

    Ok(entries.into_values().collect())
}

/// Total number of occurrences represented by a BOM.
#[must_use]
pub fn total_instances(bom: &[BomEntry]) -> u64 {
    bom.iter().map(|entry| u64::from(entry.node.instance_count)).sum()
}

/// Renders a BOM as CSV with a header row.
///
/// # Errors
///
/// Returns an error if a row cannot be encoded.
pub fn to_csv(bom: &[BomEntry]) -> Result<String, csv::Error> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    writer.write_record([
        "name",
        "part_number",
        "local_id",
        "revision_id",
        "instance_count",
        "volume",
        "is_linked",
    ])?;

    for entry in bom {
        let instance_count = entry.node.instance_count.to_string();
        let volume = entry.volume.to_string();
        writer.write_record([
            entry.node.name.as_str(),
            entry.node.part_number.as_str(),
            entry.node.local_id.as_str(),
            entry.node.revision_id.as_str(),
            instance_count.as_str(),
            volume.as_str(),
            if entry.is_linked { "yes" } else { "no" },
        ])?;
    }

    let bytes = writer
        .into_inner()
        .map_err(|e| csv::Error::from(e.into_error()))?;
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}
