//! Write-back of a computed layout.

use log::{debug, warn};

use crate::collaborator::{BranchPreview, Canvas};

use super::LayoutResult;

/// Counts of what [`apply_positions`] did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ApplyStats {
    pub applied: usize,
    pub endpoints_reported: usize,
    pub skipped: usize,
}

/// Writes real node positions to the canvas and reports endpoint centers to
/// the branch collaborator.
///
/// Placements with non-finite coordinates are skipped. Nodes the canvas no
/// longer knows about count as skipped too.
pub(crate) fn apply_positions(
    result: &LayoutResult,
    canvas: &mut dyn Canvas,
    mut preview: Option<&mut (dyn BranchPreview + Send)>,
) -> ApplyStats {
    let mut stats = ApplyStats::default();

    for (id, placement) in &result.positions {
        if !placement.center().is_finite() || !placement.top_left().is_finite() {
            warn!(node_id = id; "Skipping non-finite placement");
            stats.skipped += 1;
            continue;
        }

        if placement.is_endpoint() {
            let (Some(source_id), Some(branch_id)) = (&placement.source_id, &placement.branch_id) else {
                stats.skipped += 1;
                continue;
            };
            match preview.as_deref_mut() {
                Some(preview) => {
                    preview.update_anchor(source_id, branch_id, placement.center());
                    stats.endpoints_reported += 1;
                }
                None => stats.skipped += 1,
            }
            continue;
        }

        if canvas.set_node_position(id, placement.top_left()) {
            stats.applied += 1;
        } else {
            debug!(node_id = id; "Canvas rejected position");
            stats.skipped += 1;
        }
    }

    debug!(
        applied = stats.applied,
        endpoints = stats.endpoints_reported,
        skipped = stats.skipped;
        "Positions applied"
    );
    stats
}
