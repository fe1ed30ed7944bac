use schemars::JsonSchema;
use serde::Deserialize;
use serde_json::json;

use super::{NodeMove, apply_moves, select_nodes};
use crate::geometry::Axis;
use crate::skill::{SkillContext, SkillError, SkillOutput};

#[derive(Debug, Clone, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct NormalizeSpacingParams {
    #[serde(default)]
    pub node_ids: Option<Vec<String>>,
    #[serde(default)]
    pub axis: Axis,
    /// Pitch between consecutive nodes. Defaults to the configured spacing.
    #[serde(default)]
    pub spacing: Option<f64>,
}

pub(super) fn run(ctx: &mut SkillContext<'_>, params: NormalizeSpacingParams) -> Result<SkillOutput, SkillError> {
    let spacing = params.spacing.unwrap_or(ctx.config.default_spacing);
    if !(spacing.is_finite() && spacing > 0.0) {
        return Err(SkillError::invalid("spacing must be a positive number"));
    }
    let axis = params.axis;

    let mut nodes = select_nodes(&*ctx.graph, params.node_ids.as_deref())?;
    nodes.sort_by(|a, b| {
        axis.coord(a.position_or_default())
            .total_cmp(&axis.coord(b.position_or_default()))
            .then_with(|| a.id.cmp(&b.id))
    });

    let mut moves = Vec::new();
    let mut previous: Option<f64> = None;
    for node in &nodes {
        let from = node.position_or_default();
        let current = axis.coord(from);
        if node.state.locked {
            previous = Some(current);
            continue;
        }
        let next = match previous {
            Some(prev) => prev + spacing,
            None => (current / spacing).round() * spacing,
        };
        previous = Some(next);
        if next != current {
            moves.push(NodeMove {
                id: node.id.clone(),
                from,
                to: axis.with_coord(from, next),
                shifts: None,
            });
        }
    }

    apply_moves(ctx, &moves)?;
    Ok(SkillOutput::ok(json!({
        "moves": moves,
        "axis": axis,
        "spacing": spacing,
    })))
}
