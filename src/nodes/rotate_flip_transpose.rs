//! Rotation, flipping, transposition, and EXIF orientation lowering.

use super::*;
use crate::scaling::render1d::Render1dParams;

pub struct Rotate90Def;

impl NodeDef for Rotate90Def {
    fn kind(&self) -> NodeKind {
        NodeKind::Rotate90
    }

    fn name(&self) -> &'static str {
        "rotate 90"
    }

    fn populate_dimensions(
        &self,
        _ctx: &Context,
        _job: &mut Job,
        g: &mut Graph,
        node: NodeIndex,
    ) -> Result<()> {
        dimensions_transpose(g, node)
    }

    fn pre_optimize_flatten(
        &self,
        _ctx: &Context,
        _job: &mut Job,
        g: &mut Graph,
        _node: NodeIndex,
    ) -> Result<FlattenResult> {
        let first = g.create_transpose(None);
        let last = g.create_flip_vertical(Some(first));
        Ok(FlattenResult::ReplacedBy { first, last })
    }
}

pub struct Rotate180Def;

impl NodeDef for Rotate180Def {
    fn kind(&self) -> NodeKind {
        NodeKind::Rotate180
    }

    fn name(&self) -> &'static str {
        "rotate 180"
    }

    fn populate_dimensions(
        &self,
        _ctx: &Context,
        _job: &mut Job,
        g: &mut Graph,
        node: NodeIndex,
    ) -> Result<()> {
        dimensions_mimic_input(g, node)
    }

    fn pre_optimize_flatten(
        &self,
        _ctx: &Context,
        _job: &mut Job,
        g: &mut Graph,
        _node: NodeIndex,
    ) -> Result<FlattenResult> {
        let first = g.create_flip_vertical(None);
        let last = g.create_flip_horizontal(Some(first));
        Ok(FlattenResult::ReplacedBy { first, last })
    }
}

pub struct Rotate270Def;

impl NodeDef for Rotate270Def {
    fn kind(&self) -> NodeKind {
        NodeKind::Rotate270
    }

    fn name(&self) -> &'static str {
        "rotate 270"
    }

    fn populate_dimensions(
        &self,
        _ctx: &Context,
        _job: &mut Job,
        g: &mut Graph,
        node: NodeIndex,
    ) -> Result<()> {
        dimensions_transpose(g, node)
    }

    fn pre_optimize_flatten(
        &self,
        _ctx: &Context,
        _job: &mut Job,
        g: &mut Graph,
        _node: NodeIndex,
    ) -> Result<FlattenResult> {
        let first = g.create_flip_vertical(None);
        let last = g.create_transpose(Some(first));
        Ok(FlattenResult::ReplacedBy { first, last })
    }
}

pub struct ApplyOrientationDef;

impl NodeDef for ApplyOrientationDef {
    fn kind(&self) -> NodeKind {
        NodeKind::ApplyOrientation
    }

    fn name(&self) -> &'static str {
        "apply_orientation"
    }

    fn stringify(&self, g: &Graph, node: NodeIndex) -> String {
        let orientation = match g.node(node).params {
            NodeParams::ApplyOrientation { orientation } => orientation,
            _ => -1,
        };
        format!(
            "apply_orientation({}) {}",
            orientation,
            stringify_stage(g.node(node).stage)
        )
    }

    fn populate_dimensions(
        &self,
        _ctx: &Context,
        _job: &mut Job,
        g: &mut Graph,
        node: NodeIndex,
    ) -> Result<()> {
        let orientation = match g.node(node).params {
            NodeParams::ApplyOrientation { orientation } => orientation,
            _ => return Err(err!(StatusCode::InvalidInternalState)),
        };
        // Flags 5..8 transpose the image.
        if orientation >= 5 && orientation <= 8 {
            dimensions_transpose(g, node)
        } else {
            dimensions_mimic_input(g, node)
        }
    }

    fn pre_optimize_flatten(
        &self,
        _ctx: &Context,
        _job: &mut Job,
        g: &mut Graph,
        node: NodeIndex,
    ) -> Result<FlattenResult> {
        let orientation = match g.node(node).params {
            NodeParams::ApplyOrientation { orientation } => orientation,
            _ => return Err(err!(StatusCode::InvalidInternalState)),
        };
        // EXIF: 1 = upright, 2 = flip H, 3 = rotate 180, 4 = flip V,
        // 5 = transpose, 6 = rotate 270, 7 = transverse, 8 = rotate 90.
        let replacement = match orientation {
            2 => g.create_flip_horizontal(None),
            3 => g.create_rotate_180(None),
            4 => g.create_flip_vertical(None),
            5 => g.create_transpose(None),
            6 => g.create_rotate_270(None),
            8 => g.create_rotate_90(None),
            7 => {
                let first = g.create_rotate_180(None);
                let last = g.create_transpose(Some(first));
                return Ok(FlattenResult::ReplacedBy { first, last });
            }
            _ => g.create_noop(None),
        };
        Ok(FlattenResult::ReplacedBy {
            first: replacement,
            last: replacement,
        })
    }
}

//--------------------------------------------------------------------------------------------------

pub struct FlipVerticalDef;

impl NodeDef for FlipVerticalDef {
    fn kind(&self) -> NodeKind {
        NodeKind::FlipVertical
    }

    fn name(&self) -> &'static str {
        "flip vertical"
    }

    fn populate_dimensions(
        &self,
        _ctx: &Context,
        _job: &mut Job,
        g: &mut Graph,
        node: NodeIndex,
    ) -> Result<()> {
        dimensions_mimic_input(g, node)
    }

    fn post_optimize_flatten(
        &self,
        _ctx: &Context,
        _job: &mut Job,
        g: &mut Graph,
        node: NodeIndex,
    ) -> Result<FlattenResult> {
        flatten_flip(g, node, NodeParams::FlipVerticalMutate)
    }
}

pub struct FlipHorizontalDef;

impl NodeDef for FlipHorizontalDef {
    fn kind(&self) -> NodeKind {
        NodeKind::FlipHorizontal
    }

    fn name(&self) -> &'static str {
        "flip horizontal"
    }

    fn populate_dimensions(
        &self,
        _ctx: &Context,
        _job: &mut Job,
        g: &mut Graph,
        node: NodeIndex,
    ) -> Result<()> {
        dimensions_mimic_input(g, node)
    }

    fn post_optimize_flatten(
        &self,
        _ctx: &Context,
        _job: &mut Job,
        g: &mut Graph,
        node: NodeIndex,
    ) -> Result<FlattenResult> {
        flatten_flip(g, node, NodeParams::FlipHorizontalMutate)
    }
}

/// When the input feeds anything else, insert a clone so the in-place
/// mutate cannot corrupt a sibling's pixels.
fn flatten_flip(g: &mut Graph, node: NodeIndex, mutate: NodeParams) -> Result<FlattenResult> {
    let input = input_node(g, node)?;
    let must_clone = node_has_other_dependents(g, input, node)?;
    if must_clone {
        let first = g.create_clone(None);
        let last = g.create_node(Some(first), mutate);
        Ok(FlattenResult::ReplacedBy { first, last })
    } else {
        let only = g.create_node(None, mutate);
        Ok(FlattenResult::ReplacedBy {
            first: only,
            last: only,
        })
    }
}

pub struct TransposeDef;

impl NodeDef for TransposeDef {
    fn kind(&self) -> NodeKind {
        NodeKind::Transpose
    }

    fn name(&self) -> &'static str {
        "transpose"
    }

    fn populate_dimensions(
        &self,
        _ctx: &Context,
        _job: &mut Job,
        g: &mut Graph,
        node: NodeIndex,
    ) -> Result<()> {
        dimensions_transpose(g, node)
    }

    fn post_optimize_flatten(
        &self,
        _ctx: &Context,
        _job: &mut Job,
        g: &mut Graph,
        node: NodeIndex,
    ) -> Result<FlattenResult> {
        let est = input_frame_est(g, node)?;
        let canvas = g.create_canvas(None, est.format, est.h, est.w, 0);
        set_optimized_and_update_state(g, canvas)?;
        // A transposing 1:1 render; the filter never resamples here.
        let render = g.create_render_to_canvas_1d(
            None,
            Render1dParams::simple(est.w, true, Filter::Robidoux),
        );
        g.add_edge(canvas, render, EdgeKind::Canvas)?;
        Ok(FlattenResult::ReplacedBy {
            first: render,
            last: render,
        })
    }
}

//--------------------------------------------------------------------------------------------------

pub struct FlipVerticalMutateDef;

impl NodeDef for FlipVerticalMutateDef {
    fn kind(&self) -> NodeKind {
        NodeKind::FlipVerticalMutate
    }

    fn name(&self) -> &'static str {
        "flip vertical mutate"
    }

    fn populate_dimensions(
        &self,
        _ctx: &Context,
        _job: &mut Job,
        g: &mut Graph,
        node: NodeIndex,
    ) -> Result<()> {
        dimensions_mimic_input(g, node)
    }

    fn execute(
        &self,
        _ctx: &Context,
        _job: &mut Job,
        g: &mut Graph,
        node: NodeIndex,
    ) -> Result<()> {
        let bitmap = input_result(g, node)?;
        bitmap.borrow_mut().flip_vertical();
        g.node_mut(node).result = Some(bitmap);
        Ok(())
    }
}

pub struct FlipHorizontalMutateDef;

impl NodeDef for FlipHorizontalMutateDef {
    fn kind(&self) -> NodeKind {
        NodeKind::FlipHorizontalMutate
    }

    fn name(&self) -> &'static str {
        "flip horizontal mutate"
    }

    fn populate_dimensions(
        &self,
        _ctx: &Context,
        _job: &mut Job,
        g: &mut Graph,
        node: NodeIndex,
    ) -> Result<()> {
        dimensions_mimic_input(g, node)
    }

    fn execute(
        &self,
        _ctx: &Context,
        _job: &mut Job,
        g: &mut Graph,
        node: NodeIndex,
    ) -> Result<()> {
        let bitmap = input_result(g, node)?;
        bitmap.borrow_mut().flip_horizontal();
        g.node_mut(node).result = Some(bitmap);
        Ok(())
    }
}
