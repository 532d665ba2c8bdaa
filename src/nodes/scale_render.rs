//! Scale lowering and the 1-D / fused 2-D render primitives.

use super::*;
use crate::color::WorkingFloatspace;
use crate::scaling::render1d::{render_to_canvas_1d, Render1dParams};
use crate::scaling::scale2d::{scale2d_render_to_canvas_1d, Scale2dParams};

pub struct ScaleDef;

impl NodeDef for ScaleDef {
    fn kind(&self) -> NodeKind {
        NodeKind::Scale
    }

    fn name(&self) -> &'static str {
        "scale"
    }

    fn stringify(&self, g: &Graph, node: NodeIndex) -> String {
        match g.node(node).params {
            NodeParams::Scale { width, height, .. } => format!(
                "scale {}x{} {}",
                width,
                height,
                stringify_stage(g.node(node).stage)
            ),
            _ => "scale".to_owned(),
        }
    }

    fn populate_dimensions(
        &self,
        _ctx: &Context,
        _job: &mut Job,
        g: &mut Graph,
        node: NodeIndex,
    ) -> Result<()> {
        let (width, height) = match g.node(node).params {
            NodeParams::Scale { width, height, .. } => (width, height),
            _ => return Err(err!(StatusCode::InvalidInternalState)),
        };
        let input = input_frame_est(g, node)?;
        g.node_mut(node).frame_est = Some(FrameEstimate {
            w: width,
            h: height,
            ..input
        });
        Ok(())
    }

    fn pre_optimize_flatten(
        &self,
        _ctx: &Context,
        _job: &mut Job,
        g: &mut Graph,
        node: NodeIndex,
    ) -> Result<FlattenResult> {
        let (width, height, filter, flags) = match g.node(node).params {
            NodeParams::Scale {
                width,
                height,
                downscale_filter,
                flags,
                ..
            } => (width, height, downscale_filter, flags),
            _ => return Err(err!(StatusCode::InvalidInternalState)),
        };
        let input = input_frame_est(g, node)?;

        if flags.contains(ScaleFlags::USE_SCALE2D) {
            let canvas = g.create_canvas(None, input.format, width, height, 0);
            set_optimized_and_update_state(g, canvas)?;
            let scale = g.create_scale_2d(
                None,
                Scale2dParams {
                    scale_to_width: width,
                    scale_to_height: height,
                    interpolation_filter: filter,
                    scale_in_colorspace: WorkingFloatspace::AsIs,
                    sharpen_percent_goal: 0.0,
                },
            );
            g.add_edge(canvas, scale, EdgeKind::Canvas)?;
            return Ok(FlattenResult::ReplacedBy {
                first: scale,
                last: scale,
            });
        }

        // Two transposing 1-D passes: the first scales the width, the
        // second (over the transposed frame) the height.
        let first = g.create_render1d(None, Render1dParams::simple(width, true, filter));
        let last = g.create_render1d(Some(first), Render1dParams::simple(height, true, filter));
        Ok(FlattenResult::ReplacedBy { first, last })
    }
}

//--------------------------------------------------------------------------------------------------

pub struct NoopDef;

impl NodeDef for NoopDef {
    fn kind(&self) -> NodeKind {
        NodeKind::Noop
    }

    fn name(&self) -> &'static str {
        "no-op"
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

    /// Deletes itself, reconnecting its input to every consumer.
    fn pre_optimize_flatten(
        &self,
        _ctx: &Context,
        _job: &mut Job,
        g: &mut Graph,
        node: NodeIndex,
    ) -> Result<FlattenResult> {
        let input = g.first_inbound_node_of_kind(node, EdgeKind::Input);
        if let Some(input) = input {
            for (_, target, kind) in g.outbound_edges(node) {
                g.add_edge(input, target, kind)?;
            }
        }
        g.delete_node(node)?;
        Ok(FlattenResult::Rewired)
    }
}

//--------------------------------------------------------------------------------------------------

fn render1d_params(params: &NodeParams) -> Result<Render1dParams> {
    match params {
        NodeParams::Render1D(p) | NodeParams::RenderToCanvas1D(p) => Ok(p.clone()),
        _ => Err(err!(StatusCode::InvalidInternalState)),
    }
}

fn stringify_render1d(name: &str, g: &Graph, node: NodeIndex) -> String {
    match render1d_params(&g.node(node).params) {
        Ok(info) => format!(
            "{} x{} {:?} {}\nat {},{}. {}sharp{}%. {:?}",
            name,
            info.scale_to_width,
            info.interpolation_filter,
            stringify_stage(g.node(node).stage),
            info.canvas_x,
            info.canvas_y,
            if info.transpose_on_write { "transpose. " } else { "" },
            info.sharpen_percent_goal as i32,
            info.scale_in_colorspace
        ),
        Err(_) => name.to_owned(),
    }
}

pub struct Render1DDef;

impl NodeDef for Render1DDef {
    fn kind(&self) -> NodeKind {
        NodeKind::Render1D
    }

    fn name(&self) -> &'static str {
        "render1d"
    }

    fn stringify(&self, g: &Graph, node: NodeIndex) -> String {
        stringify_render1d("render1d", g, node)
    }

    fn populate_dimensions(
        &self,
        _ctx: &Context,
        _job: &mut Job,
        g: &mut Graph,
        node: NodeIndex,
    ) -> Result<()> {
        let info = render1d_params(&g.node(node).params)?;
        let input = input_frame_est(g, node)?;
        let (w, h) = if info.transpose_on_write {
            (input.h, info.scale_to_width)
        } else {
            (info.scale_to_width, input.h)
        };
        g.node_mut(node).frame_est = Some(FrameEstimate {
            w,
            h,
            format: PixelFormat::Bgra32,
            alpha_meaningful: true,
        });
        Ok(())
    }

    fn post_optimize_flatten(
        &self,
        _ctx: &Context,
        _job: &mut Job,
        g: &mut Graph,
        node: NodeIndex,
    ) -> Result<FlattenResult> {
        let info = render1d_params(&g.node(node).params)?;
        let input = input_frame_est(g, node)?;
        let (c_w, c_h) = if info.transpose_on_write {
            (input.h, info.scale_to_width)
        } else {
            (info.scale_to_width, input.h)
        };
        let canvas = g.create_canvas(None, input.format, c_w, c_h, 0);
        set_optimized_and_update_state(g, canvas)?;
        let render = g.create_render_to_canvas_1d(None, info);
        g.add_edge(canvas, render, EdgeKind::Canvas)?;
        Ok(FlattenResult::ReplacedBy {
            first: render,
            last: render,
        })
    }
}

pub struct RenderToCanvas1DDef;

impl NodeDef for RenderToCanvas1DDef {
    fn kind(&self) -> NodeKind {
        NodeKind::RenderToCanvas1D
    }

    fn name(&self) -> &'static str {
        "render1d_p"
    }

    fn canvas_count(&self) -> i32 {
        1
    }

    fn stringify(&self, g: &Graph, node: NodeIndex) -> String {
        stringify_render1d("render1d_p", g, node)
    }

    fn populate_dimensions(
        &self,
        _ctx: &Context,
        _job: &mut Job,
        g: &mut Graph,
        node: NodeIndex,
    ) -> Result<()> {
        dimensions_of_canvas(g, node)
    }

    fn execute(
        &self,
        _ctx: &Context,
        _job: &mut Job,
        g: &mut Graph,
        node: NodeIndex,
    ) -> Result<()> {
        let info = render1d_params(&g.node(node).params)?;
        let input_ref = input_result(g, node)?;
        let canvas_ref = canvas_result(g, node)?;
        {
            let input = input_ref.borrow();
            let mut canvas = canvas_ref.borrow_mut();
            render_to_canvas_1d(&input, &mut canvas, &info)?;
        }
        g.node_mut(node).result = Some(canvas_ref);
        Ok(())
    }
}

pub struct Scale2DDef;

impl NodeDef for Scale2DDef {
    fn kind(&self) -> NodeKind {
        NodeKind::Scale2DRenderToCanvas1D
    }

    fn name(&self) -> &'static str {
        "scale2d_p"
    }

    fn canvas_count(&self) -> i32 {
        1
    }

    fn stringify(&self, g: &Graph, node: NodeIndex) -> String {
        match g.node(node).params {
            NodeParams::Scale2D(ref info) => format!(
                "scale2d -> {}x{} {:?} {} sharp{}%. {:?}",
                info.scale_to_width,
                info.scale_to_height,
                info.interpolation_filter,
                stringify_stage(g.node(node).stage),
                info.sharpen_percent_goal as i32,
                info.scale_in_colorspace
            ),
            _ => "scale2d_p".to_owned(),
        }
    }

    fn populate_dimensions(
        &self,
        _ctx: &Context,
        _job: &mut Job,
        g: &mut Graph,
        node: NodeIndex,
    ) -> Result<()> {
        dimensions_of_canvas(g, node)
    }

    fn execute(
        &self,
        _ctx: &Context,
        _job: &mut Job,
        g: &mut Graph,
        node: NodeIndex,
    ) -> Result<()> {
        let info = match g.node(node).params {
            NodeParams::Scale2D(ref info) => info.clone(),
            _ => return Err(err!(StatusCode::InvalidInternalState)),
        };
        let input_ref = input_result(g, node)?;
        let canvas_ref = canvas_result(g, node)?;
        {
            let input = input_ref.borrow();
            let mut canvas = canvas_ref.borrow_mut();
            scale2d_render_to_canvas_1d(&input, &mut canvas, &info)?;
        }
        g.node_mut(node).result = Some(canvas_ref);
        Ok(())
    }
}
