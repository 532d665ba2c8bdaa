//! Clone, crop (including the aliasing primitive), canvas expansion, rect
//! filling, and rect copying.

use super::*;
use crate::bitmaps::BitmapBgra;
use std::rc::Rc;

pub struct CloneDef;

impl NodeDef for CloneDef {
    fn kind(&self) -> NodeKind {
        NodeKind::Clone
    }

    fn name(&self) -> &'static str {
        "clone"
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
        node: NodeIndex,
    ) -> Result<FlattenResult> {
        let est = input_frame_est(g, node)?;
        let canvas = g.create_canvas(None, est.format, est.w, est.h, 0);
        // Blit the whole input frame onto the fresh canvas.
        let copy = g.create_primitive_copy_rect_to_canvas(None, 0, 0, est.w, est.h, 0, 0);
        g.add_edge(canvas, copy, EdgeKind::Canvas)?;
        Ok(FlattenResult::ReplacedBy {
            first: copy,
            last: copy,
        })
    }
}

//--------------------------------------------------------------------------------------------------

fn crop_rect(params: &NodeParams) -> Result<CropRect> {
    match params {
        NodeParams::Crop(rect) | NodeParams::CropMutateAlias(rect) => Ok(*rect),
        _ => Err(err!(StatusCode::InvalidInternalState)),
    }
}

fn dimensions_crop(g: &mut Graph, node: NodeIndex) -> Result<()> {
    let rect = crop_rect(&g.node(node).params)?;
    let input = input_frame_est(g, node)?;
    if rect.x2 <= rect.x1 || rect.y2 <= rect.y1 {
        return Err(err!(
            StatusCode::InvalidArgument,
            "crop rectangle ({},{})-({},{}) is empty",
            rect.x1,
            rect.y1,
            rect.x2,
            rect.y2
        ));
    }
    if rect.x1 >= input.w || rect.x2 > input.w {
        return Err(err!(
            StatusCode::InvalidArgument,
            "crop arguments x1={}, x2={} are outside the width bound of the input frame ({})",
            rect.x1,
            rect.x2,
            input.w
        ));
    }
    if rect.y1 >= input.h || rect.y2 > input.h {
        return Err(err!(
            StatusCode::InvalidArgument,
            "crop arguments y1={}, y2={} are outside the height bound of the input frame ({})",
            rect.y1,
            rect.y2,
            input.h
        ));
    }
    g.node_mut(node).frame_est = Some(FrameEstimate {
        w: rect.x2 - rect.x1,
        h: rect.y2 - rect.y1,
        ..input
    });
    Ok(())
}

pub struct CropDef;

impl NodeDef for CropDef {
    fn kind(&self) -> NodeKind {
        NodeKind::Crop
    }

    fn name(&self) -> &'static str {
        "crop"
    }

    fn populate_dimensions(
        &self,
        _ctx: &Context,
        _job: &mut Job,
        g: &mut Graph,
        node: NodeIndex,
    ) -> Result<()> {
        dimensions_crop(g, node)
    }

    fn post_optimize_flatten(
        &self,
        _ctx: &Context,
        _job: &mut Job,
        g: &mut Graph,
        node: NodeIndex,
    ) -> Result<FlattenResult> {
        let rect = crop_rect(&g.node(node).params)?;
        let input = input_node(g, node)?;
        let must_clone = node_has_other_dependents(g, input, node)?;
        if must_clone {
            let first = g.create_clone(None);
            let last = g.create_primitive_crop(Some(first), rect.x1, rect.y1, rect.x2, rect.y2);
            Ok(FlattenResult::ReplacedBy { first, last })
        } else {
            let only = g.create_primitive_crop(None, rect.x1, rect.y1, rect.x2, rect.y2);
            Ok(FlattenResult::ReplacedBy {
                first: only,
                last: only,
            })
        }
    }
}

pub struct CropMutateAliasDef;

impl NodeDef for CropMutateAliasDef {
    fn kind(&self) -> NodeKind {
        NodeKind::CropMutateAlias
    }

    fn name(&self) -> &'static str {
        "crop mutate/alias"
    }

    fn populate_dimensions(
        &self,
        _ctx: &Context,
        _job: &mut Job,
        g: &mut Graph,
        node: NodeIndex,
    ) -> Result<()> {
        dimensions_crop(g, node)
    }

    fn execute(
        &self,
        _ctx: &Context,
        _job: &mut Job,
        g: &mut Graph,
        node: NodeIndex,
    ) -> Result<()> {
        let rect = crop_rect(&g.node(node).params)?;
        let original = input_result(g, node)?;
        // A window over the input's pixels: same stride, shifted origin.
        // Its pixels live exactly as long as the input's do.
        let window = original.borrow().window(rect.x1, rect.y1, rect.x2, rect.y2)?;
        g.node_mut(node).result = Some(Rc::new(RefCell::new(window)));
        Ok(())
    }
}

//--------------------------------------------------------------------------------------------------

pub struct ExpandCanvasDef;

impl NodeDef for ExpandCanvasDef {
    fn kind(&self) -> NodeKind {
        NodeKind::ExpandCanvas
    }

    fn name(&self) -> &'static str {
        "expand_canvas"
    }

    fn populate_dimensions(
        &self,
        _ctx: &Context,
        _job: &mut Job,
        g: &mut Graph,
        node: NodeIndex,
    ) -> Result<()> {
        let (left, top, right, bottom) = match g.node(node).params {
            NodeParams::ExpandCanvas {
                left,
                top,
                right,
                bottom,
                ..
            } => (left, top, right, bottom),
            _ => return Err(err!(StatusCode::InvalidInternalState)),
        };
        let input = input_frame_est(g, node)?;
        g.node_mut(node).frame_est = Some(FrameEstimate {
            w: input.w + left + right,
            h: input.h + top + bottom,
            ..input
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
        let (left, top, right, bottom, color) = match g.node(node).params {
            NodeParams::ExpandCanvas {
                left,
                top,
                right,
                bottom,
                canvas_color_srgb,
            } => (left, top, right, bottom, canvas_color_srgb),
            _ => return Err(err!(StatusCode::InvalidInternalState)),
        };
        let input = input_frame_est(g, node)?;
        let canvas_w = input.w + left + right;
        let canvas_h = input.h + top + bottom;

        let canvas = g.create_canvas(None, input.format, canvas_w, canvas_h, 0);
        let copy =
            g.create_primitive_copy_rect_to_canvas(None, 0, 0, input.w, input.h, left, top);
        g.add_edge(canvas, copy, EdgeKind::Canvas)?;

        let first = copy;
        let mut last = copy;
        if left > 0 {
            last = g.create_fill_rect(Some(last), 0, 0, left, canvas_h, color);
        }
        if top > 0 {
            last = g.create_fill_rect(Some(last), left, 0, canvas_w, top, color);
        }
        if bottom > 0 {
            last = g.create_fill_rect(Some(last), left, canvas_h - bottom, canvas_w, canvas_h, color);
        }
        if right > 0 {
            last = g.create_fill_rect(Some(last), canvas_w - right, top, canvas_w, canvas_h - bottom, color);
        }
        Ok(FlattenResult::ReplacedBy { first, last })
    }
}

//--------------------------------------------------------------------------------------------------

pub struct FillRectMutateDef;

impl NodeDef for FillRectMutateDef {
    fn kind(&self) -> NodeKind {
        NodeKind::FillRectMutate
    }

    fn name(&self) -> &'static str {
        "fill rect"
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
        let (rect, color) = match g.node(node).params {
            NodeParams::FillRectMutate { rect, color_srgb } => (rect, color_srgb),
            _ => return Err(err!(StatusCode::InvalidInternalState)),
        };
        let bitmap = input_result(g, node)?;
        bitmap
            .borrow_mut()
            .fill_rect(rect.x1, rect.y1, rect.x2, rect.y2, color)?;
        g.node_mut(node).result = Some(bitmap);
        Ok(())
    }
}

//--------------------------------------------------------------------------------------------------

pub struct CopyRectToCanvasDef;

impl NodeDef for CopyRectToCanvasDef {
    fn kind(&self) -> NodeKind {
        NodeKind::CopyRectToCanvas
    }

    fn name(&self) -> &'static str {
        "copy rect"
    }

    fn canvas_count(&self) -> i32 {
        1
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
            NodeParams::CopyRectToCanvas(info) => info,
            _ => return Err(err!(StatusCode::InvalidInternalState)),
        };
        let input_ref = input_result(g, node)?;
        let canvas_ref = canvas_result(g, node)?;
        {
            let input = input_ref.borrow();
            let mut canvas = canvas_ref.borrow_mut();
            copy_rect(&input, &mut canvas, &info)?;
        }
        g.node_mut(node).result = Some(canvas_ref);
        Ok(())
    }
}

fn copy_rect(input: &BitmapBgra, canvas: &mut BitmapBgra, info: &CopyRect) -> Result<()> {
    if input.fmt != canvas.fmt {
        return Err(err!(
            StatusCode::InvalidArgument,
            "copy_rect between mismatched formats"
        ));
    }
    if info.from_x + info.width > input.w
        || info.from_y + info.height > input.h
        || info.x + info.width > canvas.w
        || info.y + info.height > canvas.h
    {
        return Err(err!(
            StatusCode::InvalidArgument,
            "copy_rect {}x{} from ({},{}) to ({},{}) out of bounds",
            info.width,
            info.height,
            info.from_x,
            info.from_y,
            info.x,
            info.y
        ));
    }
    let bpp = input.fmt.bytes_per_pixel();
    let full_frame = info.x == 0
        && info.y == 0
        && info.from_x == 0
        && info.from_y == 0
        && info.width == input.w
        && info.width == canvas.w
        && info.height == input.h
        && info.height == canvas.h
        && canvas.stride == input.stride;
    let in_stride = input.stride as usize;
    let out_stride = canvas.stride as usize;
    input.pixels(|src| {
        canvas.pixels_mut(|dst| {
            if full_frame {
                let len = in_stride * input.h as usize;
                dst[..len].copy_from_slice(&src[..len]);
            } else {
                let row_bytes = info.width as usize * bpp;
                for y in 0..info.height as usize {
                    let from = in_stride * (info.from_y as usize + y) + bpp * info.from_x as usize;
                    let to = out_stride * (info.y as usize + y) + bpp * info.x as usize;
                    dst[to..to + row_bytes].copy_from_slice(&src[from..from + row_bytes]);
                }
            }
        })
    });
    if full_frame {
        canvas.alpha_meaningful = input.alpha_meaningful;
    }
    Ok(())
}
