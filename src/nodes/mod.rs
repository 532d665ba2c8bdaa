//! Node definitions: the per-type contracts for dimensions, lowering, and
//! execution, plus the framework that dispatches them.

use crate::bitmaps::{BitmapRef, PixelFormat};
use crate::codecs::{DecoderDownscaleHints, EncoderHints};
use crate::context::{high_precision_ticks, Context};
use crate::err;
use crate::error::{Result, StatusCode};
use crate::graph::{EdgeKind, Graph, NodeIndex};
use crate::job::Job;
use crate::scaling::render1d::Render1dParams;
use crate::scaling::scale2d::Scale2dParams;
use crate::scaling::weights::Filter;
use bitflags::bitflags;
use lazy_static::lazy_static;
use std::cell::RefCell;
use std::rc::Rc;

mod clone_crop_fill_expand;
mod codecs_and_pointer;
mod create_canvas;
mod rotate_flip_transpose;
mod scale_render;

//--------------------------------------------------------------------------------------------------

bitflags! {
    /// Readiness bits. Higher bits require the lower ones (some tiers skip
    /// stages, which `update_state` grants automatically).
    pub struct NodeStage: u32 {
        const INPUT_DIMENSIONS_KNOWN = 1;
        const PRE_OPTIMIZE_FLATTENED = 2;
        const OPTIMIZED = 4;
        const POST_OPTIMIZE_FLATTENED = 8;
        const INPUTS_EXECUTED = 16;
        const EXECUTED = 32;
        const READY_FOR_OPTIMIZE = 3;
        const READY_FOR_POST_OPTIMIZE_FLATTEN = 7;
        const READY_FOR_EXECUTION = 31;
        const DONE = 63;
    }
}

bitflags! {
    pub struct ScaleFlags: u32 {
        const USE_SCALE2D = 1;
    }
}

/// Which phase of the lowering pipeline may touch a node type.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Tier {
    /// Directly executable leaves.
    Primitive,
    /// Subject to optimizer placement; lowered post-optimize.
    Optimizable,
    /// User-facing operations, lowered pre-optimize.
    HighLevel,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum NodeKind {
    // primitives
    FlipVerticalMutate,
    FlipHorizontalMutate,
    CropMutateAlias,
    CopyRectToCanvas,
    CreateCanvas,
    RenderToCanvas1D,
    Scale2DRenderToCanvas1D,
    FillRectMutate,
    BitmapPointer,
    PrimitiveDecoder,
    PrimitiveEncoder,
    // optimizable
    ExpandCanvas,
    Transpose,
    FlipVertical,
    FlipHorizontal,
    Render1D,
    Crop,
    // high-level
    Clone,
    Decoder,
    Encoder,
    Rotate90,
    Rotate180,
    Rotate270,
    ApplyOrientation,
    Scale,
    Noop,
}

impl NodeKind {
    pub fn tier(self) -> Tier {
        use self::NodeKind::*;
        match self {
            FlipVerticalMutate | FlipHorizontalMutate | CropMutateAlias | CopyRectToCanvas
            | CreateCanvas | RenderToCanvas1D | Scale2DRenderToCanvas1D | FillRectMutate
            | BitmapPointer | PrimitiveDecoder | PrimitiveEncoder => Tier::Primitive,
            ExpandCanvas | Transpose | FlipVertical | FlipHorizontal | Render1D | Crop => {
                Tier::Optimizable
            }
            Clone | Decoder | Encoder | Rotate90 | Rotate180 | Rotate270 | ApplyOrientation
            | Scale | Noop => Tier::HighLevel,
        }
    }

    pub fn is_primitive(self) -> bool {
        self.tier() == Tier::Primitive
    }

    pub fn is_high_level(self) -> bool {
        self.tier() == Tier::HighLevel
    }
}

//--------------------------------------------------------------------------------------------------

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct CropRect {
    pub x1: u32,
    pub y1: u32,
    pub x2: u32,
    pub y2: u32,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct CopyRect {
    pub from_x: u32,
    pub from_y: u32,
    pub width: u32,
    pub height: u32,
    pub x: u32,
    pub y: u32,
}

/// Codec placeholder state carried by decoder/encoder nodes. The codec
/// instance itself lives on the job; nodes hold the binding index.
#[derive(Clone, Debug)]
pub struct CodecParams {
    pub placeholder_id: i32,
    pub instance_index: Option<usize>,
    pub desired_encoder_id: i64,
    pub downscale_hints: DecoderDownscaleHints,
    pub encoder_hints: EncoderHints,
}

impl CodecParams {
    pub fn new(placeholder_id: i32) -> CodecParams {
        CodecParams {
            placeholder_id,
            instance_index: None,
            desired_encoder_id: 0,
            downscale_hints: DecoderDownscaleHints::default(),
            encoder_hints: EncoderHints::default(),
        }
    }
}

/// Out-slot a `BitmapPointer` node reads or fills.
pub type BitmapSlot = Rc<RefCell<Option<BitmapRef>>>;

pub fn new_bitmap_slot() -> BitmapSlot {
    Rc::new(RefCell::new(None))
}

#[derive(Clone)]
pub enum NodeParams {
    FlipVerticalMutate,
    FlipHorizontalMutate,
    CropMutateAlias(CropRect),
    CopyRectToCanvas(CopyRect),
    CreateCanvas {
        format: PixelFormat,
        width: u32,
        height: u32,
        bgcolor: u32,
    },
    RenderToCanvas1D(Render1dParams),
    Scale2D(Scale2dParams),
    FillRectMutate {
        rect: CropRect,
        color_srgb: u32,
    },
    BitmapPointer(BitmapSlot),
    PrimitiveDecoder(CodecParams),
    PrimitiveEncoder(CodecParams),
    ExpandCanvas {
        left: u32,
        top: u32,
        right: u32,
        bottom: u32,
        canvas_color_srgb: u32,
    },
    Transpose,
    FlipVertical,
    FlipHorizontal,
    Render1D(Render1dParams),
    Crop(CropRect),
    Clone,
    Decoder(CodecParams),
    Encoder(CodecParams),
    Rotate90,
    Rotate180,
    Rotate270,
    ApplyOrientation {
        orientation: i32,
    },
    Scale {
        width: u32,
        height: u32,
        downscale_filter: Filter,
        upscale_filter: Filter,
        flags: ScaleFlags,
    },
    Noop,
}

impl NodeParams {
    pub fn kind(&self) -> NodeKind {
        match self {
            NodeParams::FlipVerticalMutate => NodeKind::FlipVerticalMutate,
            NodeParams::FlipHorizontalMutate => NodeKind::FlipHorizontalMutate,
            NodeParams::CropMutateAlias(..) => NodeKind::CropMutateAlias,
            NodeParams::CopyRectToCanvas(..) => NodeKind::CopyRectToCanvas,
            NodeParams::CreateCanvas { .. } => NodeKind::CreateCanvas,
            NodeParams::RenderToCanvas1D(..) => NodeKind::RenderToCanvas1D,
            NodeParams::Scale2D(..) => NodeKind::Scale2DRenderToCanvas1D,
            NodeParams::FillRectMutate { .. } => NodeKind::FillRectMutate,
            NodeParams::BitmapPointer(..) => NodeKind::BitmapPointer,
            NodeParams::PrimitiveDecoder(..) => NodeKind::PrimitiveDecoder,
            NodeParams::PrimitiveEncoder(..) => NodeKind::PrimitiveEncoder,
            NodeParams::ExpandCanvas { .. } => NodeKind::ExpandCanvas,
            NodeParams::Transpose => NodeKind::Transpose,
            NodeParams::FlipVertical => NodeKind::FlipVertical,
            NodeParams::FlipHorizontal => NodeKind::FlipHorizontal,
            NodeParams::Render1D(..) => NodeKind::Render1D,
            NodeParams::Crop(..) => NodeKind::Crop,
            NodeParams::Clone => NodeKind::Clone,
            NodeParams::Decoder(..) => NodeKind::Decoder,
            NodeParams::Encoder(..) => NodeKind::Encoder,
            NodeParams::Rotate90 => NodeKind::Rotate90,
            NodeParams::Rotate180 => NodeKind::Rotate180,
            NodeParams::Rotate270 => NodeKind::Rotate270,
            NodeParams::ApplyOrientation { .. } => NodeKind::ApplyOrientation,
            NodeParams::Scale { .. } => NodeKind::Scale,
            NodeParams::Noop => NodeKind::Noop,
        }
    }
}

/// Result dimensions a node will produce, known before execution.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct FrameEstimate {
    pub w: u32,
    pub h: u32,
    pub format: PixelFormat,
    pub alpha_meaningful: bool,
}

impl FrameEstimate {
    pub fn format_name(&self) -> &'static str {
        match self.format {
            PixelFormat::Bgr24 => "bgr24",
            PixelFormat::Bgra32 => {
                if self.alpha_meaningful {
                    "bgra32"
                } else {
                    "bgr32"
                }
            }
            PixelFormat::Gray8 => "gray8",
        }
    }
}

pub struct Node {
    pub params: NodeParams,
    pub stage: NodeStage,
    pub frame_est: Option<FrameEstimate>,
    pub result: Option<BitmapRef>,
    pub ticks_elapsed: i64,
}

impl Node {
    pub fn new(params: NodeParams) -> Node {
        Node {
            params,
            stage: NodeStage::empty(),
            frame_est: None,
            result: None,
            ticks_elapsed: 0,
        }
    }

    pub fn kind(&self) -> NodeKind {
        self.params.kind()
    }
}

//--------------------------------------------------------------------------------------------------

/// What a shorthand flatten handler produced.
pub enum FlattenResult {
    /// The node rewrote itself in place (decoder/encoder retagging).
    KeepSelf,
    /// A fresh subgraph; the framework moves the original's edges onto it
    /// and deletes the original.
    ReplacedBy { first: NodeIndex, last: NodeIndex },
    /// The handler already rewired and deleted everything itself.
    Rewired,
}

/// Per-node-type contract. Hooks left at their defaults behave like absent
/// function pointers: the framework reports `Not_implemented` or supplies
/// the generic behavior.
pub trait NodeDef {
    fn kind(&self) -> NodeKind;
    fn name(&self) -> &'static str;

    /// Required inbound input edges; -1 accepts any number.
    fn input_count(&self) -> i32 {
        1
    }

    /// Required inbound canvas edges; -1 accepts any number.
    fn canvas_count(&self) -> i32 {
        0
    }

    fn prohibit_output_edges(&self) -> bool {
        false
    }

    fn stringify(&self, g: &Graph, node: NodeIndex) -> String {
        format!("{} {}", self.name(), stringify_stage(g.node(node).stage))
    }

    fn can_populate_dimensions(&self) -> bool {
        true
    }

    fn populate_dimensions(
        &self,
        _ctx: &Context,
        _job: &mut Job,
        _g: &mut Graph,
        _node: NodeIndex,
    ) -> Result<()> {
        Err(err!(
            StatusCode::NotImplemented,
            "populate_dimensions is not implemented for node type {}",
            self.name()
        ))
    }

    fn pre_optimize_flatten(
        &self,
        _ctx: &Context,
        _job: &mut Job,
        _g: &mut Graph,
        _node: NodeIndex,
    ) -> Result<FlattenResult> {
        Err(err!(
            StatusCode::NotImplemented,
            "pre_optimize flattening not implemented for node {}",
            self.name()
        ))
    }

    fn post_optimize_flatten(
        &self,
        _ctx: &Context,
        _job: &mut Job,
        _g: &mut Graph,
        _node: NodeIndex,
    ) -> Result<FlattenResult> {
        Err(err!(
            StatusCode::NotImplemented,
            "post_optimize flattening not implemented for node {}",
            self.name()
        ))
    }

    fn execute(
        &self,
        _ctx: &Context,
        _job: &mut Job,
        _g: &mut Graph,
        _node: NodeIndex,
    ) -> Result<()> {
        Err(err!(StatusCode::NotImplemented))
    }

    fn estimate_cost(&self, _g: &Graph, _node: NodeIndex) -> Result<(usize, usize)> {
        Err(err!(StatusCode::NotImplemented))
    }
}

pub fn stringify_stage(stage: NodeStage) -> String {
    format!("[{}/{}]", stage.bits(), NodeStage::DONE.bits())
}

lazy_static! {
    static ref NODE_DEFS: Vec<&'static (dyn NodeDef + Sync)> = vec![
        // High level: these flatten into more primitive nodes.
        &scale_render::ScaleDef,
        &scale_render::NoopDef,
        &clone_crop_fill_expand::CloneDef,
        &rotate_flip_transpose::Rotate90Def,
        &rotate_flip_transpose::Rotate180Def,
        &rotate_flip_transpose::Rotate270Def,
        &rotate_flip_transpose::ApplyOrientationDef,
        &codecs_and_pointer::DecoderDef,
        &codecs_and_pointer::EncoderDef,
        // Optimizable (non-mutating).
        &rotate_flip_transpose::FlipVerticalDef,
        &rotate_flip_transpose::FlipHorizontalDef,
        &rotate_flip_transpose::TransposeDef,
        &clone_crop_fill_expand::CropDef,
        &clone_crop_fill_expand::ExpandCanvasDef,
        &scale_render::Render1DDef,
        // Non-optimizable primitives.
        &scale_render::RenderToCanvas1DDef,
        &scale_render::Scale2DDef,
        &create_canvas::CreateCanvasDef,
        &rotate_flip_transpose::FlipVerticalMutateDef,
        &rotate_flip_transpose::FlipHorizontalMutateDef,
        &clone_crop_fill_expand::CropMutateAliasDef,
        &clone_crop_fill_expand::FillRectMutateDef,
        &clone_crop_fill_expand::CopyRectToCanvasDef,
        &codecs_and_pointer::BitmapPointerDef,
        &codecs_and_pointer::PrimitiveDecoderDef,
        &codecs_and_pointer::PrimitiveEncoderDef,
    ];
}

pub fn def_for(kind: NodeKind) -> Result<&'static (dyn NodeDef + Sync)> {
    NODE_DEFS
        .iter()
        .find(|d| d.kind() == kind)
        .cloned()
        .ok_or_else(|| err!(StatusCode::NotImplemented, "no definition for {:?}", kind))
}

//--------------------------------------------------------------------------------------------------
// Framework helpers shared by the definitions.

pub fn input_node(g: &Graph, node: NodeIndex) -> Result<NodeIndex> {
    g.first_inbound_node_of_kind(node, EdgeKind::Input)
        .ok_or_else(|| err!(StatusCode::InvalidInputsToNode, "missing input edge"))
}

pub fn canvas_node(g: &Graph, node: NodeIndex) -> Result<NodeIndex> {
    g.first_inbound_node_of_kind(node, EdgeKind::Canvas)
        .ok_or_else(|| err!(StatusCode::InvalidInputsToNode, "missing canvas edge"))
}

pub fn input_frame_est(g: &Graph, node: NodeIndex) -> Result<FrameEstimate> {
    let input = input_node(g, node)?;
    g.node(input)
        .frame_est
        .ok_or_else(|| err!(StatusCode::InvalidInputsToNode, "input dimensions unknown"))
}

pub(crate) fn dimensions_mimic_input(g: &mut Graph, node: NodeIndex) -> Result<()> {
    let est = input_frame_est(g, node)?;
    g.node_mut(node).frame_est = Some(est);
    Ok(())
}

pub(crate) fn dimensions_transpose(g: &mut Graph, node: NodeIndex) -> Result<()> {
    let est = input_frame_est(g, node)?;
    g.node_mut(node).frame_est = Some(FrameEstimate {
        w: est.h,
        h: est.w,
        ..est
    });
    Ok(())
}

/// The canvas decides the result shape for primitives that write into one.
pub(crate) fn dimensions_of_canvas(g: &mut Graph, node: NodeIndex) -> Result<()> {
    let canvas = canvas_node(g, node)?;
    let est = g
        .node(canvas)
        .frame_est
        .ok_or_else(|| err!(StatusCode::InvalidInputsToNode, "canvas dimensions unknown"))?;
    g.node_mut(node).frame_est = Some(est);
    Ok(())
}

pub fn input_result(g: &Graph, node: NodeIndex) -> Result<BitmapRef> {
    let input = input_node(g, node)?;
    g.node(input)
        .result
        .clone()
        .ok_or_else(|| err!(StatusCode::InvalidInputsToNode, "input has no result bitmap"))
}

pub fn canvas_result(g: &Graph, node: NodeIndex) -> Result<BitmapRef> {
    let canvas = canvas_node(g, node)?;
    g.node(canvas)
        .result
        .clone()
        .ok_or_else(|| err!(StatusCode::InvalidInputsToNode, "canvas has no result bitmap"))
}

/// Whether the input could be mutated in place, or must be cloned first
/// because something else depends on it. Conservatively always clones.
pub fn node_has_other_dependents(
    _g: &Graph,
    _input: NodeIndex,
    _excluding: NodeIndex,
) -> Result<bool> {
    Ok(true)
}

pub fn inputs_have_dimensions(g: &Graph, node: NodeIndex) -> bool {
    g.inbound_edges(node)
        .into_iter()
        .all(|(_, source, _)| g.node(source).frame_est.is_some())
}

pub fn all_inputs_executed(g: &Graph, node: NodeIndex) -> bool {
    g.inbound_edges(node)
        .into_iter()
        .all(|(_, source, _)| g.node(source).stage.contains(NodeStage::EXECUTED))
}

pub fn validate_edges(g: &Graph, node: NodeIndex) -> Result<()> {
    let def = def_for(g.node(node).kind())?;
    let inputs = g.inbound_count_of_kind(node, EdgeKind::Input) as i32;
    let canvases = g.inbound_count_of_kind(node, EdgeKind::Canvas) as i32;
    if def.input_count() > -1 && def.input_count() != inputs {
        return Err(err!(
            StatusCode::InvalidInputsToNode,
            "{} requires {} input edges, found {}",
            def.name(),
            def.input_count(),
            inputs
        ));
    }
    if def.canvas_count() > -1 && def.canvas_count() != canvases {
        return Err(err!(
            StatusCode::InvalidInputsToNode,
            "{} requires {} canvas edges, found {}",
            def.name(),
            def.canvas_count(),
            canvases
        ));
    }
    if def.prohibit_output_edges() && g.outbound_count(node) > 0 {
        return Err(err!(
            StatusCode::GraphInvalid,
            "this node ({}) cannot have outbound edges - found {}",
            def.name(),
            g.outbound_count(node)
        ));
    }
    Ok(())
}

pub fn stringify(g: &Graph, node: NodeIndex) -> String {
    match def_for(g.node(node).kind()) {
        Ok(def) => def.stringify(g, node),
        Err(_) => "(unknown)".to_owned(),
    }
}

/// Recomputes the readiness bits from scratch. Stage grants are cumulative:
/// a tier that skips a phase receives that phase's bit as soon as the
/// preceding ones hold.
pub fn update_state(g: &mut Graph, node: NodeIndex) -> Result<()> {
    let input_dimensions_known = inputs_have_dimensions(g, node);
    let tier = g.node(node).kind().tier();
    let optimization_allowed = tier != Tier::HighLevel;
    let is_executable_primitive = tier == Tier::Primitive;
    let optimized = g.node(node).stage.contains(NodeStage::OPTIMIZED);
    let executed = g.node(node).stage.contains(NodeStage::EXECUTED);

    let mut stage = NodeStage::empty();

    if input_dimensions_known {
        stage |= NodeStage::INPUT_DIMENSIONS_KNOWN;
    } else if executed {
        // Flattening can orphan dimensions, but never on an executed node.
        return Err(err!(StatusCode::InvalidInternalState));
    }

    if !optimization_allowed {
        if optimized || executed || is_executable_primitive {
            return Err(err!(StatusCode::InvalidInternalState));
        }
        g.node_mut(node).stage = stage;
        return Ok(());
    }
    stage |= NodeStage::PRE_OPTIMIZE_FLATTENED;

    if !optimized {
        if executed {
            return Err(err!(StatusCode::InvalidInternalState));
        }
        g.node_mut(node).stage = stage;
        return Ok(());
    }
    stage |= NodeStage::OPTIMIZED;

    if !is_executable_primitive {
        if executed {
            return Err(err!(StatusCode::InvalidInternalState));
        }
        g.node_mut(node).stage = stage;
        return Ok(());
    }
    stage |= NodeStage::POST_OPTIMIZE_FLATTENED;

    if !all_inputs_executed(g, node) {
        if executed {
            return Err(err!(StatusCode::InvalidInternalState));
        }
        g.node_mut(node).stage = stage;
        return Ok(());
    }
    stage |= NodeStage::INPUTS_EXECUTED;

    if executed {
        stage |= NodeStage::EXECUTED;
    }
    g.node_mut(node).stage = stage;
    Ok(())
}

pub fn set_optimized_and_update_state(g: &mut Graph, node: NodeIndex) -> Result<()> {
    g.node_mut(node).stage |= NodeStage::OPTIMIZED;
    update_state(g, node)
}

pub fn populate_dimensions(
    ctx: &Context,
    job: &mut Job,
    g: &mut Graph,
    node: NodeIndex,
) -> Result<()> {
    validate_edges(g, node)?;
    let def = def_for(g.node(node).kind())?;
    def.populate_dimensions(ctx, job, g, node)
}

/// Runs the pre- or post-optimize flatten and performs the edge surgery the
/// shorthand shape leaves to the framework.
pub fn flatten_generic(
    ctx: &Context,
    job: &mut Job,
    g: &mut Graph,
    node: NodeIndex,
    post_optimize: bool,
) -> Result<()> {
    validate_edges(g, node)?;
    let def = def_for(g.node(node).kind())?;
    let result = if post_optimize {
        def.post_optimize_flatten(ctx, job, g, node)?
    } else {
        def.pre_optimize_flatten(ctx, job, g, node)?
    };
    match result {
        FlattenResult::KeepSelf | FlattenResult::Rewired => Ok(()),
        FlattenResult::ReplacedBy { first, last } => {
            if first == node || last == node {
                // Handlers must either keep themselves whole or return only
                // fresh nodes.
                return Err(err!(
                    StatusCode::InvalidInputsToNode,
                    "flatten for {} mixed the original node into its replacement",
                    def.name()
                ));
            }
            g.duplicate_edges_to_another_node(node, first, true, false)?;
            g.duplicate_edges_to_another_node(node, last, false, true)?;
            g.delete_node(node)
        }
    }
}

/// Executes a primitive node, recording elapsed ticks and marking it done.
pub fn execute_node(ctx: &Context, job: &mut Job, g: &mut Graph, node: NodeIndex) -> Result<()> {
    validate_edges(g, node)?;
    let def = def_for(g.node(node).kind())?;
    ctx.profiler_start(def.name(), false);
    let start = high_precision_ticks();
    let result = def.execute(ctx, job, g, node);
    g.node_mut(node).ticks_elapsed += high_precision_ticks() - start;
    ctx.profiler_stop(def.name(), true, false);
    result?;
    g.node_mut(node).stage |= NodeStage::EXECUTED;
    update_state(g, node)
}

//--------------------------------------------------------------------------------------------------
// Graph construction helpers, one per user-facing operation.

impl Graph {
    pub fn create_canvas(
        &mut self,
        prev: Option<NodeIndex>,
        format: PixelFormat,
        width: u32,
        height: u32,
        bgcolor: u32,
    ) -> NodeIndex {
        self.create_node(
            prev,
            NodeParams::CreateCanvas {
                format,
                width,
                height,
                bgcolor,
            },
        )
    }

    pub fn create_noop(&mut self, prev: Option<NodeIndex>) -> NodeIndex {
        self.create_node(prev, NodeParams::Noop)
    }

    pub fn create_clone(&mut self, prev: Option<NodeIndex>) -> NodeIndex {
        self.create_node(prev, NodeParams::Clone)
    }

    pub fn create_scale(
        &mut self,
        prev: Option<NodeIndex>,
        width: u32,
        height: u32,
        downscale_filter: Filter,
        upscale_filter: Filter,
        flags: ScaleFlags,
    ) -> NodeIndex {
        self.create_node(
            prev,
            NodeParams::Scale {
                width,
                height,
                downscale_filter,
                upscale_filter,
                flags,
            },
        )
    }

    pub fn create_rotate_90(&mut self, prev: Option<NodeIndex>) -> NodeIndex {
        self.create_node(prev, NodeParams::Rotate90)
    }

    pub fn create_rotate_180(&mut self, prev: Option<NodeIndex>) -> NodeIndex {
        self.create_node(prev, NodeParams::Rotate180)
    }

    pub fn create_rotate_270(&mut self, prev: Option<NodeIndex>) -> NodeIndex {
        self.create_node(prev, NodeParams::Rotate270)
    }

    pub fn create_apply_orientation(
        &mut self,
        prev: Option<NodeIndex>,
        exif_orientation_flag: i32,
    ) -> NodeIndex {
        self.create_node(
            prev,
            NodeParams::ApplyOrientation {
                orientation: exif_orientation_flag,
            },
        )
    }

    pub fn create_transpose(&mut self, prev: Option<NodeIndex>) -> NodeIndex {
        self.create_node(prev, NodeParams::Transpose)
    }

    pub fn create_flip_vertical(&mut self, prev: Option<NodeIndex>) -> NodeIndex {
        self.create_node(prev, NodeParams::FlipVertical)
    }

    pub fn create_flip_horizontal(&mut self, prev: Option<NodeIndex>) -> NodeIndex {
        self.create_node(prev, NodeParams::FlipHorizontal)
    }

    pub fn create_primitive_flip_vertical(&mut self, prev: Option<NodeIndex>) -> NodeIndex {
        self.create_node(prev, NodeParams::FlipVerticalMutate)
    }

    pub fn create_primitive_flip_horizontal(&mut self, prev: Option<NodeIndex>) -> NodeIndex {
        self.create_node(prev, NodeParams::FlipHorizontalMutate)
    }

    pub fn create_crop(
        &mut self,
        prev: Option<NodeIndex>,
        x1: u32,
        y1: u32,
        x2: u32,
        y2: u32,
    ) -> NodeIndex {
        self.create_node(prev, NodeParams::Crop(CropRect { x1, y1, x2, y2 }))
    }

    pub fn create_primitive_crop(
        &mut self,
        prev: Option<NodeIndex>,
        x1: u32,
        y1: u32,
        x2: u32,
        y2: u32,
    ) -> NodeIndex {
        self.create_node(prev, NodeParams::CropMutateAlias(CropRect { x1, y1, x2, y2 }))
    }

    pub fn create_expand_canvas(
        &mut self,
        prev: Option<NodeIndex>,
        left: u32,
        top: u32,
        right: u32,
        bottom: u32,
        canvas_color_srgb: u32,
    ) -> NodeIndex {
        self.create_node(
            prev,
            NodeParams::ExpandCanvas {
                left,
                top,
                right,
                bottom,
                canvas_color_srgb,
            },
        )
    }

    pub fn create_fill_rect(
        &mut self,
        prev: Option<NodeIndex>,
        x1: u32,
        y1: u32,
        x2: u32,
        y2: u32,
        color_srgb: u32,
    ) -> NodeIndex {
        self.create_node(
            prev,
            NodeParams::FillRectMutate {
                rect: CropRect { x1, y1, x2, y2 },
                color_srgb,
            },
        )
    }

    pub fn create_primitive_copy_rect_to_canvas(
        &mut self,
        prev: Option<NodeIndex>,
        from_x: u32,
        from_y: u32,
        width: u32,
        height: u32,
        x: u32,
        y: u32,
    ) -> NodeIndex {
        self.create_node(
            prev,
            NodeParams::CopyRectToCanvas(CopyRect {
                from_x,
                from_y,
                width,
                height,
                x,
                y,
            }),
        )
    }

    pub fn create_decoder(&mut self, prev: Option<NodeIndex>, placeholder_id: i32) -> NodeIndex {
        self.create_node(prev, NodeParams::Decoder(CodecParams::new(placeholder_id)))
    }

    pub fn create_encoder(
        &mut self,
        prev: Option<NodeIndex>,
        placeholder_id: i32,
        desired_encoder_id: i64,
    ) -> NodeIndex {
        let mut params = CodecParams::new(placeholder_id);
        params.desired_encoder_id = desired_encoder_id;
        self.create_node(prev, NodeParams::Encoder(params))
    }

    pub fn create_bitmap_bgra_reference(
        &mut self,
        prev: Option<NodeIndex>,
        slot: BitmapSlot,
    ) -> NodeIndex {
        self.create_node(prev, NodeParams::BitmapPointer(slot))
    }

    pub fn create_render1d(
        &mut self,
        prev: Option<NodeIndex>,
        params: Render1dParams,
    ) -> NodeIndex {
        self.create_node(prev, NodeParams::Render1D(params))
    }

    pub fn create_render_to_canvas_1d(
        &mut self,
        prev: Option<NodeIndex>,
        params: Render1dParams,
    ) -> NodeIndex {
        self.create_node(prev, NodeParams::RenderToCanvas1D(params))
    }

    pub fn create_scale_2d(
        &mut self,
        prev: Option<NodeIndex>,
        params: Scale2dParams,
    ) -> NodeIndex {
        self.create_node(prev, NodeParams::Scale2D(params))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tier_partition() {
        assert_eq!(NodeKind::CreateCanvas.tier(), Tier::Primitive);
        assert_eq!(NodeKind::Render1D.tier(), Tier::Optimizable);
        assert_eq!(NodeKind::Scale.tier(), Tier::HighLevel);
        assert!(NodeKind::PrimitiveDecoder.is_primitive());
        assert!(NodeKind::ApplyOrientation.is_high_level());
    }

    #[test]
    fn test_every_kind_has_a_definition() {
        let kinds = [
            NodeKind::FlipVerticalMutate,
            NodeKind::FlipHorizontalMutate,
            NodeKind::CropMutateAlias,
            NodeKind::CopyRectToCanvas,
            NodeKind::CreateCanvas,
            NodeKind::RenderToCanvas1D,
            NodeKind::Scale2DRenderToCanvas1D,
            NodeKind::FillRectMutate,
            NodeKind::BitmapPointer,
            NodeKind::PrimitiveDecoder,
            NodeKind::PrimitiveEncoder,
            NodeKind::ExpandCanvas,
            NodeKind::Transpose,
            NodeKind::FlipVertical,
            NodeKind::FlipHorizontal,
            NodeKind::Render1D,
            NodeKind::Crop,
            NodeKind::Clone,
            NodeKind::Decoder,
            NodeKind::Encoder,
            NodeKind::Rotate90,
            NodeKind::Rotate180,
            NodeKind::Rotate270,
            NodeKind::ApplyOrientation,
            NodeKind::Scale,
            NodeKind::Noop,
        ];
        for kind in kinds.iter() {
            let def = def_for(*kind).unwrap();
            assert_eq!(def.kind(), *kind);
            assert!(!def.name().is_empty());
        }
    }

    #[test]
    fn test_update_state_grants_skipped_stages() {
        let mut g = Graph::create();
        // A canvas primitive with no inputs: dimensions vacuously known.
        let id = g.create_canvas(None, PixelFormat::Bgra32, 4, 4, 0);
        update_state(&mut g, id).unwrap();
        assert_eq!(g.node(id).stage, NodeStage::READY_FOR_OPTIMIZE);
        set_optimized_and_update_state(&mut g, id).unwrap();
        assert!(g.node(id).stage.contains(NodeStage::READY_FOR_EXECUTION));
    }

    #[test]
    fn test_validate_edges_counts() {
        let mut g = Graph::create();
        let lone_crop = g.create_crop(None, 0, 0, 1, 1);
        assert_eq!(
            validate_edges(&g, lone_crop).unwrap_err().status,
            StatusCode::InvalidInputsToNode
        );
        let canvas = g.create_canvas(None, PixelFormat::Bgra32, 2, 2, 0);
        let crop = g.create_crop(Some(canvas), 0, 0, 1, 1);
        assert!(validate_edges(&g, crop).is_ok());
    }
}
