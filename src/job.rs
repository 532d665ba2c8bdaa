//! Job state and the fixed-point driver: bind codecs, populate dimensions,
//! flatten, optimize, flatten again, execute, until every node is done.

use crate::bitmaps::BitmapBgra;
use crate::codecs::{CodecInstance, EncoderHints, FrameInfo};
use crate::context::Context;
use crate::err;
use crate::error::{Result, StatusCode};
use crate::graph::Graph;
use crate::io::{IoDirection, IoProxy};
use crate::nodes::{self, NodeParams, NodeStage, Tier};
use crate::visualize;
use log::debug;

pub const DEFAULT_MAX_PASSES: i32 = 40;

pub struct Job {
    pub debug_job_id: i32,
    pub next_graph_version: i32,
    /// Safety bound on calc/flatten/execute iterations.
    pub max_calc_flatten_execute_passes: i32,
    pub record_graph_versions: bool,
    /// Passes consumed by the most recent `execute` call.
    pub passes_used: i32,
    codecs: Vec<CodecInstance>,
}

impl Job {
    pub fn create() -> Job {
        Job {
            debug_job_id: 0,
            next_graph_version: 0,
            max_calc_flatten_execute_passes: DEFAULT_MAX_PASSES,
            record_graph_versions: false,
            passes_used: 0,
            codecs: Vec::new(),
        }
    }

    //---------------------------------------------------------------- codec/io binding

    pub fn add_io(&mut self, io: IoProxy, placeholder_id: i32, direction: IoDirection) {
        self.codecs
            .push(CodecInstance::new(placeholder_id, direction, io));
    }

    pub fn instance_index_by_placeholder(&self, placeholder_id: i32) -> Result<usize> {
        self.codecs
            .iter()
            .position(|c| c.placeholder_id == placeholder_id)
            .ok_or_else(|| {
                err!(
                    StatusCode::InvalidArgument,
                    "no I/O bound for placeholder {}",
                    placeholder_id
                )
            })
    }

    pub fn io_mut(&mut self, placeholder_id: i32) -> Result<&mut IoProxy> {
        let index = self.instance_index_by_placeholder(placeholder_id)?;
        Ok(&mut self.codecs[index].io)
    }

    /// Binds the requested encoder codec to the placeholder ahead of
    /// execution.
    pub fn initialize_encoder(
        &mut self,
        ctx: &Context,
        placeholder_id: i32,
        codec_id: i64,
    ) -> Result<()> {
        let index = self.instance_index_by_placeholder(placeholder_id)?;
        self.initialize_encoder_codec(ctx, index, codec_id)
    }

    pub(crate) fn initialize_encoder_codec(
        &mut self,
        ctx: &Context,
        index: usize,
        desired_encoder_id: i64,
    ) -> Result<()> {
        let instance = &mut self.codecs[index];
        if instance.codec.is_some() {
            return Ok(());
        }
        // Zero means "placeholder mode": keep whatever id is already bound.
        if desired_encoder_id != 0 {
            instance.codec_id = desired_encoder_id;
        }
        let mut codec = {
            let registry = ctx.codecs();
            let def = registry.get(instance.codec_id)?;
            (def.factory)()
        };
        codec.initialize(&mut instance.io)?;
        instance.codec = Some(codec);
        Ok(())
    }

    pub(crate) fn decoder_frame_info(&mut self, index: usize) -> Result<FrameInfo> {
        let instance = &mut self.codecs[index];
        let codec = instance
            .codec
            .as_mut()
            .ok_or_else(|| err!(StatusCode::InvalidInternalState, "codec has not been initialized"))?;
        codec.get_frame_info(&mut instance.io)
    }

    pub(crate) fn decoder_read_frame(&mut self, index: usize, canvas: &mut BitmapBgra) -> Result<()> {
        let instance = &mut self.codecs[index];
        let codec = instance
            .codec
            .as_mut()
            .ok_or_else(|| err!(StatusCode::InvalidInternalState, "codec has not been initialized"))?;
        codec.read_frame(&mut instance.io, canvas)
    }

    pub(crate) fn encoder_write_frame(
        &mut self,
        index: usize,
        frame: &BitmapBgra,
        hints: &EncoderHints,
    ) -> Result<()> {
        let instance = &mut self.codecs[index];
        let codec = instance
            .codec
            .as_mut()
            .ok_or_else(|| err!(StatusCode::InvalidInternalState, "codec has not been initialized"))?;
        codec.write_frame(&mut instance.io, frame, hints)
    }

    /// Matches codec instances to decoder/encoder nodes by placeholder id.
    /// Newly attached decoders are probed against the registry's magic
    /// bytes and initialized.
    fn link_codecs(&mut self, ctx: &Context, g: &mut Graph) -> Result<()> {
        for id in g.node_ids() {
            let (placeholder_id, needs_link) = match g.node(id).params {
                NodeParams::Decoder(ref p)
                | NodeParams::Encoder(ref p)
                | NodeParams::PrimitiveDecoder(ref p)
                | NodeParams::PrimitiveEncoder(ref p) => {
                    (p.placeholder_id, p.instance_index.is_none())
                }
                _ => continue,
            };
            if !needs_link {
                continue;
            }
            let index = self.instance_index_by_placeholder(placeholder_id)?;

            if self.codecs[index].direction == IoDirection::Input
                && self.codecs[index].codec.is_none()
            {
                let leading = self.codecs[index].probe_magic_bytes()?;
                let codec_id = ctx.codecs().select_decoder(&leading).ok_or_else(|| {
                    err!(
                        StatusCode::ImageDecodingFailed,
                        "no codec recognizes the leading bytes {:02X?}",
                        leading
                    )
                })?;
                let instance = &mut self.codecs[index];
                instance.codec_id = codec_id;
                let mut codec = {
                    let registry = ctx.codecs();
                    (registry.get(codec_id)?.factory)()
                };
                codec.initialize(&mut instance.io)?;
                instance.codec = Some(codec);
            }

            match g.node_mut(id).params {
                NodeParams::Decoder(ref mut p)
                | NodeParams::Encoder(ref mut p)
                | NodeParams::PrimitiveDecoder(ref mut p)
                | NodeParams::PrimitiveEncoder(ref mut p) => {
                    p.instance_index = Some(index);
                    if self.codecs[index].direction == IoDirection::Input {
                        if let Some(codec) = self.codecs[index].codec.as_mut() {
                            codec.set_downscale_hints(&p.downscale_hints)?;
                        }
                    }
                }
                _ => {}
            }
        }
        Ok(())
    }

    //---------------------------------------------------------------- the driver

    pub fn execute(&mut self, ctx: &Context, g: &mut Graph) -> Result<()> {
        match self.execute_inner(ctx, g) {
            Ok(()) => Ok(()),
            Err(e) => {
                ctx.raise_error(e.clone());
                Err(e)
            }
        }
    }

    fn execute_inner(&mut self, ctx: &Context, g: &mut Graph) -> Result<()> {
        g.validate()?;
        self.passes_used = 0;
        loop {
            if g.fully_executed() {
                return Ok(());
            }
            if self.passes_used >= self.max_calc_flatten_execute_passes {
                return Err(err!(StatusCode::MaximumGraphPassesExceeded));
            }
            let before = graph_signature(g);
            self.one_pass(ctx, g)?;
            if self.record_graph_versions {
                visualize::notify_graph_changed(self, g)?;
            }
            self.passes_used += 1;
            if g.fully_executed() {
                return Ok(());
            }
            if graph_signature(g) == before {
                return Err(err!(
                    StatusCode::GraphInvalid,
                    "a pass completed without progress; blocked nodes: {}",
                    blocked_nodes(g)
                ));
            }
        }
    }

    fn one_pass(&mut self, ctx: &Context, g: &mut Graph) -> Result<()> {
        debug!("pass {}: {} nodes", self.passes_used, g.node_count());
        self.link_codecs(ctx, g)?;

        // Populate dimensions wherever the inputs already have theirs.
        g.walk_dependency_wise(|g, id| {
            let def = nodes::def_for(g.node(id).kind())?;
            if def.can_populate_dimensions() && nodes::inputs_have_dimensions(g, id) {
                nodes::populate_dimensions(ctx, self, g, id)?;
            }
            nodes::update_state(g, id)
        })?;

        // Lower high-level nodes.
        g.walk_dependency_wise(|g, id| {
            let node = g.node(id);
            if node.kind().tier() == Tier::HighLevel
                && node.stage.contains(NodeStage::INPUT_DIMENSIONS_KNOWN)
            {
                nodes::flatten_generic(ctx, self, g, id, false)?;
            }
            Ok(())
        })?;

        // The default optimization set is empty; this pass only promotes
        // ready nodes so post-flattening can see them.
        for id in g.node_ids() {
            nodes::update_state(g, id)?;
            let node = g.node(id);
            if node.kind().tier() != Tier::HighLevel
                && node.stage.contains(NodeStage::READY_FOR_OPTIMIZE)
                && !node.stage.contains(NodeStage::OPTIMIZED)
            {
                nodes::set_optimized_and_update_state(g, id)?;
            }
        }

        // Lower optimizable nodes to primitives.
        g.walk_dependency_wise(|g, id| {
            let node = g.node(id);
            if node.kind().tier() == Tier::Optimizable
                && node
                    .stage
                    .contains(NodeStage::READY_FOR_POST_OPTIMIZE_FLATTEN)
            {
                nodes::flatten_generic(ctx, self, g, id, true)?;
            }
            Ok(())
        })?;

        // Execute primitives whose inputs are all done. Dependency order
        // lets a whole chain finish within one pass.
        g.walk_dependency_wise(|g, id| {
            nodes::update_state(g, id)?;
            let node = g.node(id);
            if node.kind().is_primitive()
                && node.stage.contains(NodeStage::READY_FOR_EXECUTION)
                && !node.stage.contains(NodeStage::EXECUTED)
            {
                nodes::execute_node(ctx, self, g, id)?;
            }
            Ok(())
        })?;

        Ok(())
    }
}

/// Cheap change detector over node identity, stage bits, dimensioning, and
/// results.
fn graph_signature(g: &Graph) -> Vec<(usize, u32, bool, bool)> {
    g.node_ids()
        .into_iter()
        .map(|id| {
            let n = g.node(id);
            (
                id.index(),
                n.stage.bits(),
                n.frame_est.is_some(),
                n.result.is_some(),
            )
        })
        .collect()
}

fn blocked_nodes(g: &Graph) -> String {
    let blocked: Vec<String> = g
        .node_ids()
        .into_iter()
        .filter(|&id| !g.node(id).stage.contains(NodeStage::EXECUTED))
        .map(|id| format!("n{}: {}", id.index(), nodes::stringify(g, id)))
        .collect();
    blocked.join("; ")
}

impl Default for Job {
    fn default() -> Job {
        Job::create()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bitmaps::PixelFormat;
    use crate::graph::EdgeKind;
    use crate::nodes::new_bitmap_slot;

    #[test]
    fn test_canvas_fill_pointer_pipeline() {
        let ctx = Context::create();
        let mut job = Job::create();
        let mut g = Graph::create();

        let canvas = g.create_canvas(None, PixelFormat::Bgra32, 8, 8, 0);
        let fill = g.create_fill_rect(Some(canvas), 1, 1, 7, 7, 0xFF00FF00);
        let out = new_bitmap_slot();
        g.create_bitmap_bgra_reference(Some(fill), out.clone());

        job.execute(&ctx, &mut g).unwrap();
        assert!(g.fully_executed());

        let bitmap = out.borrow().clone().expect("slot must be filled");
        let b = bitmap.borrow();
        assert_eq!(b.w, 8);
        assert_eq!(b.get_pixel(3, 3), vec![0x00, 0xFF, 0x00, 0xFF]);
        assert_eq!(b.get_pixel(0, 0), vec![0x00, 0x00, 0x00, 0x00]);
    }

    #[test]
    fn test_cyclic_graph_fails() {
        let ctx = Context::create();
        let mut job = Job::create();
        let mut g = Graph::create();
        let a = g.create_noop(None);
        let b = g.create_noop(Some(a));
        g.add_edge(b, a, EdgeKind::Input).unwrap();

        let err = job.execute(&ctx, &mut g).unwrap_err();
        assert_eq!(err.status, StatusCode::GraphIsCyclic);
        assert_eq!(ctx.error_reason(), StatusCode::GraphIsCyclic);
    }

    #[test]
    fn test_crop_bounds_rejected_during_dimensioning() {
        let ctx = Context::create();
        let mut job = Job::create();
        let mut g = Graph::create();
        let canvas = g.create_canvas(None, PixelFormat::Bgra32, 10, 10, 0);
        let crop = g.create_crop(Some(canvas), 5, 5, 3, 8);
        let slot = new_bitmap_slot();
        g.create_bitmap_bgra_reference(Some(crop), slot);

        let err = job.execute(&ctx, &mut g).unwrap_err();
        assert_eq!(err.status, StatusCode::InvalidArgument);
    }
}
