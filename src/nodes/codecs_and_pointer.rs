//! Decoder/encoder nodes (and their primitive forms after codec
//! initialization), plus the bitmap-pointer escape hatch.

use super::*;
use crate::bitmaps::BitmapBgra;
use std::rc::Rc;

fn codec_params(params: &NodeParams) -> Result<CodecParams> {
    match params {
        NodeParams::Decoder(p)
        | NodeParams::Encoder(p)
        | NodeParams::PrimitiveDecoder(p)
        | NodeParams::PrimitiveEncoder(p) => Ok(p.clone()),
        _ => Err(err!(StatusCode::InvalidInternalState)),
    }
}

fn dimensions_decode(
    _ctx: &Context,
    job: &mut Job,
    g: &mut Graph,
    node: NodeIndex,
) -> Result<()> {
    let params = codec_params(&g.node(node).params)?;
    let index = params.instance_index.ok_or_else(|| {
        err!(StatusCode::InvalidInternalState, "codec has not been linked")
    })?;
    let frame_info = job.decoder_frame_info(index)?;
    g.node_mut(node).frame_est = Some(FrameEstimate {
        w: frame_info.w,
        h: frame_info.h,
        format: frame_info.format,
        alpha_meaningful: true,
    });
    Ok(())
}

fn stringify_codec(name: &'static str, g: &Graph, node: NodeIndex) -> String {
    match codec_params(&g.node(node).params) {
        Ok(ref p) if p.instance_index.is_none() => "(codec undetermined)".to_owned(),
        _ => format!("{} {}", name, stringify_stage(g.node(node).stage)),
    }
}

//--------------------------------------------------------------------------------------------------

pub struct DecoderDef;

impl NodeDef for DecoderDef {
    fn kind(&self) -> NodeKind {
        NodeKind::Decoder
    }

    fn name(&self) -> &'static str {
        "decode"
    }

    fn input_count(&self) -> i32 {
        0
    }

    fn stringify(&self, g: &Graph, node: NodeIndex) -> String {
        stringify_codec("decode", g, node)
    }

    fn populate_dimensions(
        &self,
        ctx: &Context,
        job: &mut Job,
        g: &mut Graph,
        node: NodeIndex,
    ) -> Result<()> {
        dimensions_decode(ctx, job, g, node)
    }

    fn pre_optimize_flatten(
        &self,
        _ctx: &Context,
        _job: &mut Job,
        g: &mut Graph,
        node: NodeIndex,
    ) -> Result<FlattenResult> {
        let params = codec_params(&g.node(node).params)?;
        g.node_mut(node).params = NodeParams::PrimitiveDecoder(params);
        Ok(FlattenResult::KeepSelf)
    }
}

pub struct EncoderDef;

impl NodeDef for EncoderDef {
    fn kind(&self) -> NodeKind {
        NodeKind::Encoder
    }

    fn name(&self) -> &'static str {
        "encode"
    }

    fn prohibit_output_edges(&self) -> bool {
        true
    }

    fn can_populate_dimensions(&self) -> bool {
        false
    }

    fn stringify(&self, g: &Graph, node: NodeIndex) -> String {
        stringify_codec("encode", g, node)
    }

    fn pre_optimize_flatten(
        &self,
        ctx: &Context,
        job: &mut Job,
        g: &mut Graph,
        node: NodeIndex,
    ) -> Result<FlattenResult> {
        let params = codec_params(&g.node(node).params)?;
        let index = params.instance_index.ok_or_else(|| {
            err!(StatusCode::InvalidInternalState, "codec has not been linked")
        })?;
        job.initialize_encoder_codec(ctx, index, params.desired_encoder_id)?;
        g.node_mut(node).params = NodeParams::PrimitiveEncoder(params);
        Ok(FlattenResult::KeepSelf)
    }
}

//--------------------------------------------------------------------------------------------------

pub struct PrimitiveDecoderDef;

impl NodeDef for PrimitiveDecoderDef {
    fn kind(&self) -> NodeKind {
        NodeKind::PrimitiveDecoder
    }

    fn name(&self) -> &'static str {
        "decode"
    }

    fn input_count(&self) -> i32 {
        0
    }

    fn stringify(&self, g: &Graph, node: NodeIndex) -> String {
        stringify_codec("decode", g, node)
    }

    fn populate_dimensions(
        &self,
        ctx: &Context,
        job: &mut Job,
        g: &mut Graph,
        node: NodeIndex,
    ) -> Result<()> {
        dimensions_decode(ctx, job, g, node)
    }

    fn execute(
        &self,
        ctx: &Context,
        job: &mut Job,
        g: &mut Graph,
        node: NodeIndex,
    ) -> Result<()> {
        let params = codec_params(&g.node(node).params)?;
        let index = params.instance_index.ok_or_else(|| {
            err!(StatusCode::InvalidInternalState, "codec has not been linked")
        })?;
        let frame_info = job.decoder_frame_info(index)?;
        let mut bitmap =
            BitmapBgra::create(ctx.ledger(), frame_info.w, frame_info.h, frame_info.format)?;
        job.decoder_read_frame(index, &mut bitmap)?;
        g.node_mut(node).result = Some(Rc::new(RefCell::new(bitmap)));
        Ok(())
    }
}

pub struct PrimitiveEncoderDef;

impl NodeDef for PrimitiveEncoderDef {
    fn kind(&self) -> NodeKind {
        NodeKind::PrimitiveEncoder
    }

    fn name(&self) -> &'static str {
        "encode"
    }

    fn prohibit_output_edges(&self) -> bool {
        true
    }

    fn can_populate_dimensions(&self) -> bool {
        false
    }

    fn stringify(&self, g: &Graph, node: NodeIndex) -> String {
        stringify_codec("encode", g, node)
    }

    fn execute(
        &self,
        _ctx: &Context,
        job: &mut Job,
        g: &mut Graph,
        node: NodeIndex,
    ) -> Result<()> {
        let params = codec_params(&g.node(node).params)?;
        let index = params.instance_index.ok_or_else(|| {
            err!(StatusCode::InvalidInternalState, "codec has not been linked")
        })?;
        let bitmap = input_result(g, node)?;
        job.encoder_write_frame(index, &bitmap.borrow(), &params.encoder_hints)?;
        g.node_mut(node).result = Some(bitmap);
        Ok(())
    }
}

//--------------------------------------------------------------------------------------------------

pub struct BitmapPointerDef;

impl NodeDef for BitmapPointerDef {
    fn kind(&self) -> NodeKind {
        NodeKind::BitmapPointer
    }

    fn name(&self) -> &'static str {
        "bitmap ptr"
    }

    fn input_count(&self) -> i32 {
        -1
    }

    fn stringify(&self, _g: &Graph, _node: NodeIndex) -> String {
        "* bitmap".to_owned()
    }

    fn populate_dimensions(
        &self,
        _ctx: &Context,
        _job: &mut Job,
        g: &mut Graph,
        node: NodeIndex,
    ) -> Result<()> {
        let slot = match g.node(node).params {
            NodeParams::BitmapPointer(ref slot) => slot.clone(),
            _ => return Err(err!(StatusCode::InvalidInternalState)),
        };
        let preloaded = slot.borrow().clone();
        match preloaded {
            Some(bitmap) => {
                let b = bitmap.borrow();
                g.node_mut(node).frame_est = Some(FrameEstimate {
                    w: b.w,
                    h: b.h,
                    format: b.fmt,
                    alpha_meaningful: b.alpha_meaningful,
                });
                Ok(())
            }
            None => {
                // Acting as a pass-through: an input must be present.
                dimensions_mimic_input(g, node)
            }
        }
    }

    fn execute(
        &self,
        _ctx: &Context,
        _job: &mut Job,
        g: &mut Graph,
        node: NodeIndex,
    ) -> Result<()> {
        let slot = match g.node(node).params {
            NodeParams::BitmapPointer(ref slot) => slot.clone(),
            _ => return Err(err!(StatusCode::InvalidInternalState)),
        };
        if g.inbound_count_of_kind(node, EdgeKind::Input) == 1 {
            let bitmap = input_result(g, node)?;
            *slot.borrow_mut() = Some(bitmap.clone());
            g.node_mut(node).result = Some(bitmap);
        } else {
            let preloaded = slot.borrow().clone();
            match preloaded {
                Some(bitmap) => g.node_mut(node).result = Some(bitmap),
                None => {
                    return Err(err!(
                        StatusCode::InvalidInputsToNode,
                        "bitmap pointer has neither an input edge nor a preloaded bitmap"
                    ));
                }
            }
        }
        Ok(())
    }
}
