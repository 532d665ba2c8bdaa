//! Canvas allocation.

use super::*;
use crate::bitmaps::BitmapBgra;
use std::rc::Rc;

pub struct CreateCanvasDef;

impl NodeDef for CreateCanvasDef {
    fn kind(&self) -> NodeKind {
        NodeKind::CreateCanvas
    }

    fn name(&self) -> &'static str {
        "canvas"
    }

    fn input_count(&self) -> i32 {
        0
    }

    fn stringify(&self, g: &Graph, node: NodeIndex) -> String {
        match g.node(node).params {
            NodeParams::CreateCanvas { width, height, .. } => format!(
                "canvas {}x{} {}",
                width,
                height,
                stringify_stage(g.node(node).stage)
            ),
            _ => "canvas".to_owned(),
        }
    }

    fn populate_dimensions(
        &self,
        _ctx: &Context,
        _job: &mut Job,
        g: &mut Graph,
        node: NodeIndex,
    ) -> Result<()> {
        let (format, width, height) = match g.node(node).params {
            NodeParams::CreateCanvas {
                format,
                width,
                height,
                ..
            } => (format, width, height),
            _ => return Err(err!(StatusCode::InvalidInternalState)),
        };
        g.node_mut(node).frame_est = Some(FrameEstimate {
            w: width,
            h: height,
            format,
            alpha_meaningful: false,
        });
        Ok(())
    }

    fn execute(
        &self,
        ctx: &Context,
        _job: &mut Job,
        g: &mut Graph,
        node: NodeIndex,
    ) -> Result<()> {
        let (format, width, height, bgcolor) = match g.node(node).params {
            NodeParams::CreateCanvas {
                format,
                width,
                height,
                bgcolor,
            } => (format, width, height, bgcolor),
            _ => return Err(err!(StatusCode::InvalidInternalState)),
        };
        let mut bitmap = BitmapBgra::create(ctx.ledger(), width, height, format)?;
        if bgcolor != 0 {
            bitmap.fill_rect(0, 0, width, height, bgcolor)?;
        }
        g.node_mut(node).result = Some(Rc::new(RefCell::new(bitmap)));
        Ok(())
    }
}
