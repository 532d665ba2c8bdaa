//! rastergraph: an image-processing engine built around a DAG of bitmap
//! operations.
//!
//! A graph of typed nodes (decode, scale, crop, canvas composition,
//! flips and rotations, encode) is lowered in stages and executed
//! dependency-first over 8-bit bitmaps, with all resampling arithmetic in a
//! controlled float colorspace. The [`context::Context`] owns the ambient
//! resources: tracked allocations, the first-error cell, the profiler, the
//! colorspace tables, and the codec registry.

#[macro_use]
pub mod error;

pub mod alloc;
pub mod bitmaps;
pub mod codecs;
pub mod color;
pub mod context;
pub mod graph;
pub mod io;
pub mod job;
pub mod nodes;
pub mod scaling;
pub mod visualize;

pub use crate::bitmaps::{BitmapBgra, BitmapFloat, BitmapRef, PixelFormat};
pub use crate::context::Context;
pub use crate::error::{Error, Result, StatusCode};
pub use crate::graph::{EdgeKind, Graph, NodeIndex};
pub use crate::io::{IoDirection, IoMode, IoProxy};
pub use crate::job::Job;
pub use crate::scaling::weights::Filter;
