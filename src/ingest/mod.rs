//! Consumer side: drains the frame queue, enriches each frame and persists
//! it to both stores before archiving.

pub mod pipeline;
pub mod worker;

pub use pipeline::{frame_timestamp, IngestPipeline, ProcessOutcome};
pub use worker::{drain_loop, drain_once, DrainReport};
