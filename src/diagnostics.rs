//! Ready-made [`TimingSink`](crate::world::TimingSink) for hosts that
//! want per-system frame timings in their `tracing` output for free,
//! instead of writing their own sink (spec §10.2).

use tracing::debug;

use crate::world::TimingSink;

/// A [`TimingSink`] that logs `debug!(system, elapsed_ms, entities)` for
/// every system, every phase. Pass to
/// [`WorldBuilder::with_timing_sink`](crate::builder::WorldBuilder::with_timing_sink).
pub fn tracing_sink() -> TimingSink {
  Box::new(|system: &str, elapsed_ms: f64, entities: usize| {
    debug!(system, elapsed_ms, entities, "system timing");
  })
}
