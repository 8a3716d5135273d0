mod pacer;
mod tempo;

pub use pacer::FramePacer;
pub use tempo::{TempoEntry, TempoMap};
