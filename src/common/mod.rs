mod cache;
mod clock;
mod slots;

pub use cache::MemCache;
pub use clock::{Clock, TokioClock};
pub use slots::Slots;
