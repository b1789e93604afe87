mod liveness;

pub use liveness::*;
