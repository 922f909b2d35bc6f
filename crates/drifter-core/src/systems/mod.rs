//! Systems - logic that operates on agents

mod population;
mod step;

pub use population::*;
pub use step::*;
