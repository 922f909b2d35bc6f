//! Component definitions for the agent world.
//!
//! Every agent entity carries an [`AgentState`] (the live values the step
//! engine works on) and an [`AttributeRecord`] (the persisted, schema-ordered
//! copy that is written to report rows).

mod agent;
mod attributes;

pub use agent::*;
pub use attributes::*;
