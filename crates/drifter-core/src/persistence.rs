//! Save/Load functionality for checkpointing a run
//!
//! Uses bincode for compact binary serialization. Agents are saved as plain
//! [`AgentState`] values; attribute records are rebuilt from them on load.

use std::io::{Read, Write};

use hecs::World;
use serde::{Deserialize, Serialize};

use crate::components::AgentState;
use crate::error::{DriftError, Result};

/// Version number for save file format (increment when format changes)
const SAVE_VERSION: u32 = 2;

/// Serializable snapshot of the simulation state
#[derive(Debug, Serialize, Deserialize)]
pub struct SaveData {
    pub version: u32,
    /// Simulation time (s)
    pub sim_time: f64,
    /// Number of completed updates
    pub step_count: u64,
    /// Next id the allocator would hand out
    pub next_id: u64,
    pub agents: Vec<AgentState>,
}

/// Result of loading a checkpoint
#[derive(Debug)]
pub struct LoadedSimulation {
    pub sim_time: f64,
    pub step_count: u64,
    pub next_id: u64,
    pub agents: Vec<AgentState>,
}

/// Agents in id order, so saves of the same state are byte-identical.
fn collect_agents(world: &World) -> Vec<AgentState> {
    let mut agents: Vec<AgentState> = world
        .query::<&AgentState>()
        .iter()
        .map(|(_, a)| a.clone())
        .collect();
    agents.sort_by(|a, b| a.id.cmp(&b.id).then(a.start_time.total_cmp(&b.start_time)));
    agents
}

/// Save the complete simulation to a writer
pub fn save_simulation<W: Write>(
    writer: W,
    world: &World,
    sim_time: f64,
    step_count: u64,
    next_id: u64,
) -> Result<()> {
    let save_data = SaveData {
        version: SAVE_VERSION,
        sim_time,
        step_count,
        next_id,
        agents: collect_agents(world),
    };
    bincode::serialize_into(writer, &save_data)?;
    log::info!(
        "saved {} agents at t={}s (step {})",
        save_data.agents.len(),
        sim_time,
        step_count
    );
    Ok(())
}

/// Load a simulation from a reader
pub fn load_simulation<R: Read>(reader: R) -> Result<LoadedSimulation> {
    let save_data: SaveData = bincode::deserialize_from(reader)?;

    if save_data.version != SAVE_VERSION {
        return Err(DriftError::VersionMismatch {
            expected: SAVE_VERSION,
            found: save_data.version,
        });
    }

    log::info!(
        "loaded {} agents at t={}s (step {})",
        save_data.agents.len(),
        save_data.sim_time,
        save_data.step_count
    );
    Ok(LoadedSimulation {
        sim_time: save_data.sim_time,
        step_count: save_data.step_count,
        next_id: save_data.next_id,
        agents: save_data.agents,
    })
}
