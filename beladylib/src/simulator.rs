use std::io::{Read, Seek};
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

use crate::cache::SetAssociativeCache;
use crate::config::{CacheKindConfig, ReplacementPolicyConfig, SimulationConfig};
use crate::replacement_policies::{
    AccessType, Belady, IdentityTranslation, ReplacementPolicy,
};
use crate::trace::TraceReader;

// Single-core traces; the cpu index only exists because the policy interface
// carries it through to the translator
const CPU: u32 = 0;

/// Replays an instruction trace against one cache, deferring every eviction
/// decision to the replacement policy
///
/// The replay has two phases: the warmup prefix fills the cache without being
/// measured, then the simulation window is measured. The policy sees both
/// phases through its update hook, which is what keeps a future-aware policy's
/// bookkeeping aligned with simulated time
pub struct Simulator<P> {
    cache: SetAssociativeCache,
    policy: P,
    warmup_instructions: u64,
    simulation_instructions: u64,
    result: SimulationResult,
    simulation_time: Duration,
}

/// The result of a simulation run. Can be serialised to the required output format
#[derive(Debug, Serialize, Deserialize, Eq, PartialEq)]
pub struct SimulationResult {
    pub name: String,
    pub hits: u64,
    pub misses: u64,
    pub instructions_warmed: u64,
    pub instructions_simulated: u64,
}

impl Simulator<Belady<IdentityTranslation>> {
    /// Creates a simulator running the optimal policy over an untranslated
    /// trace
    ///
    /// # Arguments
    ///
    /// * `config`: A simulation configuration, usually resulting from parsing JSON
    ///
    /// returns: Simulator
    pub fn new(config: &SimulationConfig) -> Self {
        match config.cache.replacement_policy {
            ReplacementPolicyConfig::Optimal => {
                Self::with_policy(config, Belady::new(IdentityTranslation))
            }
        }
    }
}

impl<P: ReplacementPolicy> Simulator<P> {
    /// Creates a simulator with an explicit replacement policy
    ///
    /// The policy is monomorphised in, as in practice the hot path dereferences
    /// it once per memory operand and a trait object would be opaque to the
    /// compiler
    pub fn with_policy(config: &SimulationConfig, policy: P) -> Self {
        let num_lines = config.cache.size / config.cache.line_size;
        let num_sets = match config.cache.kind {
            CacheKindConfig::Direct => num_lines,
            CacheKindConfig::Full => 1,
            CacheKindConfig::TwoWay => num_lines / 2,
            CacheKindConfig::FourWay => num_lines / 4,
            CacheKindConfig::EightWay => num_lines / 8,
        };
        Self {
            cache: SetAssociativeCache::new(config.cache.size, config.cache.line_size, num_sets),
            policy,
            warmup_instructions: config.warmup_instructions,
            simulation_instructions: config.simulation_instructions,
            result: SimulationResult {
                name: config.cache.name.clone(),
                hits: 0,
                misses: 0,
                instructions_warmed: 0,
                instructions_simulated: 0,
            },
            simulation_time: Duration::new(0, 0),
        }
    }

    /// Runs the policy's preload pass and then replays the trace
    ///
    /// Warmup instructions touch the cache but are not counted in the result.
    /// The trace may end before the requested window; whatever was replayed is
    /// reported
    pub fn simulate<R: Read + Seek>(
        &mut self,
        trace: &mut TraceReader<R>,
    ) -> Result<&SimulationResult, String> {
        self.policy
            .initialize(trace, self.warmup_instructions, self.simulation_instructions)?;
        let start = Instant::now();
        let last = self.warmup_instructions + self.simulation_instructions;
        let mut instr_id = 0u64;
        while let Some(record) = trace.read_record()? {
            instr_id += 1;
            if instr_id > last {
                instr_id -= 1;
                break;
            }
            let measured = instr_id > self.warmup_instructions;
            for &source in record.source_memory.iter() {
                if source != 0 {
                    self.access(instr_id, record.ip, source, AccessType::Load, measured);
                }
            }
            for &destination in record.destination_memory.iter() {
                if destination != 0 {
                    self.access(instr_id, record.ip, destination, AccessType::Store, measured);
                }
            }
        }
        self.policy.final_stats();
        self.result.instructions_warmed = instr_id.min(self.warmup_instructions);
        self.result.instructions_simulated = instr_id.saturating_sub(self.warmup_instructions);
        self.simulation_time += start.elapsed();
        Ok(&self.result)
    }

    /// One memory reference: probe the set, and on a miss let the policy pick
    /// the victim before filling. Every hit and fill is reported back through
    /// the policy's update hook
    fn access(&mut self, instr_id: u64, ip: u64, address: u64, access: AccessType, measured: bool) {
        let line = self.cache.align(address);
        let set = self.cache.set_of(address);
        if let Some(way) = self.cache.find_way(set, line) {
            if measured {
                self.result.hits += 1;
            }
            self.policy
                .update_state(CPU, instr_id, set, way, line, ip, 0, access, true);
            return;
        }
        if measured {
            self.result.misses += 1;
        }
        let way = self.policy.find_victim(
            CPU,
            instr_id,
            set,
            self.cache.set_blocks(set),
            ip,
            line,
            access,
        );
        let victim_addr = self.cache.install(set, way, line);
        self.policy
            .update_state(CPU, instr_id, set, way, line, ip, victim_addr, access, false);
    }

    /// Gets the wall-clock execution time for the replay (preload excluded)
    pub fn get_execution_time(&self) -> &Duration {
        &self.simulation_time
    }

    /// Gets the number of blocks never filled during the run
    pub fn get_uninitialised_block_count(&self) -> usize {
        self.cache.uninitialised_block_count()
    }

    /// The cache geometry in use, as (sets, ways)
    pub fn geometry(&self) -> (u64, u32) {
        (self.cache.num_sets(), self.cache.ways())
    }
}
