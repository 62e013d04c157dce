use std::io::{Read, Seek};

use crate::future_index::FutureIndex;
use crate::trace::TraceReader;

/// A resident cache block as the replacement policy sees it
///
/// Owned by the cache model; the policy only ever reads it. An invalid block
/// has never been filled and its address is meaningless
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheBlock {
    pub valid: bool,
    pub address: u64,
}

/// What kind of access triggered a policy callback
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessType {
    Load,
    Store,
    Writeback,
}

/// Physical-to-virtual translation, provided by the host
///
/// The future index is keyed on virtual addresses because the trace records
/// virtual references, while the cache holds physical ones. `None` is the
/// host's sentinel for a failed translation; the policy treats such a block as
/// never reused
pub trait AddressTranslator {
    fn translate(&self, cpu: u32, paddr: u64) -> Option<u64>;
}

/// Translation for traces whose recorded addresses are used untranslated
#[derive(Default)]
pub struct IdentityTranslation;

impl AddressTranslator for IdentityTranslation {
    fn translate(&self, _cpu: u32, paddr: u64) -> Option<u64> {
        Some(paddr)
    }
}

/// A generic trait for implementing new replacement policies. Can be used to parameterise a Simulator.
pub trait ReplacementPolicy {
    /// One-time setup before the trace is replayed
    ///
    /// Policies that need to see the whole trace up front (the optimal policy
    /// does) scan it here and must leave the reader rewound to the start. The
    /// default does nothing
    fn initialize<R: Read + Seek>(
        &mut self,
        _trace: &mut TraceReader<R>,
        _warmup_instructions: u64,
        _simulation_instructions: u64,
    ) -> Result<(), String> {
        Ok(())
    }

    /// Picks the way to evict from `blocks` for a miss at instruction `instr_id`
    ///
    /// `blocks` is the resident set in ascending way order; the return value
    /// indexes into it
    #[allow(clippy::too_many_arguments)]
    fn find_victim(
        &mut self,
        cpu: u32,
        instr_id: u64,
        set: u32,
        blocks: &[CacheBlock],
        ip: u64,
        full_addr: u64,
        access: AccessType,
    ) -> u32;

    /// Called on every hit and every fill with the referenced address
    #[allow(clippy::too_many_arguments)]
    fn update_state(
        &mut self,
        cpu: u32,
        instr_id: u64,
        set: u32,
        way: u32,
        full_addr: u64,
        ip: u64,
        victim_addr: u64,
        access: AccessType,
        hit: bool,
    );

    /// Releases any diagnostic resources once the replay is over
    fn final_stats(&mut self) {}
}

#[cfg(feature = "victim-log")]
const VICTIM_LOG_PATH: &str = "belady_victims.csv";

/// CSV audit trail of victim decisions, one row per `find_victim` call
#[cfg(feature = "victim-log")]
struct VictimLog {
    out: std::io::BufWriter<std::fs::File>,
}

#[cfg(feature = "victim-log")]
impl VictimLog {
    fn create(path: &str) -> Result<Self, String> {
        use std::io::Write;
        let file = std::fs::File::create(path)
            .map_err(|e| format!("Couldn't create the victim log at {path}: {e}"))?;
        let mut out = std::io::BufWriter::new(file);
        writeln!(out, "cpu, instr_id, set, way, timestamp, address, ip, type")
            .map_err(|e| format!("Couldn't write the victim log header: {e}"))?;
        Ok(Self { out })
    }

    #[allow(clippy::too_many_arguments)]
    fn record(
        &mut self,
        cpu: u32,
        instr_id: u64,
        set: u32,
        way: u32,
        timestamp: u64,
        address: u64,
        ip: u64,
        access: AccessType,
    ) {
        use std::io::Write;
        // A failed log write must not disturb the miss path; the row is lost
        let _ = writeln!(
            self.out,
            "{cpu},{instr_id:#x},{set},{way:#x},{timestamp:#x},{address:#x},{ip:#x},{}",
            access as u32
        );
    }

    fn close(&mut self) {
        use std::io::Write;
        let _ = self.out.flush();
    }
}

/// The optimal (Belady) replacement policy
///
/// Sees the whole trace before the replay starts, so on every miss it can
/// evict the resident line whose next reference lies furthest in the future.
/// No implementable policy beats it over the same trace and geometry, which
/// makes it the yardstick other policies are measured against
pub struct Belady<T> {
    index: FutureIndex,
    translator: T,
    loads: u64,
    stores: u64,
    #[cfg(feature = "victim-log")]
    victim_log: Option<VictimLog>,
}

impl<T: AddressTranslator> Belady<T> {
    pub fn new(translator: T) -> Self {
        Self {
            index: FutureIndex::new(),
            translator,
            loads: 0,
            stores: 0,
            #[cfg(feature = "victim-log")]
            victim_log: None,
        }
    }

    /// One pass over the trace recording every memory reference in the window
    ///
    /// Instruction indices are counted from the start of the trace, warmup
    /// included, and are 1-based so that 0 stays free to mean "unset". All
    /// memory operands of instruction `i` share timestamp `i`. An operand of 0
    /// means the slot is unused and is skipped. A trace shorter than the
    /// requested window is not an error; the index just covers what was read.
    /// The reader is left rewound so the replay starts from the first record
    fn preload<R: Read + Seek>(
        &mut self,
        trace: &mut TraceReader<R>,
        warmup_instructions: u64,
        simulation_instructions: u64,
    ) -> Result<(), String> {
        println!("Skipping {warmup_instructions} warmup instructions");
        println!("Loading {simulation_instructions} simulation instructions");
        let last = warmup_instructions + simulation_instructions;
        let mut instr_id = 0u64;
        while let Some(record) = trace.read_record()? {
            instr_id += 1;
            if instr_id > last {
                break;
            }
            if instr_id <= warmup_instructions {
                continue;
            }
            for &source in record.source_memory.iter() {
                if source != 0 {
                    self.index.insert(source, instr_id);
                    self.loads += 1;
                }
            }
            for &destination in record.destination_memory.iter() {
                if destination != 0 {
                    self.index.insert(destination, instr_id);
                    self.stores += 1;
                }
            }
        }
        trace.rewind()?;
        println!("Saw {} loads and {} stores", self.loads, self.stores);
        println!(
            "Future index: {} lines, {} bytes",
            self.index.distinct_lines(),
            self.index.approximate_bytes()
        );
        Ok(())
    }

    /// The victim scan: invalid ways first, then furthest next use
    ///
    /// Returns the winning way and the next-use time that won it (the current
    /// instruction for blocks that are never referenced again). Read-only;
    /// cursor consumption happens in the update hook once the fill is reported
    fn choose(&self, cpu: u32, now: u64, blocks: &[CacheBlock]) -> (u32, u64) {
        // Unused ways always win, the cache is still warming
        for (way, block) in blocks.iter().enumerate() {
            if !block.valid {
                return (way as u32, 0);
            }
        }

        let mut best_way = 0u32;
        let mut best_time = 0u64;
        for (way, block) in blocks.iter().enumerate() {
            let next = self
                .translator
                .translate(cpu, block.address)
                .and_then(|vaddr| self.index.peek_next(vaddr, now));
            match next {
                // Never referenced again (or untranslatable): nothing can be
                // further in the future, stop scanning
                None => return (way as u32, now),
                // Strict comparison so the lowest way index wins ties. Real
                // next-use times are always >= now >= 1, so the first valid
                // way beats the initial 0
                Some(next_use) if next_use > best_time => {
                    best_time = next_use;
                    best_way = way as u32;
                }
                Some(_) => {}
            }
        }
        (best_way, best_time)
    }

    /// Read access to the policy's future index, for diagnostics
    pub fn future_index(&self) -> &FutureIndex {
        &self.index
    }

    /// Loads and stores observed during the preload pass
    pub fn preload_counts(&self) -> (u64, u64) {
        (self.loads, self.stores)
    }
}

impl<T: AddressTranslator> ReplacementPolicy for Belady<T> {
    fn initialize<R: Read + Seek>(
        &mut self,
        trace: &mut TraceReader<R>,
        warmup_instructions: u64,
        simulation_instructions: u64,
    ) -> Result<(), String> {
        self.preload(trace, warmup_instructions, simulation_instructions)?;
        #[cfg(feature = "victim-log")]
        {
            self.victim_log = Some(VictimLog::create(VICTIM_LOG_PATH)?);
        }
        Ok(())
    }

    #[cfg_attr(not(feature = "victim-log"), allow(unused_variables))]
    fn find_victim(
        &mut self,
        cpu: u32,
        instr_id: u64,
        set: u32,
        blocks: &[CacheBlock],
        ip: u64,
        full_addr: u64,
        access: AccessType,
    ) -> u32 {
        let (way, next_use) = self.choose(cpu, instr_id, blocks);
        #[cfg(feature = "victim-log")]
        if let Some(log) = &mut self.victim_log {
            log.record(cpu, instr_id, set, way, next_use, full_addr, ip, access);
        }
        way
    }

    fn update_state(
        &mut self,
        cpu: u32,
        instr_id: u64,
        _set: u32,
        _way: u32,
        full_addr: u64,
        _ip: u64,
        _victim_addr: u64,
        access: AccessType,
        hit: bool,
    ) {
        // Writebacks are a side effect of an earlier demand reference, not a
        // reference of their own
        if hit && access == AccessType::Writeback {
            return;
        }
        let Some(vaddr) = self.translator.translate(cpu, full_addr) else {
            return;
        };
        // Consume the reference that just happened. References made before the
        // indexed window began (during warmup) sit below every stored
        // timestamp and must not eat a future entry, hence the time check
        if let Some(next) = self.index.next_use(vaddr) {
            if next <= instr_id {
                self.index.advance(vaddr);
            }
        }
    }

    fn final_stats(&mut self) {
        #[cfg(feature = "victim-log")]
        if let Some(log) = &mut self.victim_log {
            println!("Closing the victim log");
            log.close();
        }
    }
}
