use std::io::{ErrorKind, Read, Seek, SeekFrom};

/// Number of destination memory operands an instruction record can carry
pub const NUM_INSTR_DESTINATIONS: usize = 2;
/// Number of source memory operands an instruction record can carry
pub const NUM_INSTR_SOURCES: usize = 4;

/// Size of one instruction record in bytes. The layout is fixed, so records
/// can be located by offset and the stream rewound to any instruction boundary
pub const RECORD_SIZE: usize = 64;

const IP_OFFSET: usize = 0;
const IS_BRANCH_OFFSET: usize = 8;
const BRANCH_TAKEN_OFFSET: usize = 9;
const DESTINATION_REGISTERS_OFFSET: usize = 10;
const SOURCE_REGISTERS_OFFSET: usize = 12;
const DESTINATION_MEMORY_OFFSET: usize = 16;
const SOURCE_MEMORY_OFFSET: usize = 32;

/// One recorded instruction with its memory operands
///
/// Addresses are 64-bit virtual addresses; a value of 0 means "no memory
/// operand" and must be skipped by consumers. The register fields are carried
/// for layout fidelity with the recording tool but are not interpreted here
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TraceRecord {
    pub ip: u64,
    pub is_branch: u8,
    pub branch_taken: u8,
    pub destination_registers: [u8; NUM_INSTR_DESTINATIONS],
    pub source_registers: [u8; NUM_INSTR_SOURCES],
    pub destination_memory: [u64; NUM_INSTR_DESTINATIONS],
    pub source_memory: [u64; NUM_INSTR_SOURCES],
}

impl TraceRecord {
    /// Decodes a record from its 64-byte little-endian wire form
    ///
    /// The format is trusted; like the rest of the hot path this does no
    /// validation beyond what the fixed layout implies
    pub fn from_bytes(buf: &[u8; RECORD_SIZE]) -> Self {
        let mut destination_memory = [0u64; NUM_INSTR_DESTINATIONS];
        let mut source_memory = [0u64; NUM_INSTR_SOURCES];
        for (d, value) in destination_memory.iter_mut().enumerate() {
            *value = read_u64(buf, DESTINATION_MEMORY_OFFSET + d * 8);
        }
        for (s, value) in source_memory.iter_mut().enumerate() {
            *value = read_u64(buf, SOURCE_MEMORY_OFFSET + s * 8);
        }
        Self {
            ip: read_u64(buf, IP_OFFSET),
            is_branch: buf[IS_BRANCH_OFFSET],
            branch_taken: buf[BRANCH_TAKEN_OFFSET],
            destination_registers: [
                buf[DESTINATION_REGISTERS_OFFSET],
                buf[DESTINATION_REGISTERS_OFFSET + 1],
            ],
            source_registers: [
                buf[SOURCE_REGISTERS_OFFSET],
                buf[SOURCE_REGISTERS_OFFSET + 1],
                buf[SOURCE_REGISTERS_OFFSET + 2],
                buf[SOURCE_REGISTERS_OFFSET + 3],
            ],
            destination_memory,
            source_memory,
        }
    }

    /// Encodes the record into its 64-byte wire form
    ///
    /// Used to build synthetic traces for tests and benchmarks; round-trips
    /// with [`TraceRecord::from_bytes`]
    pub fn to_bytes(&self) -> [u8; RECORD_SIZE] {
        let mut buf = [0u8; RECORD_SIZE];
        buf[IP_OFFSET..IP_OFFSET + 8].copy_from_slice(&self.ip.to_le_bytes());
        buf[IS_BRANCH_OFFSET] = self.is_branch;
        buf[BRANCH_TAKEN_OFFSET] = self.branch_taken;
        buf[DESTINATION_REGISTERS_OFFSET..DESTINATION_REGISTERS_OFFSET + NUM_INSTR_DESTINATIONS]
            .copy_from_slice(&self.destination_registers);
        buf[SOURCE_REGISTERS_OFFSET..SOURCE_REGISTERS_OFFSET + NUM_INSTR_SOURCES]
            .copy_from_slice(&self.source_registers);
        for (d, value) in self.destination_memory.iter().enumerate() {
            let at = DESTINATION_MEMORY_OFFSET + d * 8;
            buf[at..at + 8].copy_from_slice(&value.to_le_bytes());
        }
        for (s, value) in self.source_memory.iter().enumerate() {
            let at = SOURCE_MEMORY_OFFSET + s * 8;
            buf[at..at + 8].copy_from_slice(&value.to_le_bytes());
        }
        buf
    }
}

fn read_u64(buf: &[u8; RECORD_SIZE], offset: usize) -> u64 {
    u64::from_le_bytes(buf[offset..offset + 8].try_into().unwrap())
}

/// Sequential reader over a stream of fixed-size instruction records
///
/// The optimal policy reads the trace twice (once to index the future, once to
/// replay it), so the underlying stream must be seekable
pub struct TraceReader<R> {
    inner: R,
}

impl<R: Read + Seek> TraceReader<R> {
    pub fn new(inner: R) -> Self {
        Self { inner }
    }

    /// Reads the next instruction record, or `None` at end of trace
    ///
    /// A truncated trailing record counts as end of trace, not as an error
    pub fn read_record(&mut self) -> Result<Option<TraceRecord>, String> {
        let mut buf = [0u8; RECORD_SIZE];
        match self.inner.read_exact(&mut buf) {
            Ok(()) => Ok(Some(TraceRecord::from_bytes(&buf))),
            Err(e) if e.kind() == ErrorKind::UnexpectedEof => Ok(None),
            Err(e) => Err(format!("Couldn't read a trace record: {e}")),
        }
    }

    /// Repositions the stream at the first record
    pub fn rewind(&mut self) -> Result<(), String> {
        self.inner
            .seek(SeekFrom::Start(0))
            .map_err(|e| format!("Couldn't rewind the trace: {e}"))?;
        Ok(())
    }

    /// Current byte offset into the trace, for checking reader positioning
    pub fn position(&mut self) -> Result<u64, String> {
        self.inner
            .stream_position()
            .map_err(|e| format!("Couldn't get the trace position: {e}"))
    }
}
