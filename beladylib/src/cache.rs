use crate::replacement_policies::CacheBlock;

/// Set-associative tag store
///
/// Holds one [`CacheBlock`] per way, flattened into a single allocation with
/// the ways of a set contiguous, so the replacement policy can be handed the
/// resident set as a plain slice. The store itself is policy-free; victim
/// selection happens outside and the chosen way is written back through
/// [`SetAssociativeCache::install`]
///
/// Note that for optimisation reasons the cache assumes address 0 is never
/// accessed, as it would fault on most systems
pub struct SetAssociativeCache {
    blocks: Vec<CacheBlock>,
    set_selection_bit_mask: u64,
    line_alignment_bit_mask: u64,
    line_offset_bits: u8,
    ways: u32,
    num_sets: u64,
}

impl SetAssociativeCache {
    pub fn new(size: u64, line_size: u64, num_sets: u64) -> Self {
        let line_offset_bits = line_size.trailing_zeros() as u8;
        let num_lines = size / line_size;
        Self {
            blocks: vec![CacheBlock::default(); num_lines as usize],
            set_selection_bit_mask: (num_sets - 1) << line_offset_bits,
            line_alignment_bit_mask: !((1 << line_offset_bits as u32) - 1),
            line_offset_bits,
            ways: (num_lines / num_sets) as u32,
            num_sets,
        }
    }

    /// Aligns an address down to its cache line
    pub fn align(&self, address: u64) -> u64 {
        address & self.line_alignment_bit_mask
    }

    /// The set an address maps to, usable as an index
    pub fn set_of(&self, address: u64) -> u32 {
        ((address & self.set_selection_bit_mask) >> self.line_offset_bits) as u32
    }

    /// The resident blocks of a set, ways in ascending index order
    pub fn set_blocks(&self, set: u32) -> &[CacheBlock] {
        let lower = set as usize * self.ways as usize;
        &self.blocks[lower..lower + self.ways as usize]
    }

    /// The way holding `line` in `set`, if it is resident
    pub fn find_way(&self, set: u32, line: u64) -> Option<u32> {
        // Only search the relevant set
        let lower = set as usize * self.ways as usize;
        let mut way = 0;
        while way < self.ways as usize {
            let block = &self.blocks[lower + way];
            if block.valid && block.address == line {
                return Some(way as u32);
            }
            way += 1;
        }
        None
    }

    /// Fills a way with `line`, returning the address it displaced (0 if the
    /// way was invalid)
    pub fn install(&mut self, set: u32, way: u32, line: u64) -> u64 {
        let block = &mut self.blocks[set as usize * self.ways as usize + way as usize];
        let displaced = if block.valid { block.address } else { 0 };
        block.valid = true;
        block.address = line;
        displaced
    }

    pub fn ways(&self) -> u32 {
        self.ways
    }

    pub fn num_sets(&self) -> u64 {
        self.num_sets
    }

    /// Gets the number of uninitialised blocks. Useful for analysing cache
    /// warming or debugging
    pub fn uninitialised_block_count(&self) -> usize {
        self.blocks.iter().filter(|b| !b.valid).count()
    }
}
