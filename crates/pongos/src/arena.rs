//! Fixed-capacity block allocator
//!
//! The arena carves one contiguous byte region into blocks. Every block
//! starts with an 8-byte header stored in the region itself:
//!
//! ```text
//! +----------------------+----------------------+------------------
//! | size | live (u32 LE) | next free (u32 LE)   | usable bytes ...
//! +----------------------+----------------------+------------------
//! ```
//!
//! Bit 0 of the size word is the live tag; sizes are multiples of [`ALIGN`]
//! so the bit is otherwise unused. Free blocks form a singly linked,
//! unordered list threaded through the `next` field (`u32::MAX` ends it).
//!
//! Allocation is first-fit. A free block that can hold the request, one
//! more header and at least one alignment unit is split; the tail takes the
//! head's place in the free list. Freed blocks are pushed onto the head of
//! the list and are never merged with their neighbours, so fragmentation
//! only grows over a run. Because nothing is merged, the headers tile the
//! region from offset 0 and every block boundary can be found by walking
//! them.
//!
//! Each arena has its own id and a generation that [`Arena::initialize`]
//! bumps. Handles carry both, so a handle from another arena or from
//! before a reset is rejected instead of corrupting the free list.
//!
//! # Example
//!
//! ```
//! use pongos::arena::Arena;
//!
//! let mut arena = Arena::new([0u8; 256]).unwrap();
//! let block = arena.allocate(20).unwrap();
//! assert_eq!(arena.usable_size(&block), Ok(24));
//! arena.deallocate(block).unwrap();
//! ```

use core::sync::atomic::{AtomicU32, Ordering};

use crate::error::ArenaError;

/// Alignment unit for block sizes, in bytes
pub const ALIGN: usize = 8;
/// Size of the in-band block header, in bytes
pub const HEADER_SIZE: usize = 8;

const LIVE_TAG: u32 = 0x1;
const SIZE_MASK: u32 = !LIVE_TAG;
const NIL: u32 = u32::MAX;
/// Largest region addressable by 32-bit header fields
const MAX_CAPACITY: usize = (u32::MAX as usize) & !(ALIGN - 1);

static NEXT_ARENA_ID: AtomicU32 = AtomicU32::new(0);

/// Round `size` up to the next multiple of [`ALIGN`]
#[inline]
pub const fn align_up(size: usize) -> Option<usize> {
    match size.checked_add(ALIGN - 1) {
        Some(padded) => Some(padded & !(ALIGN - 1)),
        None => None,
    }
}

/// Handle to a live block
///
/// Holds the offset of the usable region, which sits right after the
/// block's header, plus the id and generation of the arena that issued
/// it. Handles are not `Clone`: giving one back to [`Arena::deallocate`]
/// consumes it.
#[derive(Debug, PartialEq, Eq)]
pub struct Block {
    offset: usize,
    arena: u32,
    generation: u32,
}

impl Block {
    /// Offset of the usable region within the arena
    #[inline]
    pub const fn offset(&self) -> usize {
        self.offset
    }
}

/// One entry of the free list
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FreeBlock {
    /// Offset of the usable region
    pub offset: usize,
    /// Usable size in bytes
    pub size: usize,
}

/// Snapshot of arena occupancy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ArenaStats {
    pub capacity: usize,
    pub free_bytes: usize,
    pub free_blocks: usize,
    pub largest_free: usize,
}

#[derive(Debug, Clone, Copy)]
struct Header {
    size: usize,
    live: bool,
    next: Option<usize>,
}

impl Header {
    const fn free(size: usize, next: Option<usize>) -> Self {
        Header { size, live: false, next }
    }

    const fn live(size: usize) -> Self {
        Header { size, live: true, next: None }
    }
}

/// Block allocator over a fixed byte region
///
/// `S` is the backing storage: a static slice on hardware, an array or a
/// `Vec<u8>` on a host.
pub struct Arena<S> {
    storage: S,
    capacity: usize,
    free_head: Option<usize>,
    id: u32,
    generation: u32,
}

impl<S: AsRef<[u8]> + AsMut<[u8]>> Arena<S> {
    /// Take ownership of `storage` and initialize it as one free block
    ///
    /// Trailing bytes beyond the last alignment unit are left unused.
    pub fn new(storage: S) -> Result<Self, ArenaError> {
        let len = storage.as_ref().len();
        let capacity = len.min(MAX_CAPACITY) & !(ALIGN - 1);
        if capacity < HEADER_SIZE + ALIGN {
            return Err(ArenaError::TooSmall { len });
        }

        let mut arena = Arena {
            storage,
            capacity,
            free_head: None,
            id: NEXT_ARENA_ID.fetch_add(1, Ordering::Relaxed),
            generation: 0,
        };
        arena.initialize();
        Ok(arena)
    }

    /// Reset to a single free block spanning the whole region
    ///
    /// Any outstanding [`Block`] handles become invalid.
    pub fn initialize(&mut self) {
        self.write_header(0, Header::free(self.capacity - HEADER_SIZE, None));
        self.free_head = Some(0);
        self.generation = self.generation.wrapping_add(1);
        trace!(debug, capacity = self.capacity, generation = self.generation, "arena initialized");
    }

    /// Managed region size in bytes, headers included
    #[inline]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Allocate a block of at least `size` bytes
    ///
    /// Returns [`ArenaError::Exhausted`] when no free block is large enough.
    pub fn allocate(&mut self, size: usize) -> Result<Block, ArenaError> {
        let Some(size) = align_up(size.max(1)).filter(|&aligned| aligned <= self.capacity) else {
            trace!(warn, requested = size, "arena request exceeds capacity");
            return Err(ArenaError::exhausted(size));
        };

        let mut prev = None;
        let mut cursor = self.free_head;
        while let Some(at) = cursor {
            let header = self.read_header(at);
            if header.size >= size {
                let successor = if header.size >= size + HEADER_SIZE + ALIGN {
                    // Split: the tail stays free and takes this block's place
                    let tail = at + HEADER_SIZE + size;
                    self.write_header(tail, Header::free(header.size - size - HEADER_SIZE, header.next));
                    self.write_header(at, Header::live(size));
                    Some(tail)
                } else {
                    self.write_header(at, Header::live(header.size));
                    header.next
                };
                self.relink(prev, successor);
                trace!(trace, offset = at + HEADER_SIZE, size, "block allocated");
                return Ok(Block {
                    offset: at + HEADER_SIZE,
                    arena: self.id,
                    generation: self.generation,
                });
            }
            prev = Some(at);
            cursor = header.next;
        }

        trace!(warn, requested = size, "arena exhausted");
        Err(ArenaError::exhausted(size))
    }

    /// Return a block to the free list
    ///
    /// `None` is accepted and ignored. The block is pushed onto the head of
    /// the free list as-is; adjacent free blocks are not merged.
    pub fn deallocate(&mut self, block: impl Into<Option<Block>>) -> Result<(), ArenaError> {
        let Some(block) = block.into() else {
            return Ok(());
        };

        let at = self.live_header(&block)?;
        let size = self.read_header(at).size;
        self.write_header(at, Header::free(size, self.free_head));
        self.free_head = Some(at);
        trace!(trace, offset = block.offset, size, "block freed");
        Ok(())
    }

    /// Usable size of a live block (at least what was requested)
    pub fn usable_size(&self, block: &Block) -> Result<usize, ArenaError> {
        let at = self.live_header(block)?;
        Ok(self.read_header(at).size)
    }

    /// Usable bytes of a live block
    pub fn bytes(&self, block: &Block) -> Result<&[u8], ArenaError> {
        let size = self.usable_size(block)?;
        Ok(&self.storage.as_ref()[block.offset..block.offset + size])
    }

    /// Mutable usable bytes of a live block
    pub fn bytes_mut(&mut self, block: &Block) -> Result<&mut [u8], ArenaError> {
        let size = self.usable_size(block)?;
        Ok(&mut self.storage.as_mut()[block.offset..block.offset + size])
    }

    /// Walk the free list from its head
    pub fn free_blocks(&self) -> FreeBlocks<'_, S> {
        FreeBlocks {
            arena: self,
            cursor: self.free_head,
        }
    }

    /// Occupancy snapshot
    pub fn stats(&self) -> ArenaStats {
        self.free_blocks().fold(
            ArenaStats {
                capacity: self.capacity,
                ..ArenaStats::default()
            },
            |mut stats, block| {
                stats.free_bytes += block.size;
                stats.free_blocks += 1;
                stats.largest_free = stats.largest_free.max(block.size);
                stats
            },
        )
    }

    /// Raw view of the managed region, for owners of a block they know is live
    pub(crate) fn region(&self) -> &[u8] {
        &self.storage.as_ref()[..self.capacity]
    }

    pub(crate) fn region_mut(&mut self) -> &mut [u8] {
        &mut self.storage.as_mut()[..self.capacity]
    }

    fn live_header(&self, block: &Block) -> Result<usize, ArenaError> {
        let offset = block.offset;
        if block.arena != self.id || block.generation != self.generation {
            return Err(ArenaError::invalid_block(offset));
        }
        if offset < HEADER_SIZE || offset & (ALIGN - 1) != 0 || offset > self.capacity {
            return Err(ArenaError::invalid_block(offset));
        }

        let at = offset - HEADER_SIZE;
        if !self.is_boundary(at) {
            return Err(ArenaError::invalid_block(offset));
        }
        let header = self.read_header(at);
        if !header.live || offset + header.size > self.capacity {
            return Err(ArenaError::invalid_block(offset));
        }
        Ok(at)
    }

    /// Whether a header starts at `target`, found by walking from offset 0
    fn is_boundary(&self, target: usize) -> bool {
        let mut at = 0;
        while at < target {
            at += HEADER_SIZE + self.read_header(at).size;
        }
        at == target
    }

    fn relink(&mut self, prev: Option<usize>, next: Option<usize>) {
        match prev {
            Some(at) => {
                let mut header = self.read_header(at);
                header.next = next;
                self.write_header(at, header);
            }
            None => self.free_head = next,
        }
    }

    fn read_header(&self, at: usize) -> Header {
        let raw = &self.storage.as_ref()[at..at + HEADER_SIZE];
        let word = u32::from_le_bytes([raw[0], raw[1], raw[2], raw[3]]);
        let next = u32::from_le_bytes([raw[4], raw[5], raw[6], raw[7]]);
        Header {
            size: (word & SIZE_MASK) as usize,
            live: (word & LIVE_TAG) != 0,
            next: (next != NIL).then_some(next as usize),
        }
    }

    fn write_header(&mut self, at: usize, header: Header) {
        let word = (header.size as u32 & SIZE_MASK) | if header.live { LIVE_TAG } else { 0 };
        let next = header.next.map_or(NIL, |next| next as u32);
        let raw = &mut self.storage.as_mut()[at..at + HEADER_SIZE];
        raw[..4].copy_from_slice(&word.to_le_bytes());
        raw[4..].copy_from_slice(&next.to_le_bytes());
    }
}

/// Iterator over the free list, see [`Arena::free_blocks`]
pub struct FreeBlocks<'a, S> {
    arena: &'a Arena<S>,
    cursor: Option<usize>,
}

impl<S: AsRef<[u8]> + AsMut<[u8]>> Iterator for FreeBlocks<'_, S> {
    type Item = FreeBlock;

    fn next(&mut self) -> Option<FreeBlock> {
        let at = self.cursor?;
        let header = self.arena.read_header(at);
        self.cursor = header.next;
        Some(FreeBlock {
            offset: at + HEADER_SIZE,
            size: header.size,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;

    fn arena(len: usize) -> Arena<Vec<u8>> {
        Arena::new(vec![0u8; len]).unwrap()
    }

    /// Handle at `offset` that passes the id and generation checks
    fn forge<S>(arena: &Arena<S>, offset: usize) -> Block {
        Block {
            offset,
            arena: arena.id,
            generation: arena.generation,
        }
    }

    fn free_list<S: AsRef<[u8]> + AsMut<[u8]>>(arena: &Arena<S>) -> Vec<(usize, usize)> {
        arena.free_blocks().map(|b| (b.offset, b.size)).collect()
    }

    #[test]
    fn test_rejects_tiny_storage() {
        assert_eq!(Arena::new([0u8; 15]).err(), Some(ArenaError::TooSmall { len: 15 }));
        assert!(Arena::new([0u8; 16]).is_ok());
    }

    #[test]
    fn test_initial_single_free_block() {
        let arena = arena(1024);
        assert_eq!(free_list(&arena), vec![(8, 1016)]);
        assert_eq!(
            arena.stats(),
            ArenaStats { capacity: 1024, free_bytes: 1016, free_blocks: 1, largest_free: 1016 }
        );
    }

    #[test]
    fn test_capacity_rounds_down_to_alignment() {
        let arena = arena(100);
        assert_eq!(arena.capacity(), 96);
    }

    #[test]
    fn test_sizes_round_up_to_alignment() {
        let mut arena = arena(1024);
        let a = arena.allocate(5).unwrap();
        let b = arena.allocate(0).unwrap();
        let c = arena.allocate(17).unwrap();
        assert_eq!(arena.usable_size(&a), Ok(8));
        assert_eq!(arena.usable_size(&b), Ok(8));
        assert_eq!(arena.usable_size(&c), Ok(24));
    }

    #[test]
    fn test_split_places_blocks_back_to_back() {
        let mut arena = arena(1024);
        let a = arena.allocate(16).unwrap();
        let b = arena.allocate(32).unwrap();
        assert_eq!(a.offset(), 8);
        assert_eq!(b.offset(), 8 + 16 + HEADER_SIZE);
        assert_eq!(free_list(&arena), vec![(72, 1024 - 72)]);
    }

    #[test]
    fn test_exact_fit_takes_whole_block() {
        // 56 usable bytes: a 48-byte request leaves no room for header + unit
        let mut arena = arena(64);
        let a = arena.allocate(48).unwrap();
        assert_eq!(arena.usable_size(&a), Ok(56));
        assert!(free_list(&arena).is_empty());
        assert_eq!(arena.allocate(1), Err(ArenaError::Exhausted { requested: 8 }));
    }

    #[test]
    fn test_exhaustion_is_reported() {
        let mut arena = arena(128);
        assert_eq!(arena.allocate(4096), Err(ArenaError::Exhausted { requested: 4096 }));
        assert_eq!(arena.allocate(usize::MAX), Err(ArenaError::Exhausted { requested: usize::MAX }));
    }

    #[test]
    fn test_deallocate_none_is_noop() {
        let mut arena = arena(256);
        let before = arena.stats();
        assert_eq!(arena.deallocate(None), Ok(()));
        assert_eq!(arena.stats(), before);
    }

    #[test]
    fn test_freed_block_is_reused_first() {
        let mut arena = arena(1024);
        let a = arena.allocate(64).unwrap();
        let _b = arena.allocate(64).unwrap();
        let offset = a.offset();

        arena.deallocate(a).unwrap();
        let c = arena.allocate(40).unwrap();
        assert_eq!(c.offset(), offset);
        // 64 >= 40 + header + unit, so the freed block was split again
        assert_eq!(arena.usable_size(&c), Ok(40));
        assert_eq!(free_list(&arena)[0], (56, 16));
    }

    #[test]
    fn test_double_free_is_rejected() {
        let mut arena = arena(256);
        let a = arena.allocate(16).unwrap();
        let twin = forge(&arena, a.offset());
        arena.deallocate(a).unwrap();
        assert_eq!(arena.deallocate(twin), Err(ArenaError::InvalidBlock { offset: 8 }));
    }

    #[test]
    fn test_foreign_offsets_are_rejected() {
        let mut arena = arena(256);
        let three = forge(&arena, 3);
        let far = forge(&arena, 4096);
        let first = forge(&arena, 8);
        assert_eq!(arena.deallocate(three), Err(ArenaError::InvalidBlock { offset: 3 }));
        assert_eq!(arena.deallocate(far), Err(ArenaError::InvalidBlock { offset: 4096 }));
        assert_eq!(arena.usable_size(&first), Err(ArenaError::InvalidBlock { offset: 8 }));
    }

    #[test]
    fn test_stale_handle_after_initialize_is_rejected() {
        let mut arena = arena(256);
        let _a = arena.allocate(16).unwrap();
        let b = arena.allocate(16).unwrap();
        arena.initialize();

        assert_eq!(arena.usable_size(&b), Err(ArenaError::InvalidBlock { offset: 32 }));
        assert_eq!(arena.deallocate(b), Err(ArenaError::InvalidBlock { offset: 32 }));
        assert_eq!(free_list(&arena), vec![(8, 248)]);

        let c = arena.allocate(16).unwrap();
        let d = arena.allocate(200).unwrap();
        assert_eq!((c.offset(), d.offset()), (8, 32));
    }

    #[test]
    fn test_handle_from_other_arena_is_rejected() {
        let mut one = arena(256);
        let mut two = arena(256);
        let block = one.allocate(16).unwrap();
        let _own = two.allocate(16).unwrap();

        assert_eq!(two.bytes(&block), Err(ArenaError::InvalidBlock { offset: 8 }));
        assert_eq!(two.deallocate(block), Err(ArenaError::InvalidBlock { offset: 8 }));
        assert_eq!(free_list(&two), vec![(32, 224)]);
    }

    #[test]
    fn test_offset_inside_a_block_is_rejected() {
        let mut arena = arena(256);
        let a = arena.allocate(64).unwrap();
        // Payload bytes that look like a live 16-byte header
        let bytes = arena.bytes_mut(&a).unwrap();
        bytes[8..12].copy_from_slice(&17u32.to_le_bytes());
        bytes[12..16].copy_from_slice(&u32::MAX.to_le_bytes());

        let inner = forge(&arena, a.offset() + 16);
        assert_eq!(arena.deallocate(inner), Err(ArenaError::InvalidBlock { offset: 24 }));
        assert_eq!(free_list(&arena), vec![(80, 176)]);
    }

    #[test]
    fn test_freed_blocks_never_coalesce() {
        // A spans the whole arena, is freed, then B splits it. Once B is
        // freed too, the list holds B (64) and its split remainder (176):
        // 248 bytes are free in total, yet a 200-byte request must fail.
        let mut arena = arena(256);
        let a = arena.allocate(248).unwrap();
        assert_eq!(arena.usable_size(&a), Ok(248));
        arena.deallocate(a).unwrap();

        let b = arena.allocate(64).unwrap();
        arena.deallocate(b).unwrap();
        assert_eq!(free_list(&arena), vec![(8, 64), (80, 176)]);
        assert_eq!(arena.stats().free_bytes + HEADER_SIZE, 248);

        assert_eq!(arena.allocate(200), Err(ArenaError::Exhausted { requested: 200 }));
        assert!(arena.allocate(176).is_ok());
    }

    #[test]
    fn test_initialize_discards_fragmentation() {
        let mut arena = arena(256);
        let a = arena.allocate(64).unwrap();
        arena.deallocate(a).unwrap();
        arena.initialize();
        assert_eq!(free_list(&arena), vec![(8, 248)]);
    }

    #[test]
    fn test_block_bytes_are_isolated() {
        let mut arena = arena(256);
        let a = arena.allocate(8).unwrap();
        let b = arena.allocate(8).unwrap();
        arena.bytes_mut(&a).unwrap().fill(0xAA);
        arena.bytes_mut(&b).unwrap().fill(0x55);
        assert_eq!(arena.bytes(&a).unwrap(), &[0xAA; 8]);
        assert_eq!(arena.bytes(&b).unwrap(), &[0x55; 8]);
    }

    #[derive(Debug, Clone)]
    enum Op {
        Alloc(usize),
        Free(usize),
    }

    fn op() -> impl Strategy<Value = Op> {
        prop_oneof![
            (0usize..300).prop_map(Op::Alloc),
            any::<usize>().prop_map(Op::Free),
        ]
    }

    proptest! {
        #[test]
        fn prop_live_blocks_never_overlap(ops in prop::collection::vec(op(), 1..64)) {
            let mut arena = arena(2048);
            let mut live: Vec<(Block, usize)> = Vec::new();

            for op in ops {
                match op {
                    Op::Alloc(size) => {
                        if let Ok(block) = arena.allocate(size) {
                            prop_assert!(arena.usable_size(&block).unwrap() >= size);
                            live.push((block, size));
                        }
                    }
                    Op::Free(pick) if !live.is_empty() => {
                        let (block, _) = live.swap_remove(pick % live.len());
                        prop_assert!(arena.deallocate(block).is_ok());
                    }
                    Op::Free(_) => {}
                }

                let mut regions: Vec<(usize, usize, bool)> = live
                    .iter()
                    .map(|(b, _)| (b.offset() - HEADER_SIZE, b.offset() + arena.usable_size(b).unwrap(), true))
                    .chain(arena.free_blocks().map(|f| (f.offset - HEADER_SIZE, f.offset + f.size, false)))
                    .collect();
                regions.sort_unstable();

                for pair in regions.windows(2) {
                    prop_assert!(pair[0].1 <= pair[1].0, "overlap: {:?}", pair);
                }
                // Without coalescing every byte stays accounted for
                let covered: usize = regions.iter().map(|r| r.1 - r.0).sum();
                prop_assert_eq!(covered, arena.capacity());
            }
        }
    }
}
