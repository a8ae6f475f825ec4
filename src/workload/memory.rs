//! Resident memory growth in fixed-size chunks.

use crate::config::LoadConfig;
use crate::report::Reporter;
use crate::signal::StopSignal;
use crate::sysmem::MemoryProbe;
use std::time::Instant;

/// Ordered set of equally sized, fully committed buffers.
#[derive(Debug, Default)]
pub struct ChunkSet {
    chunks: Vec<Vec<u8>>,
    chunk_size: usize,
}

impl ChunkSet {
    pub fn new(chunk_size: usize) -> Self {
        Self {
            chunks: Vec::new(),
            chunk_size,
        }
    }

    /// Append one chunk filled with a repeating non-zero pattern, so every
    /// page is actually written rather than left as a shared zero page.
    pub fn push_chunk(&mut self) {
        let chunk: Vec<u8> = (0..self.chunk_size).map(|i| i as u8).collect();
        self.chunks.push(chunk);
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    pub fn total_bytes(&self) -> u64 {
        self.chunks.iter().map(|c| c.len() as u64).sum()
    }

    pub fn iter(&self) -> impl Iterator<Item = &[u8]> {
        self.chunks.iter().map(Vec::as_slice)
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut [u8]> {
        self.chunks.iter_mut().map(Vec::as_mut_slice)
    }
}

/// Outcome of growing a [`ChunkSet`].
#[derive(Debug)]
pub enum Allocation {
    /// The target was reached.
    Complete(ChunkSet),
    /// A stop request arrived first; the chunks were released.
    Interrupted { allocated_bytes: u64 },
}

/// Bytes to allocate for `fraction` of `available`.
pub fn target_bytes(available: u64, fraction: f64) -> u64 {
    (available as f64 * fraction) as u64
}

/// Append `chunk_size`-byte chunks until at least `target` bytes are held,
/// polling `stop` before every append.
pub fn allocate(target: u64, chunk_size: usize, stop: &StopSignal) -> Allocation {
    let mut set = ChunkSet::new(chunk_size);
    if chunk_size == 0 {
        return Allocation::Complete(set);
    }

    let mut allocated = 0u64;
    while allocated < target {
        if stop.is_stopped() {
            return Allocation::Interrupted {
                allocated_bytes: allocated,
            };
        }
        set.push_chunk();
        allocated += chunk_size as u64;
    }
    Allocation::Complete(set)
}

/// Size the working set from `probe` and allocate it.
///
/// Returns `None` when a stop request interrupted the allocation, in which
/// case the disk phase must not start.
pub fn run_memory_phase(
    config: &LoadConfig,
    probe: &dyn MemoryProbe,
    stop: &StopSignal,
    reporter: &dyn Reporter,
) -> Option<ChunkSet> {
    let target = target_bytes(probe.available_bytes(), config.memory_fraction);
    reporter.memory_start(target);

    let start = Instant::now();
    match allocate(target, config.chunk_size_bytes(), stop) {
        Allocation::Complete(chunks) => {
            reporter.memory_allocated(chunks.total_bytes(), start.elapsed());
            Some(chunks)
        }
        Allocation::Interrupted { allocated_bytes } => {
            reporter.memory_interrupted(allocated_bytes);
            None
        }
    }
}
