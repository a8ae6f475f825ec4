//! The three load generators and the worker bodies that drive them.

pub mod cpu;
pub mod disk;
pub mod memory;
pub mod prime;

use crate::config::LoadConfig;
use crate::report::Reporter;
use crate::signal::StopSignal;
use crate::sysmem::MemoryProbe;

/// Body of the memory/disk worker: allocate, then hand the chunks to the
/// disk loop. An interrupted allocation skips the disk phase entirely.
pub fn run_memory_and_disk(
    config: &LoadConfig,
    probe: &dyn MemoryProbe,
    stop: &StopSignal,
    reporter: &dyn Reporter,
) {
    if let Some(chunks) = memory::run_memory_phase(config, probe, stop, reporter) {
        disk::run_disk_phase(chunks, config, stop, reporter);
    }
}
