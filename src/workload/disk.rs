//! Sequential write/sync/read cycles over the allocated chunks.

use crate::config::LoadConfig;
use crate::report::{DiskProgress, Reporter};
use crate::result::{RunningAverage, Sample};
use crate::signal::StopSignal;
use crate::workload::memory::ChunkSet;
use anyhow::{Context, Result};
use rand::RngCore;
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::Path;
use std::time::Instant;
use tempfile::NamedTempFile;
use tracing::{debug, error, warn};

/// A report is forced every this many iterations, independent of the interval.
pub const REPORT_EVERY_ITERATIONS: u64 = 5;

/// Measurements from one write-then-read cycle.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DiskSample {
    pub write: Sample,
    pub read: Sample,
}

/// Scratch file removed when dropped or closed.
pub struct ScratchFile {
    file: NamedTempFile,
}

impl ScratchFile {
    /// Create a fresh `perf_test_*.tmp` file in `dir`.
    pub fn create_in(dir: &Path) -> io::Result<Self> {
        let file = tempfile::Builder::new()
            .prefix("perf_test_")
            .suffix(".tmp")
            .tempfile_in(dir)?;
        Ok(Self { file })
    }

    pub fn path(&self) -> &Path {
        self.file.path()
    }

    /// Truncate, then write every chunk with fresh random content and sync.
    ///
    /// The sync is part of the measured time. Returns `None` if `stop` was
    /// set between chunks.
    pub fn write_pass(&mut self, chunks: &mut ChunkSet, stop: &StopSignal) -> io::Result<Option<Sample>> {
        let file = self.file.as_file_mut();
        file.set_len(0)?;
        file.seek(SeekFrom::Start(0))?;

        let mut rng = rand::thread_rng();
        let start = Instant::now();
        let mut written = 0u64;
        for chunk in chunks.iter_mut() {
            if stop.is_stopped() {
                return Ok(None);
            }
            rng.fill_bytes(chunk);
            file.write_all(chunk)?;
            written += chunk.len() as u64;
        }
        file.sync_all()?;

        Ok(Some(Sample::bytes(start.elapsed(), written)))
    }

    /// Rewind and read sequentially into `buf` until end of file.
    ///
    /// Returns `None` if `stop` was set between reads.
    pub fn read_pass(&mut self, buf: &mut [u8], stop: &StopSignal) -> io::Result<Option<Sample>> {
        let file = self.file.as_file_mut();
        file.seek(SeekFrom::Start(0))?;

        let start = Instant::now();
        let mut read = 0u64;
        loop {
            if stop.is_stopped() {
                return Ok(None);
            }
            let n = file.read(buf)?;
            if n == 0 {
                break;
            }
            read += n as u64;
        }

        Ok(Some(Sample::bytes(start.elapsed(), read)))
    }

    /// One full write-then-read cycle.
    pub fn cycle(
        &mut self,
        chunks: &mut ChunkSet,
        buf: &mut [u8],
        stop: &StopSignal,
    ) -> Result<Option<DiskSample>> {
        let Some(write) = self
            .write_pass(chunks, stop)
            .context("writing scratch file")?
        else {
            return Ok(None);
        };
        let Some(read) = self.read_pass(buf, stop).context("reading scratch file")? else {
            return Ok(None);
        };
        Ok(Some(DiskSample { write, read }))
    }

    /// Remove the file now, surfacing any error.
    pub fn close(self) -> io::Result<()> {
        self.file.close()
    }
}

/// Drive write/read cycles over `chunks` until stopped or an I/O error.
///
/// Returns the number of completed cycles. Any error ends the loop; it is
/// never retried. The scratch file is removed on every path.
pub fn run_disk_loop(
    chunks: &mut ChunkSet,
    config: &LoadConfig,
    stop: &StopSignal,
    reporter: &dyn Reporter,
) -> Result<u64> {
    let mut scratch = ScratchFile::create_in(&config.disk_path).with_context(|| {
        format!(
            "creating scratch file in {}",
            config.disk_path.display()
        )
    })?;
    debug!(path = %scratch.path().display(), "created scratch file");

    let outcome = drive(&mut scratch, chunks, config, stop, reporter);

    if let Err(e) = scratch.close() {
        warn!("Error removing scratch file: {}", e);
    }
    outcome
}

fn drive(
    scratch: &mut ScratchFile,
    chunks: &mut ChunkSet,
    config: &LoadConfig,
    stop: &StopSignal,
    reporter: &dyn Reporter,
) -> Result<u64> {
    let mut buf = vec![0u8; chunks.chunk_size().max(1)];
    let mut writes = RunningAverage::new();
    let mut reads = RunningAverage::new();
    let mut iterations = 0u64;
    let mut last_report = Instant::now();

    while !stop.is_stopped() {
        let Some(sample) = scratch.cycle(chunks, &mut buf, stop)? else {
            break;
        };
        iterations += 1;
        writes.add(sample.write.mib_per_sec().unwrap_or_default());
        reads.add(sample.read.mib_per_sec().unwrap_or_default());

        if last_report.elapsed() >= config.report_interval
            || iterations % REPORT_EVERY_ITERATIONS == 0
        {
            reporter.disk_progress(&DiskProgress {
                iterations,
                avg_write_mib_per_sec: writes.mean(),
                avg_read_mib_per_sec: reads.mean(),
            });
            last_report = Instant::now();
        }
    }
    Ok(iterations)
}

/// Disk phase entry point: consumes the chunks handed over by the
/// allocator and runs until stopped. Errors stop only this phase.
pub fn run_disk_phase(
    mut chunks: ChunkSet,
    config: &LoadConfig,
    stop: &StopSignal,
    reporter: &dyn Reporter,
) {
    reporter.disk_start(&config.disk_path);
    if chunks.is_empty() {
        reporter.disk_no_chunks();
        return;
    }

    match run_disk_loop(&mut chunks, config, stop, reporter) {
        Ok(iterations) => reporter.disk_end(iterations),
        Err(e) => error!("Disk benchmark stopped: {:#}", e),
    }
}
