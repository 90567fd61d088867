use std::collections::BTreeMap;
use std::fmt;
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, SyncSender};
use std::sync::{Arc, Mutex};
use std::thread::{self, ScopedJoinHandle};
use std::time::{Duration, Instant};

use mm_core::{MatmulError, Matrix, MultiplyStrategy, Result, Validation};
use tracing::debug;

use crate::config::{available_parallelism, EngineConfig};
use crate::partition::strip_ranges;

pub const DEFAULT_STRIP_WIDTH: usize = 100;
pub const DEFAULT_QUEUE_CAPACITY: usize = 16;

/// The three stages of the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Stage {
    Load,
    Compute,
    Write,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Stage::Load => "loader",
            Stage::Compute => "compute",
            Stage::Write => "writer",
        })
    }
}

/// Item carried on a pipeline queue.
#[derive(Debug)]
pub enum Message<T> {
    Data(T),
    /// Tells exactly one consumer to stop.
    EndOfStream,
}

/// Columns `[start_col, end_col)` of B at full height, as an `n x width`
/// matrix.
#[derive(Debug, Clone)]
pub struct Strip {
    pub start_col: usize,
    pub end_col: usize,
    pub data: Matrix,
}

/// Columns `[start_col, end_col)` of C at full height, as an `m x width`
/// matrix.
#[derive(Debug, Clone)]
pub struct PartialBlock {
    pub start_col: usize,
    pub end_col: usize,
    pub data: Matrix,
}

/// What one pipelined multiplication did.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PipelineReport {
    /// Wall time per stage. Compute time is summed over all workers.
    pub timings: BTreeMap<Stage, Duration>,
    pub strips_loaded: usize,
    /// Strips consumed by each compute worker, in spawn order.
    pub strips_per_worker: Vec<usize>,
    pub blocks_written: usize,
}

/// Loader, compute workers and writer connected by two bounded queues.
///
/// The loader cuts B into column strips and feeds queue 1; `workers`
/// compute threads share its receiver and turn each strip into the matching
/// column block of C on queue 2; the writer copies blocks into place. The
/// orchestrator shuts stages down in order with one end-of-stream message
/// per consumer.
#[derive(Debug, Clone)]
pub struct PipelineStrategy {
    strip_width: usize,
    workers: usize,
    queue_capacity: usize,
    stage_timeout: Option<Duration>,
    validation: Validation,
}

impl PipelineStrategy {
    pub fn new() -> Self {
        PipelineStrategy {
            strip_width: DEFAULT_STRIP_WIDTH,
            workers: available_parallelism(),
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            stage_timeout: None,
            validation: Validation::Always,
        }
    }

    pub fn from_config(config: &EngineConfig) -> Self {
        Self::new()
            .with_strip_width(config.strip_width)
            .with_workers(config.threads)
            .with_queue_capacity(config.queue_capacity)
            .with_stage_timeout(config.stage_timeout)
            .with_validation(config.validation)
    }

    pub fn with_strip_width(mut self, width: usize) -> Self {
        self.strip_width = width.max(1);
        self
    }

    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers.max(1);
        self
    }

    pub fn with_queue_capacity(mut self, capacity: usize) -> Self {
        self.queue_capacity = capacity.max(1);
        self
    }

    /// Bound every blocking receive by `timeout`; `None` waits forever.
    pub fn with_stage_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.stage_timeout = timeout;
        self
    }

    pub fn with_validation(mut self, validation: Validation) -> Self {
        self.validation = validation;
        self
    }

    pub fn strip_width(&self) -> usize {
        self.strip_width
    }

    pub fn workers(&self) -> usize {
        self.workers
    }

    /// Multiply and report per-stage timings and message counts.
    ///
    /// Every stage is joined before this returns, even on failure. When
    /// several stages fail, the root cause wins over the
    /// [`MatmulError::Interrupted`] errors it triggered downstream.
    pub fn multiply_with_report(&self, a: &Matrix, b: &Matrix) -> Result<(Matrix, PipelineReport)> {
        self.validation.check(a, b)?;
        let mut c = Matrix::zeros(a.rows(), b.cols());
        let timeout = self.stage_timeout;
        let mut report = PipelineReport::default();
        let mut errors = Vec::new();

        thread::scope(|s| {
            let (strip_tx, strip_rx) = mpsc::sync_channel::<Message<Strip>>(self.queue_capacity);
            let (block_tx, block_rx) =
                mpsc::sync_channel::<Message<PartialBlock>>(self.queue_capacity);
            let strip_rx = Arc::new(Mutex::new(strip_rx));

            let out = &mut c;
            let writer = s.spawn(move || timed(|| run_writer(&block_rx, out, timeout)));

            let compute: Vec<_> = (0..self.workers)
                .map(|_| {
                    let rx = Arc::clone(&strip_rx);
                    let tx = block_tx.clone();
                    s.spawn(move || timed(|| run_compute(a, &rx, &tx, timeout)))
                })
                .collect();
            // Workers hold the only receiver handles from here on.
            drop(strip_rx);

            let loader_tx = strip_tx.clone();
            let width = self.strip_width;
            let loader = s.spawn(move || timed(|| run_loader(b, width, &loader_tx)));

            match join_stage(loader, Stage::Load) {
                Ok((loaded, elapsed)) => {
                    report.strips_loaded = loaded;
                    report.timings.insert(Stage::Load, elapsed);
                }
                Err(e) => errors.push(e),
            }

            for _ in 0..self.workers {
                if strip_tx.send(Message::EndOfStream).is_err() {
                    break;
                }
            }
            drop(strip_tx);

            let mut compute_time = Duration::ZERO;
            for handle in compute {
                match join_stage(handle, Stage::Compute) {
                    Ok((consumed, elapsed)) => {
                        report.strips_per_worker.push(consumed);
                        compute_time += elapsed;
                    }
                    Err(e) => {
                        report.strips_per_worker.push(0);
                        errors.push(e);
                    }
                }
            }
            report.timings.insert(Stage::Compute, compute_time);

            // A closed queue here means the writer already failed.
            let _ = block_tx.send(Message::EndOfStream);
            drop(block_tx);

            match join_stage(writer, Stage::Write) {
                Ok((written, elapsed)) => {
                    report.blocks_written = written;
                    report.timings.insert(Stage::Write, elapsed);
                }
                Err(e) => errors.push(e),
            }
        });

        if let Some(err) = first_root_cause(errors) {
            return Err(err);
        }
        Ok((c, report))
    }
}

impl Default for PipelineStrategy {
    fn default() -> Self {
        Self::new()
    }
}

impl MultiplyStrategy for PipelineStrategy {
    fn name(&self) -> &str {
        "pipeline"
    }

    fn multiply(&self, a: &Matrix, b: &Matrix) -> Result<Matrix> {
        let (c, report) = self.multiply_with_report(a, b)?;
        debug!(
            strips = report.strips_loaded,
            blocks = report.blocks_written,
            per_worker = ?report.strips_per_worker,
            timings = ?report.timings,
            "pipeline multiply"
        );
        Ok(c)
    }
}

fn run_loader(b: &Matrix, width: usize, strips: &SyncSender<Message<Strip>>) -> Result<usize> {
    let n = b.rows();
    let mut loaded = 0;
    for cols in strip_ranges(b.cols(), width) {
        let mut data = Vec::with_capacity(n * cols.len());
        for k in 0..n {
            data.extend_from_slice(&b.row(k)[cols.clone()]);
        }
        let strip = Strip {
            start_col: cols.start,
            end_col: cols.end,
            data: Matrix::new(n, cols.len(), data)?,
        };
        strips
            .send(Message::Data(strip))
            .map_err(|_| interrupted(Stage::Load, "strip queue closed"))?;
        loaded += 1;
    }
    Ok(loaded)
}

fn run_compute(
    a: &Matrix,
    strips: &Mutex<Receiver<Message<Strip>>>,
    blocks: &SyncSender<Message<PartialBlock>>,
    timeout: Option<Duration>,
) -> Result<usize> {
    let mut consumed = 0;
    loop {
        let message = {
            let rx = strips
                .lock()
                .map_err(|_| interrupted(Stage::Compute, "strip queue lock poisoned"))?;
            take(&rx, timeout, Stage::Compute)?
        };
        let strip = match message {
            Message::Data(strip) => strip,
            Message::EndOfStream => break,
        };
        let block = PartialBlock {
            start_col: strip.start_col,
            end_col: strip.end_col,
            data: partial_product(a, &strip.data),
        };
        blocks
            .send(Message::Data(block))
            .map_err(|_| interrupted(Stage::Compute, "block queue closed"))?;
        consumed += 1;
    }
    Ok(consumed)
}

fn run_writer(
    blocks: &Receiver<Message<PartialBlock>>,
    c: &mut Matrix,
    timeout: Option<Duration>,
) -> Result<usize> {
    let mut written = 0;
    loop {
        let block = match take(blocks, timeout, Stage::Write)? {
            Message::Data(block) => block,
            Message::EndOfStream => break,
        };
        for i in 0..c.rows() {
            c.row_mut(i)[block.start_col..block.end_col].copy_from_slice(block.data.row(i));
        }
        written += 1;
    }
    Ok(written)
}

/// `a · strip`, accumulated in i-k-j order.
fn partial_product(a: &Matrix, strip: &Matrix) -> Matrix {
    let mut block = Matrix::zeros(a.rows(), strip.cols());
    for i in 0..a.rows() {
        let out = block.row_mut(i);
        for (k, &a_ik) in a.row(i).iter().enumerate() {
            for (cell, &s) in out.iter_mut().zip(strip.row(k)) {
                *cell += a_ik * s;
            }
        }
    }
    block
}

fn take<T>(rx: &Receiver<Message<T>>, timeout: Option<Duration>, stage: Stage) -> Result<Message<T>> {
    match timeout {
        None => rx
            .recv()
            .map_err(|_| interrupted(stage, "queue disconnected")),
        Some(timeout) => rx.recv_timeout(timeout).map_err(|e| match e {
            RecvTimeoutError::Timeout => MatmulError::StageTimeout {
                stage: stage.to_string(),
                timeout,
            },
            RecvTimeoutError::Disconnected => interrupted(stage, "queue disconnected"),
        }),
    }
}

fn timed<T>(f: impl FnOnce() -> Result<T>) -> Result<(T, Duration)> {
    let start = Instant::now();
    let value = f()?;
    Ok((value, start.elapsed()))
}

fn join_stage<T>(handle: ScopedJoinHandle<'_, Result<T>>, stage: Stage) -> Result<T> {
    handle.join().map_err(|_| MatmulError::WorkerPanicked {
        stage: stage.to_string(),
    })?
}

fn interrupted(stage: Stage, reason: &str) -> MatmulError {
    MatmulError::Interrupted {
        stage: stage.to_string(),
        reason: reason.to_string(),
    }
}

fn first_root_cause(errors: Vec<MatmulError>) -> Option<MatmulError> {
    let pos = errors
        .iter()
        .position(|e| !matches!(e, MatmulError::Interrupted { .. }))
        .unwrap_or(0);
    errors.into_iter().nth(pos)
}
