//! Frame pacing.
//!
//! The scheduler owns the canvas and drives each tick through
//! composite, launch, wait and rendezvous. The transform for tick `i`
//! (resize, quantize, present) runs on a dedicated worker thread while the
//! scheduler sleeps out the frame's delay; the scheduler then blocks until
//! the worker hands the canvas back before touching it again. Tick spacing
//! is therefore `max(wait, transform latency)`.

use std::sync::mpsc::{self, Receiver, SyncSender};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use tracing::{debug, info, warn};

use crate::assets::Animation;
use crate::render::{DisplaySink, Transform};
use crate::{Canvas, PlayerError, Result};

/// Converts authored frame delays into wall-clock waits.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PacingPolicy {
    pub multiplier: f64,
    pub unit: Duration,
}

impl PacingPolicy {
    /// `delay * multiplier` milliseconds.
    pub fn millis(multiplier: f64) -> Self {
        Self {
            multiplier,
            unit: Duration::from_millis(1),
        }
    }

    /// Wall-clock wait for a frame authored with `delay`, rounded to the
    /// nearest nanosecond.
    pub fn wait_for(&self, delay: u32) -> Duration {
        let nanos = self.unit.as_nanos() as f64 * f64::from(delay) * self.multiplier;
        Duration::from_nanos(nanos.round() as u64)
    }
}

impl Default for PacingPolicy {
    fn default() -> Self {
        Self::millis(10.0)
    }
}

#[derive(Debug, Clone, Copy)]
pub struct TickRecord {
    pub index: usize,
    pub started_at: Instant,
    pub nominal_wait: Duration,
    pub transform_latency: Duration,
}

impl TickRecord {
    /// The transform took longer than the frame's wait.
    pub fn overran(&self) -> bool {
        self.transform_latency > self.nominal_wait
    }
}

/// Timing of a finished playback run.
#[derive(Debug, Clone)]
pub struct PlaybackReport {
    pub started_at: Instant,
    pub finished_at: Instant,
    pub ticks: Vec<TickRecord>,
}

impl PlaybackReport {
    fn empty() -> Self {
        let now = Instant::now();
        Self {
            started_at: now,
            finished_at: now,
            ticks: Vec::new(),
        }
    }

    pub fn elapsed(&self) -> Duration {
        self.finished_at.duration_since(self.started_at)
    }

    /// Time from each tick's start to the next tick's start; the last tick
    /// runs until the loop exits.
    pub fn spacings(&self) -> Vec<Duration> {
        self.ticks
            .iter()
            .enumerate()
            .map(|(i, tick)| {
                let next = self
                    .ticks
                    .get(i + 1)
                    .map(|t| t.started_at)
                    .unwrap_or(self.finished_at);
                next.duration_since(tick.started_at)
            })
            .collect()
    }

    pub fn overruns(&self) -> usize {
        self.ticks.iter().filter(|tick| tick.overran()).count()
    }
}

struct Completion {
    canvas: Canvas,
    latency: Duration,
}

/// Long-lived transform thread fed through a depth-1 queue. The canvas
/// travels to the worker by value and comes back with the completion signal,
/// so it is never reachable from two threads at once.
struct TransformWorker {
    jobs: Option<SyncSender<Canvas>>,
    done: Receiver<Completion>,
    handle: Option<JoinHandle<()>>,
}

impl TransformWorker {
    fn spawn(transform: Transform, mut sink: Box<dyn DisplaySink>) -> Result<Self> {
        let (jobs_tx, jobs_rx) = mpsc::sync_channel::<Canvas>(1);
        let (done_tx, done_rx) = mpsc::sync_channel::<Completion>(1);

        let handle = thread::Builder::new()
            .name("transform".to_string())
            .spawn(move || {
                for canvas in jobs_rx {
                    let started = Instant::now();
                    let grid = transform.apply(&canvas);
                    if let Err(err) = sink.present(&grid) {
                        warn!(%err, "display sink rejected grid");
                    }
                    let latency = started.elapsed();
                    if done_tx.send(Completion { canvas, latency }).is_err() {
                        break;
                    }
                }
                if let Err(err) = sink.finish() {
                    warn!(%err, "display sink failed to finish");
                }
            })?;

        Ok(Self {
            jobs: Some(jobs_tx),
            done: done_rx,
            handle: Some(handle),
        })
    }

    fn launch(&self, canvas: Canvas) -> Result<()> {
        self.jobs
            .as_ref()
            .ok_or(PlayerError::Worker("already shut down"))?
            .send(canvas)
            .map_err(|_| PlayerError::Worker("stopped accepting frames"))
    }

    fn rendezvous(&self) -> Result<Completion> {
        self.done
            .recv()
            .map_err(|_| PlayerError::Worker("stopped before signaling completion"))
    }

    fn shutdown(mut self) -> Result<()> {
        self.jobs.take();
        match self.handle.take() {
            Some(handle) => handle
                .join()
                .map_err(|_| PlayerError::Worker("panicked")),
            None => Ok(()),
        }
    }
}

impl Drop for TransformWorker {
    fn drop(&mut self) {
        self.jobs.take();
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

/// Drives playback of an [`Animation`] to completion.
#[derive(Debug, Clone)]
pub struct Scheduler {
    transform: Transform,
    pacing: PacingPolicy,
}

impl Scheduler {
    pub fn new(transform: Transform, pacing: PacingPolicy) -> Self {
        Self { transform, pacing }
    }

    /// Plays every frame once and returns per-tick timing.
    ///
    /// The canvas is seeded from the first frame; each tick then composites
    /// its frame, hands the canvas to the worker, sleeps the scaled delay and
    /// waits for the worker to finish before moving on.
    pub fn run(&self, animation: &Animation, sink: Box<dyn DisplaySink>) -> Result<PlaybackReport> {
        let frames = animation.frames();
        let Some(first) = frames.first() else {
            info!("animation has no frames, nothing to play");
            return Ok(PlaybackReport::empty());
        };

        let bounds = animation.bounds();
        info!(
            frames = frames.len(),
            canvas_width = bounds.width,
            canvas_height = bounds.height,
            grid_width = self.transform.width,
            grid_height = self.transform.height,
            "starting playback"
        );

        let mut canvas = Canvas::from_first_frame(bounds, first);
        let worker = TransformWorker::spawn(self.transform.clone(), sink)?;
        let mut ticks = Vec::with_capacity(frames.len());
        let started_at = Instant::now();

        for (index, frame) in frames.iter().enumerate() {
            let tick_start = Instant::now();
            let nominal_wait = self.pacing.wait_for(frame.delay);

            canvas.composite(frame);
            worker.launch(canvas)?;
            thread::sleep(nominal_wait);
            let done = worker.rendezvous()?;
            canvas = done.canvas;

            let record = TickRecord {
                index,
                started_at: tick_start,
                nominal_wait,
                transform_latency: done.latency,
            };
            if record.overran() {
                warn!(
                    tick = index,
                    wait_ms = nominal_wait.as_millis() as u64,
                    latency_ms = done.latency.as_millis() as u64,
                    "transform overran frame delay"
                );
            } else {
                debug!(
                    tick = index,
                    wait_ms = nominal_wait.as_millis() as u64,
                    latency_ms = done.latency.as_millis() as u64,
                    "tick complete"
                );
            }
            ticks.push(record);
        }

        worker.shutdown()?;

        let report = PlaybackReport {
            started_at,
            finished_at: Instant::now(),
            ticks,
        };
        info!(
            ticks = report.ticks.len(),
            overruns = report.overruns(),
            elapsed_ms = report.elapsed().as_millis() as u64,
            "playback finished"
        );
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use image::{Rgba, RgbaImage};

    use super::*;
    use crate::composite::Frame;
    use crate::palette::Palette;
    use crate::render::{Grid, MemorySink};

    const GRID_W: u32 = 4;
    const GRID_H: u32 = 2;

    fn animation(delays: &[u32]) -> Animation {
        let frames = delays
            .iter()
            .enumerate()
            .map(|(i, &delay)| {
                let shade = (i * 60) as u8;
                Frame::full(RgbaImage::from_pixel(8, 4, Rgba([shade, shade, shade, 255])), delay)
            })
            .collect();
        Animation::from_frames(frames)
    }

    fn scheduler(multiplier: f64) -> Scheduler {
        Scheduler::new(
            Transform::new(GRID_W, GRID_H, Palette::monochrome()),
            PacingPolicy::millis(multiplier),
        )
    }

    /// Sink that takes `latency` per grid and logs when each present finished.
    struct SlowSink {
        latency: Duration,
        finished: Arc<Mutex<Vec<Instant>>>,
    }

    impl DisplaySink for SlowSink {
        fn present(&mut self, _grid: &Grid) -> Result<()> {
            thread::sleep(self.latency);
            self.finished.lock().unwrap().push(Instant::now());
            Ok(())
        }
    }

    struct FailingSink;

    impl DisplaySink for FailingSink {
        fn present(&mut self, _grid: &Grid) -> Result<()> {
            Err(PlayerError::msg("display unplugged"))
        }
    }

    struct PanickingSink;

    impl DisplaySink for PanickingSink {
        fn present(&mut self, _grid: &Grid) -> Result<()> {
            panic!("sink exploded");
        }
    }

    fn assert_close(actual: Duration, expected: Duration) {
        let slack = Duration::from_millis(60);
        assert!(
            actual + Duration::from_millis(1) >= expected && actual <= expected + slack,
            "expected ~{expected:?}, measured {actual:?}"
        );
    }

    #[test]
    fn wait_scales_authored_delay() {
        let pacing = PacingPolicy::millis(10.0);
        assert_eq!(pacing.wait_for(10), Duration::from_millis(100));
        assert_eq!(pacing.wait_for(0), Duration::ZERO);
        assert_eq!(PacingPolicy::millis(2.5).wait_for(4), Duration::from_millis(10));
    }

    #[test]
    fn three_ticks_follow_scaled_delays() {
        let sink = MemorySink::new();
        let grids = sink.grids();

        let report = scheduler(10.0)
            .run(&animation(&[10, 20, 30]), Box::new(sink))
            .unwrap();

        let spacings = report.spacings();
        assert_eq!(spacings.len(), 3);
        for (spacing, expected_ms) in spacings.iter().zip([100, 200, 300]) {
            assert_close(*spacing, Duration::from_millis(expected_ms));
        }

        let grids = grids.lock().unwrap();
        assert_eq!(grids.len(), 3);
        assert!(grids
            .iter()
            .all(|grid| grid.len() == (GRID_W * GRID_H) as usize));
    }

    #[test]
    fn fast_transform_hides_behind_the_wait() {
        let finished = Arc::new(Mutex::new(Vec::new()));
        let sink = SlowSink {
            latency: Duration::from_millis(5),
            finished: finished.clone(),
        };

        let report = scheduler(10.0)
            .run(&animation(&[5, 5, 5]), Box::new(sink))
            .unwrap();

        assert_eq!(report.overruns(), 0);
        for spacing in report.spacings() {
            assert_close(spacing, Duration::from_millis(50));
        }
    }

    #[test]
    fn slow_transform_stretches_the_tick() {
        let finished = Arc::new(Mutex::new(Vec::new()));
        let sink = SlowSink {
            latency: Duration::from_millis(80),
            finished: finished.clone(),
        };

        let report = scheduler(10.0)
            .run(&animation(&[2, 2, 2]), Box::new(sink))
            .unwrap();

        assert_eq!(report.overruns(), 3);
        for spacing in report.spacings() {
            assert_close(spacing, Duration::from_millis(80));
        }

        // The next tick never starts before the previous grid was presented.
        let finished = finished.lock().unwrap();
        for (tick, presented) in report.ticks.iter().skip(1).zip(finished.iter()) {
            assert!(tick.started_at >= *presented);
        }
    }

    #[test]
    fn sink_errors_do_not_stop_playback() {
        let report = scheduler(0.0)
            .run(&animation(&[1, 1, 1, 1]), Box::new(FailingSink))
            .unwrap();
        assert_eq!(report.ticks.len(), 4);
    }

    #[test]
    fn dead_worker_is_reported() {
        let err = scheduler(0.0)
            .run(&animation(&[1, 1]), Box::new(PanickingSink))
            .unwrap_err();
        assert!(matches!(err, PlayerError::Worker(_)));
    }

    #[test]
    fn empty_animation_plays_nothing() {
        let sink = MemorySink::new();
        let grids = sink.grids();
        let report = scheduler(10.0)
            .run(&Animation::from_frames(Vec::new()), Box::new(sink))
            .unwrap();

        assert!(report.ticks.is_empty());
        assert!(grids.lock().unwrap().is_empty());
    }

    #[test]
    fn canvas_carries_over_between_ticks() {
        // Second frame is fully transparent, so both grids must match.
        let first = Frame::full(RgbaImage::from_pixel(8, 4, Rgba([255, 255, 255, 255])), 0);
        let second = Frame::full(RgbaImage::from_pixel(8, 4, Rgba([0, 0, 0, 0])), 0);
        let sink = MemorySink::new();
        let grids = sink.grids();

        scheduler(0.0)
            .run(&Animation::from_frames(vec![first, second]), Box::new(sink))
            .unwrap();

        let grids = grids.lock().unwrap();
        assert_eq!(grids.len(), 2);
        assert_eq!(grids[0], grids[1]);
    }
}
