// Main render loop and input handling.
//
// The touch input is rendered into a mask which then inverts the background, so
// a tested cell stays visible whatever colour the background cycles to. Once
// every frame interval the finished backbuffer is copied to the display; the
// rest of the time is spent polling for input.

use std::io::{self, Write};
use std::sync::atomic::{AtomicBool, Ordering};

use log::{debug, info};

use crate::compositor::Compositor;
use crate::coverage::Coverage;
use crate::error::Error;
use crate::touch;
use crate::types::{CellSize, Clock, Geometry, Surface, TouchPoint, TouchSource};

pub const FRAME_RATE_HZ: u64 = 60;
/// Milliseconds between two presented frames.
pub const FRAME_INTERVAL_MS: u64 = 1000 / FRAME_RATE_HZ;
/// The background colour moves on once this many frames have passed.
pub const BG_CYCLE_FRAMES: u32 = 60;

/// Knobs the operator controls from the command line.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Settings {
    pub cell: CellSize,
    pub fade: u8,
    pub banding: bool,
    /// Stop as soon as the whole panel has been covered once.
    pub abort_on_success: bool,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LoopState {
    Running,
    Stopping,
    Stopped,
}

/// What happened during one run; returned when the loop stops.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub frames: u64,
    pub touches: u64,
    pub completions: u64,
}

pub struct RenderLoop {
    geometry: Geometry,
    settings: Settings,
    state: LoopState,

    backbuffer: Vec<u8>, // next frame, copied to the display on a frame boundary
    mask: Vec<u8>,       // recently touched cells, fading every frame
    coverage: Coverage,
    compositor: Compositor,

    last_touch: TouchPoint,
    update_pending: bool,
    frame_drawn: bool,
    cycle: u32,
    summary: RunSummary,
    report: Box<dyn Write>, // operator-facing result lines
}

/// Zero-filled buffer, reporting allocation failure instead of aborting.
fn zeroed(len: usize) -> Result<Vec<u8>, Error> {
    let mut buf = Vec::new();
    buf.try_reserve_exact(len)
        .map_err(|_| Error::Allocation { bytes: len })?;
    buf.resize(len, 0);
    Ok(buf)
}

impl RenderLoop {
    /// Allocate the backbuffer, the touch mask and the coverage grid for a
    /// display of the given shape.
    pub fn new(geometry: Geometry, settings: Settings) -> Result<Self, Error> {
        let backbuffer = zeroed(geometry.len)?;
        let mask = zeroed(geometry.len)?;
        let coverage = Coverage::new(&geometry, settings.cell);

        debug!(
            "coverage grid {}x{} ({} cells of {}x{})",
            coverage.columns(),
            coverage.rows(),
            coverage.len(),
            settings.cell.width,
            settings.cell.height
        );

        Ok(Self {
            geometry,
            settings,
            state: LoopState::Running,
            backbuffer,
            mask,
            coverage,
            compositor: Compositor::new(),
            last_touch: TouchPoint::default(),
            update_pending: false,
            frame_drawn: false,
            cycle: 0,
            summary: RunSummary::default(),
            report: Box::new(io::stdout()),
        })
    }

    /// Send the result lines somewhere other than stdout.
    pub fn with_report(mut self, report: impl Write + 'static) -> Self {
        self.report = Box::new(report);
        self
    }

    pub fn state(&self) -> LoopState {
        self.state
    }

    pub fn summary(&self) -> RunSummary {
        self.summary
    }

    pub fn coverage(&self) -> &Coverage {
        &self.coverage
    }

    pub fn palette_index(&self) -> usize {
        self.compositor.palette_index()
    }

    /// Run until `stop` is raised, the surface goes away, or (in abort mode)
    /// the panel has been fully covered. A display error also ends the run,
    /// after the usual cleanup and report.
    pub fn run<S, T, C>(mut self, surface: &mut S, input: &mut T, clock: &C, stop: &AtomicBool) -> Result<RunSummary, Error>
    where
        S: Surface,
        T: TouchSource,
        C: Clock,
    {
        let outcome = self.drive(surface, input, clock, stop);
        if let Err(e) = &outcome {
            debug!("render loop aborted: {e}");
        }
        let summary = self.finish();
        outcome.map(|()| summary)
    }

    fn drive<S, T, C>(&mut self, surface: &mut S, input: &mut T, clock: &C, stop: &AtomicBool) -> Result<(), Error>
    where
        S: Surface,
        T: TouchSource,
        C: Clock,
    {
        debug_assert_eq!(surface.geometry().len, self.geometry.len);
        surface.clear()?;

        while self.state == LoopState::Running {
            if stop.load(Ordering::Relaxed) || !surface.is_open() {
                self.state = LoopState::Stopping;
                break;
            }

            let elapsed_ms = clock.elapsed_ms();
            self.step(surface, input, elapsed_ms)?;
        }

        Ok(())
    }

    /// One pass of the loop at `elapsed_ms` since start.
    pub fn step<S, T>(&mut self, surface: &mut S, input: &mut T, elapsed_ms: u64) -> Result<LoopState, Error>
    where
        S: Surface,
        T: TouchSource,
    {
        // 1) Always drain one input event; only the latest position matters.
        if let Some(point) = input.poll() {
            self.last_touch = point;
            self.update_pending = true;
        }

        // 2) Between frame boundaries there is nothing else to do.
        if elapsed_ms % FRAME_INTERVAL_MS != 0 {
            self.frame_drawn = false;
            return Ok(self.state);
        }

        // 3) One frame per boundary, even if several iterations land on it.
        if !self.frame_drawn {
            self.draw_frame(surface)?;
            self.frame_drawn = true;
        }

        // 4) Feed the pending touch into the mask and the coverage grid.
        if self.update_pending {
            self.update_pending = false;
            if self.handle_touch() && self.settings.abort_on_success {
                self.state = LoopState::Stopping;
            }
        }

        Ok(self.state)
    }

    fn draw_frame<S: Surface>(&mut self, surface: &mut S) -> Result<(), Error> {
        let advance = self.cycle > BG_CYCLE_FRAMES;

        surface.present(&self.backbuffer)?;
        touch::decay(&mut self.mask, self.settings.fade);
        self.compositor.draw(&mut self.backbuffer, &self.mask, &self.geometry, self.settings.banding, advance);

        if advance {
            self.cycle = 0;
            debug!("background -> palette entry {}", self.compositor.palette_index());
        } else {
            self.cycle += 1;
        }
        self.summary.frames += 1;

        Ok(())
    }

    /// Returns true when this touch completed the coverage grid.
    fn handle_touch(&mut self) -> bool {
        let point = self.last_touch;
        let cell = touch::paint(&mut self.mask, &mut self.coverage, &self.geometry, point, self.settings.cell);
        self.summary.touches += 1;
        debug!(
            "touch ({}, {}) -> cell {:?}, {}/{} covered",
            point.x,
            point.y,
            cell,
            self.coverage.touched(),
            self.coverage.len()
        );

        let complete = self.coverage.check_to(&mut self.report);
        if complete {
            self.summary.completions += 1;
            info!("coverage cycle {} complete", self.summary.completions);
        }
        complete
    }

    /// Release the buffers and report.
    fn finish(mut self) -> RunSummary {
        self.state = LoopState::Stopped;
        let summary = self.summary;
        debug!("render loop {:?}: {:?}", self.state, summary);

        if let Err(e) = writeln!(self.report, "\nTest finished.") {
            debug!("finish line not written: {e}");
        }
        drop(self);
        summary
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::{Cell, RefCell};
    use std::collections::VecDeque;
    use std::rc::Rc;

    /// Shared byte sink so a test can read back what the loop reported.
    #[derive(Clone, Default)]
    struct Report(Rc<RefCell<Vec<u8>>>);

    impl Report {
        fn text(&self) -> String {
            String::from_utf8(self.0.borrow().clone()).unwrap()
        }
    }

    impl Write for Report {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.borrow_mut().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    /// Accepts `ok_frames` frames, then fails every present.
    struct FailingSurface {
        geometry: Geometry,
        ok_frames: usize,
    }

    impl Surface for FailingSurface {
        fn geometry(&self) -> Geometry {
            self.geometry
        }

        fn present(&mut self, _frame: &[u8]) -> Result<(), Error> {
            if self.ok_frames == 0 {
                return Err(Error::Map {
                    path: "/dev/fb0".into(),
                    source: io::Error::from(io::ErrorKind::BrokenPipe),
                });
            }
            self.ok_frames -= 1;
            Ok(())
        }

        fn clear(&mut self) -> Result<(), Error> {
            Ok(())
        }
    }

    struct FakeSurface {
        geometry: Geometry,
        frames: Vec<Vec<u8>>,
        cleared: bool,
    }

    impl FakeSurface {
        fn new(geometry: Geometry) -> Self {
            Self { geometry, frames: Vec::new(), cleared: false }
        }
    }

    impl Surface for FakeSurface {
        fn geometry(&self) -> Geometry {
            self.geometry
        }

        fn present(&mut self, frame: &[u8]) -> Result<(), Error> {
            self.frames.push(frame.to_vec());
            Ok(())
        }

        fn clear(&mut self) -> Result<(), Error> {
            self.cleared = true;
            Ok(())
        }
    }

    /// Hands out scripted touches, then raises `stop` once it runs dry.
    struct ScriptedTouch<'a> {
        events: VecDeque<TouchPoint>,
        stop: Option<&'a AtomicBool>,
    }

    impl<'a> ScriptedTouch<'a> {
        fn new(events: impl IntoIterator<Item = TouchPoint>) -> Self {
            Self { events: events.into_iter().collect(), stop: None }
        }
    }

    impl TouchSource for ScriptedTouch<'_> {
        fn poll(&mut self) -> Option<TouchPoint> {
            let next = self.events.pop_front();
            if next.is_none() {
                if let Some(stop) = self.stop {
                    stop.store(true, Ordering::Relaxed);
                }
            }
            next
        }
    }

    struct StepClock {
        now: Cell<u64>,
        step: u64,
    }

    impl Clock for StepClock {
        fn elapsed_ms(&self) -> u64 {
            let now = self.now.get();
            self.now.set(now + self.step);
            now
        }
    }

    fn settings(abort_on_success: bool) -> Settings {
        Settings {
            cell: CellSize { width: 50, height: 40 },
            fade: 2,
            banding: false,
            abort_on_success,
        }
    }

    /// Centre of every cell of an 800x320 / 50x40 grid, in index order.
    fn cell_centres() -> Vec<TouchPoint> {
        (0..128)
            .map(|i| TouchPoint { x: (i % 16) * 50 + 25, y: (i / 16) * 40 + 20 })
            .collect()
    }

    #[test]
    fn draws_one_frame_per_boundary() {
        let g = Geometry::packed(32, 4, 4);
        let mut surface = FakeSurface::new(g);
        let mut input = ScriptedTouch::new([]);
        let mut lp = RenderLoop::new(g, settings(false)).unwrap();

        for ms in 0..=64 {
            // a busy loop usually lands on the same millisecond several times
            lp.step(&mut surface, &mut input, ms).unwrap();
            lp.step(&mut surface, &mut input, ms).unwrap();
        }

        assert_eq!(surface.frames.len(), 5); // 0, 16, 32, 48, 64
        assert_eq!(lp.summary().frames, 5);
    }

    #[test]
    fn first_frame_is_black_then_background_follows() {
        let g = Geometry::packed(32, 4, 4);
        let mut surface = FakeSurface::new(g);
        let mut input = ScriptedTouch::new([]);
        let mut lp = RenderLoop::new(g, settings(false)).unwrap();

        for ms in 0..=16 {
            lp.step(&mut surface, &mut input, ms).unwrap();
        }

        assert!(surface.frames[0].iter().all(|&b| b == 0));
        for px in surface.frames[1].chunks_exact(4) {
            assert_eq!(px, &[0xFF, 0xFF, 0xFF, 0x00]);
        }
    }

    #[test]
    fn background_cycles_after_sixty_two_frames() {
        let g = Geometry::packed(8, 2, 4);
        let mut surface = FakeSurface::new(g);
        let mut input = ScriptedTouch::new([]);
        let mut lp = RenderLoop::new(g, settings(false)).unwrap();

        let mut draw = |lp: &mut RenderLoop, n: u64| {
            for _ in 0..n {
                lp.step(&mut surface, &mut input, 1).unwrap();
                lp.step(&mut surface, &mut input, 0).unwrap();
            }
        };

        draw(&mut lp, 61);
        assert_eq!(lp.palette_index(), 0);
        draw(&mut lp, 1);
        assert_eq!(lp.palette_index(), 1);
        draw(&mut lp, 62);
        assert_eq!(lp.palette_index(), 2);
    }

    #[test]
    fn touch_is_only_applied_on_a_boundary() {
        let g = Geometry::packed(800, 320, 4);
        let mut surface = FakeSurface::new(g);
        let mut input = ScriptedTouch::new([TouchPoint { x: 127, y: 45 }]);
        let mut lp = RenderLoop::new(g, settings(false)).unwrap();

        lp.step(&mut surface, &mut input, 3).unwrap();
        assert_eq!(lp.summary().touches, 0);
        assert!(!lp.coverage().is_marked(18));

        lp.step(&mut surface, &mut input, 16).unwrap();
        assert_eq!(lp.summary().touches, 1);
        assert!(lp.coverage().is_marked(18));
    }

    #[test]
    fn touched_cell_shows_inverted_on_next_presented_frame() {
        let g = Geometry::packed(800, 320, 4);
        let mut surface = FakeSurface::new(g);
        let mut input = ScriptedTouch::new([TouchPoint { x: 10, y: 10 }]);
        let mut lp = RenderLoop::new(g, Settings { fade: 0, ..settings(false) }).unwrap();

        lp.step(&mut surface, &mut input, 0).unwrap(); // frame 1 + touch
        lp.step(&mut surface, &mut input, 1).unwrap();
        lp.step(&mut surface, &mut input, 16).unwrap(); // frame 2: white, mask not yet in it
        lp.step(&mut surface, &mut input, 17).unwrap();
        lp.step(&mut surface, &mut input, 32).unwrap(); // frame 3: white ^ mask

        let frame = &surface.frames[2];
        assert_eq!(&frame[0..4], &[0, 0, 0, 0]);
        let untouched = &frame[(60 * 4)..(60 * 4 + 4)];
        assert_eq!(untouched, &[0xFF, 0xFF, 0xFF, 0x00]);
    }

    #[test]
    fn full_coverage_needs_every_cell_but_the_first() {
        let g = Geometry::packed(800, 320, 4);
        let mut surface = FakeSurface::new(g);
        let all = cell_centres();
        let mut input = ScriptedTouch::new(all.iter().copied().enumerate().filter(|&(i, _)| i != 0 && i != 5).map(|(_, p)| p));
        let report = Report::default();
        let mut lp = RenderLoop::new(g, settings(false)).unwrap().with_report(report.clone());

        for _ in 0..126 {
            lp.step(&mut surface, &mut input, 0).unwrap();
        }
        assert_eq!(lp.summary().touches, 126);
        assert_eq!(lp.summary().completions, 0);
        assert_eq!(lp.coverage().touched(), 126);
        assert_eq!(report.text(), "");

        let mut input = ScriptedTouch::new([all[5]]);
        lp.step(&mut surface, &mut input, 0).unwrap();
        assert_eq!(lp.summary().completions, 1);
        assert_eq!(lp.coverage().touched(), 0);
        assert_eq!(lp.state(), LoopState::Running);
        assert_eq!(report.text(), "Input test: success\n");
    }

    #[test]
    fn abort_mode_stops_after_full_coverage() {
        let g = Geometry::packed(800, 320, 4);
        let mut surface = FakeSurface::new(g);
        let stop = AtomicBool::new(false);
        let mut input = ScriptedTouch::new(cell_centres().into_iter().skip(1));
        input.stop = Some(&stop);
        let clock = StepClock { now: Cell::new(0), step: FRAME_INTERVAL_MS };

        let lp = RenderLoop::new(g, settings(true)).unwrap();
        let summary = lp.run(&mut surface, &mut input, &clock, &stop).unwrap();

        assert!(surface.cleared);
        assert_eq!(summary.touches, 127);
        assert_eq!(summary.completions, 1);
        assert!(!stop.load(Ordering::Relaxed));
    }

    #[test]
    fn stop_flag_ends_the_loop() {
        // a real grid, so the touches cannot complete it and abort first
        let g = Geometry::packed(800, 320, 4);
        let mut surface = FakeSurface::new(g);
        let stop = AtomicBool::new(false);
        let mut input = ScriptedTouch::new([TouchPoint { x: 1, y: 1 }; 3]);
        input.stop = Some(&stop);
        let clock = StepClock { now: Cell::new(0), step: 1 };
        let report = Report::default();

        let lp = RenderLoop::new(g, settings(true)).unwrap().with_report(report.clone());
        let summary = lp.run(&mut surface, &mut input, &clock, &stop).unwrap();

        assert!(stop.load(Ordering::Relaxed));
        assert_eq!(summary.frames, 1);
        assert_eq!(summary.touches, 1);
        assert_eq!(summary.completions, 0);
        assert_eq!(report.text(), "\nTest finished.\n");
    }

    #[test]
    fn display_error_still_finishes_the_test() {
        let g = Geometry::packed(64, 8, 4);
        let mut surface = FailingSurface { geometry: g, ok_frames: 2 };
        let stop = AtomicBool::new(false);
        let mut input = ScriptedTouch::new([]);
        let clock = StepClock { now: Cell::new(0), step: FRAME_INTERVAL_MS };
        let report = Report::default();

        let err = RenderLoop::new(g, settings(false))
            .unwrap()
            .with_report(report.clone())
            .run(&mut surface, &mut input, &clock, &stop)
            .unwrap_err();

        assert!(matches!(err, Error::Map { .. }));
        assert_eq!(report.text(), "\nTest finished.\n");
    }

    #[test]
    fn raised_stop_flag_never_draws() {
        let g = Geometry::packed(64, 8, 4);
        let mut surface = FakeSurface::new(g);
        let stop = AtomicBool::new(true);
        let mut input = ScriptedTouch::new([]);
        let clock = StepClock { now: Cell::new(0), step: 1 };

        let summary = RenderLoop::new(g, settings(false))
            .unwrap()
            .run(&mut surface, &mut input, &clock, &stop)
            .unwrap();

        assert_eq!(summary, RunSummary::default());
        assert!(surface.frames.is_empty());
    }
}
