// What the operator SEES:
// • The display cycles white, black, red, green, blue about once a second.
// • Every touch inverts the grid cell under the finger; the cell fades out again.
// • Once every cell has been touched, "Input test: success" is printed.
// • Ctrl-C (or --abort after a success) ends the test with "Test finished.".

use std::path::Path;
use std::process::ExitCode;

use clap::Parser;
use log::{debug, error, info, warn};

use touch_display_test::cli::Cli;
use touch_display_test::error::Error;
use touch_display_test::evdev::{EventDevice, DEV_INPUT_EVENT};
use touch_display_test::fbdev::{Framebuffer, DEV_FB};
use touch_display_test::render::{RenderLoop, RunSummary, Settings};
use touch_display_test::signal;
use touch_display_test::types::{MonotonicClock, Surface, TouchSource};

fn main() -> ExitCode {
    let cli = Cli::parse();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    if let Err(e) = signal::install() {
        warn!("Unable to install SIGINT handler: {e}");
    }

    match run(&cli) {
        Ok(summary) => {
            info!(
                "{} frames, {} touches, {} successful coverage cycle(s)",
                summary.frames, summary.touches, summary.completions
            );
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!("{e}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: &Cli) -> Result<RunSummary, Error> {
    let settings = cli.settings();
    debug!("{settings:?}");

    /* --- Desktop preview ---
       Visual: the pattern opens in a window; the mouse stands in for the panel. */
    #[cfg(feature = "window")]
    if let Some(size) = cli.window {
        let (mut surface, mut touch) =
            touch_display_test::window::open("Touch display test", size.width, size.height)?;
        return render(&mut surface, &mut touch, settings);
    }

    /* --- Real hardware ---
       Visual: nothing changes on the panel until the render loop starts. */
    let mut fb = match cli.fb_path() {
        Some(path) => Framebuffer::open(path)?,
        None => Framebuffer::discover(Path::new(DEV_FB))?,
    };
    debug!("display '{}' ({}) mapped", fb.path().display(), fb.id());

    let mut ev = match cli.ev_path() {
        Some(path) => EventDevice::open(path)?,
        None => EventDevice::discover(Path::new(DEV_INPUT_EVENT))?,
    };
    ev.describe();
    debug!("touch input '{}' ({}) open", ev.path().display(), ev.name());

    render(&mut fb, &mut ev, settings)
}

fn render<S: Surface, T: TouchSource>(surface: &mut S, touch: &mut T, settings: Settings) -> Result<RunSummary, Error> {
    let render_loop = RenderLoop::new(surface.geometry(), settings)?;
    let clock = MonotonicClock::start();
    render_loop.run(surface, touch, &clock, &signal::STOP)
}
