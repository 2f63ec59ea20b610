//! # Sunshine Watch Face Entry Point
//!
//! This binary hosts the watch face on a desktop or dev board, coordinating
//! configuration, the sync spool and the event loop. It supports a live mode
//! (redrawn ASCII frames in the terminal) and development mode (a single
//! frame to stdout).
//!
//! ## Flags
//! - `--stdout`: render one frame, print it and exit
//! - `--init-config`: write the default `watchface-config.toml` and exit
//!
//! Log verbosity follows `RUST_LOG` (default `info`).

// Test modules
#[cfg(test)]
mod tests;

use std::env;
use std::io::{self, Write};
use watchface_lib::{config::Config, framebuffer::Framebuffer, runtime};

/// Framebuffer pixels per ASCII character; terminal cells are about twice as tall as wide
const CELL_WIDTH: u32 = 4;
const CELL_HEIGHT: u32 = 8;

/// Clear the terminal and draw `frame` if it differs from the last one shown.
fn present_frame(frame: &Framebuffer, last: &mut String) {
    let ascii = frame.to_ascii(CELL_WIDTH, CELL_HEIGHT);
    if ascii == *last {
        return;
    }
    let mut stdout = io::stdout().lock();
    // A closed stdout only loses the preview
    let _ = write!(stdout, "\x1b[2J\x1b[H{}", ascii);
    let _ = stdout.flush();
    *last = ascii;
}

fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    // Development mode: render to stdout for testing without a screen
    let development_mode = env::args().any(|arg| arg == "--stdout");

    if env::args().any(|arg| arg == "--init-config") {
        Config::default().save()?;
        return Ok(());
    }

    let config = Config::load();

    // Every callback runs on this one thread
    let rt = tokio::runtime::Builder::new_current_thread().enable_all().build()?;

    if development_mode {
        let frame = rt.block_on(runtime::render_preview(&config))?;
        println!("{}", frame.to_ascii(CELL_WIDTH, CELL_HEIGHT));
        return Ok(());
    }

    let mut last = String::new();
    rt.block_on(runtime::run(&config, |frame| present_frame(frame, &mut last)));
    Ok(())
}
