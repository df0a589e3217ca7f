//! Core library for the Palette Player.
//!
//! Plays a decoded animated bitmap on a grid of palette-colored cells. Each
//! tick composites the next frame onto a persistent canvas, downsamples the
//! canvas by block averaging, snaps every cell to the nearest palette entry
//! and hands the resulting [`Grid`] to a [`DisplaySink`], paced by the
//! frame's authored delay. A soundtrack can be started alongside, once, after
//! a fixed offset.

pub mod assets;
pub mod audio;
pub mod composite;
pub mod config;
pub mod error;
pub mod palette;
pub mod render;
pub mod resize;
pub mod timeline;

pub use assets::{load_animation, Animation};
pub use audio::{inspect_track, AudioDriver, AudioLauncher, ProcessAudioDriver, SilentAudio, TrackInfo};
pub use composite::{Canvas, CanvasBounds, Frame, Sample};
pub use config::{AppConfig, AudioConfig};
pub use error::{PlayerError, Result};
pub use palette::{ColorId, Palette, PaletteEntry, Rgb};
pub use render::{AnsiTerminalSink, DisplaySink, Grid, MemorySink, Transform};
pub use resize::{resize, SmallImage};
pub use timeline::{PacingPolicy, PlaybackReport, Scheduler, TickRecord};
