use std::fs::File;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use symphonia::core::codecs::DecoderOptions;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;
use tracing::{debug, info, warn};

use crate::config::AudioConfig;
use crate::{PlayerError, Result};

/// Playback device handle. Decoding and output belong to the implementation;
/// the player only decides when to start and stop it.
pub trait AudioDriver: Send {
    fn start(&mut self) -> Result<()>;

    fn stop(&mut self) -> Result<()> {
        Ok(())
    }
}

/// Driver used when no soundtrack is configured.
#[derive(Debug, Default, Clone, Copy)]
pub struct SilentAudio;

impl AudioDriver for SilentAudio {
    fn start(&mut self) -> Result<()> {
        debug!("no soundtrack configured");
        Ok(())
    }
}

/// Hands the soundtrack to an external player process.
#[derive(Debug)]
pub struct ProcessAudioDriver {
    program: String,
    args: Vec<String>,
    track: PathBuf,
    child: Option<Child>,
}

impl ProcessAudioDriver {
    /// Checks that `track` exists and decodes as audio before any playback
    /// starts; the player process is only spawned by [`AudioDriver::start`].
    pub fn new(config: &AudioConfig, track: impl Into<PathBuf>) -> Result<Self> {
        let track = track.into();
        if !track.is_file() {
            return Err(PlayerError::resource(
                &track,
                std::io::Error::new(std::io::ErrorKind::NotFound, "audio file not found"),
            ));
        }
        let info = inspect_track(&track)?;
        debug!(
            track = %track.display(),
            sample_rate = ?info.sample_rate,
            channels = ?info.channels,
            "soundtrack decodes"
        );
        Ok(Self {
            program: config.command.clone(),
            args: config.args.clone(),
            track,
            child: None,
        })
    }

    /// Whether a player process has been spawned and not yet stopped.
    pub fn is_running(&self) -> bool {
        self.child.is_some()
    }
}

/// Stream parameters read while validating a soundtrack.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TrackInfo {
    pub sample_rate: Option<u32>,
    pub channels: Option<usize>,
}

/// Probes the container, opens a decoder for its default track and decodes
/// the first packet. Any failure is a [`PlayerError::Decode`].
pub fn inspect_track(path: &Path) -> Result<TrackInfo> {
    let file = File::open(path).map_err(|err| PlayerError::resource(path, err))?;
    let stream = MediaSourceStream::new(Box::new(file), Default::default());

    let mut hint = Hint::new();
    if let Some(ext) = path.extension().and_then(|ext| ext.to_str()) {
        hint.with_extension(ext);
    }

    let probed = symphonia::default::get_probe()
        .format(
            &hint,
            stream,
            &FormatOptions::default(),
            &MetadataOptions::default(),
        )
        .map_err(|err| PlayerError::decode(path, err))?;
    let mut format = probed.format;

    let track = format
        .default_track()
        .ok_or_else(|| PlayerError::decode(path, "no playable audio track"))?;
    let track_id = track.id;
    let params = track.codec_params.clone();
    let mut decoder = symphonia::default::get_codecs()
        .make(&params, &DecoderOptions::default())
        .map_err(|err| PlayerError::decode(path, err))?;

    loop {
        let packet = format
            .next_packet()
            .map_err(|err| PlayerError::decode(path, err))?;
        if packet.track_id() != track_id {
            continue;
        }
        decoder
            .decode(&packet)
            .map_err(|err| PlayerError::decode(path, err))?;
        break;
    }

    Ok(TrackInfo {
        sample_rate: params.sample_rate,
        channels: params.channels.map(|channels| channels.count()),
    })
}

impl AudioDriver for ProcessAudioDriver {
    fn start(&mut self) -> Result<()> {
        if self.child.is_some() {
            return Ok(());
        }
        let child = Command::new(&self.program)
            .args(&self.args)
            .arg(&self.track)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|err| {
                PlayerError::msg(format!("failed to launch audio player `{}`: {err}", self.program))
            })?;
        info!(program = %self.program, track = %self.track.display(), "audio started");
        self.child = Some(child);
        Ok(())
    }

    fn stop(&mut self) -> Result<()> {
        if let Some(mut child) = self.child.take() {
            if child.try_wait()?.is_none() {
                child.kill()?;
            }
            child.wait()?;
            debug!("audio player stopped");
        }
        Ok(())
    }
}

impl Drop for ProcessAudioDriver {
    fn drop(&mut self) {
        let _ = self.stop();
    }
}

/// Starts an [`AudioDriver`] once, a fixed offset after `origin`, on its own
/// thread. There is no resynchronization with video after that.
pub struct AudioLauncher {
    driver: Arc<Mutex<Box<dyn AudioDriver>>>,
    handle: Option<JoinHandle<Result<Instant>>>,
}

impl AudioLauncher {
    pub fn spawn(driver: Box<dyn AudioDriver>, origin: Instant, offset: Duration) -> Result<Self> {
        let driver = Arc::new(Mutex::new(driver));
        let shared = driver.clone();

        let handle = thread::Builder::new()
            .name("audio-start".to_string())
            .spawn(move || {
                let due = origin + offset;
                let now = Instant::now();
                if due > now {
                    thread::sleep(due - now);
                }
                lock_driver(&shared)?.start()?;
                Ok(Instant::now())
            })?;

        Ok(Self {
            driver,
            handle: Some(handle),
        })
    }

    /// Waits for the start attempt and returns when audio actually began.
    pub fn wait_started(&mut self) -> Result<Option<Instant>> {
        match self.handle.take() {
            Some(handle) => handle
                .join()
                .map_err(|_| PlayerError::msg("audio start thread panicked"))?
                .map(Some),
            None => Ok(None),
        }
    }

    /// Joins the start thread and stops the driver.
    pub fn finish(mut self) -> Result<()> {
        if let Err(err) = self.wait_started() {
            warn!(%err, "audio did not start");
        }
        lock_driver(&self.driver)?.stop()
    }
}

fn lock_driver(driver: &Mutex<Box<dyn AudioDriver>>) -> Result<MutexGuard<'_, Box<dyn AudioDriver>>> {
    driver
        .lock()
        .map_err(|_| PlayerError::msg("audio driver has been poisoned"))
}

impl std::fmt::Debug for AudioLauncher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AudioLauncher")
            .field("pending", &self.handle.is_some())
            .finish()
    }
}
