/*
    fluxread
    https://github.com/dbalsom/fluxfox

    Copyright 2024 Daniel Balsom

    Permission is hereby granted, free of charge, to any person obtaining a
    copy of this software and associated documentation files (the “Software”),
    to deal in the Software without restriction, including without limitation
    the rights to use, copy, modify, merge, publish, distribute, sublicense,
    and/or sell copies of the Software, and to permit persons to whom the
    Software is furnished to do so, subject to the following conditions:

    The above copyright notice and this permission notice shall be included in
    all copies or substantial portions of the Software.

    THE SOFTWARE IS PROVIDED “AS IS”, WITHOUT WARRANTY OF ANY KIND, EXPRESS OR
    IMPLIED, INCLUDING BUT NOT LIMITED TO THE WARRANTIES OF MERCHANTABILITY,
    FITNESS FOR A PARTICULAR PURPOSE AND NONINFRINGEMENT. IN NO EVENT SHALL THE
    AUTHORS OR COPYRIGHT HOLDERS BE LIABLE FOR ANY CLAIM, DAMAGES OR OTHER
    LIABILITY, WHETHER IN AN ACTION OF CONTRACT, TORT OR OTHERWISE, ARISING
    FROM, OUT OF OR IN CONNECTION WITH THE SOFTWARE OR THE USE OR OTHER
    DEALINGS IN THE SOFTWARE.

    --------------------------------------------------------------------------

    src/read/mod.rs

    Drives a FluxDevice to read a sequence of tracks into an Image.

    A ReadSession holds the device, the validated read settings and the
    drive speed measured when the session is prepared. Every capture taken
    during the session is normalized the same way, so captures merged
    during retries remain self-consistent.

*/
pub mod retry;
pub mod summary;

use crate::{
    device::FluxDevice,
    flux::{Flux, PllLadder},
    format_ms,
    image::Image,
    read::{
        retry::{AcquireOutcome, AcquireResult, RetryEngine},
        summary::ReadSummary,
    },
    track::{ImageTrack, TrackDecoder},
    types::DiskCh,
    FluxReadError,
};

/// The length of synthetic pre-index flux captured in fake index mode, in seconds.
pub const FAKE_INDEX_PRE_ROLL: f64 = 0.5e-3;
/// The minimum number of revolutions captured by a retry read.
pub const MIN_RETRY_REVS: u32 = 3;
/// The number of revolutions read to measure drive speed.
const SPEED_MEASURE_REVS: u32 = 2;

/// The amount of data to capture per track.
#[derive(Copy, Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Revs {
    /// Capture a whole number of index-to-index revolutions.
    Whole(u32),
    /// Capture a fractional number of revolutions, timed against the measured drive speed.
    Partial(f64),
}

impl Default for Revs {
    fn default() -> Self {
        Revs::Whole(3)
    }
}

/// Settings controlling how each track is captured and retried.
#[derive(Clone, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ReadSettings {
    pub revs: Revs,
    /// Number of retry captures between seek-retries. Must be at least 1.
    pub retries: u32,
    /// Number of seek-retries before giving up on a track.
    pub seek_retries: u32,
    /// Synthesize index pulses with this period in seconds instead of using the drive's index.
    pub fake_index: Option<f64>,
    /// Scale every capture to this revolution period in seconds.
    pub adjust_speed: Option<f64>,
    /// Emit raw flux to the image instead of decoded tracks.
    pub raw: bool,
    pub pll_ladder: PllLadder,
}

impl Default for ReadSettings {
    fn default() -> Self {
        ReadSettings {
            revs: Revs::default(),
            retries: 3,
            seek_retries: 0,
            fake_index: None,
            adjust_speed: None,
            raw: false,
            pll_ladder: PllLadder::default(),
        }
    }
}

impl ReadSettings {
    pub fn with_revs(self, revs: Revs) -> Self {
        ReadSettings { revs, ..self }
    }

    pub fn with_retries(self, retries: u32) -> Self {
        ReadSettings { retries, ..self }
    }

    pub fn with_seek_retries(self, seek_retries: u32) -> Self {
        ReadSettings { seek_retries, ..self }
    }

    pub fn with_fake_index(self, period: f64) -> Self {
        ReadSettings {
            fake_index: Some(period),
            ..self
        }
    }

    pub fn with_adjust_speed(self, period: f64) -> Self {
        ReadSettings {
            adjust_speed: Some(period),
            ..self
        }
    }

    pub fn with_raw(self, raw: bool) -> Self {
        ReadSettings { raw, ..self }
    }

    pub fn with_pll_ladder(self, pll_ladder: PllLadder) -> Self {
        ReadSettings { pll_ladder, ..self }
    }

    /// Check the settings for values that cannot produce a valid read.
    pub fn validate(&self) -> Result<(), FluxReadError> {
        if self.retries == 0 {
            return Err(FluxReadError::ConfigError(
                "Retries per seek-retry must be at least 1".to_string(),
            ));
        }
        match self.revs {
            Revs::Whole(0) => {
                return Err(FluxReadError::ConfigError(
                    "Revolution count must be at least 1".to_string(),
                ))
            }
            Revs::Partial(r) if !(r > 0.0 && r.is_finite()) => {
                return Err(FluxReadError::ConfigError(format!(
                    "Invalid revolution count: {}",
                    r
                )))
            }
            _ => {}
        }
        for (name, period) in [("fake index", self.fake_index), ("adjust speed", self.adjust_speed)] {
            if let Some(p) = period {
                if !(p > 0.0 && p.is_finite()) {
                    return Err(FluxReadError::ConfigError(format!("Invalid {} period: {}", name, p)));
                }
            }
        }
        self.pll_ladder.validate()
    }
}

/// A track to read: the logical address recorded in the image, and the physical address the
/// drive is stepped to. These differ when, for example, double-stepping a 40 track disk in an
/// 80 track drive.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct TrackTarget {
    pub ch: DiskCh,
    pub physical: DiskCh,
}

impl TrackTarget {
    /// Create a target whose physical address equals its logical address.
    pub fn new(ch: DiskCh) -> Self {
        TrackTarget { ch, physical: ch }
    }

    pub fn with_physical(self, physical: DiskCh) -> Self {
        TrackTarget { physical, ..self }
    }
}

impl From<DiskCh> for TrackTarget {
    fn from(ch: DiskCh) -> Self {
        TrackTarget::new(ch)
    }
}

/// An open read against a device.
pub struct ReadSession<'d, D: FluxDevice + ?Sized> {
    device: &'d mut D,
    settings: ReadSettings,
    revs: u32,
    ticks: u64,
    drive_ticks_per_rev: Option<f64>,
}

impl<'d, D: FluxDevice + ?Sized> ReadSession<'d, D> {
    /// Validate `settings` and resolve the revolution count and capture length for the session.
    /// A fractional revolution count in decoding mode requires measuring the drive speed, which
    /// reads the currently selected track.
    pub fn prepare(device: &'d mut D, settings: ReadSettings) -> Result<Self, FluxReadError> {
        settings.validate()?;

        let mut drive_ticks_per_rev = settings.fake_index.map(|period| period * device.sample_freq());
        let mut ticks = 0;

        let revs = match settings.revs {
            Revs::Whole(revs) => revs,
            // Dumping raw flux wants full index-to-index revolutions.
            Revs::Partial(_) if settings.raw => SPEED_MEASURE_REVS,
            Revs::Partial(r) => {
                let tpr = match drive_ticks_per_rev {
                    Some(tpr) => tpr,
                    None => {
                        let measured = device.read_track(SPEED_MEASURE_REVS, 0)?;
                        measured.ticks_per_rev().ok_or_else(|| {
                            FluxReadError::CommandError("Unable to measure drive speed: no index pulses".to_string())
                        })?
                    }
                };
                log::debug!(
                    "ReadSession::prepare(): Drive speed: {:.0} ticks per revolution",
                    tpr
                );
                drive_ticks_per_rev = Some(tpr);
                ticks = (tpr * r) as u64;
                SPEED_MEASURE_REVS
            }
        };

        Ok(ReadSession {
            device,
            settings,
            revs,
            ticks,
            drive_ticks_per_rev,
        })
    }

    pub fn settings(&self) -> &ReadSettings {
        &self.settings
    }

    /// Return the number of revolutions captured by an initial read.
    pub fn revs(&self) -> u32 {
        self.revs
    }

    /// Return the capture length of an initial read in ticks, or 0 if it is bounded by
    /// revolutions only.
    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    pub fn drive_ticks_per_rev(&self) -> Option<f64> {
        self.drive_ticks_per_rev
    }

    pub fn device(&mut self) -> &mut D {
        &mut *self.device
    }

    /// Capture flux from the selected track and normalize it for this session.
    ///
    /// In fake index mode the capture is bounded by time alone and index pulses are synthesized
    /// every drive revolution, following a short pre-roll. The drive's nominal revolution length
    /// is applied to every capture, and if speed adjustment is enabled the capture is scaled to
    /// the target revolution period.
    pub fn read_and_normalise(&mut self, revs: u32, ticks: u64) -> Result<Flux, FluxReadError> {
        let mut flux = match (self.settings.fake_index, self.drive_ticks_per_rev) {
            (Some(_), Some(drive_tpr)) => {
                let drive_tpr = drive_tpr.trunc();
                let pre_index = (self.device.sample_freq() * FAKE_INDEX_PRE_ROLL).trunc();
                let ticks = match ticks {
                    0 => (revs as f64 * drive_tpr + 2.0 * pre_index) as u64,
                    _ => ticks,
                };
                self.device
                    .read_track(0, ticks)?
                    .with_fake_index(pre_index, drive_tpr)
            }
            _ => self.device.read_track(revs, ticks)?,
        };

        flux.set_ticks_per_rev(self.drive_ticks_per_rev);

        if let Some(target) = self.settings.adjust_speed {
            match flux.time_per_rev() {
                Some(tpr) if tpr > 0.0 => {
                    log::trace!(
                        "ReadSession::read_and_normalise(): Adjusting revolution period {} to {}",
                        format_ms!(tpr),
                        format_ms!(target)
                    );
                    flux.scale(target / tpr)
                }
                _ => {
                    return Err(FluxReadError::CommandError(
                        "Unable to adjust speed: revolution period unknown".to_string(),
                    ))
                }
            }
        }

        Ok(flux)
    }

    /// Acquire a single track with retries. See [RetryEngine].
    pub fn acquire(
        &mut self,
        target: TrackTarget,
        decoder: Option<&dyn TrackDecoder>,
    ) -> Result<AcquireResult, FluxReadError> {
        RetryEngine::new(self, target, decoder).run()
    }

    /// Read each target in order and emit the result into `image`.
    ///
    /// In raw mode the accumulated flux of every track is emitted, including tracks the decoder
    /// reports as out of range. Otherwise each decoded track is emitted and out of range tracks
    /// are skipped. A device error aborts the read; tracks already emitted remain in the image.
    pub fn read_to_image(
        &mut self,
        targets: &[TrackTarget],
        image: &mut dyn Image,
        decoder: Option<&dyn TrackDecoder>,
    ) -> Result<ReadSummary, FluxReadError> {
        let mut summary = ReadSummary::new(targets.iter().map(|t| t.ch));

        for target in targets {
            let result = self.acquire(*target, decoder)?;

            if let Some(track) = result.track.as_deref() {
                summary.record(target.ch, track);
            }

            if self.settings.raw {
                image.emit_track(target.ch, ImageTrack::Flux(&result.flux))?;
            }
            else if let Some(track) = result.track.as_deref() {
                image.emit_track(target.ch, ImageTrack::Decoded(track))?;
            }

            if let AcquireOutcome::GaveUp { missing } = result.outcome {
                log::debug!(
                    "ReadSession::read_to_image(): {} emitted with {} sectors missing",
                    target.ch,
                    missing
                );
            }
        }

        if decoder.is_some() {
            for line in summary.to_string().lines() {
                log::info!("{}", line);
            }
        }

        Ok(summary)
    }
}
