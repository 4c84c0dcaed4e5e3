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

    src/read/retry.rs

    The per-track acquisition loop. A track is read once and decoded with
    every parameterization in the PLL ladder. While sectors remain missing,
    additional captures are read, decoded and merged into the track. Every
    `retries` captures the drive performs a seek-retry, stepping to track 0
    and back, until the seek-retry budget is spent.

*/
use crate::{
    device::FluxDevice,
    flux::Flux,
    read::{ReadSession, TrackTarget, MIN_RETRY_REVS},
    track::{DecodedTrack, TrackDecoder},
    FluxReadError,
};
use std::fmt::{self, Display, Formatter};

/// The states of the acquisition loop.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum RetryState {
    /// Capture additional flux and decode it into the track.
    Reading,
    /// Inspect the decoded track and pick the next action.
    Decoding,
    /// The retry budget for the current seek is spent; re-seek or give up.
    SeekRetrying,
    /// No sectors are missing.
    Done,
    /// The seek-retry budget is spent with sectors still missing.
    GaveUp,
}

/// The retry and seek-retry counters of the acquisition loop, and the transitions they drive.
///
/// The give-up check compares the seek-retry counter to the budget before it is incremented on
/// each seek-retry, and the first seek-retry of a track does not physically re-seek. A budget of
/// 0 therefore allows `retries` captures and no re-seek; a budget of N allows
/// `retries * (N + 1)` captures and N re-seeks.
#[derive(Clone, Debug)]
pub struct RetryCounter {
    retries: u32,
    seek_retries: u32,
    retry: u32,
    seek_retry: u32,
}

impl RetryCounter {
    /// Create a counter for `retries` captures per seek-retry, and `seek_retries` seek-retries.
    /// `retries` must be at least 1.
    pub fn new(retries: u32, seek_retries: u32) -> Self {
        RetryCounter {
            retries: retries.max(1),
            seek_retries,
            retry: 0,
            seek_retry: 0,
        }
    }

    pub fn retry(&self) -> u32 {
        self.retry
    }

    pub fn seek_retry(&self) -> u32 {
        self.seek_retry
    }

    /// Return the state following a decode that left `missing` sectors missing.
    pub fn after_decode(&self, missing: usize) -> RetryState {
        if missing == 0 {
            RetryState::Done
        }
        else if self.retry % self.retries == 0 {
            RetryState::SeekRetrying
        }
        else {
            RetryState::Reading
        }
    }

    /// Perform a seek-retry transition. Returns the next state, and a bool indicating whether
    /// the drive must physically re-seek before the next capture.
    pub fn seek(&mut self) -> (RetryState, bool) {
        if self.seek_retry > self.seek_retries {
            return (RetryState::GaveUp, false);
        }
        let reseek = self.retry != 0;
        self.seek_retry += 1;
        self.retry = 0;
        (RetryState::Reading, reseek)
    }

    /// Count an additional capture.
    pub fn read(&mut self) {
        self.retry += 1;
    }
}

/// One progress line of the acquisition loop.
#[derive(Clone, Debug, PartialEq)]
pub struct TrackReadReport {
    pub ch: crate::types::DiskCh,
    pub message: String,
    pub seek_retry: u32,
    pub retry: u32,
}

impl Display for TrackReadReport {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        write!(f, "{}: {}", self.ch, self.message)?;
        if self.retry != 0 {
            write!(f, " (Retry #{}.{})", self.seek_retry, self.retry)?;
        }
        Ok(())
    }
}

/// How an acquisition ended.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum AcquireOutcome {
    /// No decoder was supplied; the flux was captured once.
    Raw,
    /// The decoder does not define this track.
    OutOfRange,
    /// Every sector was recovered.
    Complete,
    /// The retry budgets were spent with `missing` sectors still missing.
    GaveUp { missing: usize },
}

/// The result of acquiring one track.
pub struct AcquireResult {
    /// All flux captured for the track, concatenated in capture order.
    pub flux: Flux,
    /// The decoded track, if a decoder was supplied and the track is in range.
    pub track: Option<Box<dyn DecodedTrack>>,
    pub outcome: AcquireOutcome,
    /// Number of flux captures taken, including the initial read.
    pub reads: u32,
    /// Number of physical re-seeks performed.
    pub reseeks: u32,
    /// Final value of the seek-retry counter.
    pub seek_retry: u32,
    pub reports: Vec<TrackReadReport>,
}

impl AcquireResult {
    pub fn is_complete(&self) -> bool {
        matches!(self.outcome, AcquireOutcome::Complete)
    }
}

/// Acquires a single track through a [ReadSession].
pub struct RetryEngine<'s, 'd, D: FluxDevice + ?Sized> {
    session: &'s mut ReadSession<'d, D>,
    target: TrackTarget,
    decoder: Option<&'s dyn TrackDecoder>,
    state: RetryState,
    counter: RetryCounter,
    reads: u32,
    reseeks: u32,
    reports: Vec<TrackReadReport>,
}

impl<'s, 'd, D: FluxDevice + ?Sized> RetryEngine<'s, 'd, D> {
    pub fn new(
        session: &'s mut ReadSession<'d, D>,
        target: TrackTarget,
        decoder: Option<&'s dyn TrackDecoder>,
    ) -> Self {
        let counter = RetryCounter::new(session.settings().retries, session.settings().seek_retries);
        RetryEngine {
            session,
            target,
            decoder,
            state: RetryState::Reading,
            counter,
            reads: 0,
            reseeks: 0,
            reports: Vec::new(),
        }
    }

    pub fn state(&self) -> RetryState {
        self.state
    }

    fn report(&mut self, message: String) {
        let report = TrackReadReport {
            ch: self.target.ch,
            message,
            seek_retry: self.counter.seek_retry(),
            retry: self.counter.retry(),
        };
        log::info!("{}", report);
        self.reports.push(report);
    }

    fn capture(&mut self, revs: u32, ticks: u64) -> Result<Flux, FluxReadError> {
        self.reads += 1;
        self.session.read_and_normalise(revs, ticks)
    }

    fn finish(self, flux: Flux, track: Option<Box<dyn DecodedTrack>>, outcome: AcquireOutcome) -> AcquireResult {
        AcquireResult {
            flux,
            track,
            outcome,
            reads: self.reads,
            reseeks: self.reseeks,
            seek_retry: self.counter.seek_retry(),
            reports: self.reports,
        }
    }

    /// Run the acquisition loop to completion.
    pub fn run(mut self) -> Result<AcquireResult, FluxReadError> {
        let physical = self.target.physical;
        self.session.device().seek(physical.c(), physical.h())?;

        let (revs, ticks) = (self.session.revs(), self.session.ticks());
        let mut flux = self.capture(revs, ticks)?;

        let decoder = match self.decoder {
            Some(decoder) => decoder,
            None => {
                self.report(flux.summary_string());
                self.state = RetryState::Done;
                return Ok(self.finish(flux, None, AcquireOutcome::Raw));
            }
        };

        let ladder = self.session.settings().pll_ladder.clone();
        let primary = ladder
            .primary()
            .ok_or_else(|| FluxReadError::ConfigError("PLL ladder must not be empty".to_string()))?;
        let mut track = match decoder.decode_track(self.target.ch, &flux, primary) {
            Some(track) => track,
            None => {
                log::warn!(
                    "{}: WARNING: Out of range for format '{}': No format conversion applied",
                    self.target.ch,
                    decoder.name()
                );
                self.state = RetryState::Done;
                return Ok(self.finish(flux, None, AcquireOutcome::OutOfRange));
            }
        };
        for pll in ladder.fallbacks() {
            if track.nr_missing() == 0 {
                break;
            }
            track.decode_raw(&flux, pll);
        }

        self.state = RetryState::Decoding;
        loop {
            self.state = match self.state {
                RetryState::Decoding => {
                    self.report(format!("{} from {}", track.summary_string(), flux.summary_string()));
                    self.counter.after_decode(track.nr_missing())
                }
                RetryState::SeekRetrying => {
                    let (next, reseek) = self.counter.seek();
                    if reseek {
                        log::debug!("RetryEngine::run(): {}: Seek-retry via track 0", self.target.ch);
                        self.session.device().seek(0, 0)?;
                        self.session.device().seek(physical.c(), physical.h())?;
                        self.reseeks += 1;
                    }
                    next
                }
                RetryState::Reading => {
                    self.counter.read();
                    let retry_flux = self.capture(revs.max(MIN_RETRY_REVS), 0)?;
                    for pll in ladder.iter() {
                        if track.nr_missing() == 0 {
                            break;
                        }
                        track.decode_raw(&retry_flux, pll);
                    }
                    flux.append(retry_flux);
                    RetryState::Decoding
                }
                RetryState::Done | RetryState::GaveUp => break,
            };
        }

        let outcome = match self.state {
            RetryState::GaveUp => {
                let missing = track.nr_missing();
                log::warn!("{}: Giving up: {} sectors missing", self.target.ch, missing);
                AcquireOutcome::GaveUp { missing }
            }
            _ => AcquireOutcome::Complete,
        };

        Ok(self.finish(flux, Some(track), outcome))
    }
}
