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

    src/flux/pll.rs

    Clock recovery for flux captures.

    A Pll converts a Flux into a bitstream at a nominal bit cell period. The clock
    is steered by the phase error of each flux transition, and is clamped to
    within MAX_ADJUST of the nominal period. Decoders may run several
    parameterizations over the same capture, so the parameters are held in a
    PllLadder tried in priority order.
*/
use crate::{flux::Flux, format_us, FluxReadError};
use bit_vec::BitVec;
use std::{
    fmt::{self, Display, Formatter},
    str::FromStr,
};

/// Maximum deviation of the recovered clock from its nominal period.
const MAX_ADJUST: f64 = 0.10; // 10%

/// Parameters for a single clock recovery pass.
#[derive(Copy, Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PllParams {
    /// Percentage of the phase error applied to the clock period per transition.
    pub period_adj_pct: u32,
    /// Percentage of the phase error applied to the clock phase per transition.
    pub phase_adj_pct: u32,
    /// Flux intervals shorter than this many microseconds are treated as noise.
    pub lowpass_thresh: Option<f64>,
}

impl Default for PllParams {
    fn default() -> Self {
        PllParams {
            period_adj_pct: 5,
            phase_adj_pct: 60,
            lowpass_thresh: None,
        }
    }
}

impl PllParams {
    pub fn new(period_adj_pct: u32, phase_adj_pct: u32) -> Self {
        PllParams {
            period_adj_pct,
            phase_adj_pct,
            lowpass_thresh: None,
        }
    }

    pub fn with_lowpass(self, lowpass_thresh: f64) -> Self {
        PllParams {
            lowpass_thresh: Some(lowpass_thresh),
            ..self
        }
    }
}

impl Display for PllParams {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        write!(f, "period={}:phase={}", self.period_adj_pct, self.phase_adj_pct)?;
        if let Some(lowpass) = self.lowpass_thresh {
            write!(f, ":lowpass={}", lowpass)?;
        }
        Ok(())
    }
}

/// Parse a PLL specification of the form `period=<pct>:phase=<pct>[:lowpass=<us>]`.
/// Omitted keys keep their default values.
impl FromStr for PllParams {
    type Err = FluxReadError;

    fn from_str(spec: &str) -> Result<Self, Self::Err> {
        let mut params = PllParams::default();
        let bad_spec = || FluxReadError::ConfigError(format!("Invalid PLL specification: '{}'", spec));

        for term in spec.split(':').filter(|t| !t.is_empty()) {
            let (key, value) = term.split_once('=').ok_or_else(bad_spec)?;
            match key.trim() {
                "period" => params.period_adj_pct = value.trim().parse().map_err(|_| bad_spec())?,
                "phase" => params.phase_adj_pct = value.trim().parse().map_err(|_| bad_spec())?,
                "lowpass" => {
                    let lowpass: f64 = value.trim().parse().map_err(|_| bad_spec())?;
                    if lowpass <= 0.0 {
                        return Err(bad_spec());
                    }
                    params.lowpass_thresh = Some(lowpass);
                }
                _ => return Err(bad_spec()),
            }
        }

        if params.period_adj_pct > 100 || params.phase_adj_pct > 100 {
            return Err(bad_spec());
        }
        Ok(params)
    }
}

/// An ordered list of clock recovery parameterizations. Earlier entries are tried first.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(from = "Vec<PllParams>", into = "Vec<PllParams>"))]
pub struct PllLadder {
    plls: Vec<PllParams>,
}

impl Default for PllLadder {
    fn default() -> Self {
        PllLadder {
            plls: vec![PllParams::new(5, 60), PllParams::new(1, 40)],
        }
    }
}

impl PllLadder {
    /// Create a ladder from an explicit list of parameterizations. An empty list is replaced
    /// by the default parameters, since every read needs at least one clock recovery pass.
    pub fn new(plls: Vec<PllParams>) -> Self {
        if plls.is_empty() {
            return PllLadder {
                plls: vec![PllParams::default()],
            };
        }
        PllLadder { plls }
    }

    /// Return a new ladder with a manual override placed ahead of every other entry.
    pub fn with_override(mut self, pll: PllParams) -> Self {
        self.plls.insert(0, pll);
        self
    }

    /// The primary parameterization, used for the first decode of every capture.
    /// Returns `None` only for an empty ladder, which [`PllLadder::validate`] rejects.
    pub fn primary(&self) -> Option<&PllParams> {
        self.plls.first()
    }

    /// The parameterizations following the primary one.
    pub fn fallbacks(&self) -> &[PllParams] {
        self.plls.get(1..).unwrap_or(&[])
    }

    /// Check that the ladder holds at least one parameterization.
    pub fn validate(&self) -> Result<(), FluxReadError> {
        if self.plls.is_empty() {
            return Err(FluxReadError::ConfigError("PLL ladder must not be empty".to_string()));
        }
        Ok(())
    }

    pub fn iter(&self) -> std::slice::Iter<'_, PllParams> {
        self.plls.iter()
    }

    pub fn len(&self) -> usize {
        self.plls.len()
    }

    pub fn is_empty(&self) -> bool {
        self.plls.is_empty()
    }
}

impl From<Vec<PllParams>> for PllLadder {
    fn from(plls: Vec<PllParams>) -> Self {
        PllLadder::new(plls)
    }
}

impl From<PllLadder> for Vec<PllParams> {
    fn from(ladder: PllLadder) -> Self {
        ladder.plls
    }
}

/// The output of a clock recovery pass.
pub struct PllDecodeResult {
    /// The recovered bitstream, one bool per bit cell.
    pub bits: BitVec,
    /// The bit index at which each index pulse occurred.
    pub index_bits: Vec<usize>,
    /// The duration of each complete revolution in seconds, one per index pulse.
    pub index_times: Vec<f64>,
}

impl PllDecodeResult {
    /// Return the bits of revolution `rev` and its duration in seconds. Revolution 0 starts at
    /// the beginning of the capture and ends at the first index pulse. If the requested
    /// revolution has no terminating index pulse, the remainder of the stream is returned.
    pub fn revolution(&self, rev: usize, clock: f64) -> Option<(BitVec, f64)> {
        let start = match rev {
            0 => 0,
            _ => *self.index_bits.get(rev - 1)?,
        };
        let (end, time) = match self.index_bits.get(rev) {
            Some(&end) => (end, self.index_times[rev]),
            None => (self.bits.len(), (self.bits.len() - start) as f64 * clock),
        };
        if start > end {
            return None;
        }
        let bits: BitVec = self.bits.iter().skip(start).take(end - start).collect();
        Some((bits, time))
    }
}

pub struct Pll {
    /// Nominal bit cell period in seconds.
    pub clock: f64,
    pub params: PllParams,
}

impl Pll {
    pub fn new(clock: f64, params: PllParams) -> Self {
        log::trace!("Pll::new(): Nominal clock period: {} {}", format_us!(clock), params);
        Pll { clock, params }
    }

    /// Recover a bitstream from `flux`. Each flux transition produces a 1 bit preceded by a 0
    /// bit for every additional whole clock period that elapsed since the previous transition.
    pub fn decode(&self, flux: &Flux) -> PllDecodeResult {
        let freq = flux.sample_freq();
        let period_adj = self.params.period_adj_pct as f64 / 100.0;
        let phase_adj = self.params.phase_adj_pct as f64 / 100.0;
        let lowpass = self.params.lowpass_thresh.map(|us| us * 1e-6);

        let clock_centre = self.clock;
        let clock_min = clock_centre * (1.0 - MAX_ADJUST);
        let clock_max = clock_centre * (1.0 + MAX_ADJUST);
        let mut clock = clock_centre;

        // Convert cumulative index offsets into the time between successive pulses.
        let mut last_index = 0.0;
        let index_gaps: Vec<f64> = flux
            .index_list()
            .iter()
            .map(|&offset| {
                let gap = (offset - last_index) / freq;
                last_index = offset;
                gap
            })
            .collect();
        let mut gap_iter = index_gaps.iter();
        let mut to_index = gap_iter.next().copied().unwrap_or(f64::INFINITY);

        let mut bits = BitVec::with_capacity(flux.len() * 3);
        let mut index_bits = Vec::with_capacity(index_gaps.len());
        let mut index_times = Vec::with_capacity(index_gaps.len());
        let mut rev_time = 0.0;
        let mut ticks = 0.0;

        for &interval in flux.intervals() {
            let delta = interval / freq;
            ticks += delta;

            // A glitch too short to be a real transition is folded into the next interval.
            if let Some(lowpass) = lowpass {
                if delta < lowpass {
                    continue;
                }
            }

            let mut zeros = 0;
            loop {
                to_index -= clock;
                rev_time += clock;
                if to_index < 0.0 {
                    index_bits.push(bits.len());
                    index_times.push(rev_time);
                    rev_time = 0.0;
                    to_index += gap_iter.next().copied().unwrap_or(f64::INFINITY);
                }

                ticks -= clock;
                if ticks >= clock / 2.0 {
                    zeros += 1;
                    bits.push(false);
                }
                else {
                    break;
                }
            }

            if zeros <= 3 {
                // In sync: steer the clock by a fraction of the phase error.
                clock += ticks * period_adj;
            }
            else {
                // Out of sync: drift the clock back toward its nominal period.
                clock += (clock_centre - clock) * period_adj;
            }
            clock = clock.clamp(clock_min, clock_max);

            ticks *= 1.0 - phase_adj;
            bits.push(true);
        }

        log::trace!(
            "Pll::decode(): Decoded {} flux transitions into {} bits, {} index pulses, final clock: {}",
            flux.len(),
            bits.len(),
            index_bits.len(),
            format_us!(clock)
        );

        PllDecodeResult {
            bits,
            index_bits,
            index_times,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::read::ReadSettings;

    fn bit_string(bits: &BitVec) -> String {
        bits.iter().map(|b| if b { '1' } else { '0' }).collect()
    }

    #[test]
    fn test_parse_pll_spec() {
        let pll: PllParams = "period=1:phase=40".parse().unwrap();
        assert_eq!(pll, PllParams::new(1, 40));

        let pll: PllParams = "phase=90:lowpass=1.5".parse().unwrap();
        assert_eq!(pll.period_adj_pct, 5);
        assert_eq!(pll.phase_adj_pct, 90);
        assert_eq!(pll.lowpass_thresh, Some(1.5));

        assert!("period=abc".parse::<PllParams>().is_err());
        assert!("speed=5".parse::<PllParams>().is_err());
        assert!("period=150".parse::<PllParams>().is_err());
    }

    #[test]
    fn test_ladder_override_goes_first() {
        let ladder = PllLadder::default().with_override(PllParams::new(20, 20));
        assert_eq!(ladder.len(), 3);
        assert_eq!(ladder.primary(), Some(&PllParams::new(20, 20)));
        assert_eq!(ladder.fallbacks()[0], PllParams::new(5, 60));
    }

    #[test]
    fn test_empty_ladder_rejected() {
        let empty = PllLadder { plls: Vec::new() };
        assert!(empty.primary().is_none());
        assert!(empty.fallbacks().is_empty());
        assert!(matches!(empty.validate(), Err(FluxReadError::ConfigError(_))));

        let settings = ReadSettings::default().with_pll_ladder(empty);
        assert!(matches!(settings.validate(), Err(FluxReadError::ConfigError(_))));

        // Conversion from a list goes through `new`, as deserialization does.
        let ladder = PllLadder::from(Vec::new());
        assert_eq!(ladder.primary(), Some(&PllParams::default()));
        assert!(ladder.validate().is_ok());
    }

    #[test]
    fn test_decode_ideal_mfm_flux() {
        // 1MHz sample clock, 2us bit cells: 4us, 6us and 8us transitions.
        let flux = Flux::from_ticks(&[], &[4, 6, 8, 4], 1_000_000.0);
        let pll = Pll::new(2e-6, PllParams::default());
        let result = pll.decode(&flux);
        assert_eq!(bit_string(&result.bits), "01001000101");
    }

    #[test]
    fn test_decode_revolutions() {
        // Index pulse after the second transition.
        let flux = Flux::from_ticks(&[9], &[4, 4, 4, 4], 1_000_000.0);
        let pll = Pll::new(2e-6, PllParams::default());
        let result = pll.decode(&flux);

        assert_eq!(result.bits.len(), 8);
        assert_eq!(result.index_bits, vec![4]);

        let (rev0, _) = result.revolution(0, 2e-6).unwrap();
        assert_eq!(bit_string(&rev0), "0101");
        let (rev1, _) = result.revolution(1, 2e-6).unwrap();
        assert_eq!(bit_string(&rev1), "0101");
        assert!(result.revolution(2, 2e-6).is_none());
    }

    #[test]
    fn test_lowpass_merges_glitch() {
        // A 1us glitch is absorbed into the following 3us interval.
        let flux = Flux::from_ticks(&[], &[4, 1, 3], 1_000_000.0);
        let pll = Pll::new(2e-6, PllParams::default().with_lowpass(1.5));
        let result = pll.decode(&flux);
        assert_eq!(bit_string(&result.bits), "0101");
    }
}
