//!
//! The channelizer engine: window ingestion, the forward transform, and
//! per-channel fan-out
//!

use num_complex::Complex32;
use num_traits::Zero;

use crate::channel::{Channel, ChannelId, ChannelParams};
use crate::error::Error;
use crate::fft::{self, ForwardFft};

/// Parameters for creating an [`Engine`]
#[derive(Debug, Clone, Copy)]
pub struct EngineParams {
    /// Analysis window size, in samples. Must be even and nonzero.
    pub window_size: usize,
}

impl EngineParams {
    /// Creates engine parameters for the given analysis window size
    pub fn new(window_size: usize) -> Self {
        EngineParams { window_size }
    }
}

/// Which of the two forward plans applies to the next completed window
///
/// The "three-thirds" scheme alternates between these so that every
/// completed analysis window overlaps the previous one by exactly half a
/// window, without ever copying samples that have already been written.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PlanState {
    /// Reads `window[0 .. window_size)`
    Even,
    /// Reads `window[half_size .. half_size + window_size)`
    Odd,
}

impl PlanState {
    fn plan_index(self) -> usize {
        match self {
            PlanState::Even => 0,
            PlanState::Odd => 1,
        }
    }

    fn flip(self) -> Self {
        match self {
            PlanState::Even => PlanState::Odd,
            PlanState::Odd => PlanState::Even,
        }
    }
}

/// The spectral channelizer engine
///
/// An `Engine` owns the sliding input buffer, the two alternating forward
/// DFT plans, the shared spectrum they write to, and the roster of open
/// channels. It is not thread-safe: [`feed`](Engine::feed) must not be
/// called concurrently with itself or with [`open_channel`](Engine::open_channel)
/// / [`close_channel`](Engine::close_channel) on the same engine, and a
/// sink invoked during `feed` must not call back into `feed` on the same
/// engine.
pub struct Engine {
    /// Sliding input buffer, length `3 * window_size / 2`
    window: Vec<Complex32>,
    /// Most recent forward-DFT output, length `window_size`
    spectrum: Vec<Complex32>,
    /// Forward plans: `forward[0]` (even) reads `window[0..window_size)`,
    /// `forward[1]` (odd) reads `window[half_size..half_size+window_size)`.
    /// Both write to `spectrum`.
    forward: [Box<dyn ForwardFft>; 2],
    /// Analysis window size, `N`
    window_size: usize,
    /// `window_size / 2`
    half_size: usize,
    /// Write cursor since the last completed window, in `[0, window_size]`
    p: usize,
    /// Which plan applies to the next completed window
    state: PlanState,
    /// Set when a forward DFT has just produced a fresh spectrum that has
    /// not yet been fanned out to the channels
    ready: bool,
    /// Set once the first odd window has completed, i.e. once the mirror
    /// copy in the odd fill branch has had a chance to populate the last
    /// third of `window`. Before that, the overlap-mirror invariant below
    /// does not hold yet: the last third starts zeroed and is only ever
    /// written by an odd fill.
    mirrored: bool,
    /// Channel roster; closed slots are `None` and are not compacted, so
    /// that live indices never change
    channels: Vec<Option<Channel>>,
}

impl Engine {
    /// Creates an engine with the given parameters
    ///
    /// Fails with [`Error::InvalidParams`] if `window_size` is zero or odd,
    /// and with [`Error::OutOfMemory`] if the buffer sizes it implies would
    /// overflow `usize` before any allocation is attempted.
    pub fn new(params: EngineParams) -> Result<Self, Error> {
        let window_size = params.window_size;
        if window_size == 0 || window_size % 2 != 0 {
            return Err(Error::InvalidParams("window_size must be even and nonzero"));
        }
        let half_size = window_size / 2;
        let full_size = half_size.checked_mul(3).ok_or(Error::OutOfMemory)?;

        let window = vec![Complex32::zero(); full_size];
        let spectrum = vec![Complex32::zero(); window_size];

        log::debug!("created engine with window_size={}", window_size);

        Ok(Engine {
            window,
            spectrum,
            forward: [fft::forward_fft(window_size), fft::forward_fft(window_size)],
            window_size,
            half_size,
            p: 0,
            state: PlanState::Even,
            ready: false,
            mirrored: false,
            channels: Vec::new(),
        })
    }

    /// Returns the analysis window size this engine was created with
    pub fn window_size(&self) -> usize {
        self.window_size
    }

    /// Opens a channel, returning a handle stable across unrelated opens
    /// and closes on this engine
    ///
    /// Must not be called while a sink is running (i.e. from inside a
    /// callback passed to [`feed`](Engine::feed)).
    pub fn open_channel(&mut self, params: ChannelParams) -> Result<ChannelId, Error> {
        let mut channel = Channel::new(self.window_size, params)?;

        // Reuse the first tombstone slot, if any, so that the roster does
        // not grow without bound across many open/close cycles.
        let index = match self.channels.iter().position(Option::is_none) {
            Some(index) => index,
            None => {
                self.channels.push(None);
                self.channels.len() - 1
            }
        };
        channel.set_index(index);

        log::debug!(
            "opened channel {} at center bin {} (size {})",
            index,
            channel.center(),
            channel.size()
        );

        self.channels[index] = Some(channel);
        Ok(ChannelId(index))
    }

    /// Closes a previously opened channel
    ///
    /// Fails with [`Error::InvalidHandle`] if `id` does not refer to a
    /// currently open channel on this engine. Must not be called with the
    /// handle of the channel whose sink is currently running.
    pub fn close_channel(&mut self, id: ChannelId) -> Result<(), Error> {
        match self.channels.get_mut(id.index()) {
            Some(slot) if slot.is_some() => {
                log::debug!("closing channel {}", id.index());
                *slot = None;
                Ok(())
            }
            _ => Err(Error::InvalidHandle),
        }
    }

    /// Feeds a run of complex samples into the engine
    ///
    /// Internally, this repeatedly fills the sliding window up to its next
    /// boundary, runs the forward transform and channel fan-out whenever a
    /// window completes, and continues until every sample in `samples` has
    /// been consumed. The result is the conjunction of every sink's return
    /// value during this call (`true` if there were no channels, or every
    /// sink returned `true`).
    pub fn feed(&mut self, samples: &[Complex32]) -> bool {
        let mut ok = true;
        let mut remaining = samples;
        while !remaining.is_empty() {
            let consumed = self.fill(remaining);
            remaining = &remaining[consumed..];
            if self.ready {
                self.ready = false;
                ok = self.fan_out() && ok;
            }
        }
        ok
    }

    /// The atomic fill step described in spec §4.3: copies as many samples
    /// as fit before the next window boundary, placing them according to
    /// the current plan state, and runs the forward transform when the
    /// window fills up. Returns the number of samples consumed.
    fn fill(&mut self, samples: &[Complex32]) -> usize {
        let room = self.window_size - self.p;
        let n = samples.len().min(room);

        match self.state {
            PlanState::Even => {
                self.window[self.p..self.p + n].copy_from_slice(&samples[..n]);
            }
            PlanState::Odd => {
                let start = self.p + self.half_size;
                self.window[start..start + n].copy_from_slice(&samples[..n]);

                // If this write reached into what will become the last third of
                // the buffer, mirror the newly populated tail down into the
                // first third so that the next even-window DFT, which reads
                // window[0..window_size), sees a seamless continuation.
                if self.p + n > self.half_size {
                    let p_floor = self.p.max(self.half_size);
                    let tail_len = self.p + n - p_floor;
                    if tail_len > 0 {
                        let src = p_floor + self.half_size;
                        let dst = p_floor - self.half_size;
                        self.window.copy_within(src..src + tail_len, dst);
                    }
                }
            }
        }

        self.p += n;

        if self.p == self.window_size {
            self.p = self.half_size;

            // Only holds once an odd window has run at least once: that is
            // what populates the last third via the mirror copy above. The
            // very first completed window is always even, and at that point
            // the last third is still the zeros it was allocated with.
            if self.state == PlanState::Even && self.mirrored {
                debug_assert_eq!(
                    &self.window[..self.half_size],
                    &self.window[self.window_size..self.window_size + self.half_size],
                    "overlap-mirror invariant violated: the first third of the window must \
                     equal the last third before an even-window DFT runs"
                );
            }

            let plan_index = self.state.plan_index();
            let start = plan_index * self.half_size;
            let end = start + self.window_size;
            let (window, spectrum) = (&self.window[start..end], &mut self.spectrum);
            self.forward[plan_index].process(window, spectrum);

            if self.state == PlanState::Odd {
                self.mirrored = true;
            }

            log::trace!("completed {:?} window, next state {:?}", self.state, self.state.flip());
            self.state = self.state.flip();
            self.ready = true;
        }

        n
    }

    /// Extracts, scales, inverse-transforms, and delivers the current
    /// spectrum to every live channel, in roster order
    fn fan_out(&mut self) -> bool {
        let spectrum = &self.spectrum;
        self.channels
            .iter_mut()
            .flatten()
            .fold(true, |ok, channel| channel.extract_and_deliver(spectrum) && ok)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use std::f32::consts::PI;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};

    const TWO_PI: f32 = PI * 2.0;

    #[test]
    fn test_rejects_odd_window_size() {
        assert_eq!(
            Engine::new(EngineParams::new(1023)).unwrap_err(),
            Error::InvalidParams("window_size must be even and nonzero")
        );
    }

    #[test]
    fn test_rejects_zero_window_size() {
        assert!(Engine::new(EngineParams::new(0)).is_err());
    }

    #[test]
    fn test_accepts_even_window_size() {
        assert!(Engine::new(EngineParams::new(1024)).is_ok());
    }

    #[test]
    fn test_sample_count_preserved() {
        // Every sample fed to the engine must be consumed (invariant #2 in spec §8),
        // whether or not any channel is open
        let mut engine = Engine::new(EngineParams::new(64)).unwrap();
        let samples: Vec<Complex32> = (0..777)
            .map(|i| Complex32::new(i as f32, 0.0))
            .collect();

        // feed() always drains its input in the fill loop; if it didn't, this
        // call would spin forever instead of returning.
        let _ = engine.feed(&samples);
    }

    #[test]
    fn test_stable_indices_across_unrelated_opens_and_closes() {
        let mut engine = Engine::new(EngineParams::new(1024)).unwrap();
        let a = engine
            .open_channel(ChannelParams::new(0.3, 0.1, |_: ChannelId, _: &[Complex32]| true))
            .unwrap();
        let b = engine
            .open_channel(ChannelParams::new(0.6, 0.1, |_: ChannelId, _: &[Complex32]| true))
            .unwrap();
        let c = engine
            .open_channel(ChannelParams::new(0.9, 0.1, |_: ChannelId, _: &[Complex32]| true))
            .unwrap();
        assert_eq!(a.index(), 0);
        assert_eq!(b.index(), 1);
        assert_eq!(c.index(), 2);

        engine.close_channel(b).unwrap();

        let d = engine
            .open_channel(ChannelParams::new(1.2, 0.1, |_: ChannelId, _: &[Complex32]| true))
            .unwrap();
        assert_eq!(d.index(), 1, "the tombstone left by closing B should be reused");
        assert_eq!(a.index(), 0);
        assert_eq!(c.index(), 2);
    }

    #[test]
    fn test_close_channel_twice_fails() {
        let mut engine = Engine::new(EngineParams::new(1024)).unwrap();
        let a = engine
            .open_channel(ChannelParams::new(0.3, 0.1, |_: ChannelId, _: &[Complex32]| true))
            .unwrap();
        engine.close_channel(a).unwrap();
        assert_eq!(engine.close_channel(a).unwrap_err(), Error::InvalidHandle);
    }

    #[test]
    fn test_close_channel_invalid_handle() {
        let mut engine = Engine::new(EngineParams::new(1024)).unwrap();
        assert_eq!(
            engine.close_channel(ChannelId(99)).unwrap_err(),
            Error::InvalidHandle
        );
    }

    #[test]
    fn test_open_close_is_transparent() {
        // Opening and immediately closing a channel must leave feed()'s
        // observable behavior unchanged (invariant #1 in spec §8).
        let mut engine = Engine::new(EngineParams::new(64)).unwrap();
        let samples: Vec<Complex32> = (0..500).map(|i| Complex32::new(i as f32, 0.0)).collect();

        let baseline = engine.feed(&samples);

        let ch = engine
            .open_channel(ChannelParams::new(1.0, 0.2, |_: ChannelId, _: &[Complex32]| true))
            .unwrap();
        engine.close_channel(ch).unwrap();

        let after = engine.feed(&samples);
        assert_eq!(baseline, after);
    }

    #[test]
    fn test_output_sample_count_matches_completed_windows() {
        let window_size = 64;
        let mut engine = Engine::new(EngineParams::new(window_size)).unwrap();

        let total_delivered = Arc::new(AtomicUsize::new(0));
        let total_delivered_clone = Arc::clone(&total_delivered);
        let halfsz_seen = Arc::new(Mutex::new(None));
        let halfsz_seen_clone = Arc::clone(&halfsz_seen);
        let params = ChannelParams::new(1.0, 0.5, move |_id: ChannelId, samples: &[Complex32]| {
            total_delivered_clone.fetch_add(samples.len(), Ordering::SeqCst);
            *halfsz_seen_clone.lock().unwrap() = Some(samples.len());
            true
        });
        engine.open_channel(params).unwrap();

        // Enough samples for several completed half-window hops
        let sample_count = window_size * 20;
        let samples: Vec<Complex32> = (0..sample_count)
            .map(|i| Complex32::new((i as f32 * 0.05).cos(), (i as f32 * 0.05).sin()))
            .collect();
        engine.feed(&samples);

        // Completed windows: the first full window at p==window_size, then one
        // more for every half_size samples afterward.
        let half_size = window_size / 2;
        let completed_windows = (sample_count - window_size) / half_size + 1;
        let halfsz = halfsz_seen.lock().unwrap().expect("at least one delivery");
        assert_eq!(
            total_delivered.load(Ordering::SeqCst),
            completed_windows * halfsz
        );
    }

    #[test]
    fn test_feed_returns_false_when_any_sink_fails() {
        let mut engine = Engine::new(EngineParams::new(64)).unwrap();
        engine
            .open_channel(ChannelParams::new(0.5, 0.2, |_: ChannelId, _: &[Complex32]| true))
            .unwrap();
        engine
            .open_channel(ChannelParams::new(1.5, 0.2, |_: ChannelId, _: &[Complex32]| false))
            .unwrap();

        let samples: Vec<Complex32> = (0..256)
            .map(|i| Complex32::new((i as f32 * (TWO_PI / 32.0)).cos(), 0.0))
            .collect();
        assert!(!engine.feed(&samples));
    }
}
