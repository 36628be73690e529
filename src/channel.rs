//!
//! A single narrowband channel extracted from the shared spectrum
//!

use num_complex::Complex32;
use num_traits::Zero;

use crate::error::Error;
use crate::fft::{self, InverseFft};
use crate::TWO_PI;

/// A handle to a channel previously opened with
/// [`Engine::open_channel`](crate::Engine::open_channel)
///
/// Indices are stable: closing one channel never changes the handle of any
/// other live channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ChannelId(pub(crate) usize);

impl ChannelId {
    /// Returns the roster index this handle refers to
    pub fn index(self) -> usize {
        self.0
    }
}

/// Receives the decimated time-domain samples reconstructed for one channel
///
/// This is the idiomatic replacement for the C-style
/// `on_data(channel, private, samples, count) -> bool` callback: the
/// opaque `private` context is simply whatever state the implementor
/// closes over (or holds as fields), rather than a separate void pointer
/// threaded through every call.
///
/// Returning `false` signals a soft failure for this delivery; the engine
/// keeps delivering to the other channels and folds the failure into the
/// boolean [`Engine::feed`](crate::Engine::feed) returns.
pub trait ChannelSink: Send {
    /// Delivers `samples` reconstructed for the channel identified by `id`
    fn on_data(&mut self, id: ChannelId, samples: &[Complex32]) -> bool;
}

impl<F> ChannelSink for F
where
    F: FnMut(ChannelId, &[Complex32]) -> bool + Send,
{
    fn on_data(&mut self, id: ChannelId, samples: &[Complex32]) -> bool {
        (self)(id, samples)
    }
}

/// Parameters for opening a channel
pub struct ChannelParams {
    /// Normalized center frequency, in `(0, 2*pi)`, where `2*pi` is the input
    /// sample rate
    pub f0: f32,
    /// Normalized bandwidth, in `(0, 2*pi)`
    pub bw: f32,
    /// Receives the decimated output samples for this channel
    pub sink: Box<dyn ChannelSink>,
}

impl ChannelParams {
    /// Creates channel parameters from a center frequency, bandwidth, and sink
    pub fn new<S>(f0: f32, bw: f32, sink: S) -> Self
    where
        S: ChannelSink + 'static,
    {
        ChannelParams {
            f0,
            bw,
            sink: Box::new(sink),
        }
    }
}

impl std::fmt::Debug for ChannelParams {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChannelParams")
            .field("f0", &self.f0)
            .field("bw", &self.bw)
            .finish()
    }
}

/// One extracted, decimated, reconstructed channel
///
/// A channel owns its frequency-domain extraction buffer, its time-domain
/// output buffer, and its inverse DFT plan exclusively; nothing about a
/// channel is shared with any other channel or with the engine beyond the
/// read-only access to the shared spectrum during extraction.
pub struct Channel {
    /// Center bin in the engine's spectrum, `round(f0 / 2*pi * window_size)`
    center: usize,
    /// Per-channel IFFT length, `ceil(window_size * bw / (2*pi))`
    size: usize,
    /// Extraction half-width in bins on each side of `center`
    halfw: usize,
    /// Number of output samples delivered per call, `size / 2`
    halfsz: usize,
    /// Offset into `timebuf` where the delivered slice begins, `size / 4`
    offset: usize,
    /// Amplitude scale applied to every extracted bin
    k: f32,
    /// Frequency-domain extraction buffer (IFFT input), length `size`
    fft: Vec<Complex32>,
    /// Time-domain reconstruction buffer (IFFT output), length `size`
    timebuf: Vec<Complex32>,
    /// Inverse DFT plan, `fft -> timebuf`
    inverse: Box<dyn InverseFft>,
    /// This channel's slot index in the engine's roster
    index: usize,
    /// Receives the decimated output
    sink: Box<dyn ChannelSink>,
}

impl Channel {
    /// Creates a channel for an engine with the given analysis window size
    pub(crate) fn new(window_size: usize, params: ChannelParams) -> Result<Self, Error> {
        let ChannelParams { f0, bw, sink } = params;

        if !(f0 > 0.0 && f0 < TWO_PI) {
            return Err(Error::InvalidParams("f0 must be in (0, 2*pi)"));
        }
        if !(bw > 0.0 && bw < TWO_PI) {
            return Err(Error::InvalidParams("bw must be in (0, 2*pi)"));
        }

        let decimation = TWO_PI / bw;
        let center = ((f0 * window_size as f32 / TWO_PI).round() as usize) % window_size;

        let size_f = (window_size as f32 / decimation).ceil();
        if !size_f.is_finite() || size_f < 1.0 || size_f > (u32::max_value() as f32) {
            return Err(Error::OutOfMemory);
        }
        let size = size_f as usize;

        let k = 1.0 / (decimation * size as f32);
        let halfw = size / 2;
        let halfsz = size / 2;
        let offset = size / 4;

        Ok(Channel {
            center,
            size,
            halfw,
            halfsz,
            offset,
            k,
            fft: vec![Complex32::zero(); size],
            timebuf: vec![Complex32::zero(); size],
            inverse: fft::inverse_fft(size),
            index: 0,
            sink,
        })
    }

    /// Sets this channel's roster index, called once by the engine right
    /// after construction
    pub(crate) fn set_index(&mut self, index: usize) {
        self.index = index;
    }

    /// Returns this channel's roster index
    pub(crate) fn index(&self) -> usize {
        self.index
    }

    /// Returns the center bin this channel was opened with
    pub(crate) fn center(&self) -> usize {
        self.center
    }

    /// Returns the IFFT length this channel was opened with
    pub(crate) fn size(&self) -> usize {
        self.size
    }

    /// Extracts this channel's slice of `spectrum`, scales it, inverse-transforms
    /// it, and delivers the steady-state middle portion to the sink
    ///
    /// `spectrum` must have the engine's window size.
    pub(crate) fn extract_and_deliver(&mut self, spectrum: &[Complex32]) -> bool {
        let n = spectrum.len();

        // Upper sideband: spectrum[center .. center+halfw), wrapping past the end
        let mut src = self.center;
        for dst in self.fft.iter_mut().take(self.halfw) {
            *dst = spectrum[src] * self.k;
            src += 1;
            if src == n {
                src = 0;
            }
        }

        // Lower sideband: spectrum[center-halfw .. center), wrapping past the start.
        // Filled from the high end down so that fft[size - 1] holds spectrum[center - 1],
        // the bin immediately below the center frequency.
        let mut src = if self.center == 0 {
            n - 1
        } else {
            self.center - 1
        };
        for offset in 0..self.halfw {
            self.fft[self.size - 1 - offset] = spectrum[src] * self.k;
            src = if src == 0 { n - 1 } else { src - 1 };
        }
        // fft[halfw .. size - halfw) is the guard band and is never written; it
        // stays at the zero it was allocated with (see spec §4.4, §9).

        self.inverse.process(&self.fft, &mut self.timebuf);

        let delivered = &self.timebuf[self.offset..self.offset + self.halfsz];
        let ok = self.sink.on_data(ChannelId(self.index()), delivered);
        if !ok {
            log::warn!("channel {} callback returned false", self.index());
        }
        ok
    }
}
