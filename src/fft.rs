//!
//! The complex-FFT provider
//!
//! The engine and each channel depend on this trait boundary instead of a
//! concrete FFT library. `rustfft` backs the default implementation, but
//! nothing outside this module knows that: both traits take a borrowed
//! input and a borrowed output buffer, which lets a plan keep its own
//! scratch space and lets callers reuse the same input buffer across many
//! transforms without it being consumed.
//!

use std::sync::Arc;

use num_complex::Complex32;
use num_traits::Zero;
use rustfft::{FFTplanner, FFT};

/// A forward complex DFT plan bound to a fixed size
pub trait ForwardFft: Send {
    /// Runs the forward transform
    ///
    /// `input` and `output` must both have the size this plan was created
    /// for; `input` is left unmodified.
    fn process(&mut self, input: &[Complex32], output: &mut [Complex32]);
}

/// An inverse (unnormalized) complex DFT plan bound to a fixed size
pub trait InverseFft: Send {
    /// Runs the inverse transform
    ///
    /// `input` and `output` must both have the size this plan was created
    /// for; `input` is left unmodified. The output is *not* divided by the
    /// transform size; callers that need that convention must scale
    /// themselves.
    fn process(&mut self, input: &[Complex32], output: &mut [Complex32]);
}

/// Forward transform backed by `rustfft`
struct RustFftForward {
    fft: Arc<dyn FFT<f32>>,
    scratch: Vec<Complex32>,
}

impl ForwardFft for RustFftForward {
    fn process(&mut self, input: &[Complex32], output: &mut [Complex32]) {
        self.scratch.copy_from_slice(input);
        self.fft.process(&mut self.scratch, output);
    }
}

/// Inverse transform backed by `rustfft`
struct RustFftInverse {
    fft: Arc<dyn FFT<f32>>,
    scratch: Vec<Complex32>,
}

impl InverseFft for RustFftInverse {
    fn process(&mut self, input: &[Complex32], output: &mut [Complex32]) {
        self.scratch.copy_from_slice(input);
        self.fft.process(&mut self.scratch, output);
    }
}

/// Creates a forward DFT plan for the given size
pub fn forward_fft(size: usize) -> Box<dyn ForwardFft> {
    Box::new(RustFftForward {
        fft: FFTplanner::new(false).plan_fft(size),
        scratch: vec![Complex32::zero(); size],
    })
}

/// Creates an inverse (unnormalized) DFT plan for the given size
pub fn inverse_fft(size: usize) -> Box<dyn InverseFft> {
    Box::new(RustFftInverse {
        fft: FFTplanner::new(true).plan_fft(size),
        scratch: vec![Complex32::zero(); size],
    })
}
