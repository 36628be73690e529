/*
 * Copyright 2019 The Regents of the University of California
 *
 * Licensed under the Apache License, Version 2.0 (the "License");
 * you may not use this file except in compliance with the License.
 * You may obtain a copy of the License at
 *
 *     http://www.apache.org/licenses/LICENSE-2.0
 *
 * Unless required by applicable law or agreed to in writing, software
 * distributed under the License is distributed on an "AS IS" BASIS,
 * WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
 * See the License for the specific language governing permissions and
 * limitations under the License.
 *
 */

//!
//! A real-time spectral channelizer.
//!
//! An [`Engine`] ingests a stream of complex baseband samples and runs a
//! sliding-window forward DFT over them. Any number of narrowband
//! [channels](ChannelParams) can be opened against the same engine; each one
//! extracts its own slice of the shared spectrum, inverse-transforms it, and
//! delivers decimated time-domain samples to a [`ChannelSink`].
//!

#![deny(
    bad_style,
    const_err,
    dead_code,
    improper_ctypes,
    non_shorthand_field_patterns,
    no_mangle_generic_items,
    overflowing_literals,
    path_statements,
    patterns_in_fns_without_body,
    private_in_public,
    unconditional_recursion,
    unused,
    unused_allocation,
    unused_comparisons,
    unused_parens,
    while_true,
    missing_docs,
    trivial_casts,
    trivial_numeric_casts,
    unused_extern_crates,
    unused_import_braces,
    unused_qualifications,
    bad_style,
    future_incompatible,
    nonstandard_style,
    rust_2018_compatibility,
    rust_2018_idioms,
    missing_docs
)]
#![warn(clippy::all)]
#![warn(unused)]

mod channel;
mod engine;
mod error;
mod fft;

pub use channel::{ChannelId, ChannelParams, ChannelSink};
pub use engine::{Engine, EngineParams};
pub use error::Error;

/// One full turn of the unit circle, used throughout as the normalized
/// sample rate that `f0` and `bw` are expressed against.
pub(crate) const TWO_PI: f32 = std::f32::consts::PI * 2.0;
