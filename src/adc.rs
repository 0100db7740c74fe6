//! SAADC adapter - one-shot sampling of the configured analog inputs.
//!
//! The SAADC is run in one-shot mode once per telemetry cycle; the
//! conversion takes a few microseconds per channel, well inside the
//! cycle budget, so the async sample is driven to completion inline.

use embassy_nrf::saadc::Saadc;

use crate::sampler::{classify_raw, Sample, Sampler};

/// [`Sampler`] implementation over the nRF52840 SAADC.
pub struct SaadcSampler<'d, const N: usize> {
    saadc: Saadc<'d, N>,
}

impl<'d, const N: usize> SaadcSampler<'d, N> {
    pub fn new(saadc: Saadc<'d, N>) -> Self {
        Self { saadc }
    }

    /// Run the SAADC offset calibration. Call once after power-up,
    /// before the first cycle.
    pub async fn calibrate(&mut self) {
        self.saadc.calibrate().await;
    }
}

impl<'d, const N: usize> Sampler<N> for SaadcSampler<'d, N> {
    fn read_all(&mut self) -> [Sample; N] {
        let mut buf = [0i16; N];
        embassy_futures::block_on(self.saadc.sample(&mut buf));

        // The SAADC reports signed codes and can dip slightly below zero
        // near ground; classify_raw clamps and flags those.
        core::array::from_fn(|i| classify_raw(buf[i] as i32))
    }
}
