use rustfft::{num_complex::Complex, Fft, FftPlanner};
use std::sync::Arc;

use super::features::Spectrum;

/// Windowed FFT magnitude frontend for fixed power-of-two block sizes.
///
/// Planning and the Hamming window are done once; `compute` reuses its buffers,
/// so one frontend can be driven for every hop of an analysis.
pub struct SpectralFrontend {
    size: usize,
    fft: Arc<dyn Fft<f32>>,
    window: Vec<f32>,
    buffer: Vec<Complex<f32>>,
    scratch: Vec<Complex<f32>>,
}

impl SpectralFrontend {
    /// Panics if `size` is not a power of two.
    pub fn new(size: usize) -> Self {
        assert!(
            size.is_power_of_two(),
            "FFT block size must be a power of two, got {}",
            size
        );
        let mut planner = FftPlanner::<f32>::new();
        let fft = planner.plan_fft_forward(size);
        let scratch = vec![Complex::new(0.0, 0.0); fft.get_inplace_scratch_len()];
        Self {
            size,
            fft,
            window: hamming_window(size),
            buffer: vec![Complex::new(0.0, 0.0); size],
            scratch,
        }
    }

    pub fn size(&self) -> usize {
        self.size
    }

    /// Magnitude spectrum of one block. Panics if `block.len()` differs from the planned size.
    pub fn compute(&mut self, block: &[f32]) -> Spectrum {
        assert_eq!(
            block.len(),
            self.size,
            "spectrum block must be exactly {} samples",
            self.size
        );

        for ((slot, &sample), &w) in self.buffer.iter_mut().zip(block).zip(&self.window) {
            *slot = Complex::new(sample * w, 0.0);
        }
        self.fft.process_with_scratch(&mut self.buffer, &mut self.scratch);

        let magnitudes = self.buffer[..self.size / 2].iter().map(|c| c.norm()).collect();
        Spectrum { magnitudes }
    }
}

/// One-shot spectrum of a power-of-two block. Prefer [`SpectralFrontend`] in loops.
pub fn spectrum(block: &[f32]) -> Spectrum {
    SpectralFrontend::new(block.len()).compute(block)
}

fn hamming_window(size: usize) -> Vec<f32> {
    if size == 1 {
        return vec![1.0];
    }
    (0..size)
        .map(|i| {
            0.54 - 0.46 * (2.0 * std::f32::consts::PI * i as f32 / (size - 1) as f32).cos()
        })
        .collect()
}
