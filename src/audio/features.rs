use serde::{Deserialize, Serialize};

/// Decoded single-channel audio. Owned by the caller; analysis only reads slices of it.
#[derive(Clone, Debug, Default)]
pub struct SampleBuffer {
    pub samples: Vec<f32>,
    pub sample_rate: u32,
}

impl SampleBuffer {
    pub fn new(samples: Vec<f32>, sample_rate: u32) -> Self {
        Self { samples, sample_rate }
    }

    pub fn duration(&self) -> f64 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.samples.len() as f64 / self.sample_rate as f64
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty() || self.sample_rate == 0
    }
}

/// Magnitudes for bins `0..N/2` of one windowed block of N samples.
#[derive(Clone, Debug, PartialEq)]
pub struct Spectrum {
    pub magnitudes: Vec<f32>,
}

impl Spectrum {
    pub fn len(&self) -> usize {
        self.magnitudes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.magnitudes.is_empty()
    }

    /// Index of the strongest bin, or `None` for an empty spectrum.
    pub fn peak_bin(&self) -> Option<usize> {
        self.magnitudes
            .iter()
            .enumerate()
            .max_by(|a, b| a.1.total_cmp(b.1))
            .map(|(i, _)| i)
    }
}

/// The four frequency bands onsets are tracked in.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Band {
    Bass,    // < 150 Hz
    MidLow,  // 150-1000 Hz
    MidHigh, // 1-4 kHz
    High,    // 4-8 kHz
}

impl Band {
    pub const ALL: [Band; 4] = [Band::Bass, Band::MidLow, Band::MidHigh, Band::High];

    pub fn index(self) -> usize {
        self as usize
    }

    /// Half-open frequency range `[low, high)` in Hz.
    pub fn range_hz(self) -> (f32, f32) {
        match self {
            Band::Bass => (0.0, 150.0),
            Band::MidLow => (150.0, 1000.0),
            Band::MidHigh => (1000.0, 4000.0),
            Band::High => (4000.0, 8000.0),
        }
    }

    /// Band a frequency falls into; frequencies at or above 8 kHz belong to none.
    pub fn for_frequency(freq: f32) -> Option<Band> {
        Band::ALL.into_iter().find(|band| {
            let (low, high) = band.range_hz();
            freq >= low && freq < high
        })
    }

    pub fn name(self) -> &'static str {
        match self {
            Band::Bass => "bass",
            Band::MidLow => "midLow",
            Band::MidHigh => "midHigh",
            Band::High => "high",
        }
    }
}

impl std::fmt::Display for Band {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Summed spectral magnitude per band for one frame.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct BandEnergy {
    pub energies: [f32; 4],
}

impl BandEnergy {
    pub fn get(&self, band: Band) -> f32 {
        self.energies[band.index()]
    }

    /// Accumulate a spectrum into band buckets. Bin `k` sits at `k * sample_rate / fft_size` Hz.
    pub fn from_spectrum(spectrum: &Spectrum, sample_rate: u32, fft_size: usize) -> Self {
        let mut energies = [0.0f32; 4];
        let hz_per_bin = sample_rate as f32 / fft_size as f32;
        for (bin, &magnitude) in spectrum.magnitudes.iter().enumerate() {
            if let Some(band) = Band::for_frequency(bin as f32 * hz_per_bin) {
                energies[band.index()] += magnitude;
            }
        }
        Self { energies }
    }

    /// Half-wave rectified increase versus `previous`, per band.
    pub fn flux_since(&self, previous: &BandEnergy) -> [f32; 4] {
        let mut flux = [0.0f32; 4];
        for (i, value) in flux.iter_mut().enumerate() {
            *value = (self.energies[i] - previous.energies[i]).max(0.0);
        }
        flux
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct FluxSample {
    /// Frame start in seconds
    pub time: f64,
    pub flux: f32,
}

/// Onset times in seconds per band, ascending.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OnsetSet {
    pub bass: Vec<f64>,
    pub mid_low: Vec<f64>,
    pub mid_high: Vec<f64>,
    pub high: Vec<f64>,
}

impl OnsetSet {
    pub fn get(&self, band: Band) -> &[f64] {
        match band {
            Band::Bass => &self.bass,
            Band::MidLow => &self.mid_low,
            Band::MidHigh => &self.mid_high,
            Band::High => &self.high,
        }
    }

    pub fn set(&mut self, band: Band, times: Vec<f64>) {
        match band {
            Band::Bass => self.bass = times,
            Band::MidLow => self.mid_low = times,
            Band::MidHigh => self.mid_high = times,
            Band::High => self.high = times,
        }
    }

    pub fn total(&self) -> usize {
        Band::ALL.iter().map(|&b| self.get(b).len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.total() == 0
    }
}
