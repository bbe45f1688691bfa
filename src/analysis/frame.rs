use crate::audio_api::AudioSource;

/// One analysis tick's summary of the microphone input.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Frame {
    pub energy_rms: f32, // 0..1
    pub dominant_frequency_hz: f32,
}

/// Turns analyser snapshots into [`Frame`]s, reusing its byte buffers between ticks.
pub struct FrameAnalyzer {
    sample_rate: f32,
    fft_size: usize,
    freq_bytes: Vec<u8>,
    time_bytes: Vec<u8>,
}

impl FrameAnalyzer {
    pub fn new(sample_rate: f32, fft_size: usize) -> Self {
        Self {
            sample_rate,
            fft_size,
            freq_bytes: vec![0; fft_size / 2],
            time_bytes: vec![128; fft_size],
        }
    }

    pub fn for_source(source: &impl AudioSource) -> Self {
        Self::new(source.sample_rate(), source.fft_size())
    }

    pub fn capture(&mut self, source: &mut impl AudioSource) -> Frame {
        source.byte_frequency_data(&mut self.freq_bytes);
        source.byte_time_domain_data(&mut self.time_bytes);
        analyze_frame(&self.freq_bytes, &self.time_bytes, self.sample_rate, self.fft_size)
    }
}

pub fn analyze_frame(freq_bytes: &[u8], time_bytes: &[u8], sample_rate: f32, fft_size: usize) -> Frame {
    Frame {
        energy_rms: rms_energy(time_bytes),
        dominant_frequency_hz: dominant_frequency(freq_bytes, sample_rate, fft_size),
    }
}

/// Frequency of the loudest bin. Ties go to the lowest bin, so silence reads as 0 Hz.
pub fn dominant_frequency(freq_bytes: &[u8], sample_rate: f32, fft_size: usize) -> f32 {
    if fft_size == 0 {
        return 0.0;
    }
    let mut max_val = 0u8;
    let mut max_idx = 0usize;
    for (i, &v) in freq_bytes.iter().enumerate() {
        if v > max_val {
            max_val = v;
            max_idx = i;
        }
    }
    max_idx as f32 * sample_rate / fft_size as f32
}

// bytes are centred on 128, so (b - 128) / 128 lands in [-1, 1)
pub fn rms_energy(time_bytes: &[u8]) -> f32 {
    if time_bytes.is_empty() {
        return 0.0;
    }
    let sum: f32 = time_bytes
        .iter()
        .map(|&b| {
            let v = (b as f32 - 128.0) / 128.0;
            v * v
        })
        .sum();
    (sum / time_bytes.len() as f32).sqrt().min(1.0)
}
