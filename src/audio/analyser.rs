use std::collections::VecDeque;
use std::sync::Arc;

use crossbeam_channel::Receiver;
use rustfft::{num_complex::Complex, Fft, FftPlanner};

pub const DEFAULT_FFT_SIZE: usize = 2048;
const SMOOTHING_TIME_CONSTANT: f32 = 0.8;
const MIN_DECIBELS: f32 = -100.0;
const MAX_DECIBELS: f32 = -30.0;

/// Keeps the most recent `fft_size` microphone samples and answers byte
/// snapshot queries the way a browser analyser node does: Blackman-windowed
/// FFT, magnitudes smoothed over time, then mapped from a dB range onto 0..255.
pub struct Analyser {
    fft_size: usize,
    fft: Arc<dyn Fft<f32>>,
    window: Vec<f32>,
    ring: VecDeque<f32>,
    smoothed: Vec<f32>,
    scratch: Vec<Complex<f32>>,
    input_rx: Option<Receiver<Vec<f32>>>,
}

impl Analyser {
    pub fn new(fft_size: usize) -> Self {
        let mut planner = FftPlanner::new();
        let fft = planner.plan_fft_forward(fft_size);

        Self {
            fft_size,
            fft,
            window: blackman_window(fft_size),
            ring: std::iter::repeat_n(0.0, fft_size).collect(),
            smoothed: vec![0.0; fft_size / 2],
            scratch: vec![Complex::new(0.0, 0.0); fft_size],
            input_rx: None,
        }
    }

    pub fn fft_size(&self) -> usize {
        self.fft_size
    }

    pub fn connect(&mut self, rx: Receiver<Vec<f32>>) {
        self.input_rx = Some(rx);
    }

    // forget the previous source so a new take starts from silence
    pub fn disconnect(&mut self) {
        self.input_rx = None;
        self.ring.iter_mut().for_each(|s| *s = 0.0);
        self.smoothed.iter_mut().for_each(|m| *m = 0.0);
    }

    pub fn push_samples(&mut self, samples: &[f32]) {
        for &s in samples {
            if self.ring.len() == self.fft_size {
                self.ring.pop_front();
            }
            self.ring.push_back(s);
        }
    }

    fn drain_input(&mut self) {
        let Some(rx) = self.input_rx.take() else {
            return;
        };
        while let Ok(block) = rx.try_recv() {
            self.push_samples(&block);
        }
        self.input_rx = Some(rx);
    }

    pub fn byte_time_domain_data(&mut self, out: &mut [u8]) {
        self.drain_input();
        for (o, &s) in out.iter_mut().zip(self.ring.iter()) {
            *o = (128.0 + s * 128.0).clamp(0.0, 255.0) as u8;
        }
    }

    pub fn byte_frequency_data(&mut self, out: &mut [u8]) {
        self.drain_input();
        for (i, (c, &s)) in self.scratch.iter_mut().zip(self.ring.iter()).enumerate() {
            *c = Complex::new(s * self.window[i], 0.0);
        }
        self.fft.process(&mut self.scratch);

        let scale = 1.0 / self.fft_size as f32;
        let range = MAX_DECIBELS - MIN_DECIBELS;
        for (k, (m, o)) in self.smoothed.iter_mut().zip(out.iter_mut()).enumerate() {
            let mag = self.scratch[k].norm() * scale;
            *m = SMOOTHING_TIME_CONSTANT * *m + (1.0 - SMOOTHING_TIME_CONSTANT) * mag;
            let db = 20.0 * m.max(1e-12).log10();
            *o = (255.0 * (db - MIN_DECIBELS) / range).clamp(0.0, 255.0) as u8;
        }
    }
}

pub fn blackman_window(size: usize) -> Vec<f32> {
    use std::f32::consts::PI;
    let n = size as f32;
    (0..size)
        .map(|i| {
            let x = i as f32 / n;
            0.42 - 0.5 * (2.0 * PI * x).cos() + 0.08 * (4.0 * PI * x).cos()
        })
        .collect()
}
