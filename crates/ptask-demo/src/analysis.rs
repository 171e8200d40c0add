//! Signal synthesis and analysis for the demo pipeline.

use std::f32::consts::TAU;

use serde::Serialize;

/// Sample rate of synthesized audio.
pub const SAMPLE_RATE_HZ: f32 = 8_000.0;

/// Samples per frame.
pub const FRAME_LEN: usize = 256;

/// One block of audio samples, tagged with a sequence number.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Frame {
    pub seq: u64,
    pub samples: [f32; FRAME_LEN],
}

impl Default for Frame {
    fn default() -> Self {
        Self {
            seq: 0,
            samples: [0.0; FRAME_LEN],
        }
    }
}

/// Sine oscillator with continuous phase across frames.
#[derive(Debug, Clone)]
pub struct SineSource {
    freq_hz: f32,
    amplitude: f32,
    phase: f32,
}

impl SineSource {
    pub fn new(freq_hz: f32, amplitude: f32) -> Self {
        Self {
            freq_hz,
            amplitude,
            phase: 0.0,
        }
    }

    /// Write the next `out.len()` samples.
    pub fn fill(&mut self, out: &mut [f32]) {
        let step = TAU * self.freq_hz / SAMPLE_RATE_HZ;
        for sample in out {
            *sample = self.amplitude * self.phase.sin();
            self.phase = (self.phase + step) % TAU;
        }
    }
}

/// Result of analyzing one frame.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct Analysis {
    /// Sequence number of the analyzed frame.
    pub seq: u64,
    pub rms: f32,
    /// Pitch estimated from the zero-crossing rate.
    pub pitch_hz: f32,
}

pub fn rms(samples: &[f32]) -> f32 {
    if samples.is_empty() {
        return 0.0;
    }
    let energy: f32 = samples.iter().map(|s| s * s).sum();
    (energy / samples.len() as f32).sqrt()
}

/// Count sign changes between consecutive samples.
pub fn zero_crossings(samples: &[f32]) -> usize {
    samples
        .windows(2)
        .filter(|pair| (pair[0] < 0.0) != (pair[1] < 0.0))
        .count()
}

/// A periodic signal crosses zero twice per cycle.
pub fn estimate_pitch(samples: &[f32]) -> f32 {
    if samples.is_empty() {
        return 0.0;
    }
    let crossings = zero_crossings(samples) as f32;
    crossings * SAMPLE_RATE_HZ / (2.0 * samples.len() as f32)
}

pub fn analyze(frame: &Frame) -> Analysis {
    Analysis {
        seq: frame.seq,
        rms: rms(&frame.samples),
        pitch_hz: estimate_pitch(&frame.samples),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sine_frame(freq_hz: f32, amplitude: f32) -> Frame {
        let mut frame = Frame::default();
        SineSource::new(freq_hz, amplitude).fill(&mut frame.samples);
        frame
    }

    #[test]
    fn test_silence() {
        let result = analyze(&Frame::default());
        assert_eq!(result.rms, 0.0);
        assert_eq!(result.pitch_hz, 0.0);
    }

    #[test]
    fn test_sine_rms_is_amplitude_over_sqrt2() {
        let result = analyze(&sine_frame(440.0, 0.5));
        let expected = 0.5 / 2.0_f32.sqrt();
        assert!((result.rms - expected).abs() < 0.02, "rms {}", result.rms);
    }

    #[test]
    fn test_pitch_estimate_close_to_frequency() {
        for freq in [220.0_f32, 440.0, 1000.0] {
            let result = analyze(&sine_frame(freq, 1.0));
            assert!(
                (result.pitch_hz - freq).abs() < 0.05 * freq,
                "{freq} Hz estimated as {}",
                result.pitch_hz
            );
        }
    }

    #[test]
    fn test_phase_continues_across_frames() {
        let mut source = SineSource::new(440.0, 1.0);
        let mut whole = [0.0_f32; 2 * FRAME_LEN];
        source.fill(&mut whole);

        let mut split = SineSource::new(440.0, 1.0);
        let mut first = [0.0_f32; FRAME_LEN];
        let mut second = [0.0_f32; FRAME_LEN];
        split.fill(&mut first);
        split.fill(&mut second);

        assert_eq!(&whole[..FRAME_LEN], &first[..]);
        assert_eq!(&whole[FRAME_LEN..], &second[..]);
    }

    #[test]
    fn test_zero_crossings_of_square_wave() {
        let samples = [1.0, 1.0, -1.0, -1.0, 1.0, -1.0];
        assert_eq!(zero_crossings(&samples), 3);
        assert_eq!(zero_crossings(&[]), 0);
        assert_eq!(zero_crossings(&[1.0]), 0);
    }
}
