mod frame;
pub mod pattern;
pub mod recorder;

pub use frame::{analyze_frame, dominant_frequency, rms_energy, Frame, FrameAnalyzer};
pub use pattern::{analyze, quantize, PatternAnalysis, QuantizedEvent};
pub use recorder::{Cadence, Event, Recorder, LOOSE_ONSET_THRESHOLD, STRICT_ONSET_THRESHOLD};
