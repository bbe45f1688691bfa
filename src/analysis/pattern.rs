//! Rhythm quantization and pattern statistics.
//!
//! The grid is half the mean gap between hits (an eighth-note guess). It is a
//! heuristic, not a beat tracker: no attempt is made to choose between
//! quarter, eighth and sixteenth subdivisions.

use super::recorder::Event;
use crate::error::PatternError;

pub const MIN_TEMPO_BPM: u32 = 60;
pub const MAX_TEMPO_BPM: u32 = 200;
// used when there are too few gaps to measure
pub const DEFAULT_INTERVAL_SECS: f64 = 0.5;

/// An [`Event`] whose time has been snapped onto the rhythmic grid.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct QuantizedEvent {
    pub time: f64,
    pub frequency_hz: f32,
    pub energy: f32,
    pub velocity: f32,
    // None when the take was too short to derive a grid
    pub grid_index: Option<u32>,
}

impl QuantizedEvent {
    pub fn unsnapped(event: &Event) -> Self {
        Self {
            time: event.time,
            frequency_hz: event.frequency_hz,
            energy: event.energy,
            velocity: event.velocity,
            grid_index: None,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PatternType {
    Simple,
    Medium,
    Complex,
}

impl PatternType {
    pub fn from_count(count: usize) -> Self {
        if count > 12 {
            PatternType::Complex
        } else if count > 6 {
            PatternType::Medium
        } else {
            PatternType::Simple
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            PatternType::Simple => "Simple",
            PatternType::Medium => "Medium",
            PatternType::Complex => "Complex",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Complexity {
    Low,
    Medium,
    High,
}

impl Complexity {
    pub fn from_variation(cv: f64) -> Self {
        if cv > 0.3 {
            Complexity::High
        } else if cv > 0.15 {
            Complexity::Medium
        } else {
            Complexity::Low
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Complexity::Low => "Low",
            Complexity::Medium => "Medium",
            Complexity::High => "High",
        }
    }
}

// Rough genre feel by tempo
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TempoFeel {
    Ambient,
    Ballad,
    Pop,
    Electronic,
}

impl TempoFeel {
    pub fn from_bpm(bpm: u32) -> Self {
        if bpm > 120 {
            TempoFeel::Electronic
        } else if bpm > 80 {
            TempoFeel::Pop
        } else if bpm > 60 {
            TempoFeel::Ballad
        } else {
            TempoFeel::Ambient
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            TempoFeel::Ambient => "Ambient",
            TempoFeel::Ballad => "Slow/Ballad",
            TempoFeel::Pop => "Medium/Pop",
            TempoFeel::Electronic => "Fast/Electronic",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TimeSignature {
    FourFour,
    ThreeFour,
    Free,
}

impl TimeSignature {
    pub fn from_count(count: usize) -> Self {
        if count % 4 == 0 {
            TimeSignature::FourFour
        } else if count % 3 == 0 {
            TimeSignature::ThreeFour
        } else {
            TimeSignature::Free
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            TimeSignature::FourFour => "4/4",
            TimeSignature::ThreeFour => "3/4",
            TimeSignature::Free => "free",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PatternAnalysis {
    pub duration_secs: f64,
    pub event_count: usize,
    pub tempo_bpm: u32,
    pub pattern_type: PatternType,
    pub complexity: Complexity,
    pub average_frequency_hz: f32,
    pub average_energy: f32,
    pub feel: TempoFeel,
    pub time_signature: TimeSignature,
}

/// Grid spacing for a take: half the mean gap between consecutive hits.
pub fn grid_size(events: &[Event]) -> Result<f64, PatternError> {
    if events.len() < 2 {
        return Err(PatternError::InvalidQuantizationInput { count: events.len() });
    }
    let gaps = intervals(events.iter().map(|e| e.time));
    Ok(mean(&gaps) / 2.0)
}

/// Snaps every event to the nearest grid line. Takes shorter than two hits
/// (or with no spread in time) come back with their original times.
pub fn quantize(events: &[Event]) -> Vec<QuantizedEvent> {
    let grid = match grid_size(events) {
        Ok(g) if g > 0.0 => g,
        _ => return events.iter().map(QuantizedEvent::unsnapped).collect(),
    };

    events
        .iter()
        .map(|e| {
            let index = (e.time / grid).round().max(0.0);
            QuantizedEvent {
                time: index * grid,
                grid_index: Some(index as u32),
                ..QuantizedEvent::unsnapped(e)
            }
        })
        .collect()
}

pub fn analyze(events: &[QuantizedEvent]) -> PatternAnalysis {
    let count = events.len();
    let duration_secs = events.last().map(|e| e.time).unwrap_or(0.0);

    let gaps = intervals(events.iter().map(|e| e.time));
    let avg_interval = if gaps.len() < 2 { DEFAULT_INTERVAL_SECS } else { mean(&gaps) };
    let tempo_bpm = tempo_from_interval(avg_interval);

    let complexity = Complexity::from_variation(coefficient_of_variation(&gaps));

    let (average_frequency_hz, average_energy) = if count == 0 {
        (0.0, 0.0)
    } else {
        let n = count as f32;
        (
            events.iter().map(|e| e.frequency_hz).sum::<f32>() / n,
            events.iter().map(|e| e.energy).sum::<f32>() / n,
        )
    };

    PatternAnalysis {
        duration_secs,
        event_count: count,
        tempo_bpm,
        pattern_type: PatternType::from_count(count),
        complexity,
        average_frequency_hz,
        average_energy,
        feel: TempoFeel::from_bpm(tempo_bpm),
        time_signature: TimeSignature::from_count(count),
    }
}

fn tempo_from_interval(interval: f64) -> u32 {
    if interval <= 0.0 {
        return MAX_TEMPO_BPM;
    }
    let bpm = (60.0 / interval).round();
    bpm.clamp(MIN_TEMPO_BPM as f64, MAX_TEMPO_BPM as f64) as u32
}

fn intervals(times: impl Iterator<Item = f64>) -> Vec<f64> {
    let times: Vec<f64> = times.collect();
    times.windows(2).map(|w| w[1] - w[0]).collect()
}

fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

// population std-dev over mean; 0 when undefined
fn coefficient_of_variation(values: &[f64]) -> f64 {
    let m = mean(values);
    if values.is_empty() || m <= 0.0 {
        return 0.0;
    }
    let var = values.iter().map(|v| (v - m).powi(2)).sum::<f64>() / values.len() as f64;
    var.sqrt() / m
}

#[cfg(test)]
mod tests {
    use super::*;

    fn take(times: &[f64]) -> Vec<Event> {
        times.iter().map(|&t| Event::new(t, 220.0, 0.5)).collect()
    }

    fn evenly_spaced(count: usize, gap: f64) -> Vec<QuantizedEvent> {
        let times: Vec<f64> = (0..count).map(|i| i as f64 * gap).collect();
        quantize(&take(&times))
    }

    #[test]
    fn test_short_takes_pass_through() {
        assert!(quantize(&[]).is_empty());

        let one = take(&[0.37]);
        let q = quantize(&one);
        assert_eq!(q.len(), 1);
        assert_eq!(q[0].time, 0.37);
        assert_eq!(q[0].grid_index, None);
        assert_eq!(
            grid_size(&one),
            Err(PatternError::InvalidQuantizationInput { count: 1 })
        );
    }

    #[test]
    fn test_quantize_snaps_to_half_mean_interval() {
        let events = take(&[0.0, 0.3, 1.1, 1.5]);
        let grid = grid_size(&events).unwrap();
        assert!((grid - 0.25).abs() < 1e-9);

        let q = quantize(&events);
        assert_eq!(q.len(), events.len());
        let times: Vec<f64> = q.iter().map(|e| e.time).collect();
        for (got, want) in times.iter().zip([0.0, 0.25, 1.0, 1.5]) {
            assert!((got - want).abs() < 1e-9, "{got} != {want}");
        }
        assert_eq!(q[2].grid_index, Some(4));

        for e in &q {
            let steps = e.time / grid;
            assert!((steps - steps.round()).abs() < 1e-9);
        }
        assert!(times.windows(2).all(|w| w[0] <= w[1]));
        assert_eq!(q[1].velocity, events[1].velocity);
    }

    #[test]
    fn test_steady_half_second_is_120_bpm() {
        let a = analyze(&evenly_spaced(4, 0.5));
        assert_eq!(a.tempo_bpm, 120);
        assert!((a.duration_secs - 1.5).abs() < 1e-9);
        assert_eq!(a.pattern_type, PatternType::Simple);
        assert_eq!(a.complexity, Complexity::Low);
        assert_eq!(a.time_signature, TimeSignature::FourFour);
        assert_eq!(a.feel, TempoFeel::Pop);
    }

    #[test]
    fn test_tempo_clamps_to_range() {
        assert_eq!(analyze(&evenly_spaced(5, 0.1)).tempo_bpm, 200);
        assert_eq!(analyze(&evenly_spaced(5, 2.0)).tempo_bpm, 60);
    }

    #[test]
    fn test_too_few_gaps_use_default_interval() {
        let a = analyze(&evenly_spaced(2, 0.2));
        assert_eq!(a.tempo_bpm, 120);
    }

    #[test]
    fn test_pattern_type_by_count() {
        assert_eq!(analyze(&evenly_spaced(5, 0.5)).pattern_type, PatternType::Simple);
        assert_eq!(analyze(&evenly_spaced(7, 0.5)).pattern_type, PatternType::Medium);
        assert_eq!(analyze(&evenly_spaced(13, 0.5)).pattern_type, PatternType::Complex);
    }

    #[test]
    fn test_irregular_gaps_raise_complexity() {
        // gaps 0.25, 0.75, 0.25, 0.75: cv = 0.25 / 0.5 = 0.5
        let q = quantize(&take(&[0.0, 0.25, 1.0, 1.25, 2.0]));
        assert_eq!(analyze(&q).complexity, Complexity::High);

        assert_eq!(Complexity::from_variation(0.2), Complexity::Medium);
        assert_eq!(Complexity::from_variation(0.15), Complexity::Low);
    }

    #[test]
    fn test_averages_and_signature() {
        let events = vec![
            Event::new(0.0, 100.0, 0.2),
            Event::new(0.5, 300.0, 0.4),
            Event::new(1.0, 200.0, 0.6),
        ];
        let a = analyze(&quantize(&events));
        assert!((a.average_frequency_hz - 200.0).abs() < 1e-3);
        assert!((a.average_energy - 0.4).abs() < 1e-6);
        assert_eq!(a.time_signature, TimeSignature::ThreeFour);
        assert_eq!(TimeSignature::from_count(5), TimeSignature::Free);
    }

    #[test]
    fn test_feel_thresholds() {
        assert_eq!(TempoFeel::from_bpm(60), TempoFeel::Ambient);
        assert_eq!(TempoFeel::from_bpm(61), TempoFeel::Ballad);
        assert_eq!(TempoFeel::from_bpm(121), TempoFeel::Electronic);
    }
}
