use thiserror::Error;

use crate::pipeline::project::TrackId;

/// Failures a user action can end in. None of them are retried.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum RhythmError {
    #[error("microphone unavailable: {0}")]
    SourceUnavailable(String),

    #[error("microphone permission denied")]
    PermissionDenied,

    #[error("no sound detected")]
    EmptyRecording,

    #[error("a recording is already in progress")]
    AlreadyRecording,

    #[error("no track with id {0}")]
    UnknownTrack(TrackId),
}

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum PatternError {
    #[error("quantization needs at least 2 events, got {count}")]
    InvalidQuantizationInput { count: usize },
}

/// A stored project that breaks the track invariants.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum ProjectFileError {
    #[error("track id {0} is used more than once")]
    DuplicateTrackId(TrackId),

    #[error("track {0} has no beats")]
    EmptyTrack(TrackId),
}
