//! Waveform frames
//!
//! A frame is a 2D array of samples, time ticks along the rows and channels
//! along the columns, stored in an archive under the key `frame_<tag>_<trigger>`.

use nalgebra::DMatrix;
use std::{fmt, path::PathBuf};

mod npz;
pub use npz::{ArrayInfo, NpzStore};

/// Prefix of the archive keys holding waveform frames
pub const FRAME_PREFIX: &str = "frame_";

#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    #[error("frame {0:?} not found in the archive")]
    MissingKey(String),
    #[error("failed to access the archive {1:?}")]
    Io(#[source] std::io::Error, PathBuf),
    #[error("malformed archive {path:?}: {reason}")]
    Malformed { path: PathBuf, reason: String },
}
pub type Result<T> = std::result::Result<T, FrameError>;

/// Archive key of the frame with the given tag and trigger number
pub fn frame_key(tag: &str, trigger: u32) -> String {
    format!("{FRAME_PREFIX}{tag}_{trigger}")
}
/// Checks if the archive key refers to a waveform frame
pub fn is_frame_key(key: &str) -> bool {
    key.starts_with(FRAME_PREFIX)
}

/// Element type of the archived samples
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SampleType {
    F32,
    #[default]
    F64,
    I8,
    I16,
    I32,
    I64,
    U8,
    U16,
    U32,
    U64,
}
impl SampleType {
    /// Parses the type part of a numpy type string, e.g. `f4` in `<f4`
    pub fn from_descr(descr: &str) -> Option<Self> {
        use SampleType::*;
        let code = descr.trim_start_matches(['<', '>', '|', '=']);
        Some(match code {
            "f4" => F32,
            "f8" => F64,
            "i1" => I8,
            "i2" => I16,
            "i4" => I32,
            "i8" => I64,
            "u1" => U8,
            "u2" => U16,
            "u4" => U32,
            "u8" => U64,
            _ => return None,
        })
    }
}
impl fmt::Display for SampleType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        use SampleType::*;
        let name = match self {
            F32 => "float32",
            F64 => "float64",
            I8 => "int8",
            I16 => "int16",
            I32 => "int32",
            I64 => "int64",
            U8 => "uint8",
            U16 => "uint16",
            U32 => "uint32",
            U64 => "uint64",
        };
        write!(f, "{name}")
    }
}

/// Row-major samples of the 64-bit integer frames
///
/// `f64` holds integers exactly only up to 2^53.
#[derive(Debug, Clone, PartialEq)]
enum Integers {
    I64(Vec<i64>),
    U64(Vec<u64>),
}
impl Integers {
    fn sample_type(&self) -> SampleType {
        match self {
            Integers::I64(_) => SampleType::I64,
            Integers::U64(_) => SampleType::U64,
        }
    }
}

/// A waveform frame
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    samples: DMatrix<f64>,
    sample_type: SampleType,
    integers: Option<Integers>,
}
impl Frame {
    pub fn new(samples: DMatrix<f64>) -> Self {
        Self {
            samples,
            sample_type: SampleType::default(),
            integers: None,
        }
    }
    /// Creates a frame from row-major samples
    pub fn from_row_slice(rows: usize, cols: usize, samples: &[f64]) -> Self {
        Self::new(DMatrix::from_row_slice(rows, cols, samples))
    }
    /// Creates a `int64` frame from row-major samples, the samples are kept exactly
    pub fn from_i64(rows: usize, cols: usize, samples: Vec<i64>) -> Self {
        let view: Vec<f64> = samples.iter().map(|&x| x as f64).collect();
        Self {
            samples: DMatrix::from_row_slice(rows, cols, &view),
            sample_type: SampleType::I64,
            integers: Some(Integers::I64(samples)),
        }
    }
    /// Creates a `uint64` frame from row-major samples, the samples are kept exactly
    pub fn from_u64(rows: usize, cols: usize, samples: Vec<u64>) -> Self {
        let view: Vec<f64> = samples.iter().map(|&x| x as f64).collect();
        Self {
            samples: DMatrix::from_row_slice(rows, cols, &view),
            sample_type: SampleType::U64,
            integers: Some(Integers::U64(samples)),
        }
    }
    pub fn sample_type(self, sample_type: SampleType) -> Self {
        let integers = self
            .integers
            .filter(|integers| integers.sample_type() == sample_type);
        Self {
            samples: self.samples,
            sample_type,
            integers,
        }
    }
    /// Exact row-major samples of a frame created with [Frame::from_i64]
    pub fn i64_samples(&self) -> Option<&[i64]> {
        match &self.integers {
            Some(Integers::I64(samples)) => Some(samples.as_slice()),
            _ => None,
        }
    }
    /// Exact row-major samples of a frame created with [Frame::from_u64]
    pub fn u64_samples(&self) -> Option<&[u64]> {
        match &self.integers {
            Some(Integers::U64(samples)) => Some(samples.as_slice()),
            _ => None,
        }
    }
    pub fn samples(&self) -> &DMatrix<f64> {
        &self.samples
    }
    pub fn element_type(&self) -> SampleType {
        self.sample_type
    }
    /// Number of time ticks
    pub fn rows(&self) -> usize {
        self.samples.nrows()
    }
    /// Number of channels
    pub fn cols(&self) -> usize {
        self.samples.ncols()
    }
    /// Iterator over the samples in row-major order
    pub fn row_major_iter(&self) -> impl Iterator<Item = f64> + '_ {
        let (rows, cols) = self.samples.shape();
        (0..rows).flat_map(move |i| (0..cols).map(move |j| self.samples[(i, j)]))
    }
    /// Returns the (min,max) of the samples
    pub fn minmax(&self) -> Option<(f64, f64)> {
        if self.samples.is_empty() {
            None
        } else {
            let min_value = self.samples.iter().cloned().fold(f64::INFINITY, f64::min);
            let max_value = self.samples.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
            Some((min_value, max_value))
        }
    }
}

/// Keyed collection of waveform frames
pub trait FrameStore {
    /// Archive keys, in archive order
    fn keys(&self) -> Vec<String>;
    /// Returns the frame stored under `key`
    fn fetch(&mut self, key: &str) -> Result<Frame>;
    /// Replaces the content of the store with `frames`
    fn store(&mut self, frames: &[(String, Frame)]) -> Result<()>;
    /// Archive keys of the waveform frames, in archive order
    fn frame_keys(&self) -> Vec<String> {
        self.keys().into_iter().filter(|k| is_frame_key(k)).collect()
    }
}

/// In-memory frame store
#[derive(Debug, Default, Clone)]
pub struct MemoryStore {
    frames: Vec<(String, Frame)>,
}
impl MemoryStore {
    pub fn new() -> Self {
        Default::default()
    }
    /// Adds a frame, replacing any frame with the same key
    pub fn insert(&mut self, key: impl Into<String>, frame: Frame) -> &mut Self {
        let key = key.into();
        match self.frames.iter_mut().find(|(k, _)| *k == key) {
            Some((_, f)) => *f = frame,
            None => self.frames.push((key, frame)),
        }
        self
    }
    pub fn len(&self) -> usize {
        self.frames.len()
    }
    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }
    pub fn get(&self, key: &str) -> Option<&Frame> {
        self.frames.iter().find(|(k, _)| k == key).map(|(_, f)| f)
    }
}
impl FrameStore for MemoryStore {
    fn keys(&self) -> Vec<String> {
        self.frames.iter().map(|(k, _)| k.clone()).collect()
    }
    fn fetch(&mut self, key: &str) -> Result<Frame> {
        self.get(key)
            .cloned()
            .ok_or_else(|| FrameError::MissingKey(key.to_string()))
    }
    fn store(&mut self, frames: &[(String, Frame)]) -> Result<()> {
        self.frames = frames.to_vec();
        Ok(())
    }
}
