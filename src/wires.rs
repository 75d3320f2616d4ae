//! Ideal wire geometry
//!
//! Synthesizes the "oneside wires" table of the PCB strip readout: 320mm x 320mm
//! active area with 64 strips per plane at a constant pitch.
//! Both induction planes share the same strip positions, the collection plane
//! is rotated by 90 degrees.
//!
//! Columns: `channel plane wire sx sy sz ex ey ez`
//!
//! The geometry is idealized, it is not a model of the real detector.

use crate::Config;
use std::{
    fmt,
    fs::File,
    io::{BufWriter, Write},
    path::{Path, PathBuf},
};
use strum::IntoEnumIterator;
use strum_macros::EnumIter;

/// Number of strips per plane
pub const WIRES_PER_PLANE: u32 = 64;
/// X coordinate magnitude of the strips [cm] (placeholder)
const PLANE_X: f64 = 0.1;

#[derive(Debug, thiserror::Error)]
pub enum WiresError {
    #[error("failed to write the wires file {1:?}")]
    Io(#[source] std::io::Error, PathBuf),
}
type Result<T> = std::result::Result<T, WiresError>;

/// Detector readout planes
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter)]
pub enum Plane {
    Induction0,
    Induction1,
    Collection,
}
impl Plane {
    /// First channel number of the plane
    pub fn first_channel(&self) -> u32 {
        match self {
            Plane::Induction0 => 65,
            Plane::Induction1 => 1065,
            Plane::Collection => 1,
        }
    }
    /// Strip endpoints for a wire offset `offset` and a half extent `half` [cm]
    fn endpoints(&self, offset: f64, half: f64) -> ([f64; 3], [f64; 3]) {
        match self {
            // strips along Z, stacked along Y
            Plane::Induction0 | Plane::Induction1 => {
                ([PLANE_X, offset, -half], [PLANE_X, offset, half])
            }
            // strips along Y, stacked along Z
            Plane::Collection => ([-PLANE_X, -half, offset], [-PLANE_X, half, offset]),
        }
    }
}
impl From<Plane> for u32 {
    fn from(plane: Plane) -> Self {
        match plane {
            Plane::Induction0 => 0,
            Plane::Induction1 => 1,
            Plane::Collection => 2,
        }
    }
}

/// A single strip
#[derive(Debug, Clone, PartialEq)]
pub struct WireRecord {
    pub channel: u32,
    pub plane: Plane,
    pub wire: u32,
    /// start point [cm]
    pub start: [f64; 3],
    /// end point [cm]
    pub end: [f64; 3],
}
impl fmt::Display for WireRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let [sx, sy, sz] = self.start;
        let [ex, ey, ez] = self.end;
        write!(
            f,
            "{:3} {:1} {:3} {:8.2} {:8.2} {:8.2} {:8.2} {:8.2} {:8.2}",
            self.channel,
            u32::from(self.plane),
            self.wire,
            sx,
            sy,
            sz,
            ex,
            ey,
            ez
        )
    }
}

/// Returns the strips of all the planes, plane by plane
pub fn synthesize(config: &Config) -> Vec<WireRecord> {
    let pitch = config.pitch;
    let half = WIRES_PER_PLANE as f64 * 0.5 * pitch;
    Plane::iter()
        .flat_map(|plane| {
            (0..WIRES_PER_PLANE).map(move |wire| {
                let offset = -half + (0.5 + wire as f64) * pitch;
                let (start, end) = plane.endpoints(offset, half);
                WireRecord {
                    channel: plane.first_channel() + wire,
                    plane,
                    wire,
                    start,
                    end,
                }
            })
        })
        .collect()
}

/// Writes the wires table to `path`, overwriting any existing file
pub fn write_wires<P: AsRef<Path>>(path: P, config: &Config) -> Result<usize> {
    let path = path.as_ref();
    log::warn!("using ideal wire spacing");
    let wires = synthesize(config);
    let io_err = |e| WiresError::Io(e, path.to_path_buf());
    let mut file = BufWriter::new(File::create(path).map_err(io_err)?);
    for wire in &wires {
        writeln!(file, "{}", wire).map_err(io_err)?;
    }
    file.flush().map_err(io_err)?;
    log::info!("{} wires written to {:?}", wires.len(), path);
    Ok(wires.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    fn columns(line: &str) -> Vec<f64> {
        line.split_whitespace()
            .map(|x| x.parse::<f64>().unwrap())
            .collect()
    }

    #[test]
    fn wire_count() {
        let wires = synthesize(&Config::default());
        assert_eq!(wires.len(), 192);
        for plane in Plane::iter() {
            assert_eq!(wires.iter().filter(|w| w.plane == plane).count(), 64);
        }
        assert!(wires.iter().all(|w| w.wire < WIRES_PER_PLANE));
    }

    #[test]
    fn disjoint_channels() {
        let wires = synthesize(&Config::default());
        let channels: Vec<HashSet<u32>> = Plane::iter()
            .map(|plane| {
                wires
                    .iter()
                    .filter(|w| w.plane == plane)
                    .map(|w| w.channel)
                    .collect()
            })
            .collect();
        assert_eq!(channels[0], (65..=128).collect::<HashSet<u32>>());
        assert_eq!(channels[1], (1065..=1128).collect::<HashSet<u32>>());
        assert_eq!(channels[2], (1..=64).collect::<HashSet<u32>>());
        let all: HashSet<u32> = channels.iter().flatten().cloned().collect();
        assert_eq!(all.len(), 192);
    }

    #[test]
    fn line_layout() {
        let wires = synthesize(&Config::default());
        assert_eq!(
            wires[0].to_string(),
            " 65 0   0     0.10    -6.30    -6.40     0.10    -6.30     6.40"
        );
        assert_eq!(
            wires[191].to_string(),
            " 64 2  63    -0.10    -6.40     6.30    -0.10     6.40     6.30"
        );
        assert_eq!(
            wires[64].to_string(),
            "1065 1   0     0.10    -6.30    -6.40     0.10    -6.30     6.40"
        );
    }

    #[test]
    fn swept_along_wire_axis_only() {
        let wires = synthesize(&Config::default());
        for w in &wires {
            let axis = match w.plane {
                Plane::Induction0 | Plane::Induction1 => 2,
                Plane::Collection => 1,
            };
            for i in 0..3 {
                if i == axis {
                    assert!((w.end[i] - w.start[i] - 12.8).abs() < 1e-9);
                } else {
                    assert_eq!(w.start[i], w.end[i]);
                }
            }
        }
    }

    #[test]
    fn wires_file() {
        let path = std::env::temp_dir().join(format!("pcbro-wires-{}.txt", std::process::id()));
        let config = Config::default();
        assert_eq!(write_wires(&path, &config).unwrap(), 192);
        let text = std::fs::read_to_string(&path).unwrap();
        std::fs::remove_file(&path).unwrap();
        assert!(text.is_ascii());
        assert!(text.ends_with('\n'));
        let rows: Vec<Vec<f64>> = text.lines().map(columns).collect();
        assert_eq!(rows.len(), 192);
        assert!(rows.iter().all(|row| row.len() == 9));
        let collection: Vec<&Vec<f64>> = rows.iter().filter(|row| row[1] == 2.).collect();
        assert_eq!(collection.len(), 64);
        for pair in collection.windows(2) {
            assert!((pair[1][5] - pair[0][5] - config.pitch).abs() < 1e-9);
            assert!((pair[1][8] - pair[0][8] - config.pitch).abs() < 1e-9);
        }
    }
}
