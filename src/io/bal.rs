//! Bundle Adjustment in the Large (BAL) dataset loader.
//!
//! ## Format
//!
//! BAL files are plain text, one record after another:
//! 1. **Header**: `<num_cameras> <num_points> <num_observations>`
//! 2. **Observations**: one per line, `<camera_idx> <point_idx> <x> <y>`
//! 3. **Cameras**: 9 values per camera, one per line
//! 4. **Points**: 3 values per point, one per line
//!
//! A camera is Snavely's 9-parameter model: axis-angle rotation, translation,
//! focal length and two radial distortion coefficients. The camera looks down
//! its negative z axis.
//!
//! For more details, see: <https://grail.cs.washington.edu/projects/bal/>
//!
//! ## Example
//!
//! ```no_run
//! use lmgraph::io::BalLoader;
//!
//! let dataset = BalLoader::load("data/problem-16-22106-pre.txt")?;
//! let problem = dataset.build_problem()?;
//! println!("{} factors over {} variables", problem.graph.len(), problem.values.len());
//! # Ok::<(), lmgraph::LmGraphError>(())
//! ```

use super::{IoError, IoResult};
use crate::core::key::{c, k, p};
use crate::core::{CoreResult, FactorGraph, Key, NoiseModel, Ordering, Values};
use crate::factors::{PriorFactor, ProjectionFactor};
use crate::manifold::{Point3, SE3};
use nalgebra::{Vector2, Vector3};
use std::fs::File;
use std::path::Path;
use std::str::FromStr;
use std::sync::Arc;
use tracing::info;

/// Prior standard deviations on `[f, k1, k2]`.
const CALIBRATION_SIGMAS: [f64; 3] = [1e3, 1.0, 1.0];

/// Snavely's 9-parameter camera.
#[derive(Debug, Clone, PartialEq)]
pub struct BalCamera {
    /// Rotation as axis-angle (rx, ry, rz)
    pub rotation: Vector3<f64>,
    pub translation: Vector3<f64>,
    pub focal_length: f64,
    pub k1: f64,
    pub k2: f64,
}

impl BalCamera {
    /// World-to-camera pose.
    pub fn pose(&self) -> SE3 {
        SE3::from_axis_angle_translation(self.rotation, self.translation)
    }

    /// Calibration `[f, k1, k2]`.
    pub fn calibration(&self) -> Point3 {
        Point3::from_xyz(self.focal_length, self.k1, self.k2)
    }
}

/// A structure point.
#[derive(Debug, Clone, PartialEq)]
pub struct BalPoint {
    pub position: Vector3<f64>,
}

/// Image measurement of one point by one camera.
#[derive(Debug, Clone, PartialEq)]
pub struct BalObservation {
    pub camera_index: usize,
    pub point_index: usize,
    /// Pixel x-coordinate
    pub x: f64,
    /// Pixel y-coordinate
    pub y: f64,
}

/// Contents of a BAL file.
#[derive(Debug, Clone, PartialEq)]
pub struct BalDataset {
    pub cameras: Vec<BalCamera>,
    pub points: Vec<BalPoint>,
    pub observations: Vec<BalObservation>,
}

/// A bundle adjustment problem ready for the optimizer.
#[derive(Debug, Clone)]
pub struct BalProblem {
    pub graph: FactorGraph,
    pub values: Values,
    /// Points first, then cameras and calibrations
    pub ordering: Ordering,
}

impl BalDataset {
    /// Factor graph, initial values and elimination order of the dataset.
    ///
    /// Camera `i` becomes `c(i)` (`SE3`) and `k(i)` (calibration), point `j`
    /// becomes `p(j)`. Every observation adds a [`ProjectionFactor`] with
    /// unit noise and every camera a weak prior on its calibration.
    pub fn build_problem(&self) -> CoreResult<BalProblem> {
        let mut values = Values::new();
        let mut graph = FactorGraph::new();

        let calibration_noise = Arc::new(NoiseModel::diagonal(&CALIBRATION_SIGMAS)?);
        for (i, camera) in self.cameras.iter().enumerate() {
            let i = i as u64;
            values.insert(c(i), camera.pose())?;
            values.insert(k(i), camera.calibration())?;
            graph.add(PriorFactor::new(
                k(i),
                camera.calibration(),
                Arc::clone(&calibration_noise),
            ));
        }
        for (j, point) in self.points.iter().enumerate() {
            values.insert(p(j as u64), Point3::new(point.position))?;
        }

        let unit = Arc::new(NoiseModel::unit(2));
        for observation in &self.observations {
            let camera = observation.camera_index as u64;
            graph.add(ProjectionFactor::new(
                c(camera),
                k(camera),
                p(observation.point_index as u64),
                Vector2::new(observation.x, observation.y),
                Arc::clone(&unit),
            ));
        }

        let points: Vec<Key> = (0..self.points.len() as u64).map(p).collect();
        let ordering = Ordering::constrained_first(&graph, &points);
        ordering.validate(&graph, &values)?;

        info!(
            "BAL problem: {} cameras, {} points, {} factors",
            self.cameras.len(),
            self.points.len(),
            graph.len()
        );
        Ok(BalProblem {
            graph,
            values,
            ordering,
        })
    }
}

/// Loader for BAL files.
pub struct BalLoader;

impl BalLoader {
    /// Load a BAL dataset from a file.
    ///
    /// Fails with a line-numbered [`IoError`] on malformed input, on
    /// truncated blocks and on observations referring to cameras or points
    /// the header does not declare.
    pub fn load(path: impl AsRef<Path>) -> IoResult<BalDataset> {
        let file = File::open(path.as_ref()).map_err(|e| {
            IoError::Io(e).log_with_source(format!("Failed to open BAL file: {:?}", path.as_ref()))
        })?;

        // SAFETY: the map is read-only and dropped before this function returns.
        let mmap = unsafe {
            memmap2::Mmap::map(&file).map_err(|e| {
                IoError::Io(e).log_with_source("Failed to memory-map BAL file")
            })?
        };

        let content = std::str::from_utf8(&mmap).map_err(|_| IoError::Parse {
            line: 0,
            message: "File is not valid UTF-8".to_string(),
        })?;
        Self::parse(content)
    }

    /// Parse BAL text that is already in memory.
    pub fn parse(content: &str) -> IoResult<BalDataset> {
        let mut lines = content
            .lines()
            .enumerate()
            .map(|(idx, line)| (idx + 1, line.trim()))
            .filter(|(_, line)| !line.is_empty());

        let (header_line, header) = lines.next().ok_or(IoError::Parse {
            line: 1,
            message: "Missing header line".to_string(),
        })?;
        let [num_cameras, num_points, num_observations] = fields::<usize, 3>(header_line, header)?;

        // Header counts are untrusted; every entry needs at least one line
        let line_count = content.lines().count();
        let capacity = |count: usize| count.min(line_count);

        let mut observations = Vec::with_capacity(capacity(num_observations));
        for index in 0..num_observations {
            let (line_num, line) = next_line(&mut lines, || format!("observation {index}"))?;
            let parts: Vec<&str> = line.split_whitespace().collect();
            if parts.len() != 4 {
                return Err(IoError::MissingFields { line: line_num });
            }
            let camera_index: usize = number(line_num, parts[0])?;
            let point_index: usize = number(line_num, parts[1])?;
            if camera_index >= num_cameras || point_index >= num_points {
                return Err(IoError::Parse {
                    line: line_num,
                    message: format!(
                        "Observation refers to camera {camera_index} / point {point_index} outside the header counts"
                    ),
                });
            }
            observations.push(BalObservation {
                camera_index,
                point_index,
                x: number(line_num, parts[2])?,
                y: number(line_num, parts[3])?,
            });
        }

        let mut cameras = Vec::with_capacity(capacity(num_cameras));
        for index in 0..num_cameras {
            let v = values::<9>(&mut lines, || format!("camera {index}"))?;
            cameras.push(BalCamera {
                rotation: Vector3::new(v[0], v[1], v[2]),
                translation: Vector3::new(v[3], v[4], v[5]),
                focal_length: v[6],
                k1: v[7],
                k2: v[8],
            });
        }

        let mut points = Vec::with_capacity(capacity(num_points));
        for index in 0..num_points {
            let v = values::<3>(&mut lines, || format!("point {index}"))?;
            points.push(BalPoint {
                position: Vector3::new(v[0], v[1], v[2]),
            });
        }

        if let Some((line_num, _)) = lines.next() {
            return Err(IoError::Parse {
                line: line_num,
                message: "Trailing data after the last point".to_string(),
            });
        }

        Ok(BalDataset {
            cameras,
            points,
            observations,
        })
    }
}

fn number<T: FromStr>(line: usize, value: &str) -> IoResult<T> {
    value.parse::<T>().map_err(|_| IoError::InvalidNumber {
        line,
        value: value.to_string(),
    })
}

fn fields<T: FromStr + Copy + Default, const N: usize>(line: usize, text: &str) -> IoResult<[T; N]> {
    let parts: Vec<&str> = text.split_whitespace().collect();
    if parts.len() != N {
        return Err(IoError::MissingFields { line });
    }
    let mut out = [T::default(); N];
    for (slot, part) in out.iter_mut().zip(parts) {
        *slot = number(line, part)?;
    }
    Ok(out)
}

fn next_line<'a>(
    lines: &mut impl Iterator<Item = (usize, &'a str)>,
    what: impl FnOnce() -> String,
) -> IoResult<(usize, &'a str)> {
    lines.next().ok_or_else(|| IoError::Parse {
        line: 0,
        message: format!("Unexpected end of file in {}", what()),
    })
}

/// `N` single-value lines.
fn values<'a, const N: usize>(
    lines: &mut impl Iterator<Item = (usize, &'a str)>,
    what: impl Fn() -> String,
) -> IoResult<[f64; N]> {
    let mut out = [0.0; N];
    for slot in out.iter_mut() {
        let (line_num, line) = next_line(lines, &what)?;
        *slot = number(line_num, line)?;
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const SMALL: &str = "2 2 3
0 0 -1.0 2.0
1 0 0.5 0.5
1 1 3.0 -4.0
0.0
0.0
0.0
0.0
0.0
-5.0
500.0
0.0
0.0
0.1
0.0
0.0
1.0
0.0
-5.0
400.0
0.01
0.001
0.0
0.0
0.0
1.0
1.0
0.0
";

    #[test]
    fn test_parse_small_dataset() -> Result<(), Box<dyn std::error::Error>> {
        let dataset = BalLoader::parse(SMALL)?;
        assert_eq!(dataset.cameras.len(), 2);
        assert_eq!(dataset.points.len(), 2);
        assert_eq!(dataset.observations.len(), 3);
        assert_eq!(dataset.observations[2].point_index, 1);
        assert_eq!(dataset.cameras[1].focal_length, 400.0);
        assert_eq!(dataset.cameras[1].k2, 0.001);
        assert_eq!(dataset.points[1].position, Vector3::new(1.0, 1.0, 0.0));
        Ok(())
    }

    #[test]
    fn test_load_from_file() -> Result<(), Box<dyn std::error::Error>> {
        let mut file = tempfile::NamedTempFile::new()?;
        file.write_all(SMALL.as_bytes())?;
        let dataset = BalLoader::load(file.path())?;
        assert_eq!(dataset, BalLoader::parse(SMALL)?);
        Ok(())
    }

    #[test]
    fn test_missing_file() {
        let result = BalLoader::load("/nonexistent/problem.txt");
        assert!(matches!(result, Err(IoError::Io(_))));
    }

    #[test]
    fn test_parse_errors_carry_line_numbers() {
        assert!(matches!(
            BalLoader::parse("1 1"),
            Err(IoError::MissingFields { line: 1 })
        ));
        assert!(matches!(
            BalLoader::parse("1 1 1\n0 0 x 1.0\n"),
            Err(IoError::InvalidNumber { line: 2, .. })
        ));
        assert!(matches!(
            BalLoader::parse("1 1 1\n0 3 1.0 1.0\n"),
            Err(IoError::Parse { line: 2, .. })
        ));
        assert!(matches!(
            BalLoader::parse("1 1 1\n0 0 1.0 1.0\n0.0\n"),
            Err(IoError::Parse { .. })
        ));
    }

    #[test]
    fn test_header_counts_larger_than_input() {
        for header in ["1 1 18446744073709551615", "18446744073709551615 1 1", "2 2 4"] {
            let content = format!("{header}\n0 0 1.0 1.0\n");
            assert!(matches!(
                BalLoader::parse(&content),
                Err(IoError::Parse { .. })
            ));
        }
    }

    #[test]
    fn test_build_problem() -> Result<(), Box<dyn std::error::Error>> {
        let problem = BalLoader::parse(SMALL)?.build_problem()?;
        // 3 projections plus one calibration prior per camera
        assert_eq!(problem.graph.len(), 5);
        assert_eq!(problem.values.len(), 6);
        assert_eq!(problem.ordering.len(), 6);
        assert_eq!(problem.ordering[0].symbol(), 'p');
        assert_eq!(problem.ordering[1].symbol(), 'p');

        let error = problem.graph.error(&problem.values)?;
        assert!(error.is_finite());
        Ok(())
    }
}
