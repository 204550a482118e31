use crate::error::BodyError;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;
use tracing::info;

/// On-disk body geometry: one coordinate list per point.
#[derive(Serialize, Deserialize, Debug)]
struct GeometryFile {
    points: Vec<Vec<f64>>,
}

/// Lagrangian markers of one immersed surface, created once from the input
/// geometry.
#[derive(Debug, Clone, PartialEq)]
pub struct BodyPoints<const D: usize> {
    coords: Vec<[f64; D]>,
}

impl<const D: usize> BodyPoints<D> {
    pub fn new(coords: Vec<[f64; D]>) -> Result<Self, BodyError> {
        for (l, p) in coords.iter().enumerate() {
            if p.iter().any(|x| !x.is_finite()) {
                return Err(BodyError::InvalidPoint(format!(
                    "Point {} has a non-finite coordinate: {:?}",
                    l, p
                )));
            }
        }
        Ok(Self { coords })
    }

    /// Reads a JSON geometry file (`{"points": [[x, y(, z)], ...]}`).
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, BodyError> {
        let path = path.as_ref();
        let file = File::open(path)?;
        let geometry: GeometryFile = serde_json::from_reader(BufReader::new(file))
            .map_err(|e| BodyError::Format(e.to_string()))?;
        let mut coords = Vec::with_capacity(geometry.points.len());
        for (l, p) in geometry.points.iter().enumerate() {
            if p.len() != D {
                return Err(BodyError::Format(format!(
                    "Point {} has {} coordinates, expected {}",
                    l,
                    p.len(),
                    D
                )));
            }
            coords.push(std::array::from_fn(|a| p[a]));
        }
        info!(
            "Loaded {} body points from {}",
            coords.len(),
            path.display()
        );
        Self::new(coords)
    }

    pub fn to_json_file(&self, path: impl AsRef<Path>) -> Result<(), BodyError> {
        let file = File::create(path.as_ref())?;
        let geometry = GeometryFile {
            points: self.coords.iter().map(|p| p.to_vec()).collect(),
        };
        serde_json::to_writer_pretty(BufWriter::new(file), &geometry)
            .map_err(|e| BodyError::Format(e.to_string()))?;
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.coords.len()
    }

    pub fn is_empty(&self) -> bool {
        self.coords.is_empty()
    }

    pub fn position(&self, l: usize) -> [f64; D] {
        self.coords[l]
    }

    pub fn iter(&self) -> impl Iterator<Item = &[f64; D]> {
        self.coords.iter()
    }
}

impl BodyPoints<2> {
    /// Points evenly spaced on a circle, a common 2D body.
    pub fn circle(center: [f64; 2], radius: f64, n: usize) -> Result<Self, BodyError> {
        let coords = (0..n)
            .map(|l| {
                let theta = 2.0 * std::f64::consts::PI * l as f64 / n as f64;
                [
                    center[0] + radius * theta.cos(),
                    center[1] + radius * theta.sin(),
                ]
            })
            .collect();
        Self::new(coords)
    }
}
