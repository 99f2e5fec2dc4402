//! Point features: the 2D observations compared against projected structure.
//!
//! Features are stored one per line in whitespace separated text files
//! (`x y` for [`PointFeature`], `x y scale orientation` for
//! [`SioPointFeature`]), with no header and no count prefix.

use log::info;
use nalgebra::{Matrix2xX, Vector2};
use std::fmt;
use std::fs::File;
use std::io::{self, BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::str::FromStr;

#[derive(thiserror::Error, Debug, PartialEq)]
pub enum ParseFeatureError {
    #[error("expected {expected} fields, found {found}")]
    FieldCount { expected: usize, found: usize },
    #[error("invalid number '{0}'")]
    InvalidNumber(String),
}

#[derive(thiserror::Error, Debug)]
pub enum FeatureError {
    #[error("Can't open features file {path:?}: {source}")]
    Open { path: PathBuf, source: io::Error },
    #[error("Can't read features file {path:?}: {source}")]
    Read { path: PathBuf, source: io::Error },
    #[error("Features file {path:?} is incorrect at line {line}: {source}")]
    Parse {
        path: PathBuf,
        line: usize,
        source: ParseFeatureError,
    },
    #[error("Can't write features file {path:?}: {source}")]
    Write { path: PathBuf, source: io::Error },
}

/// Anything with an image position.
pub trait FeaturePoint {
    fn coords(&self) -> Vector2<f32>;
}

fn parse_fields<const N: usize>(line: &str) -> Result<[f32; N], ParseFeatureError> {
    let tokens: Vec<&str> = line.split_whitespace().collect();
    if tokens.len() != N {
        return Err(ParseFeatureError::FieldCount {
            expected: N,
            found: tokens.len(),
        });
    }
    let mut values = [0.0; N];
    for (value, token) in values.iter_mut().zip(tokens) {
        *value = token
            .parse::<f32>()
            .ok()
            .filter(|v| v.is_finite())
            .ok_or_else(|| ParseFeatureError::InvalidNumber(token.to_string()))?;
    }
    Ok(values)
}

/// Position of a feature point.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct PointFeature {
    coords: Vector2<f32>,
}

impl PointFeature {
    pub fn new(x: f32, y: f32) -> Self {
        PointFeature {
            coords: Vector2::new(x, y),
        }
    }

    pub fn x(&self) -> f32 {
        self.coords.x
    }

    pub fn y(&self) -> f32 {
        self.coords.y
    }

    pub fn coords(&self) -> &Vector2<f32> {
        &self.coords
    }

    pub fn x_mut(&mut self) -> &mut f32 {
        &mut self.coords.x
    }

    pub fn y_mut(&mut self) -> &mut f32 {
        &mut self.coords.y
    }

    pub fn coords_mut(&mut self) -> &mut Vector2<f32> {
        &mut self.coords
    }
}

impl FeaturePoint for PointFeature {
    fn coords(&self) -> Vector2<f32> {
        self.coords
    }
}

impl fmt::Display for PointFeature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.coords.x, self.coords.y)
    }
}

impl FromStr for PointFeature {
    type Err = ParseFeatureError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let [x, y] = parse_fields::<2>(s)?;
        Ok(PointFeature::new(x, y))
    }
}

/// Scale invariant, oriented point feature.
///
/// `scale` is a radius in pixels (0 when unset), `orientation` is in radians
/// and is not reduced modulo 2π. Equality is exact on all four fields.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct SioPointFeature {
    point: PointFeature,
    scale: f32,
    orientation: f32,
}

impl SioPointFeature {
    pub fn new(x: f32, y: f32, scale: f32, orientation: f32) -> Self {
        SioPointFeature {
            point: PointFeature::new(x, y),
            scale,
            orientation,
        }
    }

    pub fn x(&self) -> f32 {
        self.point.x()
    }

    pub fn y(&self) -> f32 {
        self.point.y()
    }

    pub fn point(&self) -> &PointFeature {
        &self.point
    }

    pub fn point_mut(&mut self) -> &mut PointFeature {
        &mut self.point
    }

    pub fn scale(&self) -> f32 {
        self.scale
    }

    pub fn scale_mut(&mut self) -> &mut f32 {
        &mut self.scale
    }

    pub fn orientation(&self) -> f32 {
        self.orientation
    }

    pub fn orientation_mut(&mut self) -> &mut f32 {
        &mut self.orientation
    }

    /// Unit vector pointing along the orientation.
    pub fn orientation_vector(&self) -> Vector2<f32> {
        Vector2::new(self.orientation.cos(), self.orientation.sin())
    }

    /// Orientation vector scaled to the feature scale.
    pub fn scaled_orientation_vector(&self) -> Vector2<f32> {
        self.orientation_vector() * self.scale
    }
}

impl FeaturePoint for SioPointFeature {
    fn coords(&self) -> Vector2<f32> {
        *self.point.coords()
    }
}

impl fmt::Display for SioPointFeature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {}", self.point, self.scale, self.orientation)
    }
}

impl FromStr for SioPointFeature {
    type Err = ParseFeatureError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let [x, y, scale, orientation] = parse_fields::<4>(s)?;
        Ok(SioPointFeature::new(x, y, scale, orientation))
    }
}

/// Reads features from a text file, one per line. Blank lines are skipped.
///
/// # Errors
///
/// * [`FeatureError::Open`] if the file cannot be opened
/// * [`FeatureError::Parse`] for the first line that does not hold exactly the
///   expected numbers
pub fn load_feats_from_file<F>(path: impl AsRef<Path>) -> Result<Vec<F>, FeatureError>
where
    F: FromStr<Err = ParseFeatureError>,
{
    let path = path.as_ref();
    let file = File::open(path).map_err(|source| FeatureError::Open {
        path: path.to_path_buf(),
        source,
    })?;

    let mut feats = Vec::new();
    for (index, line) in BufReader::new(file).lines().enumerate() {
        let line = line.map_err(|source| FeatureError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        if line.trim().is_empty() {
            continue;
        }
        let feat = line.parse::<F>().map_err(|source| FeatureError::Parse {
            path: path.to_path_buf(),
            line: index + 1,
            source,
        })?;
        feats.push(feat);
    }

    info!("Loaded {} features from {}", feats.len(), path.display());
    Ok(feats)
}

/// Writes features to a text file, one per line.
pub fn save_feats_to_file<F>(path: impl AsRef<Path>, feats: &[F]) -> Result<(), FeatureError>
where
    F: fmt::Display,
{
    let path = path.as_ref();
    let write_error = |source: io::Error| FeatureError::Write {
        path: path.to_path_buf(),
        source,
    };

    let file = File::create(path).map_err(|source| FeatureError::Open {
        path: path.to_path_buf(),
        source,
    })?;
    let mut writer = BufWriter::new(file);
    for feat in feats {
        writeln!(writer, "{feat}").map_err(write_error)?;
    }
    writer.flush().map_err(write_error)?;

    info!("Saved {} features to {}", feats.len(), path.display());
    Ok(())
}

/// Packs feature positions into a 2xN matrix, one column per feature.
pub fn points_to_mat<F: FeaturePoint>(feats: &[F]) -> Matrix2xX<f32> {
    Matrix2xX::from_fn(feats.len(), |row, col| feats[col].coords()[row])
}
