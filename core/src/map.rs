//! Static landmark maps.
//!
//! A [`Map`] is an ordered collection of point landmarks in the map frame. It is read-only for the
//! lifetime of a filter session. Maps are stored on disk as CSV with an `id,x,y` header:
//!
//! ```text
//! id,x,y
//! 1,92.064,-34.777
//! 2,61.109,-47.132
//! ```
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io;
use std::path::Path;

use crate::LandmarkId;

/// A single point landmark in the map frame.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Landmark {
    pub id: LandmarkId,
    /// x position (m)
    pub x: f64,
    /// y position (m)
    pub y: f64,
}
impl Landmark {
    pub fn new(id: LandmarkId, x: f64, y: f64) -> Self {
        Landmark { id, x, y }
    }
}

/// Known landmark map.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Map {
    landmarks: Vec<Landmark>,
}
impl From<Vec<Landmark>> for Map {
    fn from(landmarks: Vec<Landmark>) -> Self {
        Map { landmarks }
    }
}
impl FromIterator<Landmark> for Map {
    fn from_iter<I: IntoIterator<Item = Landmark>>(iter: I) -> Self {
        Map {
            landmarks: iter.into_iter().collect(),
        }
    }
}
impl Map {
    pub fn new(landmarks: Vec<Landmark>) -> Self {
        Map { landmarks }
    }
    pub fn landmarks(&self) -> &[Landmark] {
        &self.landmarks
    }
    pub fn len(&self) -> usize {
        self.landmarks.len()
    }
    pub fn is_empty(&self) -> bool {
        self.landmarks.is_empty()
    }
    pub fn iter(&self) -> std::slice::Iter<'_, Landmark> {
        self.landmarks.iter()
    }
    /// Look up a landmark by id (first match in map order).
    pub fn get(&self, id: LandmarkId) -> Option<&Landmark> {
        self.landmarks.iter().find(|l| l.id == id)
    }
    /// Landmarks whose distance from `(x, y)` is at most `range`, in map order.
    pub fn within_range(&self, x: f64, y: f64, range: f64) -> Vec<Landmark> {
        self.landmarks
            .iter()
            .filter(|l| (l.x - x).hypot(l.y - y) <= range)
            .copied()
            .collect()
    }
    /// Reads a map from a CSV file with an `id,x,y` header.
    ///
    /// # Arguments
    /// * `path` - Path to the CSV file to read.
    ///
    /// # Returns
    /// * `Ok(Map)` if successful.
    /// * `Err` if the file cannot be read or a row cannot be parsed.
    pub fn from_csv<P: AsRef<Path>>(path: P) -> Result<Self, Box<dyn std::error::Error>> {
        let mut rdr = csv::Reader::from_path(path)?;
        let mut landmarks = Vec::new();
        for result in rdr.deserialize() {
            let landmark: Landmark = result?;
            landmarks.push(landmark);
        }
        Ok(Map { landmarks })
    }
    /// Writes the map to a CSV file with an `id,x,y` header.
    pub fn to_csv<P: AsRef<Path>>(&self, path: P) -> io::Result<()> {
        let file = File::create(path)?;
        let mut writer = csv::Writer::from_writer(file);
        for landmark in &self.landmarks {
            writer.serialize(landmark)?;
        }
        writer.flush()?;
        Ok(())
    }
}
