use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use async_trait::async_trait;

use super::{Location, LocationStore};
use crate::ring::SamplePoint;
use crate::stats::Reading;

/// One pretty-printed JSON document per location under a data directory.
pub struct JsonStore {
    data_dir: PathBuf,
}

impl JsonStore {
    pub fn new(data_dir: &Path) -> Result<Self> {
        fs::create_dir_all(data_dir)
            .with_context(|| format!("Failed to create data directory {}", data_dir.display()))?;
        Ok(Self {
            data_dir: data_dir.to_path_buf(),
        })
    }

    fn path_for(&self, name: &str) -> PathBuf {
        self.data_dir.join(format!("{}.json", slug(name)))
    }

    fn read(&self, path: &Path) -> Result<Location> {
        let bytes = fs::read(path)
            .with_context(|| format!("Failed to read location file {}", path.display()))?;
        serde_json::from_slice(&bytes)
            .with_context(|| format!("Failed to parse location file {}", path.display()))
    }

    fn write(&self, location: &Location) -> Result<()> {
        let path = self.path_for(&location.name);
        let bytes = serde_json::to_vec_pretty(location)?;
        fs::write(&path, bytes)
            .with_context(|| format!("Failed to write location file {}", path.display()))
    }

    /// Reads the document filed under `name`, or `None` when the file is
    /// missing or holds a different location whose name slugs to the same
    /// file.
    fn read_if_named(&self, name: &str) -> Result<Option<Location>> {
        let path = self.path_for(name);
        if !path.exists() {
            return Ok(None);
        }
        let location = self.read(&path)?;
        Ok((location.name == name).then_some(location))
    }

    fn update(&self, name: &str, apply: impl FnOnce(&mut Location)) -> Result<()> {
        let Some(mut location) = self.read_if_named(name)? else {
            bail!("no location named '{name}'");
        };
        apply(&mut location);
        self.write(&location)
    }
}

/// Keeps file names shell-friendly while staying readable.
fn slug(name: &str) -> String {
    name.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect()
}

#[async_trait]
impl LocationStore for JsonStore {
    async fn find(&self, name: &str) -> Result<Option<Location>> {
        self.read_if_named(name)
    }

    async fn find_all(&self) -> Result<Vec<Location>> {
        let mut locations = Vec::new();
        let entries = fs::read_dir(&self.data_dir).with_context(|| {
            format!("Failed to list data directory {}", self.data_dir.display())
        })?;
        for entry in entries {
            let path = entry?.path();
            if path.extension().is_some_and(|ext| ext == "json") {
                locations.push(self.read(&path)?);
            }
        }
        locations.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(locations)
    }

    async fn insert(&self, location: &Location) -> Result<()> {
        let path = self.path_for(&location.name);
        if path.exists() {
            let existing = self.read(&path)?;
            if existing.name == location.name {
                bail!("location '{}' already exists", location.name);
            }
            bail!(
                "location '{}' collides with '{}' on file {}",
                location.name,
                existing.name,
                path.display()
            );
        }
        self.write(location)
    }

    async fn set_points(&self, name: &str, points: Vec<SamplePoint>) -> Result<()> {
        self.update(name, |location| location.points = points)
    }

    async fn set_on_land(&self, name: &str, point_name: &str, on_land: bool) -> Result<()> {
        self.update(name, |location| {
            for point in &mut location.points {
                if point.name == point_name {
                    point.on_land = Some(on_land);
                }
            }
        })
    }

    async fn set_country(&self, name: &str, country: &str) -> Result<()> {
        self.update(name, |location| {
            location.country = Some(country.to_string())
        })
    }

    async fn push_reading(&self, name: &str, reading: Reading) -> Result<()> {
        self.update(name, |location| location.readings.push(reading))
    }

    async fn clear_readings(&self) -> Result<usize> {
        let mut cleared = 0;
        for location in self.find_all().await? {
            self.update(&location.name, |location| location.readings.clear())?;
            cleared += 1;
        }
        Ok(cleared)
    }
}
