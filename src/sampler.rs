//! Sampling orchestration: ring upkeep, matrix fetches, and cycle runs.

use std::sync::Arc;

use anyhow::{bail, Context, Result};
use chrono::Utc;
use tokio::sync::Semaphore;
use tracing::Instrument;
use tracing::{error, info, warn};

use crate::geo::Coordinate;
use crate::ring::{generate_ring, RING_SIZE};
use crate::services::{DistanceApi, GeocodeApi, Surface, WaterApi};
use crate::stats::Reading;
use crate::store::{Location, LocationStore};

/// A location cannot be sampled until at least two of its ring points are
/// confirmed on land.
#[derive(Debug, thiserror::Error)]
#[error("'{name}' has {usable} usable points, need at least 2")]
pub struct InsufficientPoints {
    pub name: String,
    pub usable: usize,
}

/// Counters for one full sampling cycle across all locations.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CycleReport {
    pub attempted: usize,
    pub recorded: usize,
    pub no_data: usize,
    pub failed: usize,
}

enum Outcome {
    Recorded,
    NoData,
    Failed,
}

/// Drives the whole pipeline against pluggable providers and a store.
#[derive(Clone)]
pub struct Sampler {
    store: Arc<dyn LocationStore>,
    distance: Arc<dyn DistanceApi>,
    water: Arc<dyn WaterApi>,
    geocode: Arc<dyn GeocodeApi>,
    radius_km: f64,
    concurrency: usize,
}

impl Sampler {
    pub fn new(
        store: Arc<dyn LocationStore>,
        distance: Arc<dyn DistanceApi>,
        water: Arc<dyn WaterApi>,
        geocode: Arc<dyn GeocodeApi>,
        radius_km: f64,
        concurrency: usize,
    ) -> Self {
        Self {
            store,
            distance,
            water,
            geocode,
            radius_km,
            concurrency: concurrency.max(1),
        }
    }

    /// Registers a new location and immediately runs the maintenance pass so
    /// its ring, surface flags, and country are filled in.
    pub async fn add_location(&self, name: &str, lat: f64, lng: f64) -> Result<()> {
        if self.store.find(name).await?.is_some() {
            bail!("location '{name}' already exists");
        }
        let location = Location::new(name, lat, lng);
        self.store.insert(&location).await?;
        info!(location = %name, lat, lng, "Registered location");

        self.update_points().await
    }

    /// Fills in missing rings, surface flags, and countries for every stored
    /// location. Points already classified are left alone. Failures are
    /// logged and dropped per unit of work, never blocking the remaining
    /// points or locations.
    pub async fn update_points(&self) -> Result<()> {
        for location in self.store.find_all().await? {
            self.update_location(&location).await;
        }
        Ok(())
    }

    async fn update_location(&self, location: &Location) {
        let mut location = location.clone();

        if location.points.len() < RING_SIZE {
            let points = match generate_ring(location.center(), self.radius_km) {
                Ok(points) => points,
                Err(e) => {
                    error!(location = %location.name, error = %e, "Failed to generate sampling ring");
                    return;
                }
            };
            if let Err(e) = self.store.set_points(&location.name, points.clone()).await {
                error!(location = %location.name, error = %e, "Failed to persist sampling ring");
                return;
            }
            location.points = points;
            info!(location = %location.name, "Generated sampling ring");
        }

        for point in &location.points {
            if point.on_land.is_some() {
                continue;
            }
            let surface = match self.water.classify(point.coordinate()).await {
                Ok(surface) => surface,
                Err(e) => {
                    warn!(location = %location.name, point = %point.name, error = %e, "Surface lookup failed, point stays unclassified");
                    continue;
                }
            };
            let on_land = surface == Surface::Land;
            if let Err(e) = self
                .store
                .set_on_land(&location.name, &point.name, on_land)
                .await
            {
                error!(location = %location.name, point = %point.name, error = %e, "Failed to persist surface flag");
                continue;
            }
            info!(location = %location.name, point = %point.name, on_land, "Classified point");
        }

        if location.country.is_none() {
            match self.geocode.country(location.center()).await {
                Ok(Some(country)) => {
                    if let Err(e) = self.store.set_country(&location.name, &country).await {
                        error!(location = %location.name, error = %e, "Failed to persist country");
                    } else {
                        info!(location = %location.name, country = %country, "Resolved country");
                    }
                }
                Ok(None) => {
                    warn!(location = %location.name, "Reverse geocode returned no country");
                }
                Err(e) => {
                    warn!(location = %location.name, error = %e, "Reverse geocode failed");
                }
            }
        }
    }

    /// Fetches one pairwise matrix over the location's on-land points and
    /// reduces it. `Ok(None)` means the provider answered but no cell held a
    /// usable trip.
    pub async fn sample_location(&self, location: &Location) -> Result<Option<Reading>> {
        let usable: Vec<Coordinate> = location
            .usable_points()
            .iter()
            .map(|p| p.coordinate())
            .collect();
        if usable.len() < 2 {
            return Err(InsufficientPoints {
                name: location.name.clone(),
                usable: usable.len(),
            }
            .into());
        }

        let matrix = self
            .distance
            .matrix(&usable, &usable, Utc::now())
            .await
            .with_context(|| format!("Failed to fetch distance matrix for '{}'", location.name))?;

        Ok(Reading::from_matrix(&matrix))
    }

    pub async fn sample_by_name(&self, name: &str) -> Result<Option<Reading>> {
        let location = self
            .store
            .find(name)
            .await?
            .with_context(|| format!("no location named '{name}'"))?;
        self.sample_location(&location).await
    }

    /// Samples every stored location concurrently and persists the readings.
    /// One location failing never blocks the others.
    pub async fn sample_all(&self) -> Result<CycleReport> {
        let locations = self.store.find_all().await?;
        let mut report = CycleReport {
            attempted: locations.len(),
            ..Default::default()
        };

        let semaphore = Arc::new(Semaphore::new(self.concurrency));
        let mut tasks = Vec::new();

        for location in locations {
            let sampler = self.clone();
            let sem = semaphore.clone();

            let location_span = tracing::info_span!(
                "sample_location",
                location = %location.name,
            );

            let task = tokio::spawn(
                async move {
                    let _permit = sem.acquire().await.unwrap();
                    sampler.record_location(&location).await
                }
                .instrument(location_span),
            );

            tasks.push(task);
        }

        for task in tasks {
            match task.await {
                Ok(Outcome::Recorded) => report.recorded += 1,
                Ok(Outcome::NoData) => report.no_data += 1,
                Ok(Outcome::Failed) => report.failed += 1,
                Err(e) => {
                    error!(error = %e, "Sampling task panicked");
                    report.failed += 1;
                }
            }
        }

        info!(
            attempted = report.attempted,
            recorded = report.recorded,
            no_data = report.no_data,
            failed = report.failed,
            "Sampling cycle finished"
        );
        Ok(report)
    }

    async fn record_location(&self, location: &Location) -> Outcome {
        match self.sample_location(location).await {
            Ok(Some(reading)) => {
                let trips = reading.trips;
                if let Err(e) = self.store.push_reading(&location.name, reading).await {
                    error!(location = %location.name, error = %e, "Failed to persist reading");
                    return Outcome::Failed;
                }
                info!(location = %location.name, trips, "Recorded reading");
                Outcome::Recorded
            }
            Ok(None) => {
                warn!(location = %location.name, "No usable trips this cycle, nothing recorded");
                Outcome::NoData
            }
            Err(e) => {
                error!(location = %location.name, error = %e, "Failed to sample location");
                Outcome::Failed
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ring::SamplePoint;
    use crate::services::distance::{
        DistanceMatrix, MatrixElement, MatrixRow, Quantity, STATUS_OK,
    };
    use async_trait::async_trait;
    use chrono::{DateTime, Utc};
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    struct MemoryStore {
        data: Mutex<HashMap<String, Location>>,
    }

    impl MemoryStore {
        fn new() -> Self {
            Self {
                data: Mutex::new(HashMap::new()),
            }
        }

        fn update(&self, name: &str, apply: impl FnOnce(&mut Location)) -> Result<()> {
            let mut data = self.data.lock().unwrap();
            let location = data
                .get_mut(name)
                .ok_or_else(|| anyhow::anyhow!("no location named '{name}'"))?;
            apply(location);
            Ok(())
        }
    }

    #[async_trait]
    impl LocationStore for MemoryStore {
        async fn find(&self, name: &str) -> Result<Option<Location>> {
            Ok(self.data.lock().unwrap().get(name).cloned())
        }

        async fn find_all(&self) -> Result<Vec<Location>> {
            let mut all: Vec<Location> = self.data.lock().unwrap().values().cloned().collect();
            all.sort_by(|a, b| a.name.cmp(&b.name));
            Ok(all)
        }

        async fn insert(&self, location: &Location) -> Result<()> {
            let mut data = self.data.lock().unwrap();
            if data.contains_key(&location.name) {
                bail!("location '{}' already exists", location.name);
            }
            data.insert(location.name.clone(), location.clone());
            Ok(())
        }

        async fn set_points(&self, name: &str, points: Vec<SamplePoint>) -> Result<()> {
            self.update(name, |l| l.points = points)
        }

        async fn set_on_land(&self, name: &str, point_name: &str, on_land: bool) -> Result<()> {
            self.update(name, |l| {
                for point in &mut l.points {
                    if point.name == point_name {
                        point.on_land = Some(on_land);
                    }
                }
            })
        }

        async fn set_country(&self, name: &str, country: &str) -> Result<()> {
            self.update(name, |l| l.country = Some(country.to_string()))
        }

        async fn push_reading(&self, name: &str, reading: Reading) -> Result<()> {
            self.update(name, |l| l.readings.push(reading))
        }

        async fn clear_readings(&self) -> Result<usize> {
            let mut data = self.data.lock().unwrap();
            for location in data.values_mut() {
                location.readings.clear();
            }
            Ok(data.len())
        }
    }

    /// Delegates to a [`MemoryStore`] except that surface flags for one
    /// location never persist.
    struct FlakyFlagStore {
        inner: MemoryStore,
        broken: &'static str,
    }

    #[async_trait]
    impl LocationStore for FlakyFlagStore {
        async fn find(&self, name: &str) -> Result<Option<Location>> {
            self.inner.find(name).await
        }

        async fn find_all(&self) -> Result<Vec<Location>> {
            self.inner.find_all().await
        }

        async fn insert(&self, location: &Location) -> Result<()> {
            self.inner.insert(location).await
        }

        async fn set_points(&self, name: &str, points: Vec<SamplePoint>) -> Result<()> {
            self.inner.set_points(name, points).await
        }

        async fn set_on_land(&self, name: &str, point_name: &str, on_land: bool) -> Result<()> {
            if name == self.broken {
                bail!("disk full");
            }
            self.inner.set_on_land(name, point_name, on_land).await
        }

        async fn set_country(&self, name: &str, country: &str) -> Result<()> {
            self.inner.set_country(name, country).await
        }

        async fn push_reading(&self, name: &str, reading: Reading) -> Result<()> {
            self.inner.push_reading(name, reading).await
        }

        async fn clear_readings(&self) -> Result<usize> {
            self.inner.clear_readings().await
        }
    }

    /// Off-diagonal cells get a fixed 5 km / 10 min trip.
    struct FixedMatrix;

    #[async_trait]
    impl DistanceApi for FixedMatrix {
        async fn matrix(
            &self,
            origins: &[Coordinate],
            destinations: &[Coordinate],
            _departure: DateTime<Utc>,
        ) -> Result<DistanceMatrix> {
            let mut rows = Vec::new();
            for o in 0..origins.len() {
                let mut elements = Vec::new();
                for d in 0..destinations.len() {
                    let (distance, time) = if o == d { (0.0, 0.0) } else { (5000.0, 600.0) };
                    elements.push(MatrixElement {
                        status: STATUS_OK.to_string(),
                        distance: Some(Quantity {
                            text: String::new(),
                            value: distance,
                        }),
                        duration: None,
                        duration_in_traffic: Some(Quantity {
                            text: String::new(),
                            value: time,
                        }),
                    });
                }
                rows.push(MatrixRow { elements });
            }
            Ok(DistanceMatrix {
                origin_addresses: origins.iter().map(|c| c.as_query()).collect(),
                destination_addresses: destinations.iter().map(|c| c.as_query()).collect(),
                rows,
                status: Some("OK".to_string()),
            })
        }
    }

    struct FailingMatrix;

    #[async_trait]
    impl DistanceApi for FailingMatrix {
        async fn matrix(
            &self,
            _origins: &[Coordinate],
            _destinations: &[Coordinate],
            _departure: DateTime<Utc>,
        ) -> Result<DistanceMatrix> {
            bail!("matrix provider offline")
        }
    }

    /// Answers successfully but every cell is a failed lookup.
    struct NoTripsMatrix;

    #[async_trait]
    impl DistanceApi for NoTripsMatrix {
        async fn matrix(
            &self,
            origins: &[Coordinate],
            destinations: &[Coordinate],
            _departure: DateTime<Utc>,
        ) -> Result<DistanceMatrix> {
            let rows = (0..origins.len())
                .map(|_| MatrixRow {
                    elements: (0..destinations.len())
                        .map(|_| MatrixElement {
                            status: "ZERO_RESULTS".to_string(),
                            distance: None,
                            duration: None,
                            duration_in_traffic: None,
                        })
                        .collect(),
                })
                .collect();
            Ok(DistanceMatrix {
                origin_addresses: origins.iter().map(|c| c.as_query()).collect(),
                destination_addresses: destinations.iter().map(|c| c.as_query()).collect(),
                rows,
                status: Some("OK".to_string()),
            })
        }
    }

    #[derive(Default)]
    struct AllLand {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl WaterApi for AllLand {
        async fn classify(&self, _coordinate: Coordinate) -> Result<Surface> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(Surface::Land)
        }
    }

    struct FailingWater;

    #[async_trait]
    impl WaterApi for FailingWater {
        async fn classify(&self, _coordinate: Coordinate) -> Result<Surface> {
            bail!("water provider offline")
        }
    }

    struct FixedCountry;

    #[async_trait]
    impl GeocodeApi for FixedCountry {
        async fn country(&self, _coordinate: Coordinate) -> Result<Option<String>> {
            Ok(Some("Ireland".to_string()))
        }
    }

    fn land_ring(center: Coordinate) -> Vec<SamplePoint> {
        generate_ring(center, 10.0)
            .unwrap()
            .into_iter()
            .map(|mut p| {
                p.on_land = Some(true);
                p
            })
            .collect()
    }

    fn sampler(
        store: Arc<dyn LocationStore>,
        distance: Arc<dyn DistanceApi>,
        water: Arc<dyn WaterApi>,
    ) -> Sampler {
        Sampler::new(store, distance, water, Arc::new(FixedCountry), 10.0, 4)
    }

    #[tokio::test]
    async fn test_add_location_generates_classified_ring() {
        let store = Arc::new(MemoryStore::new());
        let water = Arc::new(AllLand::default());
        let s = sampler(store.clone(), Arc::new(FixedMatrix), water.clone());

        s.add_location("Dublin", 53.3498, -6.2603).await.unwrap();

        let location = store.find("Dublin").await.unwrap().unwrap();
        assert_eq!(location.points.len(), 9);
        assert_eq!(location.points[0].name, "CENTER");
        assert!(location.points.iter().all(|p| p.on_land == Some(true)));
        assert_eq!(location.country.as_deref(), Some("Ireland"));
        assert_eq!(water.calls.load(Ordering::SeqCst), 9);
    }

    #[tokio::test]
    async fn test_add_duplicate_fails() {
        let store = Arc::new(MemoryStore::new());
        let s = sampler(store, Arc::new(FixedMatrix), Arc::new(AllLand::default()));

        s.add_location("Dublin", 53.3498, -6.2603).await.unwrap();
        let err = s.add_location("Dublin", 53.3498, -6.2603).await.unwrap_err();
        assert!(err.to_string().contains("already exists"));
    }

    #[tokio::test]
    async fn test_update_does_not_reclassify_known_points() {
        let store = Arc::new(MemoryStore::new());
        let water = Arc::new(AllLand::default());
        let s = sampler(store, Arc::new(FixedMatrix), water.clone());

        s.add_location("Dublin", 53.3498, -6.2603).await.unwrap();
        assert_eq!(water.calls.load(Ordering::SeqCst), 9);

        s.update_points().await.unwrap();
        assert_eq!(water.calls.load(Ordering::SeqCst), 9);
    }

    #[tokio::test]
    async fn test_update_pass_is_fail_isolated() {
        let store = Arc::new(FlakyFlagStore {
            inner: MemoryStore::new(),
            broken: "Athlone",
        });
        store
            .insert(&Location::new("Athlone", 53.4239, -7.9407))
            .await
            .unwrap();
        store
            .insert(&Location::new("Dublin", 53.3498, -6.2603))
            .await
            .unwrap();

        let s = sampler(store.clone(), Arc::new(FixedMatrix), Arc::new(AllLand::default()));
        s.update_points().await.unwrap();

        // Athlone's ring persisted and its country resolved; only the flag
        // writes were dropped
        let athlone = store.find("Athlone").await.unwrap().unwrap();
        assert_eq!(athlone.points.len(), 9);
        assert!(athlone.points.iter().all(|p| p.on_land.is_none()));
        assert_eq!(athlone.country.as_deref(), Some("Ireland"));

        // the location after the failing one still got the full pass
        let dublin = store.find("Dublin").await.unwrap().unwrap();
        assert_eq!(dublin.points.len(), 9);
        assert!(dublin.points.iter().all(|p| p.on_land == Some(true)));
        assert_eq!(dublin.country.as_deref(), Some("Ireland"));
    }

    #[tokio::test]
    async fn test_classification_failure_leaves_points_unknown() {
        let store = Arc::new(MemoryStore::new());
        let s = sampler(store.clone(), Arc::new(FixedMatrix), Arc::new(FailingWater));

        s.add_location("Dublin", 53.3498, -6.2603).await.unwrap();

        let location = store.find("Dublin").await.unwrap().unwrap();
        assert_eq!(location.points.len(), 9);
        assert!(location.points.iter().all(|p| p.on_land.is_none()));

        // unknown points are not usable, so sampling refuses to run
        let err = s.sample_by_name("Dublin").await.unwrap_err();
        let insufficient = err.downcast_ref::<InsufficientPoints>().unwrap();
        assert_eq!(insufficient.usable, 0);
    }

    #[tokio::test]
    async fn test_sample_requires_two_usable_points() {
        let store = Arc::new(MemoryStore::new());
        let mut location = Location::new("Dublin", 53.3498, -6.2603);
        let mut points = land_ring(location.center());
        for point in points.iter_mut().skip(1) {
            point.on_land = Some(false);
        }
        location.points = points;
        store.insert(&location).await.unwrap();

        let s = sampler(store, Arc::new(FixedMatrix), Arc::new(AllLand::default()));
        let err = s.sample_by_name("Dublin").await.unwrap_err();
        let insufficient = err.downcast_ref::<InsufficientPoints>().unwrap();
        assert_eq!(insufficient.usable, 1);
        assert_eq!(insufficient.name, "Dublin");
    }

    #[tokio::test]
    async fn test_sample_by_name_unknown_location() {
        let store = Arc::new(MemoryStore::new());
        let s = sampler(store, Arc::new(FixedMatrix), Arc::new(AllLand::default()));

        let err = s.sample_by_name("Nowhere").await.unwrap_err();
        assert!(err.to_string().contains("no location named"));
    }

    #[tokio::test]
    async fn test_cycle_is_fail_isolated() {
        let store = Arc::new(MemoryStore::new());

        // Athlone has a single usable point and cannot be sampled
        let mut athlone = Location::new("Athlone", 53.4239, -7.9407);
        let mut points = land_ring(athlone.center());
        for point in points.iter_mut().skip(1) {
            point.on_land = Some(false);
        }
        athlone.points = points;
        store.insert(&athlone).await.unwrap();

        let mut dublin = Location::new("Dublin", 53.3498, -6.2603);
        dublin.points = land_ring(dublin.center());
        store.insert(&dublin).await.unwrap();

        let s = sampler(store.clone(), Arc::new(FixedMatrix), Arc::new(AllLand::default()));
        let report = s.sample_all().await.unwrap();

        assert_eq!(
            report,
            CycleReport {
                attempted: 2,
                recorded: 1,
                no_data: 0,
                failed: 1,
            }
        );
        let dublin = store.find("Dublin").await.unwrap().unwrap();
        assert_eq!(dublin.readings.len(), 1);
        assert_eq!(dublin.readings[0].trips, 72);
        let athlone = store.find("Athlone").await.unwrap().unwrap();
        assert!(athlone.readings.is_empty());
    }

    #[tokio::test]
    async fn test_cycle_counts_provider_outage_as_failed() {
        let store = Arc::new(MemoryStore::new());
        let mut dublin = Location::new("Dublin", 53.3498, -6.2603);
        dublin.points = land_ring(dublin.center());
        store.insert(&dublin).await.unwrap();

        let s = sampler(store.clone(), Arc::new(FailingMatrix), Arc::new(AllLand::default()));
        let report = s.sample_all().await.unwrap();

        assert_eq!(report.failed, 1);
        assert_eq!(report.recorded, 0);
        let dublin = store.find("Dublin").await.unwrap().unwrap();
        assert!(dublin.readings.is_empty());
    }

    #[tokio::test]
    async fn test_zero_trip_cycle_records_nothing() {
        let store = Arc::new(MemoryStore::new());
        let mut dublin = Location::new("Dublin", 53.3498, -6.2603);
        dublin.points = land_ring(dublin.center());
        store.insert(&dublin).await.unwrap();

        let s = sampler(store.clone(), Arc::new(NoTripsMatrix), Arc::new(AllLand::default()));
        let report = s.sample_all().await.unwrap();

        assert_eq!(report.no_data, 1);
        assert_eq!(report.recorded, 0);
        assert_eq!(report.failed, 0);
        let dublin = store.find("Dublin").await.unwrap().unwrap();
        assert!(dublin.readings.is_empty());
    }

    #[tokio::test]
    async fn test_each_cycle_appends_one_reading() {
        let store = Arc::new(MemoryStore::new());
        let mut dublin = Location::new("Dublin", 53.3498, -6.2603);
        dublin.points = land_ring(dublin.center());
        store.insert(&dublin).await.unwrap();

        let s = sampler(store.clone(), Arc::new(FixedMatrix), Arc::new(AllLand::default()));
        s.sample_all().await.unwrap();
        s.sample_all().await.unwrap();

        let dublin = store.find("Dublin").await.unwrap().unwrap();
        assert_eq!(dublin.readings.len(), 2);
    }
}
