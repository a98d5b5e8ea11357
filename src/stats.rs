use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::services::distance::DistanceMatrix;

/// One extremum cell of a matrix: the extreme value, the companion metric of
/// the same trip, and the provider's address labels for its endpoints.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TripExtreme {
    pub value: f64,
    pub paired: f64,
    pub from: String,
    pub to: String,
}

impl TripExtreme {
    fn capture(value: f64, paired: f64, from: &str, to: &str) -> Self {
        Self {
            value,
            paired,
            from: from.to_string(),
            to: to.to_string(),
        }
    }
}

/// Summary statistics for one sampling cycle of one location.
///
/// Times are seconds, distances meters, matching the provider's units.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reading {
    pub time: DateTime<Utc>,
    pub trips: usize,
    pub average_time: f64,
    pub average_distance: f64,
    pub total_time: f64,
    pub total_distance: f64,
    pub min_time: TripExtreme,
    pub max_time: TripExtreme,
    pub min_distance: TripExtreme,
    pub max_distance: TripExtreme,
    /// Provider payload the summary was computed from, kept for audit.
    pub raw: DistanceMatrix,
}

impl Reading {
    /// Reduces a pairwise matrix into summary statistics.
    ///
    /// A cell counts as a trip when its status is OK and its distance is
    /// strictly positive, which also drops the zero-distance self-pairs on
    /// the diagonal. Returns `None` when no cell qualifies, so a degenerate
    /// matrix can never put NaN averages into the store.
    ///
    /// Extremum bookkeeping: a cell that replaces a max is not considered for
    /// the matching min in the same pass (the two branches are exclusive), and
    /// on equal values the first-encountered max is retained.
    pub fn from_matrix(matrix: &DistanceMatrix) -> Option<Reading> {
        let mut trips = 0usize;
        let mut total_time = 0.0;
        let mut total_distance = 0.0;
        let mut min_time = TripExtreme::default();
        let mut max_time = TripExtreme::default();
        let mut min_distance = TripExtreme::default();
        let mut max_distance = TripExtreme::default();

        for (o, from) in matrix.origin_addresses.iter().enumerate() {
            for (d, to) in matrix.destination_addresses.iter().enumerate() {
                let Some(element) = matrix.rows.get(o).and_then(|row| row.elements.get(d)) else {
                    continue;
                };
                if !element.is_ok() {
                    continue;
                }
                let Some(distance) = element.distance_value() else {
                    continue;
                };
                if distance <= 0.0 {
                    continue;
                }
                let Some(time) = element.travel_time() else {
                    continue;
                };

                if distance > max_distance.value {
                    max_distance = TripExtreme::capture(distance, time, from, to);
                } else if min_distance.value == 0.0 || distance < min_distance.value {
                    min_distance = TripExtreme::capture(distance, time, from, to);
                }

                if time > max_time.value {
                    max_time = TripExtreme::capture(time, distance, from, to);
                } else if min_time.value == 0.0 || time < min_time.value {
                    min_time = TripExtreme::capture(time, distance, from, to);
                }

                trips += 1;
                total_time += time;
                total_distance += distance;
            }
        }

        if trips == 0 {
            return None;
        }

        Some(Reading {
            time: Utc::now(),
            trips,
            average_time: total_time / trips as f64,
            average_distance: total_distance / trips as f64,
            total_time,
            total_distance,
            min_time,
            max_time,
            min_distance,
            max_distance,
            raw: matrix.clone(),
        })
    }
}
