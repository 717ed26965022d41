//! Assembly of the single-row feature record the price model consumes.

use std::collections::BTreeMap;

use polars::prelude::*;
use tracing::debug;

use crate::artifacts::{ReferenceData, TrainingColumns, LATITUDE, LONGITUDE};
use crate::drift::{DriftEvent, DriftHook};
use crate::error::{Error, Result};

pub const AREA: &str = "area";
pub const BEDROOMS: &str = "no_of_bedrooms";
pub const DIST_TO_METRO: &str = "dist_to_metro_km";
pub const LOCATION_PREFIX: &str = "location_";

pub const AREA_RANGE: (f64, f64) = (200.0, 10_000.0);
pub const BEDROOM_RANGE: (u32, u32) = (1, 10);
pub const DIST_TO_METRO_RANGE: (f64, f64) = (0.0, 20.0);

pub const DEFAULT_AREA: f64 = 1000.0;
pub const DEFAULT_BEDROOMS: u32 = 2;
pub const DEFAULT_DIST_TO_METRO: f64 = 1.0;

/// Amenities the form can offer, in display order. Only those present as
/// dataset columns are shown.
pub const KNOWN_AMENITIES: [&str; 14] = [
    "gymnasium",
    "lift",
    "swimmingpool",
    "clubhouse",
    "carparking",
    "intercom",
    "sportsfacility",
    "joggingtrack",
    "rainwaterharvesting",
    "indoorgames",
    "shoppingmall",
    "gasconnection",
    "ac",
    "wifi",
];

#[derive(Debug, Clone, PartialEq)]
pub struct PropertyRequest {
    pub location: String,
    pub area: f64,
    pub bedrooms: u32,
    pub dist_to_metro_km: f64,
    pub amenities: BTreeMap<String, bool>,
}

impl PropertyRequest {
    /// A request with the form defaults and no amenities selected.
    pub fn new(location: impl Into<String>) -> Self {
        Self {
            location: location.into(),
            area: DEFAULT_AREA,
            bedrooms: DEFAULT_BEDROOMS,
            dist_to_metro_km: DEFAULT_DIST_TO_METRO,
            amenities: BTreeMap::new(),
        }
    }

    pub fn with_amenity(mut self, name: impl Into<String>, selected: bool) -> Self {
        self.amenities.insert(name.into(), selected);
        self
    }

    /// Checks the numeric inputs against the bounds the form enforces.
    pub fn validate(&self) -> Result<()> {
        let (lo, hi) = AREA_RANGE;
        if !(lo..=hi).contains(&self.area) {
            return Err(Error::InvalidInput(format!(
                "area {} sq. ft. outside [{lo}, {hi}]",
                self.area
            )));
        }

        let (lo, hi) = BEDROOM_RANGE;
        if !(lo..=hi).contains(&self.bedrooms) {
            return Err(Error::InvalidInput(format!(
                "bedroom count {} outside [{lo}, {hi}]",
                self.bedrooms
            )));
        }

        let (lo, hi) = DIST_TO_METRO_RANGE;
        if !(lo..=hi).contains(&self.dist_to_metro_km) {
            return Err(Error::InvalidInput(format!(
                "distance to metro {} km outside [{lo}, {hi}]",
                self.dist_to_metro_km
            )));
        }

        Ok(())
    }
}

/// One value per training column, in training order.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureRecord<'a> {
    columns: &'a TrainingColumns,
    values: Vec<f64>,
}

impl<'a> FeatureRecord<'a> {
    pub fn zeros(columns: &'a TrainingColumns) -> Self {
        Self {
            columns,
            values: vec![0.0; columns.len()],
        }
    }

    /// Writes `value` if `column` is a training column. Returns whether the
    /// value was kept.
    pub fn set(&mut self, column: &str, value: f64) -> bool {
        match self.columns.position(column) {
            Some(pos) => {
                self.values[pos] = value;
                true
            }
            None => false,
        }
    }

    pub fn get(&self, column: &str) -> Option<f64> {
        self.columns.position(column).map(|pos| self.values[pos])
    }

    pub fn columns(&self) -> &[String] {
        self.columns.names()
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> + '_ {
        self.columns
            .names()
            .iter()
            .map(String::as_str)
            .zip(self.values.iter().copied())
    }

    // f32 row for DMatrix::from_dense
    pub fn to_dense(&self) -> Vec<f32> {
        self.values.iter().map(|&v| v as f32).collect()
    }

    /// The row as a one-row frame whose columns are selected in training order.
    pub fn to_frame(&self) -> Result<DataFrame> {
        let series: Vec<Series> = self
            .iter()
            .map(|(name, v)| Series::new(name, &[v]))
            .collect();
        let frame = DataFrame::new(series)?.select(self.columns.names())?;
        Ok(frame)
    }

    fn fill_nan(&mut self) {
        for v in self.values.iter_mut().filter(|v| v.is_nan()) {
            *v = 0.0;
        }
    }
}

/// Builds the feature record for `request`.
///
/// Never fails: names absent from the training columns are dropped and an
/// unknown location falls back to the dataset-wide mean coordinates. Each
/// such fallback is reported to `hook`.
pub fn build_feature_record<'a>(
    request: &PropertyRequest,
    reference: &ReferenceData,
    columns: &'a TrainingColumns,
    hook: &dyn DriftHook,
) -> FeatureRecord<'a> {
    let mut record = FeatureRecord::zeros(columns);

    set_numeric(&mut record, AREA, request.area, hook);
    set_numeric(&mut record, BEDROOMS, f64::from(request.bedrooms), hook);
    set_numeric(&mut record, DIST_TO_METRO, request.dist_to_metro_km, hook);

    for (amenity, &selected) in &request.amenities {
        let flag = if selected { 1.0 } else { 0.0 };
        if !record.set(amenity, flag) {
            hook.record(DriftEvent::UnknownAmenity(amenity.clone()));
        }
    }

    let location_column = format!("{LOCATION_PREFIX}{}", request.location);
    if !record.set(&location_column, 1.0) {
        hook.record(DriftEvent::UnknownLocationColumn(location_column));
    }

    let coordinates = match reference.coordinates_of(&request.location) {
        Some(found) => found,
        None => {
            hook.record(DriftEvent::LocationNotInDataset(request.location.clone()));
            reference.mean_coordinates()
        }
    };
    set_numeric(&mut record, LATITUDE, coordinates.latitude, hook);
    set_numeric(&mut record, LONGITUDE, coordinates.longitude, hook);

    record.fill_nan();

    debug!(location = %request.location, "feature record: {:?}", record.values());
    record
}

fn set_numeric(
    record: &mut FeatureRecord<'_>,
    column: &str,
    value: f64,
    hook: &dyn DriftHook,
) {
    if !record.set(column, value) {
        hook.record(DriftEvent::UnknownNumericColumn(column.to_string()));
    }
}

pub fn available_amenities(reference: &ReferenceData) -> Vec<&'static str> {
    KNOWN_AMENITIES
        .into_iter()
        .filter(|name| reference.has_column(name))
        .collect()
}

/// Splits amenities into two display groups; the first takes every index
/// below half the count.
pub fn amenity_groups<'s>(amenities: &[&'s str]) -> (Vec<&'s str>, Vec<&'s str>) {
    let half = amenities.len() as f64 / 2.0;
    let (left, right): (Vec<_>, Vec<_>) = amenities
        .iter()
        .enumerate()
        .partition(|(i, _)| (*i as f64) < half);
    (
        left.into_iter().map(|(_, a)| *a).collect(),
        right.into_iter().map(|(_, a)| *a).collect(),
    )
}

/// Label shown next to an amenity toggle, following Python's `str.title()`:
/// underscores become spaces, a letter after a non-letter is upper-cased and
/// every other letter lower-cased.
pub fn display_label(name: &str) -> String {
    let mut label = String::with_capacity(name.len());
    let mut after_letter = false;

    for c in name.chars() {
        let c = if c == '_' { ' ' } else { c };
        if after_letter {
            label.extend(c.to_lowercase());
        } else {
            label.extend(c.to_uppercase());
        }
        after_letter = c.is_alphabetic();
    }

    label
}
