//! Startup artifacts: the reference dataset, the training columns and the
//! model, bundled into a read-only [`AppContext`].

use std::collections::{BTreeSet, HashMap};
use std::path::{Path, PathBuf};

use polars::prelude::*;
use rand::{rngs::StdRng, seq::SliceRandom, SeedableRng};
use tracing::{debug, info};

use crate::error::{Error, Result};
use crate::model::{PriceModel, XgbModel};

pub const LOCATION: &str = "location";
pub const LATITUDE: &str = "latitude";
pub const LONGITUDE: &str = "longitude";

pub const DEFAULT_MODEL_FILE: &str = "mumbai_price_model.bin";
pub const DEFAULT_DATASET_FILE: &str = "geocoded_mumbai_data.csv";
pub const DEFAULT_SCHEMA_FILE: &str = "training_columns.json";

// Cells read as missing, matching what pandas treats as NA by default.
const NULL_TOKENS: [&str; 16] = [
    "", "#N/A", "#N/A N/A", "#NA", "-1.#IND", "-1.#QNAN", "-NaN", "-nan", "1.#IND", "1.#QNAN",
    "<NA>", "N/A", "NA", "NULL", "NaN", "nan",
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactPaths {
    pub model: PathBuf,
    pub dataset: PathBuf,
    pub schema: PathBuf,
}

impl ArtifactPaths {
    // Default file names under `dir`.
    pub fn in_dir(dir: impl AsRef<Path>) -> Self {
        let dir = dir.as_ref();
        Self {
            model: dir.join(DEFAULT_MODEL_FILE),
            dataset: dir.join(DEFAULT_DATASET_FILE),
            schema: dir.join(DEFAULT_SCHEMA_FILE),
        }
    }

    pub fn missing(&self) -> Vec<PathBuf> {
        [&self.model, &self.dataset, &self.schema]
            .into_iter()
            .filter(|p| !p.exists())
            .cloned()
            .collect()
    }
}

/// The ordered list of columns the model was trained on.
#[derive(Debug, Clone, PartialEq)]
pub struct TrainingColumns {
    names: Vec<String>,
    index: HashMap<String, usize>,
}

impl TrainingColumns {
    pub fn new(names: Vec<String>) -> Result<Self> {
        if names.is_empty() {
            return Err(Error::InvalidSchema("column list is empty".into()));
        }

        let mut index = HashMap::with_capacity(names.len());
        for (pos, name) in names.iter().enumerate() {
            if index.insert(name.clone(), pos).is_some() {
                return Err(Error::InvalidSchema(format!("duplicate column `{name}`")));
            }
        }

        Ok(Self { names, index })
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub fn position(&self, name: &str) -> Option<usize> {
        self.index.get(name).copied()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }
}

pub fn load_training_columns(path: impl AsRef<Path>) -> Result<TrainingColumns> {
    let raw = std::fs::read_to_string(path.as_ref())?;
    let names: Vec<String> = serde_json::from_str(&raw)?;
    let columns = TrainingColumns::new(names)?;

    info!("Loaded {} training columns", columns.len());
    Ok(columns)
}

pub fn load_csv_file(path: impl AsRef<Path>) -> Result<DataFrame> {
    let null_values = NULL_TOKENS.iter().map(|t| t.to_string()).collect();
    let df = CsvReader::from_path(path.as_ref())?
        .has_header(true)
        .with_null_values(Some(NullValues::AllColumns(null_values)))
        .finish()?;

    info!("Loaded {} rows and {} columns", df.height(), df.width());
    debug!("{:?}", df.head(Some(5)));

    Ok(df)
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Coordinates {
    pub latitude: f64,
    pub longitude: f64,
}

/// The reference dataset of known properties.
///
/// Coordinates of the first row for every location and the dataset-wide mean
/// are resolved once here; the frame itself is kept for column membership
/// checks and map sampling.
#[derive(Debug, Clone)]
pub struct ReferenceData {
    frame: DataFrame,
    locations: Vec<String>,
    first_coordinates: HashMap<String, Coordinates>,
    mean_coordinates: Coordinates,
}

impl ReferenceData {
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        Self::from_frame(load_csv_file(path)?)
    }

    pub fn from_frame(frame: DataFrame) -> Result<Self> {
        for required in [LOCATION, LATITUDE, LONGITUDE] {
            if frame.column(required).is_err() {
                return Err(Error::MissingColumn(required.to_string()));
            }
        }

        let location = frame.column(LOCATION)?.cast(&DataType::Utf8)?;
        let latitude = frame.column(LATITUDE)?.cast(&DataType::Float64)?;
        let longitude = frame.column(LONGITUDE)?.cast(&DataType::Float64)?;
        let lat = latitude.f64()?;
        let lon = longitude.f64()?;

        // Null coordinates become NaN here and are zeroed by the feature
        // builder's final pass. The mean skips them.
        let mut distinct = BTreeSet::new();
        let mut first_coordinates = HashMap::new();
        for (row, name) in location.utf8()?.into_iter().enumerate() {
            let Some(name) = name else { continue };
            if first_coordinates.contains_key(name) {
                continue;
            }
            distinct.insert(name.to_string());
            first_coordinates.insert(
                name.to_string(),
                Coordinates {
                    latitude: lat.get(row).unwrap_or(f64::NAN),
                    longitude: lon.get(row).unwrap_or(f64::NAN),
                },
            );
        }

        let mean_coordinates = Coordinates {
            latitude: mean_ignoring_missing(lat),
            longitude: mean_ignoring_missing(lon),
        };

        Ok(Self {
            frame,
            locations: distinct.into_iter().collect(),
            first_coordinates,
            mean_coordinates,
        })
    }

    // sorted
    pub fn locations(&self) -> &[String] {
        &self.locations
    }

    pub fn has_location(&self, location: &str) -> bool {
        self.first_coordinates.contains_key(location)
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.frame.column(name).is_ok()
    }

    /// Coordinates of the first row whose location equals `location`.
    pub fn coordinates_of(&self, location: &str) -> Option<Coordinates> {
        self.first_coordinates.get(location).copied()
    }

    pub fn mean_coordinates(&self) -> Coordinates {
        self.mean_coordinates
    }

    /// A seeded sample of up to `size` rows, without replacement, as a
    /// two-column `lat`/`lon` frame.
    pub fn sample_coordinates(&self, size: usize, seed: u64) -> Result<DataFrame> {
        let mut indices: Vec<u32> = (0..self.frame.height() as u32).collect();

        let mut rng = StdRng::seed_from_u64(seed);
        indices.shuffle(&mut rng);
        indices.truncate(size);

        let idx = UInt32Chunked::from_vec("", indices);
        let mut sample = self.frame.select([LATITUDE, LONGITUDE])?.take(&idx)?;
        sample.rename(LATITUDE, "lat")?;
        sample.rename(LONGITUDE, "lon")?;

        Ok(sample)
    }
}

// Nulls and NaN cells are both skipped; NaN when nothing is left.
fn mean_ignoring_missing(values: &Float64Chunked) -> f64 {
    let (sum, count) = values
        .into_iter()
        .flatten()
        .filter(|v| !v.is_nan())
        .fold((0.0, 0usize), |(sum, count), v| (sum + v, count + 1));

    if count == 0 {
        f64::NAN
    } else {
        sum / count as f64
    }
}

/// Everything loaded at startup, read-only for the life of the process.
pub struct AppContext {
    reference: ReferenceData,
    columns: TrainingColumns,
    model: Box<dyn PriceModel>,
}

impl AppContext {
    pub fn new(
        reference: ReferenceData,
        columns: TrainingColumns,
        model: Box<dyn PriceModel>,
    ) -> Self {
        Self {
            reference,
            columns,
            model,
        }
    }

    /// Loads all three artifacts. If any file is absent nothing is parsed and
    /// the error names every missing path.
    pub fn load(paths: &ArtifactPaths) -> Result<Self> {
        let missing = paths.missing();
        if !missing.is_empty() {
            return Err(Error::MissingArtifacts(missing));
        }

        let model = XgbModel::load(&paths.model)?;
        let reference = ReferenceData::load(&paths.dataset)?;
        let columns = load_training_columns(&paths.schema)?;

        Ok(Self::new(reference, columns, Box::new(model)))
    }

    pub fn reference(&self) -> &ReferenceData {
        &self.reference
    }

    pub fn columns(&self) -> &TrainingColumns {
        &self.columns
    }

    pub fn model(&self) -> &dyn PriceModel {
        self.model.as_ref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reference() -> ReferenceData {
        let frame = df!(
            "location" => &["Andheri", "Bandra", "Andheri", "Powai"],
            "latitude" => &[19.12, 19.06, 19.20, 19.10],
            "longitude" => &[72.85, 72.83, 72.90, 72.90],
            "lift" => &[1i64, 0, 1, 1]
        )
        .unwrap();
        ReferenceData::from_frame(frame).unwrap()
    }

    #[test]
    fn training_columns_reject_duplicates_and_empty() {
        let empty = TrainingColumns::new(vec![]);
        assert!(matches!(empty, Err(Error::InvalidSchema(_))));
        assert!(matches!(
            TrainingColumns::new(vec!["area".into(), "area".into()]),
            Err(Error::InvalidSchema(_))
        ));

        let cols = TrainingColumns::new(vec!["area".into(), "lift".into()]).unwrap();
        assert_eq!(cols.position("lift"), Some(1));
        assert!(!cols.contains("wifi"));
    }

    #[test]
    fn first_matching_row_wins() {
        let data = reference();
        assert_eq!(
            data.coordinates_of("Andheri"),
            Some(Coordinates {
                latitude: 19.12,
                longitude: 72.85,
            })
        );
        assert_eq!(data.coordinates_of("Thane"), None);
    }

    #[test]
    fn locations_are_distinct_and_sorted() {
        assert_eq!(reference().locations(), &["Andheri", "Bandra", "Powai"]);
    }

    #[test]
    fn mean_coordinates_cover_all_rows() {
        let mean = reference().mean_coordinates();
        approx::assert_relative_eq!(
            mean.latitude,
            (19.12 + 19.06 + 19.20 + 19.10) / 4.0,
            epsilon = 1e-12
        );
        approx::assert_relative_eq!(
            mean.longitude,
            (72.85 + 72.83 + 72.90 + 72.90) / 4.0,
            epsilon = 1e-12
        );
    }

    #[test]
    fn mean_coordinates_skip_nan_and_null() {
        let frame = df!(
            "location" => &["Andheri", "Bandra", "Powai", "Thane"],
            "latitude" => &[Some(19.12), Some(f64::NAN), Some(19.10), None],
            "longitude" => &[Some(72.85), Some(72.83), Some(f64::NAN), Some(72.97)]
        )
        .unwrap();

        let mean = ReferenceData::from_frame(frame).unwrap().mean_coordinates();
        approx::assert_relative_eq!(mean.latitude, 19.11, epsilon = 1e-12);
        let expected = (72.85 + 72.83 + 72.97) / 3.0;
        approx::assert_relative_eq!(mean.longitude, expected, epsilon = 1e-12);
    }

    #[test]
    fn mean_of_only_missing_values_is_nan() {
        let frame = df!(
            "location" => &["Andheri"],
            "latitude" => &[f64::NAN],
            "longitude" => &[None::<f64>]
        )
        .unwrap();

        let mean = ReferenceData::from_frame(frame).unwrap().mean_coordinates();
        assert!(mean.latitude.is_nan());
        assert!(mean.longitude.is_nan());
    }

    #[test]
    fn integer_coordinates_are_accepted() {
        let frame = df!(
            "location" => &["Andheri"],
            "latitude" => &[19i64],
            "longitude" => &[72i64]
        )
        .unwrap();
        let data = ReferenceData::from_frame(frame).unwrap();
        assert_eq!(data.coordinates_of("Andheri").unwrap().latitude, 19.0);
    }

    #[test]
    fn missing_required_column_is_reported() {
        let frame = df!("location" => &["Andheri"], "latitude" => &[19.12]).unwrap();
        match ReferenceData::from_frame(frame) {
            Err(Error::MissingColumn(col)) => assert_eq!(col, LONGITUDE),
            other => panic!("expected missing column, got {other:?}"),
        }
    }

    #[test]
    fn sample_is_seeded_and_clamped() {
        let data = reference();

        let a = data.sample_coordinates(1000, 42).unwrap();
        let b = data.sample_coordinates(1000, 42).unwrap();
        assert_eq!(a.height(), 4);
        assert_eq!(a.get_column_names(), &["lat", "lon"]);
        assert!(a.frame_equal(&b));

        assert_eq!(data.sample_coordinates(2, 42).unwrap().height(), 2);
    }

    #[test]
    fn missing_paths_are_listed() {
        let paths = ArtifactPaths::in_dir("/definitely/not/here");
        assert_eq!(paths.missing().len(), 3);
    }
}
