//! Fair value estimates for residential property.
//!
//! Three artifacts are loaded once at startup into an [`AppContext`]: an
//! XGBoost model trained on log prices, a reference dataset of geocoded
//! listings and the ordered list of training columns. Each prediction builds
//! one [`FeatureRecord`] from a [`PropertyRequest`], runs the model and turns
//! the log-space output into a [`Valuation`] in crores.

pub mod artifacts;
pub mod cli;
pub mod drift;
pub mod error;
pub mod features;
pub mod model;

pub use artifacts::{
    load_csv_file, load_training_columns, AppContext, ArtifactPaths, Coordinates, ReferenceData,
    TrainingColumns,
};
pub use drift::{CollectDrift, DriftEvent, DriftHook, LogDrift, SilentDrift};
pub use error::{Error, Result};
pub use features::{build_feature_record, FeatureRecord, PropertyRequest};
pub use model::{predict_value, PriceModel, Valuation, XgbModel};
