//! Error types for artifact loading, feature assembly and prediction.

use std::path::PathBuf;

use polars::prelude::PolarsError;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while loading artifacts or producing a valuation.
#[derive(Error, Debug)]
pub enum Error {
    #[error("essential file(s) missing: {}", display_paths(.0))]
    MissingArtifacts(Vec<PathBuf>),

    #[error("invalid training columns: {0}")]
    InvalidSchema(String),

    #[error("reference dataset is missing required column `{0}`")]
    MissingColumn(String),

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("model returned no prediction")]
    EmptyPrediction,

    #[error(transparent)]
    Polars(#[from] PolarsError),

    #[error("model error: {0}")]
    Model(#[from] xgboost::XGBError),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

fn display_paths(paths: &[PathBuf]) -> String {
    paths
        .iter()
        .map(|p| format!("`{}`", p.display()))
        .collect::<Vec<_>>()
        .join(", ")
}
