//! The price model and the conversion of its log-space output into a
//! displayable valuation.

use std::fmt;
use std::path::Path;

use tracing::info;
use xgboost::{Booster, DMatrix};

use crate::artifacts::AppContext;
use crate::drift::DriftHook;
use crate::error::{Error, Result};
use crate::features::{build_feature_record, FeatureRecord, PropertyRequest};

pub const RUPEES_PER_CRORE: f64 = 10_000_000.0;

/// A model trained on log-transformed prices.
pub trait PriceModel {
    fn predict_log(&self, record: &FeatureRecord<'_>) -> Result<f64>;
}

pub struct XgbModel {
    booster: Booster,
}

impl XgbModel {
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let booster = Booster::load(path.as_ref())?;
        info!("Loaded model from {}", path.as_ref().display());
        Ok(Self { booster })
    }
}

impl PriceModel for XgbModel {
    fn predict_log(&self, record: &FeatureRecord<'_>) -> Result<f64> {
        let dense = record.to_dense();
        let dmatrix = DMatrix::from_dense(&dense, 1)?;
        let predictions = self.booster.predict(&dmatrix)?;

        predictions
            .first()
            .map(|&p| f64::from(p))
            .ok_or(Error::EmptyPrediction)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Valuation {
    pub log_price: f64,
    pub rupees: f64,
    pub crores: f64,
}

impl Valuation {
    pub fn from_log_prediction(log_price: f64) -> Self {
        let rupees = log_price.exp();
        Self {
            log_price,
            rupees,
            crores: rupees / RUPEES_PER_CRORE,
        }
    }
}

impl fmt::Display for Valuation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Estimated Property Value: ₹ {:.2} Cr", self.crores)
    }
}

/// Builds the feature record for `request`, runs the model and converts the
/// result.
pub fn predict_value(
    ctx: &AppContext,
    request: &PropertyRequest,
    hook: &dyn DriftHook,
) -> Result<Valuation> {
    let record = build_feature_record(request, ctx.reference(), ctx.columns(), hook);
    let log_price = ctx.model().predict_log(&record)?;
    Ok(Valuation::from_log_prediction(log_price))
}
