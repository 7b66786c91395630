//! Turns raw classifier output into the caller-facing recommendation list.
//!
//! The `reason` sentence and the percentage string are a contract surface:
//! callers display or parse them verbatim, so both are pure templates of the
//! prediction with no other inputs.

use serde::Serialize;
use utoipa::ToSchema;

use super::inference::Prediction;
use crate::helpers::probability_to_percent;

/// One ranked crop suggestion.
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct CropRecommendation {
    /// Crop name as known to the crop model
    pub name: String,
    /// Probability as a percentage with one decimal place (e.g. "15.2%")
    pub probability: String,
    /// Probability in [0, 1]
    pub raw_probability: f64,
    /// Templated explanation naming the soil type and the two driving factors
    pub reason: String,
}

/// Recommendation response: inferred soil type plus up to three crops,
/// ordered by descending probability.
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct RecommendationResult {
    pub soil_type: String,
    pub recommendations: Vec<CropRecommendation>,
}

pub fn compose(prediction: &Prediction) -> RecommendationResult {
    let factors = prediction.top_factors.join(", ");
    let recommendations = prediction
        .top_crops
        .iter()
        .map(|(crop, p)| CropRecommendation {
            name: crop.clone(),
            probability: probability_to_percent(*p),
            raw_probability: *p,
            reason: reason(&prediction.soil_type, crop, &factors),
        })
        .collect();

    RecommendationResult {
        soil_type: prediction.soil_type.clone(),
        recommendations,
    }
}

fn reason(soil_type: &str, crop: &str, factors: &str) -> String {
    format!(
        "{} soil with given conditions favors {}. Key factors: {}.",
        soil_type, crop, factors
    )
}
