//! Two-stage inference: soil type first, then crop probabilities conditioned
//! on the encoded soil type.
//!
//! The stage is built once at startup and shared read-only behind an `Arc`;
//! `predict` takes `&self` and holds no locks.

use std::path::Path;
use std::sync::Arc;

use super::composer::{self, RecommendationResult};
use super::forest::{Classifier, ForestClassifier, LabelEncoder, ModelLoadError};

/// Names of the crop model's input features, in model order.
pub const FEATURE_NAMES: [&str; 5] = ["Moisture", "Temperature", "pH", "NPK", "Soil Type"];

/// Number of crops returned per recommendation.
pub const TOP_CROPS: usize = 3;

/// Number of driving factors quoted in each reason.
pub const TOP_FACTORS: usize = 2;

/// Allowed deviation of the crop probability sum from 1.
const PROBABILITY_TOLERANCE: f64 = 1e-6;

pub const SOIL_MODEL_FILE: &str = "soil_model.json";
pub const CROP_MODEL_FILE: &str = "crop_model.json";
pub const SOIL_ENCODER_FILE: &str = "soil_encoder.json";

#[derive(Debug, thiserror::Error)]
pub enum InferenceError {
    #[error("{0}")]
    Validation(String),

    #[error("soil label '{0}' is not known to the encoder")]
    UnknownCategory(String),

    #[error("{0}")]
    Model(String),
}

/// Fully resolved model input. Every value must be finite.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FeatureVector {
    pub moisture: f64,
    pub temperature: f64,
    pub ph: f64,
    pub npk: f64,
}

impl FeatureVector {
    pub fn to_array(self) -> [f64; 4] {
        [self.moisture, self.temperature, self.ph, self.npk]
    }
}

/// Raw output of the two classifiers, before composition.
#[derive(Debug, Clone, PartialEq)]
pub struct Prediction {
    pub soil_type: String,
    /// `(crop, probability)` ranked by descending probability.
    pub top_crops: Vec<(String, f64)>,
    /// Feature names ranked by descending importance.
    pub top_factors: Vec<&'static str>,
}

pub struct InferenceStage {
    soil: Arc<dyn Classifier>,
    crop: Arc<dyn Classifier>,
    encoder: LabelEncoder,
}

impl std::fmt::Debug for InferenceStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InferenceStage")
            .field("soil_classes", &self.soil.classes())
            .field("crop_classes", &self.crop.classes())
            .field("encoder", &self.encoder)
            .finish()
    }
}

impl InferenceStage {
    pub fn new(
        soil: Arc<dyn Classifier>,
        crop: Arc<dyn Classifier>,
        encoder: LabelEncoder,
    ) -> Result<Self, ModelLoadError> {
        if soil.n_features() != 4 {
            return Err(ModelLoadError::Invalid(format!(
                "soil model expects {} features, need 4",
                soil.n_features()
            )));
        }
        if crop.n_features() != FEATURE_NAMES.len() {
            return Err(ModelLoadError::Invalid(format!(
                "crop model expects {} features, need {}",
                crop.n_features(),
                FEATURE_NAMES.len()
            )));
        }
        if crop.feature_importances().len() != FEATURE_NAMES.len() {
            return Err(ModelLoadError::Invalid(format!(
                "crop model has {} feature importances, need {}",
                crop.feature_importances().len(),
                FEATURE_NAMES.len()
            )));
        }

        let unknown: Vec<&str> = soil
            .classes()
            .iter()
            .filter(|c| encoder.transform(c).is_none())
            .map(String::as_str)
            .collect();
        if !unknown.is_empty() {
            tracing::warn!(
                "Soil model predicts labels the encoder does not know: {:?}",
                unknown
            );
        }

        Ok(Self {
            soil,
            crop,
            encoder,
        })
    }

    /// Load the soil model, crop model and soil encoder from `dir`.
    pub fn load(dir: &Path) -> Result<Self, ModelLoadError> {
        let soil = ForestClassifier::from_file(&dir.join(SOIL_MODEL_FILE))?;
        let crop = ForestClassifier::from_file(&dir.join(CROP_MODEL_FILE))?;
        let encoder = LabelEncoder::from_file(&dir.join(SOIL_ENCODER_FILE))?;
        let stage = Self::new(Arc::new(soil), Arc::new(crop), encoder)?;
        tracing::info!(
            "Loaded models from {}: {} soil types, {} crops",
            dir.display(),
            stage.soil.classes().len(),
            stage.crop.classes().len()
        );
        Ok(stage)
    }

    pub fn predict(&self, features: FeatureVector) -> Result<Prediction, InferenceError> {
        let base = features.to_array();
        for (name, value) in FEATURE_NAMES.iter().zip(base.iter()) {
            if !value.is_finite() {
                return Err(InferenceError::Validation(format!(
                    "{} must be a finite number, got {}",
                    name, value
                )));
            }
        }

        // Soil stage
        let soil_type = self
            .soil
            .predict(&base)
            .ok_or_else(|| InferenceError::Model("soil model produced no label".into()))?
            .to_string();
        let encoded_soil = self
            .encoder
            .transform(&soil_type)
            .ok_or_else(|| InferenceError::UnknownCategory(soil_type.clone()))?;

        // Crop stage
        let crop_features = [base[0], base[1], base[2], base[3], encoded_soil as f64];
        let probs = self.crop.predict_proba(&crop_features);
        check_distribution(&probs, self.crop.classes().len())?;

        let classes = self.crop.classes();
        let top_crops = rank_descending(&probs)
            .into_iter()
            .take(TOP_CROPS)
            .map(|i| (classes[i].clone(), probs[i]))
            .collect();

        let importances = self.crop.feature_importances();
        let top_factors = rank_descending(importances)
            .into_iter()
            .take(TOP_FACTORS)
            .map(|i| FEATURE_NAMES[i])
            .collect();

        Ok(Prediction {
            soil_type,
            top_crops,
            top_factors,
        })
    }

    pub fn recommend(&self, features: FeatureVector) -> Result<RecommendationResult, InferenceError> {
        let prediction = self.predict(features)?;
        Ok(composer::compose(&prediction))
    }
}

/// Indices sorted by descending score. The sort is stable, so equal scores
/// keep their original order.
fn rank_descending(scores: &[f64]) -> Vec<usize> {
    let mut order: Vec<usize> = (0..scores.len()).collect();
    order.sort_by(|&a, &b| scores[b].total_cmp(&scores[a]));
    order
}

fn check_distribution(probs: &[f64], n_classes: usize) -> Result<(), InferenceError> {
    if probs.len() != n_classes {
        return Err(InferenceError::Model(format!(
            "crop model returned {} probabilities for {} classes",
            probs.len(),
            n_classes
        )));
    }
    if probs.iter().any(|p| !p.is_finite() || *p < 0.0) {
        return Err(InferenceError::Model(
            "crop model returned an invalid probability".into(),
        ));
    }
    let sum: f64 = probs.iter().sum();
    if (sum - 1.0).abs() > PROBABILITY_TOLERANCE {
        return Err(InferenceError::Model(format!(
            "crop probabilities sum to {}, expected 1",
            sum
        )));
    }
    Ok(())
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// Classifier returning a fixed distribution regardless of input.
    pub(crate) struct FixedClassifier {
        pub classes: Vec<String>,
        pub probs: Vec<f64>,
        pub importances: Vec<f64>,
    }

    impl FixedClassifier {
        pub fn new(classes: &[&str], probs: &[f64], importances: &[f64]) -> Self {
            Self {
                classes: classes.iter().map(|c| c.to_string()).collect(),
                probs: probs.to_vec(),
                importances: importances.to_vec(),
            }
        }
    }

    impl Classifier for FixedClassifier {
        fn classes(&self) -> &[String] {
            &self.classes
        }
        fn n_features(&self) -> usize {
            self.importances.len()
        }
        fn predict_proba(&self, _features: &[f64]) -> Vec<f64> {
            self.probs.clone()
        }
        fn feature_importances(&self) -> &[f64] {
            &self.importances
        }
    }

    fn soil(label: &str) -> Arc<dyn Classifier> {
        Arc::new(FixedClassifier::new(&[label], &[1.0], &[0.25; 4]))
    }

    fn encoder() -> LabelEncoder {
        LabelEncoder::new(vec!["Clay".into(), "Loamy".into(), "Sandy".into()]).unwrap()
    }

    fn input() -> FeatureVector {
        FeatureVector {
            moisture: 30.0,
            temperature: 28.0,
            ph: 6.5,
            npk: 90.0,
        }
    }

    fn stage(crop: FixedClassifier) -> InferenceStage {
        InferenceStage::new(soil("Loamy"), Arc::new(crop), encoder()).unwrap()
    }

    #[test]
    fn test_top_three_ranked_descending() {
        let crop = FixedClassifier::new(
            &["Cotton", "Maize", "Rice", "Wheat"],
            &[0.1, 0.4, 0.2, 0.3],
            &[0.3, 0.1, 0.2, 0.15, 0.25],
        );
        let p = stage(crop).predict(input()).unwrap();
        assert_eq!(p.soil_type, "Loamy");
        let names: Vec<_> = p.top_crops.iter().map(|(n, _)| n.as_str()).collect();
        assert_eq!(names, vec!["Maize", "Wheat", "Rice"]);
        for w in p.top_crops.windows(2) {
            assert!(w[0].1 >= w[1].1);
        }
        assert_eq!(p.top_factors, vec!["Moisture", "Soil Type"]);
    }

    #[test]
    fn test_ties_keep_class_order() {
        let crop = FixedClassifier::new(
            &["Barley", "Maize", "Rice", "Wheat"],
            &[0.25, 0.25, 0.25, 0.25],
            &[0.2, 0.2, 0.2, 0.2, 0.2],
        );
        let p = stage(crop).predict(input()).unwrap();
        let names: Vec<_> = p.top_crops.iter().map(|(n, _)| n.as_str()).collect();
        assert_eq!(names, vec!["Barley", "Maize", "Rice"]);
        assert_eq!(p.top_factors, vec!["Moisture", "Temperature"]);
    }

    #[test]
    fn test_fewer_classes_than_top_k() {
        let crop = FixedClassifier::new(&["Rice", "Wheat"], &[0.35, 0.65], &[0.1, 0.2, 0.3, 0.4, 0.0]);
        let p = stage(crop).predict(input()).unwrap();
        assert_eq!(p.top_crops.len(), 2);
        assert_eq!(p.top_crops[0].0, "Wheat");
        assert_eq!(p.top_factors, vec!["NPK", "pH"]);
    }

    #[test]
    fn test_unknown_soil_label() {
        let crop = FixedClassifier::new(&["Rice"], &[1.0], &[0.2; 5]);
        let stage = InferenceStage::new(soil("Peaty"), Arc::new(crop), encoder()).unwrap();
        let err = stage.predict(input()).unwrap_err();
        assert!(matches!(err, InferenceError::UnknownCategory(ref l) if l == "Peaty"));
    }

    #[test]
    fn test_non_finite_input_rejected() {
        let crop = FixedClassifier::new(&["Rice"], &[1.0], &[0.2; 5]);
        let mut features = input();
        features.ph = f64::INFINITY;
        let err = stage(crop).predict(features).unwrap_err();
        assert!(matches!(err, InferenceError::Validation(ref m) if m.contains("pH")));
    }

    #[test]
    fn test_distribution_must_sum_to_one() {
        let crop = FixedClassifier::new(&["Rice", "Wheat"], &[0.5, 0.6], &[0.2; 5]);
        let err = stage(crop).predict(input()).unwrap_err();
        assert!(matches!(err, InferenceError::Model(_)));
    }

    #[test]
    fn test_crop_model_feature_count_checked() {
        let crop = FixedClassifier::new(&["Rice"], &[1.0], &[0.25; 4]);
        let err = InferenceStage::new(soil("Clay"), Arc::new(crop), encoder()).unwrap_err();
        assert!(matches!(err, ModelLoadError::Invalid(_)));
    }

    #[test]
    fn test_predict_is_deterministic() {
        let crop = FixedClassifier::new(
            &["Cotton", "Maize", "Rice", "Wheat"],
            &[0.1, 0.4, 0.2, 0.3],
            &[0.3, 0.1, 0.2, 0.15, 0.25],
        );
        let stage = stage(crop);
        let a = stage.recommend(input()).unwrap();
        let b = stage.recommend(input()).unwrap();
        assert_eq!(
            serde_json::to_string(&a).unwrap(),
            serde_json::to_string(&b).unwrap()
        );
    }

    #[test]
    fn test_load_missing_dir_fails() {
        let err = InferenceStage::load(Path::new("/nonexistent/model")).unwrap_err();
        assert!(matches!(err, ModelLoadError::Io { .. }));
    }

    #[test]
    fn test_rank_descending_stable() {
        assert_eq!(rank_descending(&[0.2, 0.5, 0.2, 0.1]), vec![1, 0, 2, 3]);
    }
}
