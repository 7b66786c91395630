//! Trained model artifacts and their prediction interface.
//!
//! The offline training step exports each random forest as JSON: the class
//! labels, per-feature importances, and every tree as a flat node array.
//! Splits send a sample left when `x[feature] <= threshold`; a leaf holds a
//! per-class weight vector. Forest probabilities are the mean of the
//! normalized leaf vectors, matching how the models were trained.

use std::collections::HashSet;
use std::path::Path;

use serde::Deserialize;

/// Errors raised while loading model artifacts at startup.
#[derive(Debug, thiserror::Error)]
pub enum ModelLoadError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },

    #[error("failed to parse {path}: {source}")]
    Parse {
        path: String,
        source: serde_json::Error,
    },

    #[error("invalid model artifact: {0}")]
    Invalid(String),
}

/// Prediction interface the inference stage depends on.
pub trait Classifier: Send + Sync {
    /// Class labels in the model's inherent order.
    fn classes(&self) -> &[String];

    /// Number of input features the model expects.
    fn n_features(&self) -> usize;

    /// Probability per class, aligned to `classes()`.
    fn predict_proba(&self, features: &[f64]) -> Vec<f64>;

    /// Per-feature importance scores, aligned to the input features.
    fn feature_importances(&self) -> &[f64];

    /// Most probable class label; the first class wins on exact ties.
    fn predict(&self, features: &[f64]) -> Option<&str> {
        let probs = self.predict_proba(features);
        let mut best: Option<(usize, f64)> = None;
        for (i, p) in probs.iter().copied().enumerate() {
            match best {
                Some((_, bp)) if p <= bp => {}
                _ => best = Some((i, p)),
            }
        }
        best.and_then(|(i, _)| self.classes().get(i))
            .map(String::as_str)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
enum Node {
    Split {
        feature: usize,
        threshold: f64,
        left: usize,
        right: usize,
    },
    Leaf {
        value: Vec<f64>,
    },
}

#[derive(Debug, Clone, Deserialize)]
struct Tree {
    nodes: Vec<Node>,
}

impl Tree {
    fn leaf_for(&self, features: &[f64]) -> &[f64] {
        let mut idx = 0;
        loop {
            match &self.nodes[idx] {
                Node::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    idx = if features[*feature] <= *threshold {
                        *left
                    } else {
                        *right
                    };
                }
                Node::Leaf { value } => return value,
            }
        }
    }
}

/// A random-forest classifier loaded from a JSON artifact.
#[derive(Debug, Clone, Deserialize)]
pub struct ForestClassifier {
    classes: Vec<String>,
    n_features: usize,
    feature_importances: Vec<f64>,
    trees: Vec<Tree>,
}

impl ForestClassifier {
    pub fn from_file(path: &Path) -> Result<Self, ModelLoadError> {
        let raw = read_artifact(path)?;
        Self::parse(&raw, &path.display().to_string())
    }

    #[cfg(test)]
    pub fn from_json(raw: &str) -> Result<Self, ModelLoadError> {
        Self::parse(raw, "<inline>")
    }

    fn parse(raw: &str, origin: &str) -> Result<Self, ModelLoadError> {
        let forest: ForestClassifier =
            serde_json::from_str(raw).map_err(|source| ModelLoadError::Parse {
                path: origin.to_string(),
                source,
            })?;
        forest.validate()?;
        Ok(forest)
    }

    /// Structural checks so prediction can index without bounds failures.
    /// Children must come after their parent, which also rules out cycles.
    fn validate(&self) -> Result<(), ModelLoadError> {
        if self.classes.is_empty() {
            return Err(ModelLoadError::Invalid("model has no classes".into()));
        }
        if self.trees.is_empty() {
            return Err(ModelLoadError::Invalid("model has no trees".into()));
        }
        if self.feature_importances.len() != self.n_features {
            return Err(ModelLoadError::Invalid(format!(
                "expected {} feature importances, found {}",
                self.n_features,
                self.feature_importances.len()
            )));
        }
        for (t, tree) in self.trees.iter().enumerate() {
            if tree.nodes.is_empty() {
                return Err(ModelLoadError::Invalid(format!("tree {} is empty", t)));
            }
            for (i, node) in tree.nodes.iter().enumerate() {
                match node {
                    Node::Split {
                        feature,
                        threshold,
                        left,
                        right,
                    } => {
                        if *feature >= self.n_features {
                            return Err(ModelLoadError::Invalid(format!(
                                "tree {} node {} splits on feature {} of {}",
                                t, i, feature, self.n_features
                            )));
                        }
                        if !threshold.is_finite() {
                            return Err(ModelLoadError::Invalid(format!(
                                "tree {} node {} has a non-finite threshold",
                                t, i
                            )));
                        }
                        for child in [*left, *right] {
                            if child <= i || child >= tree.nodes.len() {
                                return Err(ModelLoadError::Invalid(format!(
                                    "tree {} node {} has invalid child {}",
                                    t, i, child
                                )));
                            }
                        }
                    }
                    Node::Leaf { value } => {
                        if value.len() != self.classes.len() {
                            return Err(ModelLoadError::Invalid(format!(
                                "tree {} leaf {} has {} values for {} classes",
                                t,
                                i,
                                value.len(),
                                self.classes.len()
                            )));
                        }
                        if value.iter().any(|v| !v.is_finite() || *v < 0.0) {
                            return Err(ModelLoadError::Invalid(format!(
                                "tree {} leaf {} has a negative or non-finite weight",
                                t, i
                            )));
                        }
                    }
                }
            }
        }
        Ok(())
    }
}

impl Classifier for ForestClassifier {
    fn classes(&self) -> &[String] {
        &self.classes
    }

    fn n_features(&self) -> usize {
        self.n_features
    }

    fn predict_proba(&self, features: &[f64]) -> Vec<f64> {
        let mut acc = vec![0.0; self.classes.len()];
        for tree in &self.trees {
            let leaf = tree.leaf_for(features);
            let total: f64 = leaf.iter().sum();
            if total > 0.0 {
                for (a, v) in acc.iter_mut().zip(leaf) {
                    *a += v / total;
                }
            } else {
                // An empty leaf votes uniformly.
                let share = 1.0 / self.classes.len() as f64;
                acc.iter_mut().for_each(|a| *a += share);
            }
        }
        let n_trees = self.trees.len() as f64;
        acc.iter_mut().for_each(|a| *a /= n_trees);
        acc
    }

    fn feature_importances(&self) -> &[f64] {
        &self.feature_importances
    }
}

/// Maps soil labels to the integer ids the crop model was trained on.
#[derive(Debug, Clone, Deserialize)]
pub struct LabelEncoder {
    classes: Vec<String>,
}

impl LabelEncoder {
    pub fn new(classes: Vec<String>) -> Result<Self, ModelLoadError> {
        let encoder = Self { classes };
        encoder.validate()?;
        Ok(encoder)
    }

    pub fn from_file(path: &Path) -> Result<Self, ModelLoadError> {
        let raw = read_artifact(path)?;
        let encoder: LabelEncoder =
            serde_json::from_str(&raw).map_err(|source| ModelLoadError::Parse {
                path: path.display().to_string(),
                source,
            })?;
        Self::new(encoder.classes)
    }

    fn validate(&self) -> Result<(), ModelLoadError> {
        if self.classes.is_empty() {
            return Err(ModelLoadError::Invalid("encoder has no classes".into()));
        }
        let mut seen = HashSet::new();
        for c in &self.classes {
            if !seen.insert(c.as_str()) {
                return Err(ModelLoadError::Invalid(format!(
                    "encoder class '{}' is duplicated",
                    c
                )));
            }
        }
        Ok(())
    }

    /// Category id for `label`, or `None` if it was not seen at training time.
    pub fn transform(&self, label: &str) -> Option<usize> {
        self.classes.iter().position(|c| c == label)
    }
}

fn read_artifact(path: &Path) -> Result<String, ModelLoadError> {
    std::fs::read_to_string(path).map_err(|source| ModelLoadError::Io {
        path: path.display().to_string(),
        source,
    })
}
