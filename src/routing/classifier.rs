//! Linear prompt classifier.
//!
//! The artifact is a JSON object `{ "weights": [[f64; D]; C], "bias": [f64; C] }`
//! produced by an offline logistic-regression fit. Scoring is
//! `weights · embedding + bias` and the predicted class is the argmax.

use std::path::Path;

use ndarray::{Array1, Array2, ArrayView1};
use serde::{Deserialize, Serialize};

use crate::error::ClassifierError;

/// On-disk classifier tensors.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassifierArtifact {
    pub weights: Vec<Vec<f64>>,
    pub bias: Vec<f64>,
}

/// Validated classifier ready to score embeddings.
#[derive(Debug, Clone)]
pub struct RoutingClassifier {
    weights: Array2<f64>,
    bias: Array1<f64>,
}

impl RoutingClassifier {
    pub fn from_file(path: &Path) -> Result<Self, ClassifierError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_json_str(&content)
    }

    pub fn from_json_str(json: &str) -> Result<Self, ClassifierError> {
        let artifact: ClassifierArtifact = serde_json::from_str(json)?;
        Self::new(artifact)
    }

    /// Validate shapes and build the weight matrix.
    pub fn new(artifact: ClassifierArtifact) -> Result<Self, ClassifierError> {
        let classes = artifact.weights.len();
        if classes == 0 {
            return Err(ClassifierError::Empty);
        }
        if artifact.bias.len() != classes {
            return Err(ClassifierError::BiasMismatch {
                classes,
                bias: artifact.bias.len(),
            });
        }

        let dimension = artifact.weights[0].len();
        if dimension == 0 {
            return Err(ClassifierError::Empty);
        }
        for (row, values) in artifact.weights.iter().enumerate() {
            if values.len() != dimension {
                return Err(ClassifierError::RaggedWeights {
                    row,
                    expected: dimension,
                    actual: values.len(),
                });
            }
        }

        let flat: Vec<f64> = artifact.weights.into_iter().flatten().collect();
        let weights = Array2::from_shape_vec((classes, dimension), flat).map_err(|_| {
            ClassifierError::RaggedWeights {
                row: 0,
                expected: dimension,
                actual: 0,
            }
        })?;

        Ok(Self {
            weights,
            bias: Array1::from_vec(artifact.bias),
        })
    }

    pub fn num_classes(&self) -> usize {
        self.weights.nrows()
    }

    /// Embedding length the classifier was trained on.
    pub fn dimension(&self) -> usize {
        self.weights.ncols()
    }

    /// Per-class decision scores.
    pub fn scores(&self, embedding: &[f64]) -> Result<Array1<f64>, ClassifierError> {
        if embedding.len() != self.dimension() {
            return Err(ClassifierError::DimensionMismatch {
                expected: self.dimension(),
                actual: embedding.len(),
            });
        }
        Ok(self.weights.dot(&ArrayView1::from(embedding)) + &self.bias)
    }

    /// Predicted class id. Ties go to the lowest id.
    pub fn classify(&self, embedding: &[f64]) -> Result<usize, ClassifierError> {
        let scores = self.scores(embedding)?;
        let mut best: Option<(usize, f64)> = None;
        for (class, &score) in scores.iter().enumerate() {
            if score.is_nan() {
                continue;
            }
            match best {
                Some((_, top)) if score <= top => {}
                _ => best = Some((class, score)),
            }
        }
        // All-NaN scores fall back to the first class.
        Ok(best.map(|(class, _)| class).unwrap_or(0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn identity3() -> RoutingClassifier {
        RoutingClassifier::new(ClassifierArtifact {
            weights: vec![
                vec![1.0, 0.0, 0.0],
                vec![0.0, 1.0, 0.0],
                vec![0.0, 0.0, 1.0],
            ],
            bias: vec![0.0, 0.0, 0.0],
        })
        .expect("valid")
    }

    #[test]
    fn test_classify_argmax() {
        let clf = identity3();
        assert_eq!(clf.num_classes(), 3);
        assert_eq!(clf.dimension(), 3);
        assert_eq!(clf.classify(&[0.1, 0.9, 0.2]).expect("classify"), 1);
        assert_eq!(clf.classify(&[0.1, 0.2, 0.3]).expect("classify"), 2);
    }

    #[test]
    fn test_bias_shifts_decision() {
        let clf = RoutingClassifier::new(ClassifierArtifact {
            weights: vec![vec![1.0, 0.0], vec![0.0, 1.0]],
            bias: vec![0.0, 0.5],
        })
        .expect("valid");
        assert_eq!(clf.classify(&[0.6, 0.2]).expect("classify"), 1);
        let scores = clf.scores(&[0.6, 0.2]).expect("scores");
        assert!((scores[1] - 0.7).abs() < 1e-12);
    }

    #[test]
    fn test_classify_is_deterministic() {
        let clf = RoutingClassifier::new(ClassifierArtifact {
            weights: vec![vec![0.3, -0.7, 0.1], vec![-0.2, 0.4, 0.9]],
            bias: vec![0.05, -0.1],
        })
        .expect("valid");
        let embedding = [0.12, -0.48, 0.33];

        let first = clf.classify(&embedding).expect("classify");
        let first_scores = clf.scores(&embedding).expect("scores");
        for _ in 0..50 {
            assert_eq!(clf.classify(&embedding).expect("classify"), first);
            assert_eq!(clf.scores(&embedding).expect("scores"), first_scores);
        }

        let reloaded = identity3();
        let again = identity3();
        assert_eq!(
            reloaded.classify(&[0.2, 0.7, 0.1]).expect("classify"),
            again.classify(&[0.2, 0.7, 0.1]).expect("classify")
        );
    }

    #[test]
    fn test_tie_goes_to_lowest_class() {
        let clf = identity3();
        assert_eq!(clf.classify(&[0.5, 0.5, 0.5]).expect("classify"), 0);
    }

    #[test]
    fn test_dimension_mismatch() {
        let err = identity3().classify(&[1.0, 2.0]).expect_err("mismatch");
        assert!(matches!(
            err,
            ClassifierError::DimensionMismatch {
                expected: 3,
                actual: 2
            }
        ));
    }

    #[test]
    fn test_rejects_bad_shapes() {
        let ragged = RoutingClassifier::new(ClassifierArtifact {
            weights: vec![vec![1.0, 0.0], vec![1.0]],
            bias: vec![0.0, 0.0],
        });
        assert!(matches!(ragged, Err(ClassifierError::RaggedWeights { row: 1, .. })));

        let bias = RoutingClassifier::new(ClassifierArtifact {
            weights: vec![vec![1.0, 0.0]],
            bias: vec![0.0, 0.0],
        });
        assert!(matches!(bias, Err(ClassifierError::BiasMismatch { .. })));

        let empty = RoutingClassifier::new(ClassifierArtifact {
            weights: vec![],
            bias: vec![],
        });
        assert!(matches!(empty, Err(ClassifierError::Empty)));
    }

    #[test]
    fn test_from_file() {
        let dir = TempDir::new().expect("tempdir");
        let path = dir.path().join("classifier_tensors.json");
        std::fs::write(
            &path,
            r#"{"weights": [[0.0, 1.0], [1.0, 0.0]], "bias": [0.1, 0.0]}"#,
        )
        .expect("write");

        let clf = RoutingClassifier::from_file(&path).expect("load");
        assert_eq!(clf.classify(&[0.0, 1.0]).expect("classify"), 0);
        assert_eq!(clf.classify(&[1.0, 0.0]).expect("classify"), 1);
    }

    #[test]
    fn test_malformed_json() {
        assert!(matches!(
            RoutingClassifier::from_json_str("{\"weights\": 3}"),
            Err(ClassifierError::Json(_))
        ));
    }
}
