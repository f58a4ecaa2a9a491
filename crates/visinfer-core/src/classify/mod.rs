//! Classification output handling: label tables and top-k selection.

mod labels;

pub use labels::LabelTable;

use serde::{Deserialize, Serialize};

/// A single scored class.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Prediction {
    /// Position in the model's output vector.
    pub index: usize,
    /// Class label.
    pub label: String,
    /// Raw output score.
    pub score: f32,
}

/// Select the `k` highest-scoring classes.
///
/// Results are ordered by descending score; equal scores keep ascending index
/// order. `k` larger than the vector returns every entry.
pub fn top_k(scores: &[f32], labels: &LabelTable, k: usize) -> Vec<Prediction> {
    let mut order: Vec<usize> = (0..scores.len()).collect();
    // Stable sort keeps ascending index order among ties
    order.sort_by(|&a, &b| scores[b].total_cmp(&scores[a]));

    order
        .into_iter()
        .take(k)
        .map(|index| Prediction {
            index,
            label: labels.label(index).into_owned(),
            score: scores[index],
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_top5_of_1000() {
        let scores: Vec<f32> = (0..1000).map(|i| ((i * 37) % 1000) as f32 / 1000.0).collect();
        let top = top_k(&scores, &LabelTable::default(), 5);

        assert_eq!(top.len(), 5);
        assert!(top.windows(2).all(|w| w[0].score >= w[1].score));
        assert_eq!(top[0].score, 0.999);
    }

    #[test]
    fn test_ties_keep_index_order() {
        let mut scores = vec![0.0f32; 10];
        scores[3] = 0.9;
        scores[7] = 0.9;
        let top = top_k(&scores, &LabelTable::default(), 2);

        assert_eq!(top[0].index, 3);
        assert_eq!(top[1].index, 7);
        assert_eq!(top[0].label, "class_3");
    }

    #[test]
    fn test_k_larger_than_n_and_empty() {
        let labels = LabelTable::new(vec!["a".into(), "b".into(), "c".into()]);
        let top = top_k(&[0.2, 0.5, 0.3], &labels, 10);
        let names: Vec<&str> = top.iter().map(|p| p.label.as_str()).collect();
        assert_eq!(names, vec!["b", "c", "a"]);

        assert!(top_k(&[], &labels, 5).is_empty());
    }

    #[test]
    fn test_selection_is_idempotent() {
        let scores = [0.1f32, 0.4, 0.4, 0.05, 0.9, 0.4];
        let once = top_k(&scores, &LabelTable::default(), 4);
        assert_eq!(
            once.iter().map(|p| p.index).collect::<Vec<_>>(),
            vec![4, 1, 2, 5]
        );

        let mut resorted = once.clone();
        resorted.sort_by(|a, b| b.score.total_cmp(&a.score));
        assert_eq!(resorted, once);

        let rescored: Vec<f32> = once.iter().map(|p| p.score).collect();
        let again = top_k(&rescored, &LabelTable::default(), 4);
        let again_scores: Vec<f32> = again.iter().map(|p| p.score).collect();
        assert_eq!(again_scores, rescored);
    }
}
