//! Model session management.
//!
//! A [`ModelManager`] owns at most one live inference session. Loading a new
//! model, or the same model on another execution provider, builds a complete
//! replacement first and swaps it in only when creation succeeds.

mod manager;

pub use manager::{Classification, LoadRequest, LoadedModel, ModelInfo, ModelManager};

/// Work out the tensor shape to feed a model.
///
/// The declared shape is used when it is `[N, 3, H, W]` with static, square
/// spatial dims and a batch that is either dynamic or 1. A dynamic batch
/// becomes 1. Anything else falls back to `[1, 3, S, S]`.
pub fn resolve_input_shape(declared: Option<&[i64]>, target_size: u32) -> Vec<usize> {
    let side = target_size as usize;
    let fallback = vec![1, 3, side, side];

    match declared {
        Some(&[batch, 3, h, w]) if h > 0 && h == w && (batch <= 0 || batch == 1) => {
            vec![1, 3, h as usize, w as usize]
        }
        _ => fallback,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_static_shape_is_honored() {
        assert_eq!(resolve_input_shape(Some(&[1, 3, 256, 256]), 224), vec![1, 3, 256, 256]);
    }

    #[test]
    fn test_dynamic_batch_becomes_one() {
        assert_eq!(resolve_input_shape(Some(&[-1, 3, 224, 224]), 224), vec![1, 3, 224, 224]);
    }

    #[test]
    fn test_fallback_shapes() {
        let fallback = vec![1, 3, 224, 224];
        assert_eq!(resolve_input_shape(None, 224), fallback);
        assert_eq!(resolve_input_shape(Some(&[-1, 3, -1, -1]), 224), fallback);
        assert_eq!(resolve_input_shape(Some(&[1, 1, 28, 28]), 224), fallback);
        assert_eq!(resolve_input_shape(Some(&[8, 3, 224, 224]), 224), fallback);
        assert_eq!(resolve_input_shape(Some(&[1, 3, 224]), 224), fallback);
        assert_eq!(resolve_input_shape(Some(&[1, 3, 320, 240]), 224), fallback);
    }
}
