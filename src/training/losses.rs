//! Loss functions and label helpers for GAN training
//!
//! Both networks are trained with binary cross-entropy on sigmoid
//! probabilities. The discriminator sees real images labelled 1 and
//! synthetic images labelled 0; the generator is trained against all-ones
//! labels through the frozen discriminator.

use burn::tensor::{backend::Backend, Tensor, TensorData};

/// Probabilities are clamped to [EPSILON, 1 - EPSILON] before taking logs
pub const EPSILON: f32 = 1e-7;

/// Label of a real image
pub const REAL_LABEL: f32 = 1.0;

/// Label of a synthetic image
pub const SYNTHETIC_LABEL: f32 = 0.0;

/// Mean binary cross-entropy: -mean(y * ln(p) + (1 - y) * ln(1 - p))
///
/// # Arguments
///
/// * `predictions` - Probabilities in [0, 1]
/// * `targets` - Labels in [0, 1], same shape as `predictions`
///
/// # Returns
///
/// Single-element loss tensor
pub fn binary_cross_entropy<B: Backend, const D: usize>(
    predictions: Tensor<B, D>,
    targets: Tensor<B, D>,
) -> Tensor<B, 1> {
    let p = predictions.clamp(EPSILON, 1.0 - EPSILON);

    let real_term = targets.clone().mul(p.clone().log());
    let synthetic_term = targets
        .neg()
        .add_scalar(1.0)
        .mul(p.neg().add_scalar(1.0).log());

    real_term.add(synthetic_term).neg().mean()
}

/// Generator loss: BCE of the discriminator output against all-ones labels
pub fn generator_loss<B: Backend>(fake_output: Tensor<B, 2>) -> Tensor<B, 1> {
    let targets = fake_output.ones_like();
    binary_cross_entropy(fake_output, targets)
}

/// Labels for a combined batch: `half` real entries followed by `half` synthetic ones
pub fn combined_label_values(half: usize) -> Vec<f32> {
    let mut labels = vec![REAL_LABEL; half];
    labels.extend(std::iter::repeat(SYNTHETIC_LABEL).take(half));
    labels
}

/// Tensor of shape (2 * half, 1) with the combined batch labels
pub fn combined_labels<B: Backend>(half: usize, device: &B::Device) -> Tensor<B, 2> {
    Tensor::from_data(
        TensorData::new(combined_label_values(half), [2 * half, 1]),
        device,
    )
}

/// Fraction of predictions on the correct side of 0.5
///
/// A prediction of at least 0.5 counts as "real".
pub fn binary_accuracy(predictions: &[f32], targets: &[f32]) -> f64 {
    if predictions.is_empty() {
        return 0.0;
    }

    let correct = predictions
        .iter()
        .zip(targets)
        .filter(|(p, t)| (**p >= 0.5) == (**t >= 0.5))
        .count();

    correct as f64 / predictions.len() as f64
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::NdArray;
    use burn::tensor::ElementConversion;

    type TestBackend = NdArray<f32>;

    fn tensor(values: &[f32]) -> Tensor<TestBackend, 2> {
        Tensor::from_data(
            TensorData::new(values.to_vec(), [values.len(), 1]),
            &Default::default(),
        )
    }

    fn scalar(loss: Tensor<TestBackend, 1>) -> f32 {
        loss.into_scalar().elem::<f32>()
    }

    #[test]
    fn test_bce_uninformed_prediction() {
        let loss = binary_cross_entropy(tensor(&[0.5, 0.5]), tensor(&[1.0, 0.0]));
        assert!((scalar(loss) - std::f32::consts::LN_2).abs() < 1e-5);
    }

    #[test]
    fn test_bce_perfect_discriminator() {
        let loss = binary_cross_entropy(tensor(&[1.0, 1.0, 0.0, 0.0]), tensor(&[1.0, 1.0, 0.0, 0.0]));
        assert!(scalar(loss) < 1e-4);
    }

    #[test]
    fn test_bce_confident_and_wrong_is_finite() {
        let loss = scalar(binary_cross_entropy(tensor(&[0.0]), tensor(&[1.0])));
        assert!(loss.is_finite());
        assert!(loss > 10.0);
    }

    #[test]
    fn test_generator_loss() {
        let fooled = scalar(generator_loss(tensor(&[0.99, 0.99])));
        let caught = scalar(generator_loss(tensor(&[0.01, 0.01])));
        assert!(fooled < caught);
    }

    #[test]
    fn test_combined_label_order() {
        let labels = combined_label_values(3);
        assert_eq!(labels, vec![1.0, 1.0, 1.0, 0.0, 0.0, 0.0]);

        let tensor = combined_labels::<TestBackend>(3, &Default::default());
        assert_eq!(tensor.dims(), [6, 1]);
        let values: Vec<f32> = tensor.into_data().iter::<f32>().collect();
        assert_eq!(values, labels);
    }

    #[test]
    fn test_binary_accuracy() {
        let targets = combined_label_values(2);
        assert_eq!(binary_accuracy(&[0.9, 0.5, 0.1, 0.2], &targets), 1.0);
        assert_eq!(binary_accuracy(&[0.9, 0.4, 0.6, 0.2], &targets), 0.5);
        assert_eq!(binary_accuracy(&[], &[]), 0.0);
    }
}
