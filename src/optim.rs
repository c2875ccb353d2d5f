//! Optimizers for the trainable head parameters.

use crate::Tensor;
use ndarray::Array1;

/// Trait for optimization algorithms.
pub trait Optimizer {
    /// Apply one update step to referenced parameters.
    fn step_refs(&mut self, params: &mut [&mut Tensor]);

    /// Clear gradients on referenced parameters.
    fn zero_grad_refs(&mut self, params: &mut [&mut Tensor]) {
        for param in params.iter_mut() {
            param.zero_grad();
        }
    }

    /// Current learning rate.
    fn lr(&self) -> f32;

    /// Set the learning rate.
    fn set_lr(&mut self, lr: f32);
}

/// AdamW: Adam with decoupled weight decay.
///
/// Standard Adam folds L2 regularization into the gradient; AdamW instead
/// shrinks the parameters directly, separate from the adaptive update:
///
/// `theta_t = (1 - lr * lambda) * theta_{t-1} - lr_t * m_t / (sqrt(v_t) + eps)`
///
/// Moment buffers are allocated lazily on the first step that sees each
/// parameter slot.
pub struct AdamW {
    lr: f32,
    beta1: f32,
    beta2: f32,
    epsilon: f32,
    weight_decay: f32,
    t: u64,
    m: Vec<Option<Array1<f32>>>,
    v: Vec<Option<Array1<f32>>>,
}

impl AdamW {
    /// Create an AdamW optimizer with explicit hyperparameters.
    pub fn new(lr: f32, beta1: f32, beta2: f32, epsilon: f32, weight_decay: f32) -> Self {
        Self {
            lr,
            beta1,
            beta2,
            epsilon,
            weight_decay,
            t: 0,
            m: Vec::new(),
            v: Vec::new(),
        }
    }

    /// AdamW with the fine-tuning defaults used by this pipeline
    /// (beta1 0.9, beta2 0.999, eps 1e-8, weight decay 0.01).
    pub fn default_params(lr: f32) -> Self {
        Self::new(lr, 0.9, 0.999, 1e-8, 0.01)
    }

    /// Number of steps taken so far.
    #[must_use]
    pub fn step_count(&self) -> u64 {
        self.t
    }
}

impl Optimizer for AdamW {
    fn step_refs(&mut self, params: &mut [&mut Tensor]) {
        if self.m.len() < params.len() {
            self.m.resize(params.len(), None);
            self.v.resize(params.len(), None);
        }
        self.t += 1;

        // Bias-corrected step size.
        let lr_t = self.lr
            * ((1.0 - self.beta2.powi(self.t as i32)).sqrt()
                / (1.0 - self.beta1.powi(self.t as i32)));

        for (i, param) in params.iter_mut().enumerate() {
            let Some(grad) = param.grad() else {
                continue;
            };

            // m_t = b1 * m + (1 - b1) * g
            let m_t = match &self.m[i] {
                Some(m) => m * self.beta1 + &grad * (1.0 - self.beta1),
                None => &grad * (1.0 - self.beta1),
            };

            // v_t = b2 * v + (1 - b2) * g^2
            let grad_sq = &grad * &grad;
            let v_t = match &self.v[i] {
                Some(v) => v * self.beta2 + &grad_sq * (1.0 - self.beta2),
                None => &grad_sq * (1.0 - self.beta2),
            };

            let adaptive = &m_t / &(v_t.mapv(f32::sqrt) + self.epsilon) * lr_t;
            let decay = 1.0 - self.lr * self.weight_decay;
            let updated = param.data().clone() * decay - &adaptive;
            *param.data_mut() = updated;

            self.m[i] = Some(m_t);
            self.v[i] = Some(v_t);
        }
    }

    fn lr(&self) -> f32 {
        self.lr
    }

    fn set_lr(&mut self, lr: f32) {
        self.lr = lr;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array1;

    #[test]
    fn adamw_descends_a_quadratic() {
        // Minimize f(x) = x^2; gradient is 2x.
        let mut opt = AdamW::default_params(0.1);
        let x = Tensor::from_vec(vec![2.0], true);

        for _ in 0..100 {
            let g = 2.0 * x.data()[0];
            x.set_grad(Array1::from(vec![g]));
            let mut x_ref = x.clone();
            opt.step_refs(&mut [&mut x_ref]);
            x.zero_grad();
        }

        assert!(
            x.data()[0].abs() < 0.5,
            "AdamW should move toward the minimum, got {}",
            x.data()[0]
        );
    }

    #[test]
    fn step_without_grad_is_a_no_op() {
        let mut opt = AdamW::default_params(0.1);
        let x = Tensor::from_vec(vec![1.0, 2.0], true);
        let before = x.data().to_vec();

        let mut x_ref = x.clone();
        opt.step_refs(&mut [&mut x_ref]);

        assert_eq!(x.data().to_vec(), before);
        assert_eq!(opt.step_count(), 1);
    }

    #[test]
    fn lr_accessors() {
        let mut opt = AdamW::default_params(2e-5);
        assert!((opt.lr() - 2e-5).abs() < 1e-12);
        opt.set_lr(1e-4);
        assert!((opt.lr() - 1e-4).abs() < 1e-12);
    }

    #[test]
    fn zero_grad_refs_clears() {
        let mut opt = AdamW::default_params(0.1);
        let x = Tensor::from_vec(vec![1.0], true);
        x.set_grad(Array1::from(vec![1.0]));
        let mut x_ref = x.clone();
        opt.zero_grad_refs(&mut [&mut x_ref]);
        assert!(x.grad().is_none());
    }
}
