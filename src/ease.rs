//! Easing curves mapping normalized time `t ∈ [0, 1]` onto progress.

use std::f64::consts::PI;

pub type Ease = fn(f64) -> f64;

pub fn linear(t: f64) -> f64 {
    t
}

pub fn quad_in(t: f64) -> f64 {
    t * t
}

pub fn quad_out(t: f64) -> f64 {
    t * (2.0 - t)
}

pub fn quad_in_out(t: f64) -> f64 {
    let t = t * 2.0;
    if t <= 1.0 {
        t * t / 2.0
    } else {
        let t = t - 1.0;
        (t * (2.0 - t) + 1.0) / 2.0
    }
}

pub fn cubic_in(t: f64) -> f64 {
    t * t * t
}

pub fn cubic_out(t: f64) -> f64 {
    let t = t - 1.0;
    t * t * t + 1.0
}

pub fn cubic_in_out(t: f64) -> f64 {
    let t = t * 2.0;
    if t <= 1.0 {
        t * t * t / 2.0
    } else {
        let t = t - 2.0;
        (t * t * t + 2.0) / 2.0
    }
}

pub fn sin_in_out(t: f64) -> f64 {
    (1.0 - (PI * t).cos()) / 2.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn curves_are_anchored_at_both_ends() {
        let curves: [Ease; 8] = [
            linear,
            quad_in,
            quad_out,
            quad_in_out,
            cubic_in,
            cubic_out,
            cubic_in_out,
            sin_in_out,
        ];
        for ease in curves {
            assert!(ease(0.0).abs() < 1e-12);
            assert!((ease(1.0) - 1.0).abs() < 1e-12);
        }
    }

    #[test]
    fn symmetric_curves_pass_through_the_midpoint() {
        for ease in [quad_in_out as Ease, cubic_in_out, sin_in_out] {
            assert!((ease(0.5) - 0.5).abs() < 1e-12);
            assert!((ease(0.25) + ease(0.75) - 1.0).abs() < 1e-12);
        }
    }
}
