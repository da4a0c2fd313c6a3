//! Intensity → tile break probability, and the reroll chain built on it.

use rand::Rng;
use thiserror::Error;

use crate::map::TileKind;

/// Default control points: no chance at 0 rising linearly to certain at 15.
pub const DEFAULT_BREAK_INTENSITY: [f32; 2] = [0.0, 15.0];
pub const DEFAULT_BREAK_CHANCE: [f32; 2] = [0.0, 1.0];

/// Piecewise-linear curve over authored `(intensity, chance)` control points.
///
/// Intensities are expected in non-decreasing order. Evaluation clamps to the
/// first/last chance outside the authored range.
#[derive(Debug, Clone, PartialEq)]
pub struct BreakChanceCurve {
    intensities: Vec<f32>,
    chances: Vec<f32>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("malformed tile break curve: {intensity_points} intensity points, {chance_points} chance points")]
pub struct MalformedCurve {
    pub intensity_points: usize,
    pub chance_points: usize,
}

impl Default for BreakChanceCurve {
    fn default() -> Self {
        Self::new(DEFAULT_BREAK_INTENSITY.to_vec(), DEFAULT_BREAK_CHANCE.to_vec())
    }
}

impl BreakChanceCurve {
    pub fn new(intensities: Vec<f32>, chances: Vec<f32>) -> Self {
        Self {
            intensities,
            chances,
        }
    }

    pub fn validate(&self) -> Result<(), MalformedCurve> {
        if self.chances.is_empty() || self.chances.len() != self.intensities.len() {
            return Err(MalformedCurve {
                intensity_points: self.intensities.len(),
                chance_points: self.chances.len(),
            });
        }
        Ok(())
    }

    pub fn is_malformed(&self) -> bool {
        self.validate().is_err()
    }

    /// Chance in `[0, 1]` that a tile breaks at `intensity`.
    pub fn try_evaluate(&self, intensity: f32) -> Result<f32, MalformedCurve> {
        self.validate()?;
        let xs = &self.intensities;
        let ps = &self.chances;
        let last = xs.len() - 1;

        if intensity.is_nan() {
            return Ok(clamp_probability(ps[0]));
        }
        if intensity >= xs[last] || xs.len() == 1 {
            return Ok(clamp_probability(ps[last]));
        }
        if intensity <= xs[0] {
            return Ok(clamp_probability(ps[0]));
        }

        // First control point at or above `intensity`; never 0 here.
        let i = xs.partition_point(|&x| x < intensity).clamp(1, last);
        let run = xs[i] - xs[i - 1];
        if !(run > 0.0) {
            return Ok(clamp_probability(ps[i]));
        }
        let slope = (ps[i] - ps[i - 1]) / run;
        Ok(clamp_probability(ps[i - 1] + slope * (intensity - xs[i - 1])))
    }

    /// Like [`try_evaluate`](Self::try_evaluate) but malformed curves yield 0.
    pub fn evaluate(&self, intensity: f32) -> f32 {
        self.try_evaluate(intensity).unwrap_or(0.0)
    }
}

fn clamp_probability(value: f32) -> f32 {
    if value.is_nan() {
        0.0
    } else {
        value.clamp(0.0, 1.0)
    }
}

/// Result of walking one tile down its break chain.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TileBreakOutcome {
    pub start: TileKind,
    pub end: TileKind,
    pub breaks: u32,
    /// Intensity left after the last successful break.
    pub final_intensity: f32,
}

impl TileBreakOutcome {
    pub fn is_broken(&self) -> bool {
        self.breaks > 0
    }

    pub fn became_space(&self) -> bool {
        self.end.is_space() && !self.start.is_space()
    }
}

/// Roll a tile's break chain.
///
/// Each successful roll moves the tile one step along [`TileKind::break_to`]
/// and lowers the intensity by `reroll_reduction` before the next roll. The
/// chain stops on the first failed roll, once the intensity is spent, or when
/// the tile reaches space. A non-positive or non-finite reduction would never
/// spend the intensity, so such chains stop after one break; every chain is
/// also capped at `max_breaks`.
pub fn roll_tile_breaks<R, F>(
    start: TileKind,
    intensity: f32,
    reroll_reduction: f32,
    max_breaks: u32,
    chance: F,
    rng: &mut R,
) -> TileBreakOutcome
where
    R: Rng + ?Sized,
    F: Fn(f32) -> f32,
{
    let limit = if reroll_reduction.is_finite() && reroll_reduction > 0.0 {
        max_breaks
    } else {
        max_breaks.min(1)
    };

    let mut kind = start;
    let mut effective = intensity;
    let mut breaks = 0;
    while breaks < limit && !kind.is_space() && effective > 0.0 {
        if rng.gen::<f32>() >= chance(effective) {
            break;
        }
        kind = kind.break_to();
        breaks += 1;
        effective -= reroll_reduction;
    }

    TileBreakOutcome {
        start,
        end: kind,
        breaks,
        final_intensity: effective,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    fn linear() -> BreakChanceCurve {
        BreakChanceCurve::new(vec![0.0, 15.0], vec![0.0, 1.0])
    }

    #[test]
    fn interpolates_between_control_points() {
        let curve = linear();
        assert_eq!(curve.evaluate(7.5), 0.5);
        assert_eq!(curve.evaluate(-1.0), 0.0);
        assert_eq!(curve.evaluate(20.0), 1.0);
        assert_eq!(curve.evaluate(15.0), 1.0);
        assert_eq!(curve.evaluate(0.0), 0.0);
    }

    #[test]
    fn default_curve_matches_authored_default() {
        let curve = BreakChanceCurve::default();
        assert_eq!(curve, linear());
    }

    #[test]
    fn clamps_outside_the_authored_range() {
        let curve = BreakChanceCurve::new(vec![5.0, 10.0, 30.0], vec![0.1, 0.4, 0.9]);
        for below in [-100.0, 0.0, 4.99, 5.0] {
            assert_eq!(curve.evaluate(below), 0.1);
        }
        for above in [30.0, 30.01, 1e9, f32::INFINITY] {
            assert_eq!(curve.evaluate(above), 0.9);
        }
        assert!((curve.evaluate(20.0) - 0.65).abs() < 1e-6);
    }

    #[test]
    fn single_point_saturates_everywhere() {
        let curve = BreakChanceCurve::new(vec![12.0], vec![0.3]);
        assert_eq!(curve.evaluate(-5.0), 0.3);
        assert_eq!(curve.evaluate(12.0), 0.3);
        assert_eq!(curve.evaluate(50.0), 0.3);
    }

    #[test]
    fn malformed_curves_yield_zero() {
        let empty = BreakChanceCurve::new(Vec::new(), Vec::new());
        let mismatched = BreakChanceCurve::new(vec![0.0, 5.0, 10.0], vec![0.0, 1.0]);
        let no_chances = BreakChanceCurve::new(vec![0.0], Vec::new());
        for curve in [empty, mismatched, no_chances] {
            assert!(curve.is_malformed());
            for intensity in [-10.0, 0.0, 7.5, 1e6, f32::NAN] {
                assert_eq!(curve.evaluate(intensity), 0.0);
            }
        }
        let err = BreakChanceCurve::new(vec![0.0, 5.0, 10.0], vec![0.0, 1.0])
            .try_evaluate(3.0)
            .unwrap_err();
        assert_eq!(err.intensity_points, 3);
        assert_eq!(err.chance_points, 2);
    }

    #[test]
    fn duplicate_control_points_step() {
        let curve = BreakChanceCurve::new(vec![0.0, 5.0, 5.0, 10.0], vec![0.0, 0.2, 0.8, 1.0]);
        assert!((curve.evaluate(5.0) - 0.2).abs() < 1e-6);
        assert!(curve.evaluate(5.001) >= 0.8);
        assert!((curve.evaluate(2.5) - 0.1).abs() < 1e-6);
        assert!(!curve.evaluate(5.0).is_nan());
    }

    #[test]
    fn out_of_order_points_never_divide_by_zero() {
        let curve = BreakChanceCurve::new(vec![0.0, 8.0, 4.0, 10.0], vec![0.0, 0.5, 0.7, 1.0]);
        for step in 0..=40 {
            let value = curve.evaluate(step as f32 * 0.25);
            assert!((0.0..=1.0).contains(&value), "{value}");
        }
    }

    #[test]
    fn nan_intensity_reads_first_point() {
        let curve = BreakChanceCurve::new(vec![0.0, 15.0], vec![0.25, 1.0]);
        assert_eq!(curve.evaluate(f32::NAN), 0.25);
    }

    #[test]
    fn monotonic_points_give_monotonic_output() {
        let mut rng = ChaCha8Rng::seed_from_u64(0x5eed_b1a5);
        for _ in 0..250 {
            let n = rng.gen_range(1..8);
            let mut xs: Vec<f32> = (0..n).map(|_| rng.gen_range(-20.0..60.0)).collect();
            xs.sort_by(|a, b| a.total_cmp(b));
            if rng.gen_bool(0.3) && n > 1 {
                let dup = rng.gen_range(1..n);
                xs[dup] = xs[dup - 1];
            }
            let mut ps: Vec<f32> = (0..n).map(|_| rng.gen::<f32>()).collect();
            ps.sort_by(|a, b| a.total_cmp(b));
            let curve = BreakChanceCurve::new(xs.clone(), ps.clone());

            let mut previous = curve.evaluate(-100.0);
            assert_eq!(previous, ps[0]);
            let mut x = -100.0f32;
            while x <= 100.0 {
                let value = curve.evaluate(x);
                assert!(
                    value + 1e-5 >= previous,
                    "curve {xs:?}/{ps:?} decreased at {x}: {previous} -> {value}"
                );
                assert!((0.0..=1.0).contains(&value));
                previous = value;
                x += 0.25;
            }
            assert_eq!(curve.evaluate(100.0), ps[n - 1]);
        }
    }

    #[test]
    fn certain_breaks_run_to_space() {
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        let outcome = roll_tile_breaks(TileKind::Floor, 100.0, 10.0, 8, |_| 1.0, &mut rng);
        assert_eq!(outcome.end, TileKind::Space);
        assert_eq!(outcome.breaks, 3);
        assert!(outcome.became_space());
        assert_eq!(outcome.final_intensity, 70.0);
    }

    #[test]
    fn impossible_breaks_leave_tile_intact() {
        let mut rng = ChaCha8Rng::seed_from_u64(2);
        let outcome = roll_tile_breaks(TileKind::Reinforced, 100.0, 10.0, 8, |_| 0.0, &mut rng);
        assert_eq!(outcome.end, TileKind::Reinforced);
        assert!(!outcome.is_broken());
        assert_eq!(outcome.final_intensity, 100.0);
    }

    #[test]
    fn reduction_spends_intensity_between_rolls() {
        let curve = linear();
        let mut rng = ChaCha8Rng::seed_from_u64(3);
        // Certain at 15, then 5 left: the second roll has a 1/3 chance, the
        // third would be rolled at -5 and never happens.
        for _ in 0..100 {
            let outcome =
                roll_tile_breaks(TileKind::Reinforced, 15.0, 10.0, 8, |i| curve.evaluate(i), &mut rng);
            assert!(outcome.breaks >= 1 && outcome.breaks <= 2, "{outcome:?}");
            assert!(!outcome.end.is_space());
        }
    }

    #[test]
    fn chains_terminate_for_any_reduction() {
        let mut rng = ChaCha8Rng::seed_from_u64(4);
        for reduction in [1e-6, 0.5, 10.0, 1e9] {
            for intensity in [0.0, 1.0, 1e6, 1e30] {
                let outcome =
                    roll_tile_breaks(TileKind::Reinforced, intensity, reduction, 64, |_| 1.0, &mut rng);
                assert!(outcome.breaks <= 4);
            }
        }
    }

    #[test]
    fn non_positive_reduction_is_bounded_to_one_break() {
        let mut rng = ChaCha8Rng::seed_from_u64(5);
        for reduction in [0.0, -10.0, f32::NAN, f32::INFINITY] {
            let outcome =
                roll_tile_breaks(TileKind::Reinforced, 50.0, reduction, 8, |_| 1.0, &mut rng);
            assert_eq!(outcome.breaks, 1, "reduction {reduction}");
            assert_eq!(outcome.end, TileKind::Floor);
        }
    }

    #[test]
    fn max_breaks_caps_the_chain() {
        let mut rng = ChaCha8Rng::seed_from_u64(6);
        let outcome = roll_tile_breaks(TileKind::Reinforced, 1000.0, 1.0, 2, |_| 1.0, &mut rng);
        assert_eq!(outcome.breaks, 2);
        assert_eq!(outcome.end, TileKind::Plating);
    }

    #[test]
    fn spent_intensity_never_rolls() {
        let mut rng = ChaCha8Rng::seed_from_u64(7);
        let outcome = roll_tile_breaks(TileKind::Floor, 0.0, 10.0, 8, |_| 1.0, &mut rng);
        assert!(!outcome.is_broken());
    }
}
