//! Pure statistical functions backing experiment evaluation: two-proportion
//! Z-test, Wilson intervals, power analysis and an O'Brien–Fleming style
//! early-stopping boundary. Everything here is synchronous and side-effect
//! free.

use serde::{Deserialize, Serialize};

/// Z value of the standard normal at 95% two-sided confidence.
const Z_95: f64 = 1.96;
/// Z value for 80% power.
const Z_POWER_80: f64 = 0.84;

/// Successes out of a number of trials.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Proportion {
    pub successes: u64,
    pub trials: u64,
}

impl Proportion {
    pub fn new(successes: u64, trials: u64) -> Self {
        Self { successes, trials }
    }

    pub fn rate(&self) -> f64 {
        if self.trials == 0 {
            0.0
        } else {
            self.successes as f64 / self.trials as f64
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Recommendation {
    ContinueTesting,
    AdoptVariant,
    KeepControl,
    Inconclusive,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Significance {
    pub p_value: f64,
    pub significant: bool,
    pub z_score: f64,
    /// 95% confidence interval of the rate difference (variant - control).
    pub confidence_interval: (f64, f64),
    /// variant rate - control rate.
    pub effect_size: f64,
    pub recommendation: Recommendation,
    pub sample_size_warning: Option<String>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct EarlyStopDecision {
    pub should_stop: bool,
    /// Interim significance level the p-value was compared against.
    pub adjusted_alpha: f64,
    pub reason: String,
}

/// Standard normal CDF via the Abramowitz–Stegun 7.1.26 erf approximation
/// (absolute error below 1.5e-7).
pub fn normal_cdf(x: f64) -> f64 {
    const P: f64 = 0.3275911;
    const A1: f64 = 0.254829592;
    const A2: f64 = -0.284496736;
    const A3: f64 = 1.421413741;
    const A4: f64 = -1.453152027;
    const A5: f64 = 1.061405429;

    let sign = if x < 0.0 { -1.0 } else { 1.0 };
    let x = x.abs() / std::f64::consts::SQRT_2;
    let t = 1.0 / (1.0 + P * x);
    let erf = 1.0 - (((((A5 * t + A4) * t) + A3) * t + A2) * t + A1) * t * (-x * x).exp();
    0.5 * (1.0 + sign * erf)
}

/// Pooled two-proportion Z score. Zero when either sample is empty or the
/// pooled standard error degenerates.
pub fn two_proportions_z_score(first: Proportion, second: Proportion) -> f64 {
    if first.trials == 0 || second.trials == 0 {
        return 0.0;
    }
    let pooled = (first.successes + second.successes) as f64
        / (first.trials + second.trials) as f64;
    let standard_error = (pooled
        * (1.0 - pooled)
        * (1.0 / first.trials as f64 + 1.0 / second.trials as f64))
        .sqrt();
    if standard_error == 0.0 {
        return 0.0;
    }
    (first.rate() - second.rate()) / standard_error
}

/// Two-tailed p-value of a Z score.
pub fn z_score_to_p_value(z: f64) -> f64 {
    2.0 * (1.0 - normal_cdf(z.abs()))
}

/// Wilson score interval for a single proportion at 95% confidence.
pub fn wilson_confidence_interval(proportion: Proportion) -> (f64, f64) {
    if proportion.trials == 0 {
        return (0.0, 0.0);
    }
    let n = proportion.trials as f64;
    let p = proportion.rate();
    let z_squared = Z_95 * Z_95;
    let denominator = 1.0 + z_squared / n;
    let center = (p + z_squared / (2.0 * n)) / denominator;
    let margin =
        Z_95 * (p * (1.0 - p) / n + z_squared / (4.0 * n * n)).sqrt() / denominator;
    ((center - margin).max(0.0), (center + margin).min(1.0))
}

/// Unpooled 95% confidence interval for the difference of two proportions
/// (`first - second`).
pub fn difference_confidence_interval(first: Proportion, second: Proportion) -> (f64, f64) {
    if first.trials == 0 || second.trials == 0 {
        return (0.0, 0.0);
    }
    let p1 = first.rate();
    let p2 = second.rate();
    let standard_error = (p1 * (1.0 - p1) / first.trials as f64
        + p2 * (1.0 - p2) / second.trials as f64)
        .sqrt();
    let difference = p1 - p2;
    (
        difference - Z_95 * standard_error,
        difference + Z_95 * standard_error,
    )
}

/// Evaluates variant against control.
///
/// `significant` requires both the p-value below the threshold and both arms
/// reaching the minimum sample size.
pub fn calculate_significance(
    control: Proportion,
    variant: Proportion,
    threshold: f64,
    min_sample_size: u64,
) -> Significance {
    let z_score = two_proportions_z_score(variant, control);
    let p_value = z_score_to_p_value(z_score);
    let effect_size = variant.rate() - control.rate();
    let enough_samples =
        control.trials >= min_sample_size && variant.trials >= min_sample_size;
    let significant = p_value < threshold && enough_samples;

    let recommendation = if !enough_samples {
        Recommendation::ContinueTesting
    } else if significant && effect_size > 0.0 {
        Recommendation::AdoptVariant
    } else if significant {
        Recommendation::KeepControl
    } else if p_value > 0.5 {
        Recommendation::Inconclusive
    } else {
        Recommendation::ContinueTesting
    };

    Significance {
        p_value,
        significant,
        z_score,
        confidence_interval: difference_confidence_interval(variant, control),
        effect_size,
        recommendation,
        sample_size_warning: (!enough_samples).then(|| {
            format!(
                "need {min_sample_size} samples per arm, have control={} variant={}",
                control.trials, variant.trials
            )
        }),
    }
}

/// Samples per arm required to detect `minimum_detectable_effect` on top of
/// `baseline_rate` at 80% power and 5% alpha. Infinite for a zero effect.
pub fn required_sample_size(baseline_rate: f64, minimum_detectable_effect: f64) -> f64 {
    if minimum_detectable_effect == 0.0 {
        return f64::INFINITY;
    }
    let p1 = baseline_rate;
    let p2 = (baseline_rate + minimum_detectable_effect).clamp(0.0, 1.0);
    let mean = (p1 + p2) / 2.0;
    let numerator = Z_95 * (2.0 * mean * (1.0 - mean)).sqrt()
        + Z_POWER_80 * (p1 * (1.0 - p1) + p2 * (1.0 - p2)).sqrt();
    (numerator * numerator / ((p2 - p1) * (p2 - p1))).ceil()
}

/// Hours until the required sample size is reached at the given throughput.
pub fn estimate_time_to_significance(
    current_samples: u64,
    required_samples: f64,
    samples_per_hour: f64,
) -> f64 {
    if (current_samples as f64) >= required_samples {
        return 0.0;
    }
    if samples_per_hour <= 0.0 {
        return f64::INFINITY;
    }
    (required_samples - current_samples as f64) / samples_per_hour
}

/// O'Brien–Fleming style interim look: very conservative early, relaxing to
/// the nominal level at the planned end of the experiment.
pub fn should_stop_early(p_value: f64, current_samples: u64, target_samples: u64) -> EarlyStopDecision {
    let information = if target_samples == 0 {
        0.0
    } else {
        current_samples as f64 / target_samples as f64
    };
    if information < 0.25 {
        return EarlyStopDecision {
            should_stop: false,
            adjusted_alpha: 0.0001,
            reason: "Insufficient data for an interim look".to_owned(),
        };
    }
    let adjusted_z = Z_95 / information.sqrt();
    let adjusted_alpha = 2.0 * (1.0 - normal_cdf(adjusted_z));
    let should_stop = p_value < adjusted_alpha;
    EarlyStopDecision {
        should_stop,
        adjusted_alpha,
        reason: if should_stop {
            format!("p-value {p_value} beats the interim boundary {adjusted_alpha}")
        } else {
            format!("p-value {p_value} does not reach the interim boundary {adjusted_alpha}")
        },
    }
}
