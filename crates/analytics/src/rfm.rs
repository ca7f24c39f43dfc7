//! Recency/frequency/monetary scoring against a comparison population.

use engine_core::RfmScore;

/// Raw RFM inputs of one customer.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RfmInputs {
    /// Days since the last completed event. `None` without any.
    pub recency_days: Option<i64>,
    pub frequency: u64,
    pub monetary: f64,
}

/// Sorted raw metrics of every customer being compared.
#[derive(Debug, Clone, Default)]
pub struct ComparisonPopulation {
    recency: Vec<f64>,
    frequency: Vec<f64>,
    monetary: Vec<f64>,
}

impl ComparisonPopulation {
    /// Builds the population from customers with at least one completed
    /// event.
    pub fn new<'a>(members: impl IntoIterator<Item = &'a RfmInputs>) -> Self {
        let mut population = Self::default();
        for m in members {
            let Some(days) = m.recency_days else {
                continue;
            };
            population.recency.push(days as f64);
            population.frequency.push(m.frequency as f64);
            population.monetary.push(m.monetary);
        }
        population.recency.sort_by(f64::total_cmp);
        population.frequency.sort_by(f64::total_cmp);
        population.monetary.sort_by(f64::total_cmp);
        population
    }

    pub fn len(&self) -> usize {
        self.recency.len()
    }

    pub fn is_empty(&self) -> bool {
        self.recency.is_empty()
    }

    /// Quintile scores for one customer.
    ///
    /// An empty population yields the neutral score. A customer without a
    /// completed event always gets the worst recency score.
    pub fn score(&self, inputs: &RfmInputs) -> RfmScore {
        if self.is_empty() {
            return RfmScore::NEUTRAL;
        }
        let recency = match inputs.recency_days {
            Some(days) => quintile(percentile_rank(days as f64, &self.recency, true)),
            None => 1,
        };
        let frequency = quintile(percentile_rank(
            inputs.frequency as f64,
            &self.frequency,
            false,
        ));
        let monetary = quintile(percentile_rank(inputs.monetary, &self.monetary, false));
        RfmScore::new(recency, frequency, monetary)
    }
}

/// Percentile of `value` within ascending `sorted`.
///
/// The rank is the first index whose value is `>= value` (the last index
/// when every value is smaller). `invert` flips the direction for metrics
/// where lower is better.
pub fn percentile_rank(value: f64, sorted: &[f64], invert: bool) -> f64 {
    let n = sorted.len();
    if n == 0 {
        return 50.0;
    }
    let index = sorted.iter().position(|v| *v >= value).unwrap_or(n - 1);
    let percentile = index as f64 / n as f64 * 100.0;
    if invert {
        100.0 - percentile
    } else {
        percentile
    }
}

/// Maps a percentile to a 1-5 bucket.
pub fn quintile(percentile: f64) -> u8 {
    match percentile {
        p if p >= 80.0 => 5,
        p if p >= 60.0 => 4,
        p if p >= 40.0 => 3,
        p if p >= 20.0 => 2,
        _ => 1,
    }
}
