use {
    alloy_primitives::U256,
    chrono::{DateTime, Utc},
    serde::{Deserialize, Serialize},
};

/// Outcome of executing one opportunity under an experiment arm.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ExecutionOutcome {
    pub success: bool,
    /// Realized profit in native token atoms.
    pub profit: U256,
    pub gas_cost: U256,
}

/// Monotonic per-arm counters. Value accumulators are 256-bit so profit sums
/// in token atoms cannot saturate; latency and counts fit 64 bits.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VariantMetrics {
    pub success_count: u64,
    pub failure_count: u64,
    pub total_profit: U256,
    pub total_gas_cost: U256,
    pub total_latency_ms: u64,
    pub mev_frontrun_count: u64,
    pub first_execution_at: Option<DateTime<Utc>>,
    pub last_execution_at: Option<DateTime<Utc>>,
}

impl VariantMetrics {
    pub fn record(
        &mut self,
        outcome: &ExecutionOutcome,
        latency_ms: u64,
        mev_frontrun_detected: bool,
        now: DateTime<Utc>,
    ) {
        if outcome.success {
            self.success_count += 1;
        } else {
            self.failure_count += 1;
        }
        self.total_profit += outcome.profit;
        self.total_gas_cost += outcome.gas_cost;
        self.total_latency_ms += latency_ms;
        if mev_frontrun_detected {
            self.mev_frontrun_count += 1;
        }
        self.first_execution_at.get_or_insert(now);
        self.last_execution_at = Some(now);
    }

    pub fn sample_size(&self) -> u64 {
        self.success_count + self.failure_count
    }

    /// Derived read-only view.
    pub fn computed(&self) -> ComputedMetrics {
        let samples = self.sample_size();
        let divide = |value: U256| {
            if samples == 0 {
                U256::ZERO
            } else {
                value / U256::from(samples)
            }
        };
        ComputedMetrics {
            success_rate: if samples == 0 {
                0.0
            } else {
                self.success_count as f64 / samples as f64
            },
            average_profit: divide(self.total_profit),
            average_gas_cost: divide(self.total_gas_cost),
            average_latency_ms: if samples == 0 {
                0.0
            } else {
                self.total_latency_ms as f64 / samples as f64
            },
            mev_frontrun_rate: if samples == 0 {
                0.0
            } else {
                self.mev_frontrun_count as f64 / samples as f64
            },
            sample_size: samples,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComputedMetrics {
    pub success_rate: f64,
    pub average_profit: U256,
    pub average_gas_cost: U256,
    pub average_latency_ms: f64,
    pub mev_frontrun_rate: f64,
    pub sample_size: u64,
}
