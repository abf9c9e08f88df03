//! Session budgets and the budget gate

use super::types::day_key;
use crate::error::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Budget period
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BudgetPeriod {
    /// Calendar day (UTC)
    Daily,
    /// Calendar month (UTC)
    Monthly,
}

impl BudgetPeriod {
    /// Lowercase name
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Daily => "daily",
            Self::Monthly => "monthly",
        }
    }

    /// Key identifying the period containing `at`
    #[must_use]
    pub fn key(&self, at: &DateTime<Utc>) -> String {
        match self {
            Self::Daily => day_key(at),
            Self::Monthly => at.format("%Y-%m").to_string(),
        }
    }
}

impl std::fmt::Display for BudgetPeriod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Warning ladder. Ordered from least to most severe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WarningLevel {
    /// 75% of the limit
    Approaching,
    /// 90% of the limit
    Critical,
    /// 100% of the limit
    Exceeded,
}

impl WarningLevel {
    /// All levels, most severe first
    pub const LADDER: [WarningLevel; 3] = [Self::Exceeded, Self::Critical, Self::Approaching];

    /// Fraction of the limit at which this level fires
    #[must_use]
    pub fn threshold(&self) -> f64 {
        match self {
            Self::Approaching => 0.75,
            Self::Critical => 0.90,
            Self::Exceeded => 1.0,
        }
    }

    /// Highest level reached by `spend` against `limit`
    #[must_use]
    pub fn for_spend(spend: f64, limit: f64) -> Option<Self> {
        if limit <= 0.0 {
            return None;
        }
        Self::LADDER
            .into_iter()
            .find(|level| spend >= limit * level.threshold())
    }
}

impl std::fmt::Display for WarningLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Approaching => write!(f, "approaching"),
            Self::Critical => write!(f, "critical"),
            Self::Exceeded => write!(f, "exceeded"),
        }
    }
}

/// A budget threshold that has been reached
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BudgetWarning {
    /// Which limit
    pub period: BudgetPeriod,
    /// Which rung of the ladder
    pub level: WarningLevel,
    /// The configured limit
    pub limit: f64,
    /// Spend in the current period
    pub spend: f64,
    /// Spend as a percentage of the limit
    pub percentage: f64,
    /// Human-readable message
    pub message: String,
    /// When the warning was raised
    pub timestamp: DateTime<Utc>,
}

/// Spending ceilings for one session.
///
/// A missing or non-positive limit means unlimited for that period.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TokenBudget {
    /// Daily ceiling
    pub daily_limit: Option<f64>,
    /// Monthly ceiling
    pub monthly_limit: Option<f64>,
    /// Spend in the current day
    pub current_daily_spend: f64,
    /// Spend in the current month
    pub current_monthly_spend: f64,
    /// Start of the current daily period
    pub last_daily_reset: DateTime<Utc>,
    /// Start of the current monthly period
    pub last_monthly_reset: DateTime<Utc>,
    /// Warnings reached in the current periods, one per (period, level)
    pub warnings: Vec<BudgetWarning>,
}

impl Default for TokenBudget {
    fn default() -> Self {
        Self::new()
    }
}

impl TokenBudget {
    /// Create an unlimited budget
    #[must_use]
    pub fn new() -> Self {
        let now = Utc::now();
        Self {
            daily_limit: None,
            monthly_limit: None,
            current_daily_spend: 0.0,
            current_monthly_spend: 0.0,
            last_daily_reset: now,
            last_monthly_reset: now,
            warnings: Vec::new(),
        }
    }

    /// Set the daily ceiling
    #[must_use]
    pub fn with_daily_limit(mut self, limit: f64) -> Self {
        self.daily_limit = Some(limit);
        self
    }

    /// Set the monthly ceiling
    #[must_use]
    pub fn with_monthly_limit(mut self, limit: f64) -> Self {
        self.monthly_limit = Some(limit);
        self
    }

    /// Limit for a period, if one is in force
    #[must_use]
    pub fn limit(&self, period: BudgetPeriod) -> Option<f64> {
        let limit = match period {
            BudgetPeriod::Daily => self.daily_limit,
            BudgetPeriod::Monthly => self.monthly_limit,
        };
        limit.filter(|l| *l > 0.0)
    }

    /// Spend in the current period
    #[must_use]
    pub fn spend(&self, period: BudgetPeriod) -> f64 {
        match period {
            BudgetPeriod::Daily => self.current_daily_spend,
            BudgetPeriod::Monthly => self.current_monthly_spend,
        }
    }

    /// Zero any period that `now` has left behind. Returns whether anything
    /// rolled over.
    pub fn roll_over(&mut self, now: DateTime<Utc>) -> bool {
        let mut rolled = false;
        if BudgetPeriod::Daily.key(&self.last_daily_reset) != BudgetPeriod::Daily.key(&now) {
            self.current_daily_spend = 0.0;
            self.last_daily_reset = now;
            self.warnings.retain(|w| w.period != BudgetPeriod::Daily);
            rolled = true;
        }
        if BudgetPeriod::Monthly.key(&self.last_monthly_reset) != BudgetPeriod::Monthly.key(&now) {
            self.current_monthly_spend = 0.0;
            self.last_monthly_reset = now;
            self.warnings.retain(|w| w.period != BudgetPeriod::Monthly);
            rolled = true;
        }
        rolled
    }

    /// Add spend that happened at `at`. Spend outside the current periods is
    /// not counted against them.
    pub fn add_spend(&mut self, cost: f64, at: DateTime<Utc>, now: DateTime<Utc>) {
        self.roll_over(now);
        if BudgetPeriod::Daily.key(&at) == BudgetPeriod::Daily.key(&now) {
            self.current_daily_spend += cost;
        }
        if BudgetPeriod::Monthly.key(&at) == BudgetPeriod::Monthly.key(&now) {
            self.current_monthly_spend += cost;
        }
    }

    /// Highest reached level per period, without touching the history
    #[must_use]
    pub fn evaluate(&self, now: DateTime<Utc>) -> Vec<BudgetWarning> {
        [BudgetPeriod::Daily, BudgetPeriod::Monthly]
            .into_iter()
            .filter_map(|period| {
                let limit = self.limit(period)?;
                let spend = self.spend(period);
                let level = WarningLevel::for_spend(spend, limit)?;
                let percentage = spend / limit * 100.0;
                Some(BudgetWarning {
                    period,
                    level,
                    limit,
                    spend,
                    percentage,
                    message: format!(
                        "{period} budget {level}: ${spend:.4} of ${limit:.4} ({percentage:.1}%)"
                    ),
                    timestamp: now,
                })
            })
            .collect()
    }

    /// First period whose limit has been reached
    #[must_use]
    pub fn exceeded_period(&self) -> Option<BudgetPeriod> {
        [BudgetPeriod::Daily, BudgetPeriod::Monthly]
            .into_iter()
            .find(|period| {
                self.limit(*period)
                    .is_some_and(|limit| self.spend(*period) >= limit)
            })
    }

    /// Add `warning` to the history unless its (period, level) is already there.
    /// Returns whether it was new.
    pub fn remember(&mut self, warning: &BudgetWarning) -> bool {
        let seen = self
            .warnings
            .iter()
            .any(|w| w.period == warning.period && w.level == warning.level);
        if !seen {
            self.warnings.push(warning.clone());
        }
        !seen
    }
}

/// Result of a budget check
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BudgetStatus {
    /// Budget after rollover and history update
    pub budget: TokenBudget,
    /// Highest level currently reached, per period
    pub warnings: Vec<BudgetWarning>,
}

impl BudgetStatus {
    /// Whether any period is at or over its limit
    #[must_use]
    pub fn is_exceeded(&self) -> bool {
        self.warnings
            .iter()
            .any(|w| w.level == WarningLevel::Exceeded)
    }
}

/// Pre-flight spend check consulted before a request reaches any provider
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait BudgetGate: Send + Sync {
    /// Fail with [`crate::Error::BudgetExceeded`] if `session_id` may not spend more
    async fn check(&self, session_id: &str) -> Result<()>;
}
