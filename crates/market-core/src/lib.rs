#![deny(warnings)]

//! Core domain models and invariants for the shrinkflation strategy analyzer.
//!
//! This crate defines the fixed three-firm roster, the maintain/shrink
//! strategy space, the closed eight-profile enumeration, and the per-year
//! snapshot types shared across the workspace, with validation helpers used
//! at ingest boundaries.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// One of the three packaged-goods firms under analysis.
///
/// The roster is closed: the game is fixed to exactly these three players,
/// and `Firm::ALL` fixes the canonical ordering used wherever an array is
/// keyed by firm.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Firm {
    #[serde(rename = "Milk Bikis")]
    MilkBikis,
    #[serde(rename = "Good Day")]
    GoodDay,
    #[serde(rename = "Parle G")]
    ParleG,
}

impl Firm {
    /// Canonical firm ordering: Milk Bikis, Good Day, Parle G.
    pub const ALL: [Firm; 3] = [Firm::MilkBikis, Firm::GoodDay, Firm::ParleG];

    /// Position of this firm in [`Firm::ALL`].
    pub fn index(self) -> usize {
        match self {
            Firm::MilkBikis => 0,
            Firm::GoodDay => 1,
            Firm::ParleG => 2,
        }
    }

    /// Trade name, e.g. "Milk Bikis".
    pub fn name(self) -> &'static str {
        match self {
            Firm::MilkBikis => "Milk Bikis",
            Firm::GoodDay => "Good Day",
            Firm::ParleG => "Parle G",
        }
    }

    /// The other two firms, in canonical order.
    pub fn rivals(self) -> [Firm; 2] {
        match self {
            Firm::MilkBikis => [Firm::GoodDay, Firm::ParleG],
            Firm::GoodDay => [Firm::MilkBikis, Firm::ParleG],
            Firm::ParleG => [Firm::MilkBikis, Firm::GoodDay],
        }
    }
}

impl fmt::Display for Firm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A firm's yearly packaging choice.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Strategy {
    /// Keep package size and production cost unchanged.
    Maintain,
    /// Trim the package 5% and the unit production cost 3%.
    Shrink,
}

impl Strategy {
    /// The opposite choice, used for unilateral-deviation checks.
    pub fn flipped(self) -> Strategy {
        match self {
            Strategy::Maintain => Strategy::Shrink,
            Strategy::Shrink => Strategy::Maintain,
        }
    }
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Strategy::Maintain => f.write_str("Maintain"),
            Strategy::Shrink => f.write_str("Shrink"),
        }
    }
}

/// A simultaneous strategy assignment for all three firms, in
/// [`Firm::ALL`] order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StrategyProfile(pub [Strategy; 3]);

impl StrategyProfile {
    /// All eight joint profiles, written out as a closed enumeration.
    ///
    /// Milk Bikis varies slowest and Parle G fastest, maintain before
    /// shrink. This ordering is the deterministic tie-break for the
    /// dominant-total-payoff fallback and must stay fixed.
    pub const ALL: [StrategyProfile; 8] = [
        StrategyProfile([Strategy::Maintain, Strategy::Maintain, Strategy::Maintain]),
        StrategyProfile([Strategy::Maintain, Strategy::Maintain, Strategy::Shrink]),
        StrategyProfile([Strategy::Maintain, Strategy::Shrink, Strategy::Maintain]),
        StrategyProfile([Strategy::Maintain, Strategy::Shrink, Strategy::Shrink]),
        StrategyProfile([Strategy::Shrink, Strategy::Maintain, Strategy::Maintain]),
        StrategyProfile([Strategy::Shrink, Strategy::Maintain, Strategy::Shrink]),
        StrategyProfile([Strategy::Shrink, Strategy::Shrink, Strategy::Maintain]),
        StrategyProfile([Strategy::Shrink, Strategy::Shrink, Strategy::Shrink]),
    ];

    /// Position of this profile in [`StrategyProfile::ALL`].
    pub fn index(self) -> usize {
        let bit = |s: Strategy| match s {
            Strategy::Maintain => 0usize,
            Strategy::Shrink => 1usize,
        };
        bit(self.0[0]) * 4 + bit(self.0[1]) * 2 + bit(self.0[2])
    }

    /// The strategy assigned to `firm` in this profile.
    pub fn strategy_of(self, firm: Firm) -> Strategy {
        self.0[firm.index()]
    }

    /// The strategies of the two rivals of `firm`, in canonical order.
    pub fn rivals_of(self, firm: Firm) -> [Strategy; 2] {
        let [a, b] = firm.rivals();
        [self.strategy_of(a), self.strategy_of(b)]
    }

    /// A copy of this profile with one firm's strategy replaced.
    pub fn with_strategy(self, firm: Firm, strategy: Strategy) -> StrategyProfile {
        let mut strategies = self.0;
        strategies[firm.index()] = strategy;
        StrategyProfile(strategies)
    }
}

impl fmt::Display for StrategyProfile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: {}, {}: {}, {}: {}",
            Firm::MilkBikis,
            self.0[0],
            Firm::GoodDay,
            self.0[1],
            Firm::ParleG,
            self.0[2]
        )
    }
}

/// One firm's package and cost position for one year.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FirmState {
    /// Which firm this state belongs to.
    pub firm: Firm,
    /// Package size in grams (> 0).
    pub package_size_g: Decimal,
    /// Retail price in rupees (> 0).
    pub price: Decimal,
    /// Per-unit production cost in rupees. Absent values default to 50% of
    /// price at the point of use, never rejected.
    pub production_cost: Option<Decimal>,
    /// Market share in percent, within [0, 100].
    pub market_share_pct: f64,
}

/// Package/cost pair after applying a strategy to a firm state.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct EffectiveFirm {
    /// Package size after the strategy (grams).
    pub package_size_g: Decimal,
    /// Production cost after the strategy (rupees).
    pub production_cost: Decimal,
}

impl FirmState {
    /// Production cost with the missing-value default applied (50% of price).
    pub fn production_cost_or_default(&self) -> Decimal {
        self.production_cost
            .unwrap_or_else(|| self.price * Decimal::new(5, 1))
    }

    /// Package and cost under a strategy. A shrink trims the package by 5%
    /// and the unit cost by 3%; a maintain changes neither.
    ///
    /// The effective package size does not enter the base payoff formula;
    /// only the cost side does, with the package delta surfacing through
    /// consumer awareness instead. Callers must not wire the size back in.
    pub fn under_strategy(&self, strategy: Strategy) -> EffectiveFirm {
        let cost = self.production_cost_or_default();
        match strategy {
            Strategy::Maintain => EffectiveFirm {
                package_size_g: self.package_size_g,
                production_cost: cost,
            },
            Strategy::Shrink => EffectiveFirm {
                package_size_g: self.package_size_g * Decimal::new(95, 2),
                production_cost: cost * Decimal::new(97, 2),
            },
        }
    }
}

/// Shared market conditions for one year.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MarketSnapshot {
    /// Annual inflation in percent.
    pub inflation_rate_pct: f64,
    /// Sugar price index (base year = 100).
    pub sugar_price_index: f64,
    /// Wheat price index (base year = 100).
    pub wheat_price_index: f64,
    /// Packaging material price index (base year = 100).
    pub packaging_price_index: f64,
    /// Consumer price sensitivity on a 1–10 scale.
    pub consumer_price_sensitivity: f64,
    /// Competitive intensity on a 1–10 scale.
    pub competition_intensity: f64,
}

/// Consumer-behavior indicators for one year.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ConsumerSnapshot {
    /// Share of consumers aware of shrinkflation, in [0, 100].
    pub shrinkflation_awareness_pct: f64,
    /// Brand loyalty per firm on a 0–10 scale, in [`Firm::ALL`] order.
    /// Missing entries default to 7.0 at the point of use.
    pub brand_loyalty: [Option<f64>; 3],
    /// How strongly price outweighs quantity in purchase decisions.
    pub price_vs_quantity_importance: f64,
}

impl ConsumerSnapshot {
    /// Effective brand loyalty for a firm (0–10), defaulting to 7.0.
    pub fn loyalty_of(&self, firm: Firm) -> f64 {
        self.brand_loyalty[firm.index()].unwrap_or(7.0)
    }
}

/// Macro-economic indicators for one year.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct EconomicSnapshot {
    /// GDP growth rate in percent.
    pub gdp_growth_rate_pct: f64,
    /// Unemployment rate in percent.
    pub unemployment_rate_pct: f64,
    /// Consumer confidence index in [0, 100], centered conceptually on 70.
    pub consumer_confidence_index: f64,
}

/// The full input bundle for one year's analysis: all three firm states in
/// [`Firm::ALL`] order plus the shared snapshots. Passed by value through
/// the engine; scenario simulation perturbs a clone.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct YearSnapshot {
    /// Firm states in [`Firm::ALL`] order.
    pub firms: [FirmState; 3],
    /// Shared market conditions.
    pub market: MarketSnapshot,
    /// Shared consumer-behavior indicators.
    pub consumer: ConsumerSnapshot,
    /// Shared macro-economic indicators.
    pub economic: EconomicSnapshot,
}

impl YearSnapshot {
    /// The state of one firm.
    pub fn firm(&self, firm: Firm) -> &FirmState {
        &self.firms[firm.index()]
    }
}

/// Validation errors for domain invariants, reported at ingest boundaries.
/// The payoff path itself clamps out-of-range values instead of rejecting.
#[derive(Debug, Error, PartialEq)]
pub enum ValidationError {
    /// Package size must be strictly positive.
    #[error("package size must be > 0")]
    NonPositiveSize,
    /// Price must be strictly positive.
    #[error("price must be > 0")]
    NonPositivePrice,
    /// Production cost, when present, must be strictly positive.
    #[error("production cost must be > 0 when present")]
    NonPositiveCost,
    /// Market share must lie within [0, 100].
    #[error("market share {0} is out of [0, 100]")]
    ShareOutOfRange(f64),
    /// A bounded score or index left its documented range.
    #[error("{field} value {value} is out of [{min}, {max}]")]
    ScoreOutOfRange {
        /// Name of the offending field.
        field: &'static str,
        /// The rejected value.
        value: f64,
        /// Lower bound, inclusive.
        min: f64,
        /// Upper bound, inclusive.
        max: f64,
    },
    /// A price index must be non-negative.
    #[error("{0} must be >= 0")]
    NegativeIndex(&'static str),
    /// Numeric field must be finite.
    #[error("non-finite numeric value encountered")]
    NonFinite,
    /// A firm state sits at the wrong roster position.
    #[error("firm {found} found at roster position of {expected}")]
    MisplacedFirm {
        /// The firm expected at this position.
        expected: Firm,
        /// The firm actually found.
        found: Firm,
    },
}

fn check_range(
    field: &'static str,
    value: f64,
    min: f64,
    max: f64,
) -> Result<(), ValidationError> {
    if !value.is_finite() {
        return Err(ValidationError::NonFinite);
    }
    if !(min..=max).contains(&value) {
        return Err(ValidationError::ScoreOutOfRange {
            field,
            value,
            min,
            max,
        });
    }
    Ok(())
}

/// Validate one firm state. `price > production_cost` is not checked; a
/// negative margin is a valid input the engine clamps.
pub fn validate_firm_state(state: &FirmState) -> Result<(), ValidationError> {
    if state.package_size_g <= Decimal::ZERO {
        return Err(ValidationError::NonPositiveSize);
    }
    if state.price <= Decimal::ZERO {
        return Err(ValidationError::NonPositivePrice);
    }
    if let Some(cost) = state.production_cost {
        if cost <= Decimal::ZERO {
            return Err(ValidationError::NonPositiveCost);
        }
    }
    if !state.market_share_pct.is_finite() {
        return Err(ValidationError::NonFinite);
    }
    if !(0.0..=100.0).contains(&state.market_share_pct) {
        return Err(ValidationError::ShareOutOfRange(state.market_share_pct));
    }
    Ok(())
}

fn check_index(field: &'static str, value: f64) -> Result<(), ValidationError> {
    if !value.is_finite() {
        return Err(ValidationError::NonFinite);
    }
    if value < 0.0 {
        return Err(ValidationError::NegativeIndex(field));
    }
    Ok(())
}

/// Validate a market snapshot.
pub fn validate_market(market: &MarketSnapshot) -> Result<(), ValidationError> {
    if !market.inflation_rate_pct.is_finite() {
        return Err(ValidationError::NonFinite);
    }
    check_index("sugar_price_index", market.sugar_price_index)?;
    check_index("wheat_price_index", market.wheat_price_index)?;
    check_index("packaging_price_index", market.packaging_price_index)?;
    check_range(
        "consumer_price_sensitivity",
        market.consumer_price_sensitivity,
        1.0,
        10.0,
    )?;
    check_range(
        "competition_intensity",
        market.competition_intensity,
        1.0,
        10.0,
    )?;
    Ok(())
}

/// Validate a consumer snapshot.
pub fn validate_consumer(consumer: &ConsumerSnapshot) -> Result<(), ValidationError> {
    check_range(
        "shrinkflation_awareness_pct",
        consumer.shrinkflation_awareness_pct,
        0.0,
        100.0,
    )?;
    for loyalty in consumer.brand_loyalty.iter().flatten() {
        check_range("brand_loyalty", *loyalty, 0.0, 10.0)?;
    }
    if !consumer.price_vs_quantity_importance.is_finite() {
        return Err(ValidationError::NonFinite);
    }
    Ok(())
}

/// Validate an economic snapshot.
pub fn validate_economic(economic: &EconomicSnapshot) -> Result<(), ValidationError> {
    if !economic.gdp_growth_rate_pct.is_finite() || !economic.unemployment_rate_pct.is_finite() {
        return Err(ValidationError::NonFinite);
    }
    check_range(
        "consumer_confidence_index",
        economic.consumer_confidence_index,
        0.0,
        100.0,
    )?;
    Ok(())
}

/// Validate a full year snapshot, including that the firm states sit at
/// their canonical roster positions.
pub fn validate_year_snapshot(snapshot: &YearSnapshot) -> Result<(), ValidationError> {
    for (expected, state) in Firm::ALL.iter().zip(snapshot.firms.iter()) {
        if state.firm != *expected {
            return Err(ValidationError::MisplacedFirm {
                expected: *expected,
                found: state.firm,
            });
        }
        validate_firm_state(state)?;
    }
    validate_market(&snapshot.market)?;
    validate_consumer(&snapshot.consumer)?;
    validate_economic(&snapshot.economic)?;
    Ok(())
}
