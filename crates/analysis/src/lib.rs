#![deny(warnings)]

//! Analysis layer: derived firm metrics, threshold-driven insights, scenario
//! simulation, and the [`Analyst`] orchestrator that ties the payoff engine
//! to a [`DataStore`].
//!
//! The orchestrator is the sole entry point for external callers (API
//! layer, CLI). Everything below it is a pure function of its inputs; the
//! orchestrator itself owns the two impure touches, the record timestamp
//! and the keyed upsert into the store.

use chrono::{DateTime, Utc};
use game_theory::{
    build_cube, find_equilibria, Equilibrium, PayoffCube, PayoffPolicy, Recommendations,
};
use market_core::{
    ConsumerSnapshot, EconomicSnapshot, Firm, FirmState, MarketSnapshot, Strategy, YearSnapshot,
};
use rust_decimal::prelude::FromPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use thiserror::Error;

/// Errors reported by the orchestrator.
#[derive(Debug, Error, PartialEq)]
pub enum AnalysisError {
    /// One of the four required snapshot groups is missing for the year.
    /// The pipeline refuses to compute a partial result.
    #[error("no data available for year {year}")]
    NoData {
        /// The requested year.
        year: i32,
    },
}

/// Storage port the orchestrator calls through. Implementations live
/// outside the core (see the `persistence` crate); the core never touches
/// a database or file directly.
pub trait DataStore {
    /// One firm's state for one year, if stored.
    fn firm_state(&self, firm: Firm, year: i32) -> Option<FirmState>;
    /// Market snapshot for one year, if stored.
    fn market(&self, year: i32) -> Option<MarketSnapshot>;
    /// Consumer snapshot for one year, if stored.
    fn consumer(&self, year: i32) -> Option<ConsumerSnapshot>;
    /// Economic snapshot for one year, if stored.
    fn economic(&self, year: i32) -> Option<EconomicSnapshot>;
    /// Years with any stored firm state, ascending.
    fn years(&self) -> Vec<i32>;
    /// The stored analysis record for one year, if any.
    fn analysis(&self, year: i32) -> Option<AnalysisRecord>;
    /// Insert or replace the analysis record for `record.year`.
    fn upsert_analysis(&mut self, record: AnalysisRecord);
}

/// Derived per-firm figures published alongside the equilibrium outcome.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FirmMetrics {
    /// Which firm the figures describe.
    pub firm: Firm,
    /// Package size this year (grams).
    pub current_size_g: Decimal,
    /// Retail price this year (rupees).
    pub current_price: Decimal,
    /// Package size change vs the prior year, percent, 1 dp. Zero when no
    /// prior-year state is stored.
    pub size_change_pct: Decimal,
    /// Price change vs the prior year, percent, 1 dp. Zero when no
    /// prior-year state is stored.
    pub price_change_pct: Decimal,
    /// Profit margin percent, 1 dp, with the missing-cost default applied.
    pub profit_margin_pct: Decimal,
    /// Market share percent, as stored.
    pub market_share_pct: f64,
    /// Price per 100 g, rupees, 2 dp.
    pub price_per_100g: Decimal,
    /// Effective production cost (rupees), with the default applied.
    pub production_cost: Decimal,
    /// Recommended strategy from the equilibrium outcome.
    pub recommendation: Strategy,
}

fn pct_change(current: Decimal, previous: Option<Decimal>) -> Decimal {
    match previous {
        Some(prev) if !prev.is_zero() => {
            ((current - prev) / prev * Decimal::new(100, 0)).round_dp(1)
        }
        _ => Decimal::ZERO,
    }
}

/// Derive one firm's metrics from its stored state, the prior-year state
/// when available, and the recommendation read off the equilibrium.
pub fn firm_metrics(
    state: &FirmState,
    previous: Option<&FirmState>,
    recommendation: Strategy,
) -> FirmMetrics {
    let production_cost = state.production_cost_or_default();
    let profit_margin_pct = if state.price.is_zero() {
        Decimal::ZERO
    } else {
        ((state.price - production_cost) / state.price * Decimal::new(100, 0)).round_dp(1)
    };
    let price_per_100g = if state.package_size_g.is_zero() {
        Decimal::ZERO
    } else {
        (state.price / state.package_size_g * Decimal::new(100, 0)).round_dp(2)
    };
    FirmMetrics {
        firm: state.firm,
        current_size_g: state.package_size_g,
        current_price: state.price,
        size_change_pct: pct_change(state.package_size_g, previous.map(|p| p.package_size_g)),
        price_change_pct: pct_change(state.price, previous.map(|p| p.price)),
        profit_margin_pct,
        market_share_pct: state.market_share_pct,
        price_per_100g,
        production_cost,
        recommendation,
    }
}

/// Threshold-driven observations over the snapshots and the equilibrium
/// outcome. Each rule independently appends zero or one string. The
/// price-per-unit comparison always fires; if somehow no rule fired, a
/// generic monitoring note is emitted, so the list is never empty.
pub fn generate_insights(
    metrics: &[FirmMetrics; 3],
    market: &MarketSnapshot,
    consumer: &ConsumerSnapshot,
    economic: &EconomicSnapshot,
    equilibria: &[Equilibrium],
) -> Vec<String> {
    let mut insights = Vec::new();

    let awareness = consumer.shrinkflation_awareness_pct;
    if awareness > 50.0 {
        insights.push(format!(
            "High consumer awareness of shrinkflation ({awareness}%) is making shrinkflation \
             strategies riskier, especially for companies with lower brand loyalty."
        ));
    } else {
        insights.push(format!(
            "Low consumer awareness of shrinkflation ({awareness}%) creates an opportunity for \
             companies to implement shrinkflation with minimal market share impact."
        ));
    }

    let confidence = economic.consumer_confidence_index;
    if confidence < 65.0 {
        insights.push(format!(
            "Low consumer confidence ({confidence}) is making consumers more price-sensitive, \
             potentially favoring shrinkflation over price increases."
        ));
    } else {
        insights.push(format!(
            "Strong consumer confidence ({confidence}) suggests consumers may be less sensitive \
             to package size changes."
        ));
    }

    let loyalties = Firm::ALL.map(|firm| consumer.loyalty_of(firm));
    let max_loyalty = loyalties.iter().cloned().fold(f64::MIN, f64::max);
    let min_loyalty = loyalties.iter().cloned().fold(f64::MAX, f64::min);
    if max_loyalty - min_loyalty > 1.5 {
        insights.push(
            "Significant differences in brand loyalty between companies suggest different \
             optimal strategies for each company."
                .to_string(),
        );
    }

    if equilibria.len() > 1 {
        insights.push(
            "Multiple Nash equilibria indicate market uncertainty. Companies should monitor \
             competitors' actions closely."
                .to_string(),
        );
    } else if let Some(first) = equilibria.first() {
        let description = first.to_string().to_lowercase();
        if description.contains("shrink") && description.contains("maintain") {
            insights.push(
                "Mixed Nash equilibrium suggests a market in transition, with some companies \
                 benefiting from shrinkflation while others should maintain sizes."
                    .to_string(),
            );
        }
    }

    if market.sugar_price_index > 130.0 || market.wheat_price_index > 130.0 {
        insights.push(
            "High raw material costs are putting pressure on profit margins, making \
             shrinkflation an attractive strategy to maintain profitability."
                .to_string(),
        );
    }

    let mut highest = &metrics[0];
    let mut lowest = &metrics[0];
    for m in &metrics[1..] {
        if m.price_per_100g > highest.price_per_100g {
            highest = m;
        }
        if m.price_per_100g < lowest.price_per_100g {
            lowest = m;
        }
    }
    insights.push(format!(
        "{} has the highest price per unit (₹{} per 100ml/g), while {} has the lowest \
         (₹{} per 100ml/g).",
        highest.firm, highest.price_per_100g, lowest.firm, lowest.price_per_100g
    ));

    if insights.is_empty() {
        insights.push(
            "Analysis suggests monitoring market conditions closely for optimal shrinkflation \
             strategy."
                .to_string(),
        );
    }

    insights
}

/// A declarative perturbation applied to a copy of one year's snapshot
/// before the simulation-variant pipeline reruns.
///
/// Unrecognized `type` tags deserialize to [`Scenario::Unchanged`], which
/// applies nothing: an inert no-op rather than an error.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Scenario {
    /// Shift shrinkflation awareness by a signed delta, clamped to [0, 100].
    ConsumerAwareness {
        /// Signed awareness delta in percentage points.
        change: f64,
    },
    /// Depress GDP growth and consumer confidence, raise price sensitivity.
    EconomicDownturn {
        /// Shock severity; confidence drops ten times this amount.
        severity: f64,
    },
    /// Shift raw-material indices (amplified 1.5×) and scale production
    /// costs by `1 + change/100`.
    RawMaterialCost {
        /// Signed raw-material cost change in percent.
        change: f64,
    },
    /// Force one firm's packaging posture ahead of the rerun. A forced
    /// shrink is steeper than the in-model shrink: size ×0.90, cost ×0.94.
    CompetitorStrategy {
        /// The firm whose posture is forced.
        company: Firm,
        /// The forced strategy.
        strategy: Strategy,
    },
    /// Unknown scenario type: the snapshot passes through unmodified.
    #[serde(other)]
    Unchanged,
}

impl Scenario {
    /// Apply this perturbation in place. Callers hand in a clone of the
    /// base snapshot; the original year's records are never touched.
    pub fn apply(&self, snapshot: &mut YearSnapshot) {
        match self {
            Scenario::ConsumerAwareness { change } => {
                let consumer = &mut snapshot.consumer;
                consumer.shrinkflation_awareness_pct =
                    (consumer.shrinkflation_awareness_pct + change).clamp(0.0, 100.0);
            }
            Scenario::EconomicDownturn { severity } => {
                let economic = &mut snapshot.economic;
                economic.gdp_growth_rate_pct = (economic.gdp_growth_rate_pct - severity).max(0.0);
                economic.consumer_confidence_index =
                    (economic.consumer_confidence_index - severity * 10.0).max(0.0);
                let market = &mut snapshot.market;
                market.consumer_price_sensitivity =
                    (market.consumer_price_sensitivity + severity).min(10.0);
            }
            Scenario::RawMaterialCost { change } => {
                let market = &mut snapshot.market;
                let bump = change * 1.5;
                market.sugar_price_index = (market.sugar_price_index + bump).max(0.0);
                market.wheat_price_index = (market.wheat_price_index + bump).max(0.0);
                market.packaging_price_index = (market.packaging_price_index + bump).max(0.0);
                // Non-finite change leaves costs untouched.
                let scale = Decimal::from_f64(1.0 + change / 100.0).unwrap_or(Decimal::ONE);
                for firm in &mut snapshot.firms {
                    firm.production_cost = Some(match firm.production_cost {
                        Some(cost) => cost * scale,
                        // A previously unrecorded cost materializes at the
                        // default and is not scaled.
                        None => firm.price * Decimal::new(5, 1),
                    });
                }
            }
            Scenario::CompetitorStrategy { company, strategy } => {
                let state = &mut snapshot.firms[company.index()];
                match strategy {
                    Strategy::Shrink => {
                        state.package_size_g *= Decimal::new(90, 2);
                        state.production_cost = Some(match state.production_cost {
                            Some(cost) => cost * Decimal::new(94, 2),
                            None => state.price * Decimal::new(47, 2),
                        });
                    }
                    Strategy::Maintain => {
                        // Size and cost stay put; only make sure the cost
                        // field is populated.
                        state.production_cost = Some(state.production_cost_or_default());
                    }
                }
            }
            Scenario::Unchanged => {}
        }
    }
}

/// One year's persisted analysis output. Keyed by year in the store with
/// upsert semantics: exactly one record per year, last writer wins.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AnalysisRecord {
    /// The analyzed year.
    pub year: i32,
    /// When the record was computed.
    pub computed_at: DateTime<Utc>,
    /// Equilibrium outcome, never empty.
    pub equilibria: Vec<Equilibrium>,
    /// Full payoff cube under the base policy.
    pub cube: PayoffCube,
    /// Per-firm derived figures, in [`Firm::ALL`] order.
    pub firm_metrics: [FirmMetrics; 3],
    /// Market snapshot the analysis ran on.
    pub market: MarketSnapshot,
    /// Consumer snapshot the analysis ran on.
    pub consumer: ConsumerSnapshot,
    /// Economic snapshot the analysis ran on.
    pub economic: EconomicSnapshot,
    /// Generated observations, never empty.
    pub insights: Vec<String>,
}

/// Outcome of one scenario rerun. Transient: never persisted, and no
/// insights are regenerated for simulated conditions.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SimulationResult {
    /// The perturbation that produced this outcome.
    pub scenario: Scenario,
    /// Equilibrium outcome under the simulation policy, never empty.
    pub equilibria: Vec<Equilibrium>,
    /// Per-firm recommendations read off the first equilibrium.
    pub recommendations: Recommendations,
    /// Full payoff cube under the simulation policy.
    pub cube: PayoffCube,
}

/// Which per-firm series to derive from stored firm states.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SeriesField {
    /// Package size in grams.
    Size,
    /// Retail price in rupees.
    Price,
    /// Price per 100 g.
    PricePerUnit,
    /// Market share percent.
    MarketShare,
    /// Profit margin percent.
    ProfitMargin,
}

/// Error for unrecognized series field names.
#[derive(Debug, Error, PartialEq)]
#[error("unknown series field: {0}")]
pub struct UnknownSeriesField(pub String);

impl FromStr for SeriesField {
    type Err = UnknownSeriesField;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "size" => Ok(SeriesField::Size),
            "price" => Ok(SeriesField::Price),
            // "ratio" is the historical name of the per-unit series.
            "price-per-unit" | "ratio" => Ok(SeriesField::PricePerUnit),
            "market-share" => Ok(SeriesField::MarketShare),
            "profit-margin" => Ok(SeriesField::ProfitMargin),
            other => Err(UnknownSeriesField(other.to_string())),
        }
    }
}

/// One year's values for all three firms, in [`Firm::ALL`] order. A firm
/// with no stored state for the year carries `None`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SeriesPoint {
    /// The year the values belong to.
    pub year: i32,
    /// Per-firm values in [`Firm::ALL`] order.
    pub values: [Option<f64>; 3],
}

fn series_value(state: &FirmState, field: SeriesField) -> Option<f64> {
    use rust_decimal::prelude::ToPrimitive;
    match field {
        SeriesField::Size => state.package_size_g.to_f64(),
        SeriesField::Price => state.price.to_f64(),
        SeriesField::PricePerUnit => {
            if state.package_size_g.is_zero() {
                None
            } else {
                (state.price / state.package_size_g * Decimal::new(100, 0))
                    .round_dp(2)
                    .to_f64()
            }
        }
        SeriesField::MarketShare => Some(state.market_share_pct),
        SeriesField::ProfitMargin => {
            if state.price.is_zero() {
                None
            } else {
                ((state.price - state.production_cost_or_default()) / state.price
                    * Decimal::new(100, 0))
                .round_dp(1)
                .to_f64()
            }
        }
    }
}

/// The analysis orchestrator: loads snapshots through the [`DataStore`]
/// port, runs the engine, and upserts one [`AnalysisRecord`] per year.
pub struct Analyst<S> {
    store: S,
}

impl<S: DataStore> Analyst<S> {
    /// Wrap a store.
    pub fn new(store: S) -> Self {
        Analyst { store }
    }

    /// Read access to the underlying store.
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Unwrap the underlying store.
    pub fn into_store(self) -> S {
        self.store
    }

    fn load_snapshot(&self, year: i32) -> Result<YearSnapshot, AnalysisError> {
        let missing = || AnalysisError::NoData { year };
        let milk_bikis = self
            .store
            .firm_state(Firm::MilkBikis, year)
            .ok_or_else(missing)?;
        let good_day = self
            .store
            .firm_state(Firm::GoodDay, year)
            .ok_or_else(missing)?;
        let parle_g = self
            .store
            .firm_state(Firm::ParleG, year)
            .ok_or_else(missing)?;
        let market = self.store.market(year).ok_or_else(missing)?;
        let consumer = self.store.consumer(year).ok_or_else(missing)?;
        let economic = self.store.economic(year).ok_or_else(missing)?;
        Ok(YearSnapshot {
            firms: [milk_bikis, good_day, parle_g],
            market,
            consumer,
            economic,
        })
    }

    /// Run the full pipeline for one year and upsert the result.
    ///
    /// Fails with [`AnalysisError::NoData`] when any of the four snapshot
    /// groups is absent; a partial analysis is never computed.
    pub fn run_analysis(&mut self, year: i32) -> Result<AnalysisRecord, AnalysisError> {
        let snapshot = self.load_snapshot(year)?;
        tracing::info!(year, "running strategy analysis");

        let cube = build_cube(&snapshot, &PayoffPolicy::BASE);
        let equilibria = find_equilibria(&cube);
        let recommendations = Recommendations::from_equilibria(&equilibria);

        let firm_metrics = Firm::ALL.map(|firm| {
            let previous = self.store.firm_state(firm, year - 1);
            firm_metrics(
                snapshot.firm(firm),
                previous.as_ref(),
                recommendations.for_firm(firm),
            )
        });

        let insights = generate_insights(
            &firm_metrics,
            &snapshot.market,
            &snapshot.consumer,
            &snapshot.economic,
            &equilibria,
        );

        let record = AnalysisRecord {
            year,
            computed_at: Utc::now(),
            equilibria,
            cube,
            firm_metrics,
            market: snapshot.market,
            consumer: snapshot.consumer,
            economic: snapshot.economic,
            insights,
        };
        self.store.upsert_analysis(record.clone());
        Ok(record)
    }

    /// The stored record for a year, computing and persisting it first if
    /// absent.
    pub fn get_or_run_analysis(&mut self, year: i32) -> Result<AnalysisRecord, AnalysisError> {
        match self.store.analysis(year) {
            Some(record) => Ok(record),
            None => self.run_analysis(year),
        }
    }

    /// Rerun the engine once per scenario against independently perturbed
    /// copies of the year's snapshot, under the simulation policy. Nothing
    /// is persisted and scenarios do not compose.
    pub fn simulate(
        &self,
        year: i32,
        scenarios: &[Scenario],
    ) -> Result<Vec<SimulationResult>, AnalysisError> {
        let base = self.load_snapshot(year)?;
        tracing::debug!(year, scenarios = scenarios.len(), "simulating scenarios");
        Ok(scenarios
            .iter()
            .map(|scenario| {
                let mut snapshot = base.clone();
                scenario.apply(&mut snapshot);
                let cube = build_cube(&snapshot, &PayoffPolicy::SIMULATION);
                let equilibria = find_equilibria(&cube);
                let recommendations = Recommendations::from_equilibria(&equilibria);
                SimulationResult {
                    scenario: scenario.clone(),
                    equilibria,
                    recommendations,
                    cube,
                }
            })
            .collect())
    }

    /// A per-firm time series over all stored years, derived from firm
    /// states (not from analysis records).
    pub fn historical_series(&self, field: SeriesField) -> Vec<SeriesPoint> {
        self.store
            .years()
            .into_iter()
            .map(|year| SeriesPoint {
                year,
                values: Firm::ALL.map(|firm| {
                    self.store
                        .firm_state(firm, year)
                        .as_ref()
                        .and_then(|state| series_value(state, field))
                }),
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use market_core::Strategy;
    use game_theory::EquilibriumKind;
    use market_core::StrategyProfile;
    use proptest::prelude::*;
    use std::collections::{BTreeMap, HashMap};

    #[derive(Default)]
    struct TestStore {
        firms: HashMap<(Firm, i32), FirmState>,
        market: HashMap<i32, MarketSnapshot>,
        consumer: HashMap<i32, ConsumerSnapshot>,
        economic: HashMap<i32, EconomicSnapshot>,
        analyses: BTreeMap<i32, AnalysisRecord>,
    }

    impl DataStore for TestStore {
        fn firm_state(&self, firm: Firm, year: i32) -> Option<FirmState> {
            self.firms.get(&(firm, year)).cloned()
        }
        fn market(&self, year: i32) -> Option<MarketSnapshot> {
            self.market.get(&year).cloned()
        }
        fn consumer(&self, year: i32) -> Option<ConsumerSnapshot> {
            self.consumer.get(&year).cloned()
        }
        fn economic(&self, year: i32) -> Option<EconomicSnapshot> {
            self.economic.get(&year).cloned()
        }
        fn years(&self) -> Vec<i32> {
            let mut years: Vec<i32> = self.firms.keys().map(|(_, y)| *y).collect();
            years.sort_unstable();
            years.dedup();
            years
        }
        fn analysis(&self, year: i32) -> Option<AnalysisRecord> {
            self.analyses.get(&year).cloned()
        }
        fn upsert_analysis(&mut self, record: AnalysisRecord) {
            self.analyses.insert(record.year, record);
        }
    }

    fn firm_state(firm: Firm, size: i64, price: i64, cost_tenths: i64, share: f64) -> FirmState {
        FirmState {
            firm,
            package_size_g: Decimal::new(size, 0),
            price: Decimal::new(price, 0),
            production_cost: Some(Decimal::new(cost_tenths, 1)),
            market_share_pct: share,
        }
    }

    fn market() -> MarketSnapshot {
        MarketSnapshot {
            inflation_rate_pct: 5.2,
            sugar_price_index: 142.0,
            wheat_price_index: 148.0,
            packaging_price_index: 130.0,
            consumer_price_sensitivity: 8.2,
            competition_intensity: 8.3,
        }
    }

    fn consumer() -> ConsumerSnapshot {
        ConsumerSnapshot {
            shrinkflation_awareness_pct: 65.0,
            brand_loyalty: [Some(7.2), Some(6.3), Some(7.7)],
            price_vs_quantity_importance: 1.2,
        }
    }

    fn economic() -> EconomicSnapshot {
        EconomicSnapshot {
            gdp_growth_rate_pct: 6.1,
            unemployment_rate_pct: 5.5,
            consumer_confidence_index: 68.0,
        }
    }

    fn snapshot() -> YearSnapshot {
        YearSnapshot {
            firms: [
                firm_state(Firm::MilkBikis, 130, 24, 99, 45.0),
                firm_state(Firm::GoodDay, 90, 10, 40, 31.0),
                firm_state(Firm::ParleG, 80, 5, 23, 25.0),
            ],
            market: market(),
            consumer: consumer(),
            economic: economic(),
        }
    }

    fn seeded_store() -> TestStore {
        let mut store = TestStore::default();
        let snap = snapshot();
        for state in snap.firms {
            store.firms.insert((state.firm, 2023), state);
        }
        // Prior year for delta checks.
        store.firms.insert(
            (Firm::MilkBikis, 2022),
            firm_state(Firm::MilkBikis, 135, 22, 97, 45.0),
        );
        store.market.insert(2023, snap.market);
        store.consumer.insert(2023, snap.consumer);
        store.economic.insert(2023, snap.economic);
        store
    }

    fn nash(profile_index: usize) -> Equilibrium {
        Equilibrium {
            profile: StrategyProfile::ALL[profile_index],
            kind: EquilibriumKind::Nash,
        }
    }

    // ── metrics ──────────────────────────────────────────────────────────

    #[test]
    fn metrics_compute_deltas_against_prior_year() {
        let current = firm_state(Firm::MilkBikis, 130, 24, 99, 45.0);
        let previous = firm_state(Firm::MilkBikis, 135, 22, 97, 45.0);
        let m = firm_metrics(&current, Some(&previous), Strategy::Shrink);
        assert_eq!(m.size_change_pct, Decimal::new(-37, 1)); // -3.7
        assert_eq!(m.price_change_pct, Decimal::new(91, 1)); // 9.1
        assert_eq!(m.profit_margin_pct, Decimal::new(588, 1)); // (24-9.9)/24
        assert_eq!(m.price_per_100g, Decimal::new(1846, 2)); // 24/130*100
        assert_eq!(m.recommendation, Strategy::Shrink);
    }

    #[test]
    fn metrics_missing_prior_year_yields_zero_deltas() {
        let current = firm_state(Firm::GoodDay, 90, 10, 40, 31.0);
        let m = firm_metrics(&current, None, Strategy::Maintain);
        assert_eq!(m.size_change_pct, Decimal::ZERO);
        assert_eq!(m.price_change_pct, Decimal::ZERO);
    }

    #[test]
    fn metrics_default_missing_cost() {
        let mut current = firm_state(Firm::ParleG, 80, 6, 0, 25.0);
        current.production_cost = None;
        let m = firm_metrics(&current, None, Strategy::Maintain);
        assert_eq!(m.production_cost, Decimal::new(3, 0));
        assert_eq!(m.profit_margin_pct, Decimal::new(500, 1)); // 50.0
    }

    // ── insights ─────────────────────────────────────────────────────────

    fn base_metrics() -> [FirmMetrics; 3] {
        let snap = snapshot();
        [
            firm_metrics(&snap.firms[0], None, Strategy::Maintain),
            firm_metrics(&snap.firms[1], None, Strategy::Maintain),
            firm_metrics(&snap.firms[2], None, Strategy::Maintain),
        ]
    }

    #[test]
    fn insight_awareness_threshold_swaps_note() {
        let mut cons = consumer();
        let high = generate_insights(
            &base_metrics(),
            &market(),
            &cons,
            &economic(),
            &[nash(0)],
        );
        assert!(high[0].starts_with("High consumer awareness of shrinkflation (65%)"));

        cons.shrinkflation_awareness_pct = 38.0;
        let low = generate_insights(
            &base_metrics(),
            &market(),
            &cons,
            &economic(),
            &[nash(0)],
        );
        assert!(low[0].starts_with("Low consumer awareness of shrinkflation (38%)"));
    }

    #[test]
    fn insight_confidence_threshold_swaps_note() {
        let mut econ = economic();
        econ.consumer_confidence_index = 58.0;
        let low = generate_insights(&base_metrics(), &market(), &consumer(), &econ, &[nash(0)]);
        assert!(low[1].starts_with("Low consumer confidence (58)"));

        econ.consumer_confidence_index = 75.0;
        let high = generate_insights(&base_metrics(), &market(), &consumer(), &econ, &[nash(0)]);
        assert!(high[1].starts_with("Strong consumer confidence (75)"));
    }

    #[test]
    fn insight_loyalty_spread_fires_above_threshold() {
        // Spread here is 7.7 - 6.3 = 1.4: silent.
        let quiet = generate_insights(
            &base_metrics(),
            &market(),
            &consumer(),
            &economic(),
            &[nash(0)],
        );
        assert!(!quiet
            .iter()
            .any(|i| i.starts_with("Significant differences in brand loyalty")));

        let mut cons = consumer();
        cons.brand_loyalty[Firm::GoodDay.index()] = Some(5.5);
        let fired = generate_insights(&base_metrics(), &market(), &cons, &economic(), &[nash(0)]);
        assert!(fired
            .iter()
            .any(|i| i.starts_with("Significant differences in brand loyalty")));
    }

    #[test]
    fn insight_multiple_equilibria_beats_mixed_note() {
        let many = generate_insights(
            &base_metrics(),
            &market(),
            &consumer(),
            &economic(),
            &[nash(0), nash(7)],
        );
        assert!(many.iter().any(|i| i.contains("Multiple Nash equilibria")));
        assert!(!many.iter().any(|i| i.contains("market in transition")));
    }

    #[test]
    fn insight_mixed_equilibrium_note() {
        // Profile 2 mixes shrink and maintain across firms.
        let mixed = generate_insights(
            &base_metrics(),
            &market(),
            &consumer(),
            &economic(),
            &[nash(2)],
        );
        assert!(mixed.iter().any(|i| i.contains("market in transition")));

        let uniform = generate_insights(
            &base_metrics(),
            &market(),
            &consumer(),
            &economic(),
            &[nash(0)],
        );
        assert!(!uniform.iter().any(|i| i.contains("market in transition")));
    }

    #[test]
    fn insight_raw_material_pressure() {
        let fired = generate_insights(
            &base_metrics(),
            &market(),
            &consumer(),
            &economic(),
            &[nash(0)],
        );
        assert!(fired.iter().any(|i| i.starts_with("High raw material costs")));

        let mut calm = market();
        calm.sugar_price_index = 110.0;
        calm.wheat_price_index = 112.0;
        let silent = generate_insights(&base_metrics(), &calm, &consumer(), &economic(), &[nash(0)]);
        assert!(!silent.iter().any(|i| i.contains("High raw material costs")));
    }

    #[test]
    fn insight_price_per_unit_always_present() {
        let insights = generate_insights(
            &base_metrics(),
            &market(),
            &consumer(),
            &economic(),
            &[nash(0)],
        );
        let last = insights.last().unwrap();
        // Milk Bikis: 24/130*100 = 18.46; Good Day: 11.11; Parle G: 6.25.
        assert_eq!(
            last,
            "Milk Bikis has the highest price per unit (₹18.46 per 100ml/g), while Parle G \
             has the lowest (₹6.25 per 100ml/g)."
        );
    }

    // ── scenarios ────────────────────────────────────────────────────────

    #[test]
    fn awareness_scenario_clamps_to_bounds() {
        let mut snap = snapshot();
        Scenario::ConsumerAwareness { change: 80.0 }.apply(&mut snap);
        assert_eq!(snap.consumer.shrinkflation_awareness_pct, 100.0);

        let mut snap = snapshot();
        Scenario::ConsumerAwareness { change: -90.0 }.apply(&mut snap);
        assert_eq!(snap.consumer.shrinkflation_awareness_pct, 0.0);
    }

    #[test]
    fn downturn_scenario_floors_and_ceilings() {
        let mut snap = snapshot();
        Scenario::EconomicDownturn { severity: 3.0 }.apply(&mut snap);
        assert!((snap.economic.gdp_growth_rate_pct - 3.1).abs() < 1e-9);
        assert_eq!(snap.economic.consumer_confidence_index, 38.0);
        assert_eq!(snap.market.consumer_price_sensitivity, 10.0); // 8.2 + 3 capped

        let mut snap = snapshot();
        Scenario::EconomicDownturn { severity: 20.0 }.apply(&mut snap);
        assert_eq!(snap.economic.gdp_growth_rate_pct, 0.0);
        assert_eq!(snap.economic.consumer_confidence_index, 0.0);
    }

    #[test]
    fn raw_material_scenario_scales_indices_and_costs() {
        let mut snap = snapshot();
        snap.firms[1].production_cost = None; // Good Day's cost is unrecorded
        Scenario::RawMaterialCost { change: 10.0 }.apply(&mut snap);
        assert_eq!(snap.market.sugar_price_index, 157.0); // 142 + 15
        assert_eq!(snap.market.wheat_price_index, 163.0);
        assert_eq!(snap.market.packaging_price_index, 145.0);
        // 9.9 * 1.1 = 10.89
        assert_eq!(snap.firms[0].production_cost, Some(Decimal::new(1089, 2)));
        // Unrecorded cost materializes at the default, unscaled: 10 * 0.5.
        assert_eq!(snap.firms[1].production_cost, Some(Decimal::new(5, 0)));
    }

    #[test]
    fn competitor_scenario_touches_only_named_firm() {
        let base = snapshot();
        let mut snap = base.clone();
        Scenario::CompetitorStrategy {
            company: Firm::GoodDay,
            strategy: Strategy::Shrink,
        }
        .apply(&mut snap);

        // Forced shrink is steeper than the in-model 0.95/0.97.
        assert_eq!(snap.firms[1].package_size_g, Decimal::new(8100, 2)); // 81.00
        assert_eq!(snap.firms[1].production_cost, Some(Decimal::new(376, 2))); // 3.76
        // The other two firms are byte-identical to the base snapshot.
        assert_eq!(snap.firms[0], base.firms[0]);
        assert_eq!(snap.firms[2], base.firms[2]);
        assert_eq!(snap.market, base.market);
    }

    #[test]
    fn competitor_maintain_only_populates_cost() {
        let mut snap = snapshot();
        snap.firms[2].production_cost = None;
        Scenario::CompetitorStrategy {
            company: Firm::ParleG,
            strategy: Strategy::Maintain,
        }
        .apply(&mut snap);
        assert_eq!(snap.firms[2].package_size_g, Decimal::new(80, 0));
        assert_eq!(snap.firms[2].production_cost, Some(Decimal::new(25, 1)));
    }

    #[test]
    fn unknown_scenario_type_is_inert() {
        let parsed: Scenario =
            serde_json::from_str(r#"{"type": "regulatory_cap", "ceiling": 4}"#).unwrap();
        assert_eq!(parsed, Scenario::Unchanged);

        let base = snapshot();
        let mut snap = base.clone();
        parsed.apply(&mut snap);
        assert_eq!(snap, base);
    }

    #[test]
    fn scenario_serde_roundtrip() {
        let scenario = Scenario::CompetitorStrategy {
            company: Firm::ParleG,
            strategy: Strategy::Shrink,
        };
        let json = serde_json::to_string(&scenario).unwrap();
        assert!(json.contains("\"competitor_strategy\""));
        assert!(json.contains("\"Parle G\""));
        let back: Scenario = serde_json::from_str(&json).unwrap();
        assert_eq!(back, scenario);
    }

    // ── orchestrator ─────────────────────────────────────────────────────

    #[test]
    fn run_analysis_produces_and_stores_record() {
        let mut analyst = Analyst::new(seeded_store());
        let record = analyst.run_analysis(2023).unwrap();
        assert_eq!(record.year, 2023);
        assert!(!record.equilibria.is_empty());
        assert!(!record.insights.is_empty());
        // Prior-year deltas only exist for Milk Bikis in the fixture.
        assert_ne!(record.firm_metrics[0].size_change_pct, Decimal::ZERO);
        assert_eq!(record.firm_metrics[1].size_change_pct, Decimal::ZERO);
        let stored = analyst.store().analysis(2023).unwrap();
        assert_eq!(stored, record);
    }

    #[test]
    fn run_analysis_is_deterministic_and_idempotent() {
        let mut analyst = Analyst::new(seeded_store());
        let first = analyst.run_analysis(2023).unwrap();
        let second = analyst.run_analysis(2023).unwrap();
        assert_eq!(first.cube, second.cube);
        assert_eq!(first.equilibria, second.equilibria);
        assert_eq!(first.firm_metrics, second.firm_metrics);
        assert_eq!(first.insights, second.insights);
        // Upsert: still exactly one stored record for the year.
        assert_eq!(analyst.store().analyses.len(), 1);
    }

    #[test]
    fn get_or_run_returns_stored_record_untouched() {
        let mut analyst = Analyst::new(seeded_store());
        let first = analyst.get_or_run_analysis(2023).unwrap();
        let second = analyst.get_or_run_analysis(2023).unwrap();
        // Identical including the timestamp: the second call read the store.
        assert_eq!(first, second);
    }

    #[test]
    fn missing_economic_snapshot_is_no_data() {
        let mut store = seeded_store();
        store.economic.clear();
        let mut analyst = Analyst::new(store);
        assert_eq!(
            analyst.run_analysis(2023),
            Err(AnalysisError::NoData { year: 2023 })
        );
        assert!(analyst.store().analysis(2023).is_none());
    }

    #[test]
    fn simulate_runs_each_scenario_independently_without_persisting() {
        let mut analyst = Analyst::new(seeded_store());
        let base_record = analyst.run_analysis(2023).unwrap();

        let scenarios = vec![
            Scenario::ConsumerAwareness { change: 20.0 },
            Scenario::Unchanged,
        ];
        let results = analyst.simulate(2023, &scenarios).unwrap();
        assert_eq!(results.len(), 2);
        for result in &results {
            assert!(!result.equilibria.is_empty());
        }
        // The inert scenario still reruns under the simulation policy, so
        // its cube need not match the base cube.
        assert_eq!(results[1].scenario, Scenario::Unchanged);
        // Nothing new was persisted.
        assert_eq!(analyst.store().analysis(2023).unwrap(), base_record);
    }

    #[test]
    fn historical_series_skips_missing_years_per_firm() {
        let analyst = Analyst::new(seeded_store());
        let series = analyst.historical_series(SeriesField::Price);
        assert_eq!(series.len(), 2); // 2022 and 2023
        let y2022 = &series[0];
        assert_eq!(y2022.year, 2022);
        assert_eq!(y2022.values[0], Some(22.0));
        assert_eq!(y2022.values[1], None);
        let y2023 = &series[1];
        assert_eq!(y2023.values, [Some(24.0), Some(10.0), Some(5.0)]);
    }

    #[test]
    fn historical_series_derived_fields() {
        let analyst = Analyst::new(seeded_store());
        let per_unit = analyst.historical_series(SeriesField::PricePerUnit);
        // 24 / 130 * 100 = 18.46
        assert_eq!(per_unit[1].values[0], Some(18.46));
        let margin = analyst.historical_series(SeriesField::ProfitMargin);
        // (10 - 4.0) / 10 * 100 = 60.0
        assert_eq!(margin[1].values[1], Some(60.0));
    }

    proptest! {
        #[test]
        fn awareness_scenario_stays_within_bounds(change in -500.0f64..500.0) {
            let mut snap = snapshot();
            Scenario::ConsumerAwareness { change }.apply(&mut snap);
            prop_assert!((0.0..=100.0).contains(&snap.consumer.shrinkflation_awareness_pct));
        }

        #[test]
        fn downturn_scenario_never_overshoots(severity in 0.0f64..50.0) {
            let mut snap = snapshot();
            Scenario::EconomicDownturn { severity }.apply(&mut snap);
            prop_assert!(snap.economic.gdp_growth_rate_pct >= 0.0);
            prop_assert!(snap.economic.consumer_confidence_index >= 0.0);
            prop_assert!(snap.market.consumer_price_sensitivity <= 10.0);
        }
    }

    #[test]
    fn series_field_parses_historical_names() {
        assert_eq!("price-per-unit".parse::<SeriesField>(), Ok(SeriesField::PricePerUnit));
        assert_eq!("ratio".parse::<SeriesField>(), Ok(SeriesField::PricePerUnit));
        assert_eq!("market-share".parse::<SeriesField>(), Ok(SeriesField::MarketShare));
        assert!("velocity".parse::<SeriesField>().is_err());
    }
}
