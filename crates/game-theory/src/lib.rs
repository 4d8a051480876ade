#![deny(warnings)]

//! Payoff engine for the three-firm maintain/shrink game.
//!
//! Computes each firm's normalized payoff under every joint strategy
//! profile, searches the resulting cube for pure-strategy Nash equilibria
//! (with a deterministic dominant-total-payoff fallback), and reads per-firm
//! recommendations off the chosen outcome. Everything here is pure and
//! deterministic; the one observable side effect is a debug log line when
//! the fallback engages.

use market_core::{
    ConsumerSnapshot, EconomicSnapshot, Firm, FirmState, Strategy, StrategyProfile, YearSnapshot,
};
use rust_decimal::prelude::ToPrimitive;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Assumed total market size in units, used to translate market share into
/// units sold and back out of the profit normalization.
const MARKET_SIZE_UNITS: f64 = 1_000_000.0;

/// Weights for the market-share response to a joint strategy pattern.
///
/// Two named variants exist: the yearly analysis ([`PayoffPolicy::BASE`])
/// and the scenario simulator ([`PayoffPolicy::SIMULATION`]) respond to the
/// same patterns with different magnitudes, and the simulator skips the
/// confidence scaling step entirely.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PayoffPolicy {
    /// Penalty weight when the firm is the only one shrinking
    /// (× awareness × (1 − loyalty)).
    pub lone_shrink_penalty: f64,
    /// Bonus weight when the firm is the only one maintaining
    /// (× awareness).
    pub holdout_bonus: f64,
    /// Penalty weight when all three firms shrink (× awareness).
    pub herd_shrink_penalty: f64,
    /// Penalty weight when the firm shrinks alongside exactly one rival
    /// (× awareness × (1 − loyalty)).
    pub partial_shrink_penalty: f64,
    /// Whether the share delta is scaled by `consumer_confidence / 70`.
    pub confidence_scaling: bool,
}

impl PayoffPolicy {
    /// Weights used by the yearly analysis pipeline.
    pub const BASE: PayoffPolicy = PayoffPolicy {
        lone_shrink_penalty: 2.0,
        holdout_bonus: 1.5,
        herd_shrink_penalty: 0.5,
        partial_shrink_penalty: 1.0,
        confidence_scaling: true,
    };

    /// Sharper weights used when replaying perturbed scenarios; the
    /// confidence scaling step is skipped.
    pub const SIMULATION: PayoffPolicy = PayoffPolicy {
        lone_shrink_penalty: 3.0,
        holdout_bonus: 2.5,
        herd_shrink_penalty: 0.3,
        partial_shrink_penalty: 1.5,
        confidence_scaling: false,
    };
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// One firm's normalized payoff under a joint strategy assignment.
///
/// `rivals` carries the other two firms' strategies; which rival is which
/// does not matter, only how many of them shrink. The result is clamped to
/// [0, 10] and rounded to 2 decimals. Out-of-range inputs are clamped, not
/// rejected; a cost above price simply bottoms out at 0.
pub fn payoff(
    firm: &FirmState,
    strategy: Strategy,
    rivals: [Strategy; 2],
    consumer: &ConsumerSnapshot,
    economic: &EconomicSnapshot,
    policy: &PayoffPolicy,
) -> f64 {
    // Only the cost side of the strategy effect reaches the formula; the
    // shrunken package surfaces through consumer awareness instead.
    let effective = firm.under_strategy(strategy);
    let margin = (firm.price - effective.production_cost)
        .to_f64()
        .unwrap_or(0.0);

    let awareness = consumer.shrinkflation_awareness_pct / 100.0;
    let loyalty = consumer.loyalty_of(firm.firm) / 10.0;
    let rival_shrinks = rivals.iter().filter(|s| **s == Strategy::Shrink).count();

    let mut delta = match (strategy, rival_shrinks) {
        // Lone shrinker: awareness punishes it, loyalty shields it.
        (Strategy::Shrink, 0) => -awareness * (1.0 - loyalty) * policy.lone_shrink_penalty,
        // Lone holdout picks up share from both shrinking rivals.
        (Strategy::Maintain, 2) => awareness * policy.holdout_bonus,
        // Everyone shrinks: consumers have nowhere to defect to.
        (Strategy::Shrink, 2) => -awareness * policy.herd_shrink_penalty,
        // Shrinking alongside one maintaining rival.
        (Strategy::Shrink, 1) => -awareness * (1.0 - loyalty) * policy.partial_shrink_penalty,
        // Maintaining while at most one rival shrinks moves nothing.
        _ => 0.0,
    };

    if policy.confidence_scaling {
        delta *= economic.consumer_confidence_index / 70.0;
    }

    let new_share = firm.market_share_pct + delta;
    let units_sold = MARKET_SIZE_UNITS * new_share / 100.0;
    let total_profit = units_sold * margin;

    round2((total_profit / MARKET_SIZE_UNITS).clamp(0.0, 10.0))
}

/// Per-firm payoffs for all eight joint strategy profiles.
///
/// `cells[p][f]` is the payoff of `Firm::ALL[f]` under
/// `StrategyProfile::ALL[p]`. Built fresh per analysis run and treated as
/// immutable afterwards.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PayoffCube {
    /// Payoff cells in profile-major, firm-minor order.
    pub cells: [[f64; 3]; 8],
}

impl PayoffCube {
    /// Payoff of one firm under one profile.
    pub fn get(&self, profile: StrategyProfile, firm: Firm) -> f64 {
        self.cells[profile.index()][firm.index()]
    }

    /// Sum of the three firms' payoffs under one profile.
    pub fn total(&self, profile: StrategyProfile) -> f64 {
        self.cells[profile.index()].iter().sum()
    }
}

/// Build the full payoff cube for one year's snapshot under a policy.
pub fn build_cube(snapshot: &YearSnapshot, policy: &PayoffPolicy) -> PayoffCube {
    let mut cells = [[0.0f64; 3]; 8];
    for profile in StrategyProfile::ALL {
        for firm in Firm::ALL {
            cells[profile.index()][firm.index()] = payoff(
                snapshot.firm(firm),
                profile.strategy_of(firm),
                profile.rivals_of(firm),
                &snapshot.consumer,
                &snapshot.economic,
                policy,
            );
        }
    }
    PayoffCube { cells }
}

/// How a stable outcome was selected.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum EquilibriumKind {
    /// No firm gains by unilaterally switching its own strategy.
    Nash,
    /// No profile was deviation-proof; this one maximizes summed payoff.
    DominantTotalPayoff,
}

/// A stable (or fallback-stable) strategy profile.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Equilibrium {
    /// The joint strategy assignment.
    pub profile: StrategyProfile,
    /// Whether this is a true equilibrium or the dominant-total fallback.
    pub kind: EquilibriumKind,
}

impl fmt::Display for Equilibrium {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            EquilibriumKind::Nash => write!(f, "{}", self.profile),
            EquilibriumKind::DominantTotalPayoff => {
                write!(f, "{} (Dominant Total Payoff)", self.profile)
            }
        }
    }
}

fn can_improve(cube: &PayoffCube, profile: StrategyProfile, firm: Firm) -> bool {
    let current = cube.get(profile, firm);
    let deviated = profile.with_strategy(firm, profile.strategy_of(firm).flipped());
    cube.get(deviated, firm) > current
}

/// All pure-strategy Nash equilibria of a cube, in enumeration order.
///
/// When none exist the result is the single profile with the maximal summed
/// payoff, labeled [`EquilibriumKind::DominantTotalPayoff`]; ties resolve to
/// the profile reached first in the fixed enumeration order. The returned
/// list is therefore never empty.
pub fn find_equilibria(cube: &PayoffCube) -> Vec<Equilibrium> {
    let mut equilibria: Vec<Equilibrium> = StrategyProfile::ALL
        .into_iter()
        .filter(|profile| !Firm::ALL.iter().any(|f| can_improve(cube, *profile, *f)))
        .map(|profile| Equilibrium {
            profile,
            kind: EquilibriumKind::Nash,
        })
        .collect();

    if equilibria.is_empty() {
        let mut best = StrategyProfile::ALL[0];
        let mut best_total = cube.total(best);
        for profile in &StrategyProfile::ALL[1..] {
            let total = cube.total(*profile);
            if total > best_total {
                best = *profile;
                best_total = total;
            }
        }
        tracing::debug!(
            profile = %best,
            total = best_total,
            "no pure-strategy equilibrium; selecting dominant total payoff"
        );
        equilibria.push(Equilibrium {
            profile: best,
            kind: EquilibriumKind::DominantTotalPayoff,
        });
    }

    equilibria
}

/// Per-firm recommended strategies, in [`Firm::ALL`] order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Recommendations(pub [Strategy; 3]);

impl Recommendations {
    /// Read recommendations off the first equilibrium in list order. An
    /// empty list cannot occur through [`find_equilibria`]; if handed one
    /// anyway, every firm defaults to maintain.
    pub fn from_equilibria(equilibria: &[Equilibrium]) -> Recommendations {
        match equilibria.first() {
            Some(eq) => Recommendations(eq.profile.0),
            None => Recommendations([Strategy::Maintain; 3]),
        }
    }

    /// The recommended strategy for one firm.
    pub fn for_firm(self, firm: Firm) -> Strategy {
        self.0[firm.index()]
    }
}
