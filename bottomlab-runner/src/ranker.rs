//! Deterministic ranking and ranked-set assembly.
//!
//! Sort key: (tier desc, robust score desc, expected value desc, ticker
//! asc). The ticker tie-break makes the output a pure function of the
//! inputs, independent of worker scheduling. Assembly then applies the
//! per-sector cap (overflow truncated, not rescaled) and the
//! minimum-position floor.

use std::collections::BTreeMap;

use crate::setup::{Rejection, RejectionStage, Setup};

fn tier_rank(tier: &str) -> u8 {
    match tier {
        "CORE" => 3,
        "PRIMARY" => 2,
        "SECONDARY" => 1,
        _ => 0,
    }
}

/// Stable sort by the ranking key.
pub fn rank(mut setups: Vec<Setup>) -> Vec<Setup> {
    setups.sort_by(|a, b| {
        tier_rank(&b.tier)
            .cmp(&tier_rank(&a.tier))
            .then(
                b.robust_score
                    .partial_cmp(&a.robust_score)
                    .unwrap_or(std::cmp::Ordering::Equal),
            )
            .then(
                b.expected_value
                    .partial_cmp(&a.expected_value)
                    .unwrap_or(std::cmp::Ordering::Equal),
            )
            .then(a.ticker.cmp(&b.ticker))
    });
    setups
}

/// Result of assembling the final ranked set.
pub struct RankedSet {
    pub setups: Vec<Setup>,
    pub rejections: Vec<Rejection>,
}

/// Assemble the final set: walk candidates in rank order, enforce the
/// cumulative sector cap and the minimum-position floor, keep the top N.
pub fn assemble(
    candidates: Vec<Setup>,
    sector_cap: f64,
    portfolio_amount: f64,
    min_position_currency: f64,
    top_n: usize,
) -> RankedSet {
    let ranked = rank(candidates);
    let mut sector_used: BTreeMap<String, f64> = BTreeMap::new();
    let mut setups = Vec::new();
    let mut rejections = Vec::new();

    for mut setup in ranked {
        if setups.len() >= top_n {
            rejections.push(Rejection::new(
                &setup.ticker,
                RejectionStage::Rank,
                "below_top_n",
                format!("ranked below the top {top_n}"),
            ));
            continue;
        }

        let used = sector_used.get(&setup.sector).copied().unwrap_or(0.0);
        let headroom = sector_cap - used;
        if headroom <= 0.0 {
            rejections.push(Rejection::new(
                &setup.ticker,
                RejectionStage::SectorCap,
                "sector_cap_exhausted",
                format!("sector {} already at {:.0}% cap", setup.sector, sector_cap * 100.0),
            ));
            continue;
        }
        if setup.position_pct > headroom {
            setup.notes.push(format!(
                "sector cap truncation: {:.2}% -> {:.2}%",
                setup.position_pct * 100.0,
                headroom * 100.0
            ));
            setup.position_pct = headroom;
            setup.position_currency = headroom * portfolio_amount;
        }

        if setup.position_currency < min_position_currency {
            rejections.push(Rejection::new(
                &setup.ticker,
                RejectionStage::MinPosition,
                "below_min_position",
                format!(
                    "{:.0} below minimum {:.0}",
                    setup.position_currency, min_position_currency
                ),
            ));
            continue;
        }

        *sector_used.entry(setup.sector.clone()).or_insert(0.0) += setup.position_pct;
        setups.push(setup);
    }

    RankedSet { setups, rejections }
}
