//! Human-readable run report and CSV export.
//!
//! The text report always carries the counts block (analysed, evaluated,
//! rejected by stage) and prints a warning line for every note attached to
//! a top setup, so a penalty can never fire invisibly.

use std::fmt::Write as _;

use anyhow::Result;

use crate::pipeline::RunOutcome;
use crate::snapshot::RunSnapshot;

/// Render the fixed-width text report.
pub fn render_text(snapshot: &RunSnapshot, outcome: &RunOutcome) -> String {
    let mut out = String::new();
    let line = "=".repeat(80);

    let _ = writeln!(out, "{line}");
    let _ = writeln!(out, "POSITION TRADING SCAN - {}", snapshot.timestamp.format("%Y-%m-%d %H:%M"));
    let _ = writeln!(out, "{line}");
    if snapshot.partial {
        let _ = writeln!(out, "NOTE: run was cancelled; results cover a partial universe");
    }
    let _ = writeln!(out);
    let _ = writeln!(
        out,
        "Regime: {} (breadth {:.1}%, stress {:.0})",
        snapshot.regime.regime.label(),
        snapshot.regime.breadth_pct,
        snapshot.regime.stress_index
    );
    let _ = writeln!(out);

    // Counts block
    let _ = writeln!(out, "Analysed:  {}", snapshot.analysed);
    let _ = writeln!(out, "Evaluated: {}", snapshot.evaluated);
    let _ = writeln!(out, "Setups:    {}", snapshot.setups.len());
    let _ = writeln!(out, "Rejected:");
    for (stage, count) in snapshot.rejections_by_stage() {
        let _ = writeln!(out, "  {stage:<14} {count}");
    }
    let _ = writeln!(out);

    // Decline distribution across the universe
    let _ = writeln!(out, "Decline from 90-bar high:");
    for (label, lo, hi) in [
        ("0% to -5%", -0.05, f64::INFINITY),
        ("-5% to -10%", -0.10, -0.05),
        ("-10% to -15%", -0.15, -0.10),
        ("-15% to -20%", -0.20, -0.15),
        ("below -20%", f64::NEG_INFINITY, -0.20),
    ] {
        let count = outcome
            .declines
            .iter()
            .filter(|d| d.decline_from_high > lo && d.decline_from_high <= hi)
            .count();
        let _ = writeln!(out, "  {label:<14} {count}");
    }

    // Near misses: within 3 percentage points of the context gate
    let mut near: Vec<_> = outcome
        .declines
        .iter()
        .filter(|d| d.decline_from_high > -0.10 && d.decline_from_high <= -0.07)
        .collect();
    near.sort_by(|a, b| {
        a.decline_from_high
            .partial_cmp(&b.decline_from_high)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    if !near.is_empty() {
        let _ = writeln!(out);
        let _ = writeln!(out, "Near misses (close to the -10% gate):");
        for d in near.iter().take(10) {
            let _ = writeln!(out, "  {:<12} {:>6.1}%", d.ticker, d.decline_from_high * 100.0);
        }
    }
    let _ = writeln!(out);

    // Top setups
    if snapshot.setups.is_empty() {
        let _ = writeln!(out, "NO VALID SETUPS THIS RUN");
    } else {
        let _ = writeln!(
            out,
            "{:<4} {:<12} {:<34} {:<10} {:>6} {:>7} {:>7} {:>7} {:>6} {:>7}",
            "Rank", "Ticker", "Pattern", "Tier", "Score", "21d", "42d", "63d", "WR", "Pos%"
        );
        let _ = writeln!(out, "{}", "-".repeat(110));
        for (i, setup) in snapshot.setups.iter().enumerate() {
            let mut pattern = setup.pattern_name.clone();
            if pattern.len() > 33 {
                pattern.truncate(31);
                pattern.push_str("..");
            }
            let _ = writeln!(
                out,
                "{:<4} {:<12} {:<34} {:<10} {:>6.0} {:>6.1}% {:>6.1}% {:>6.1}% {:>5.0}% {:>6.2}%",
                i + 1,
                setup.ticker,
                pattern,
                setup.tier,
                setup.score,
                setup.horizon_edges.h21 * 100.0,
                setup.horizon_edges.h42 * 100.0,
                setup.horizon_edges.h63 * 100.0,
                setup.win_rate * 100.0,
                setup.position_pct * 100.0
            );
            let _ = writeln!(
                out,
                "     WR CI [{:.0}%, {:.0}%]  EV {:+.2}%  net edge {:+.2}%  R/R {:.1}  stop {:.1}%  {:.0} SEK",
                setup.win_rate_ci.lower * 100.0,
                setup.win_rate_ci.upper * 100.0,
                setup.expected_value * 100.0,
                setup.net_edge * 100.0,
                setup.risk_reward,
                setup.stop_loss_pct * 100.0,
                setup.position_currency
            );
            for note in &setup.notes {
                let _ = writeln!(out, "     warning: {note}");
            }
        }
    }
    let _ = writeln!(out, "{line}");

    out
}

/// CSV of the ranked setups.
pub fn render_csv(snapshot: &RunSnapshot) -> Result<String> {
    let mut wtr = csv::Writer::from_writer(vec![]);
    wtr.write_record([
        "rank",
        "ticker",
        "name",
        "sector",
        "pattern",
        "tier",
        "score",
        "robust_score",
        "edge_21d",
        "edge_42d",
        "edge_63d",
        "win_rate",
        "win_rate_ci_lower",
        "win_rate_ci_upper",
        "expected_value",
        "net_edge",
        "risk_reward",
        "sample_size",
        "stop_loss_pct",
        "position_pct",
        "position_currency",
    ])?;
    for (i, s) in snapshot.setups.iter().enumerate() {
        wtr.write_record([
            (i + 1).to_string(),
            s.ticker.clone(),
            s.name.clone(),
            s.sector.clone(),
            s.pattern_name.clone(),
            s.tier.clone(),
            format!("{:.1}", s.score),
            format!("{:.1}", s.robust_score),
            format!("{:.6}", s.horizon_edges.h21),
            format!("{:.6}", s.horizon_edges.h42),
            format!("{:.6}", s.horizon_edges.h63),
            format!("{:.4}", s.win_rate),
            format!("{:.4}", s.win_rate_ci.lower),
            format!("{:.4}", s.win_rate_ci.upper),
            format!("{:.6}", s.expected_value),
            format!("{:.6}", s.net_edge),
            format!("{:.2}", s.risk_reward),
            s.sample_size.to_string(),
            format!("{:.4}", s.stop_loss_pct),
            format!("{:.4}", s.position_pct),
            format!("{:.0}", s.position_currency),
        ])?;
    }
    let bytes = wtr.into_inner()?;
    Ok(String::from_utf8(bytes)?)
}
