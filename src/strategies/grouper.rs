use chrono::{DateTime, Duration, Utc};
use tracing::{debug, info};

use crate::config::StrategyConfig;
use crate::strategies::types::{Opportunity, Side};

/// 1..K opportunities on one asset with maturities inside the tolerance
/// window
#[derive(Debug, Clone, PartialEq)]
pub struct StrategyGroup {
    opportunities: Vec<Opportunity>,
}

impl StrategyGroup {
    pub fn opportunities(&self) -> &[Opportunity] {
        &self.opportunities
    }

    pub fn len(&self) -> usize {
        self.opportunities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.opportunities.is_empty()
    }

    pub fn asset(&self) -> &str {
        self.opportunities.first().map(|o| o.asset()).unwrap_or_default()
    }

    pub fn has_side(&self, side: Side) -> bool {
        self.opportunities.iter().any(|o| o.side() == Some(side))
    }

    pub fn is_mixed(&self) -> bool {
        self.has_side(Side::Yes) && self.has_side(Side::No)
    }

    /// Sum of signed edge percentages
    pub fn total_edge_pct(&self) -> f64 {
        self.opportunities.iter().map(|o| o.edge_percentage()).sum()
    }

    /// Target price of the seed opportunity
    pub fn lead_target(&self) -> Option<f64> {
        self.opportunities.first().map(|o| o.quote.target_price)
    }
}

/// Greedy clustering of opportunities into multi-leg strategies.
///
/// Legs share an asset and a maturity window; once a group holds both a
/// YES and a NO leg it stops growing.
#[derive(Debug, Clone)]
pub struct StrategyGrouper {
    min_group_size: usize,
    max_group_size: usize,
    maturity_tolerance: Duration,
}

impl Default for StrategyGrouper {
    fn default() -> Self {
        Self::new(&StrategyConfig::default())
    }
}

impl StrategyGrouper {
    pub fn new(config: &StrategyConfig) -> Self {
        Self {
            min_group_size: config.min_group_size,
            max_group_size: config.max_group_size.max(1),
            maturity_tolerance: Duration::days(config.maturity_tolerance_days),
        }
    }

    pub fn group_opportunities(&self, opportunities: &[Opportunity]) -> Vec<StrategyGroup> {
        self.group_opportunities_at(opportunities, Utc::now())
    }

    /// Single greedy pass over actionable opportunities, largest |edge%|
    /// first (ties keep input order). Quotes without a maturity are treated
    /// as maturing at `now`.
    pub fn group_opportunities_at(
        &self,
        opportunities: &[Opportunity],
        now: DateTime<Utc>,
    ) -> Vec<StrategyGroup> {
        let mut candidates: Vec<&Opportunity> = opportunities
            .iter()
            .filter(|o| o.recommendation().is_actionable())
            .collect();
        candidates.sort_by(|a, b| {
            b.edge_percentage()
                .abs()
                .total_cmp(&a.edge_percentage().abs())
        });

        let mut processed = vec![false; candidates.len()];
        let mut groups = Vec::new();

        for seed_idx in 0..candidates.len() {
            if processed[seed_idx] {
                continue;
            }
            processed[seed_idx] = true;

            let seed = candidates[seed_idx];
            let mut members: Vec<&Opportunity> = vec![seed];

            for idx in (seed_idx + 1)..candidates.len() {
                if members.len() >= self.max_group_size {
                    break;
                }
                if processed[idx] {
                    continue;
                }

                let candidate = candidates[idx];
                if candidate.asset() != seed.asset() {
                    continue;
                }

                let candidate_maturity = maturity_or(candidate, now);
                let in_window = members
                    .iter()
                    .all(|m| self.within_tolerance(maturity_or(m, now), candidate_maturity));
                if !in_window {
                    continue;
                }

                let has_yes = members.iter().any(|m| m.side() == Some(Side::Yes));
                let has_no = members.iter().any(|m| m.side() == Some(Side::No));
                if has_yes && has_no {
                    // Both sides represented: every further leg would repeat a side
                    continue;
                }

                members.push(candidate);
                processed[idx] = true;
            }

            if members.len() < self.min_group_size {
                debug!(
                    "Dropping {} group of {} (minimum {})",
                    seed.asset(),
                    members.len(),
                    self.min_group_size
                );
                continue;
            }

            let group = StrategyGroup {
                opportunities: members.into_iter().cloned().collect(),
            };
            info!(
                "Formed strategy with {} opportunities ({}, total edge: {:.1}%)",
                group.len(),
                group.asset(),
                group.total_edge_pct()
            );
            groups.push(group);
        }

        groups
    }

    fn within_tolerance(&self, a: DateTime<Utc>, b: DateTime<Utc>) -> bool {
        let gap = if a > b { a - b } else { b - a };
        gap <= self.maturity_tolerance
    }
}

fn maturity_or(opportunity: &Opportunity, now: DateTime<Utc>) -> DateTime<Utc> {
    opportunity.quote.maturity.unwrap_or(now)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::strategies::detector::opportunity_with;
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 10, 18, 12, 0, 0).unwrap()
    }

    fn yes(id: &str, asset: &str) -> Opportunity {
        opportunity_with(id, asset, 0.30, 0.10)
    }

    fn no(id: &str, asset: &str) -> Opportunity {
        opportunity_with(id, asset, 0.05, 0.10)
    }

    fn ids(group: &StrategyGroup) -> Vec<&str> {
        group.opportunities().iter().map(|o| o.quote.market_id.as_str()).collect()
    }

    #[test]
    fn test_empty_input_yields_no_groups() {
        assert!(StrategyGrouper::default().group_opportunities_at(&[], now()).is_empty());
    }

    #[test]
    fn test_never_mixes_assets() {
        let opportunities = vec![
            yes("b1", "BTC"),
            yes("e1", "ETH"),
            yes("b2", "BTC"),
            yes("e2", "ETH"),
        ];

        let groups = StrategyGrouper::default().group_opportunities_at(&opportunities, now());

        assert_eq!(groups.len(), 2);
        assert_eq!(ids(&groups[0]), vec!["b1", "b2"]);
        assert_eq!(ids(&groups[1]), vec!["e1", "e2"]);
        for group in &groups {
            assert!(group.opportunities().iter().all(|o| o.asset() == group.asset()));
        }
    }

    #[test]
    fn test_same_side_fills_up_to_cap() {
        let opportunities: Vec<Opportunity> =
            (0..5).map(|i| yes(&format!("b{}", i), "BTC")).collect();

        let groups = StrategyGrouper::default().group_opportunities_at(&opportunities, now());

        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].len(), 4);
        assert_eq!(ids(&groups[1]), vec!["b4"]);
    }

    #[test]
    fn test_mixed_group_stops_growing() {
        // +200% YES legs rank ahead of the -50% NO legs
        let opportunities = vec![
            yes("y1", "BTC"),
            no("n1", "BTC"),
            yes("y2", "BTC"),
            no("n2", "BTC"),
        ];

        let groups = StrategyGrouper::default().group_opportunities_at(&opportunities, now());

        assert_eq!(groups.len(), 2);
        assert_eq!(ids(&groups[0]), vec!["y1", "y2", "n1"]);
        assert!(groups[0].is_mixed());
        assert_eq!(ids(&groups[1]), vec!["n2"]);
    }

    #[test]
    fn test_seeds_follow_edge_rank() {
        let config = StrategyConfig {
            max_group_size: 1,
            ..StrategyConfig::default()
        };
        let opportunities = vec![
            opportunity_with("weak", "BTC", 0.13, 0.10),
            no("mid", "BTC"),
            yes("strong", "BTC"),
        ];

        let groups = StrategyGrouper::new(&config).group_opportunities_at(&opportunities, now());

        let seeds: Vec<&str> = groups.iter().map(|g| ids(g)[0]).collect();
        assert_eq!(seeds, vec!["strong", "mid", "weak"]);
    }

    #[test]
    fn test_maturity_window_respected() {
        let mut near = yes("near", "BTC");
        near.quote.maturity = Some(now() + Duration::hours(12));
        let mut far = yes("far", "BTC");
        far.quote.maturity = Some(now() + Duration::days(3));
        let seed = yes("seed", "BTC");

        let groups = StrategyGrouper::default().group_opportunities_at(&[seed, far, near], now());

        assert_eq!(groups.len(), 2);
        assert_eq!(ids(&groups[0]), vec!["seed", "near"]);
        assert_eq!(ids(&groups[1]), vec!["far"]);
    }

    #[test]
    fn test_window_checked_against_every_member() {
        let seed = yes("seed", "BTC");
        let mut early = yes("early", "BTC");
        early.quote.maturity = Some(now() - Duration::hours(20));
        let mut late = yes("late", "BTC");
        late.quote.maturity = Some(now() + Duration::hours(20));

        let groups = StrategyGrouper::default().group_opportunities_at(&[seed, early, late], now());

        // late is within a day of seed but 40h from early
        assert_eq!(ids(&groups[0]), vec!["seed", "early"]);
        assert_eq!(ids(&groups[1]), vec!["late"]);
    }

    #[test]
    fn test_skips_non_actionable_and_enforces_minimum() {
        let config = StrategyConfig {
            min_group_size: 2,
            ..StrategyConfig::default()
        };
        let grouper = StrategyGrouper::new(&config);
        let opportunities = vec![
            opportunity_with("fair", "BTC", 0.101, 0.10),
            yes("lonely", "ETH"),
            yes("b1", "BTC"),
            no("b2", "BTC"),
        ];

        let groups = grouper.group_opportunities_at(&opportunities, now());

        assert_eq!(groups.len(), 1);
        assert_eq!(ids(&groups[0]), vec!["b1", "b2"]);
    }

    #[test]
    fn test_every_opportunity_in_at_most_one_group() {
        let opportunities: Vec<Opportunity> = (0..9)
            .map(|i| {
                let id = format!("o{}", i);
                if i % 3 == 0 {
                    no(&id, "BTC")
                } else {
                    yes(&id, "BTC")
                }
            })
            .collect();

        let groups = StrategyGrouper::default().group_opportunities_at(&opportunities, now());

        let mut seen: Vec<&str> = groups.iter().flat_map(|g| ids(g)).collect();
        let total = seen.len();
        seen.sort_unstable();
        seen.dedup();
        assert_eq!(seen.len(), total);
        assert_eq!(total, 9);
    }
}
