use tracing::{debug, info};

use crate::config::DetectionConfig;
use crate::data::types::PricedQuote;
use crate::monitoring::diagnostics::Diagnostics;
use crate::strategies::types::{Edge, Opportunity, Recommendation};

const HIGH_CONFIDENCE_EDGE_PCT: f64 = 50.0;
const MEDIUM_CONFIDENCE_EDGE_PCT: f64 = 20.0;
/// Flat notional behind the ranking proxy
const RANK_NOTIONAL_USD: f64 = 100.0;

/// Flags quotes whose fair value deviates from the market price by more
/// than a relative threshold.
///
/// Positive edge means the market is cheap (bet YES), negative edge means
/// it is rich (bet NO).
#[derive(Debug, Clone)]
pub struct InefficiencyDetector {
    min_edge_threshold: f64,
}

/// Overlapping views over one scan's opportunities
#[derive(Debug, Clone, Default)]
pub struct OpportunityBuckets {
    pub all: Vec<Opportunity>,
    pub undervalued: Vec<Opportunity>,
    pub overvalued: Vec<Opportunity>,
    pub high_confidence: Vec<Opportunity>,
    pub medium_confidence: Vec<Opportunity>,
    pub low_confidence: Vec<Opportunity>,
}

impl OpportunityBuckets {
    pub fn named(&self) -> [(&'static str, &[Opportunity]); 6] {
        [
            ("all", self.all.as_slice()),
            ("undervalued", self.undervalued.as_slice()),
            ("overvalued", self.overvalued.as_slice()),
            ("high_confidence", self.high_confidence.as_slice()),
            ("medium_confidence", self.medium_confidence.as_slice()),
            ("low_confidence", self.low_confidence.as_slice()),
        ]
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct BucketSummary {
    pub category: &'static str,
    pub count: usize,
    pub avg_edge: f64,
    pub max_edge: f64,
    pub min_edge: f64,
    pub total_ev: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RankedOpportunity {
    pub opportunity: Opportunity,
    /// |edge%| scaled by a flat notional; not risk-adjusted
    pub expected_value: f64,
}

impl InefficiencyDetector {
    pub fn new(config: &DetectionConfig) -> Self {
        Self::with_threshold(config.min_edge_threshold)
    }

    pub fn with_threshold(min_edge_threshold: f64) -> Self {
        Self { min_edge_threshold }
    }

    fn threshold_pct(&self) -> f64 {
        self.min_edge_threshold * 100.0
    }

    pub fn calculate_edge(&self, theoretical_price: f64, market_price: f64) -> Edge {
        if market_price <= 0.0 {
            return Edge {
                absolute: 0.0,
                percentage: 0.0,
                recommendation: Recommendation::Invalid,
            };
        }

        let absolute = theoretical_price - market_price;
        let percentage = absolute / market_price * 100.0;

        let recommendation = if percentage > self.threshold_pct() {
            Recommendation::BetYes
        } else if percentage < -self.threshold_pct() {
            Recommendation::BetNo
        } else {
            Recommendation::Skip
        };

        Edge {
            absolute,
            percentage,
            recommendation,
        }
    }

    pub fn analyze(&self, priced: &PricedQuote) -> Opportunity {
        let edge = self.calculate_edge(priced.pricing.theoretical_price, priced.quote.market_price);
        let is_opportunity = edge.recommendation != Recommendation::Invalid
            && edge.percentage.abs() >= self.threshold_pct();
        Opportunity::from_priced(priced, edge, is_opportunity)
    }

    /// Edge for every priced quote, largest |edge%| first
    pub fn scan_markets(
        &self,
        priced: &[PricedQuote],
        diagnostics: &mut Diagnostics,
    ) -> Vec<Opportunity> {
        let mut opportunities: Vec<Opportunity> = Vec::with_capacity(priced.len());

        for quote in priced {
            let opportunity = self.analyze(quote);
            if opportunity.recommendation() == Recommendation::Invalid {
                diagnostics.warn(
                    &quote.quote.market_id,
                    format!("edge undefined for market price {}", quote.quote.market_price),
                );
                continue;
            }
            debug!(
                "{} edge {:+.1}% -> {}",
                quote.quote.market_id,
                opportunity.edge_percentage(),
                opportunity.recommendation()
            );
            opportunities.push(opportunity);
        }

        opportunities.sort_by(|a, b| {
            b.edge_percentage()
                .abs()
                .total_cmp(&a.edge_percentage().abs())
        });
        opportunities
    }

    pub fn categorize(&self, opportunities: &[Opportunity]) -> OpportunityBuckets {
        let threshold = self.threshold_pct();
        let select = |keep: &dyn Fn(f64) -> bool| -> Vec<Opportunity> {
            opportunities
                .iter()
                .filter(|o| keep(o.edge_percentage()))
                .cloned()
                .collect()
        };

        OpportunityBuckets {
            all: opportunities.to_vec(),
            undervalued: select(&|pct: f64| pct > threshold),
            overvalued: select(&|pct: f64| pct < -threshold),
            high_confidence: select(&|pct: f64| pct.abs() > HIGH_CONFIDENCE_EDGE_PCT),
            medium_confidence: select(&|pct: f64| {
                pct.abs() > MEDIUM_CONFIDENCE_EDGE_PCT && pct.abs() <= HIGH_CONFIDENCE_EDGE_PCT
            }),
            low_confidence: select(&|pct: f64| {
                pct.abs() > threshold && pct.abs() <= MEDIUM_CONFIDENCE_EDGE_PCT
            }),
        }
    }

    pub fn summarize(&self, buckets: &OpportunityBuckets) -> Vec<BucketSummary> {
        buckets
            .named()
            .into_iter()
            .map(|(category, opportunities)| summarize_bucket(category, opportunities))
            .collect()
    }

    /// Top `max_positions` opportunities by proxy expected value
    pub fn rank(
        &self,
        opportunities: &[Opportunity],
        max_positions: usize,
    ) -> Vec<RankedOpportunity> {
        let mut ranked: Vec<RankedOpportunity> = opportunities
            .iter()
            .map(|o| RankedOpportunity {
                opportunity: o.clone(),
                expected_value: proxy_expected_value(o),
            })
            .collect();

        ranked.sort_by(|a, b| b.expected_value.total_cmp(&a.expected_value));
        ranked.truncate(max_positions);

        info!("Ranked {} of {} opportunities", ranked.len(), opportunities.len());
        ranked
    }
}

fn proxy_expected_value(opportunity: &Opportunity) -> f64 {
    opportunity.edge_percentage().abs() * RANK_NOTIONAL_USD
}

fn summarize_bucket(category: &'static str, opportunities: &[Opportunity]) -> BucketSummary {
    if opportunities.is_empty() {
        return BucketSummary {
            category,
            count: 0,
            avg_edge: 0.0,
            max_edge: 0.0,
            min_edge: 0.0,
            total_ev: 0.0,
        };
    }

    let edges: Vec<f64> = opportunities.iter().map(|o| o.edge_percentage()).collect();
    BucketSummary {
        category,
        count: edges.len(),
        avg_edge: edges.iter().sum::<f64>() / edges.len() as f64,
        max_edge: edges.iter().copied().fold(f64::NEG_INFINITY, f64::max),
        min_edge: edges.iter().copied().fold(f64::INFINITY, f64::min),
        total_ev: opportunities.iter().map(proxy_expected_value).sum(),
    }
}

#[cfg(test)]
pub(crate) fn opportunity_with(
    market_id: &str,
    asset: &str,
    theoretical: f64,
    market: f64,
) -> Opportunity {
    use crate::data::types::sample_quote;
    use crate::pricing::barrier::PricingResult;

    let mut quote = sample_quote(130_000.0, market);
    quote.market_id = market_id.to_string();
    quote.asset = asset.to_string();
    let priced = PricedQuote {
        quote,
        pricing: PricingResult {
            theoretical_price: theoretical,
            delta: 1e-5,
            time_to_expiry: 13.5 / 365.0,
        },
    };
    InefficiencyDetector::with_threshold(0.10).analyze(&priced)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::types::sample_quote;
    use crate::pricing::barrier::{BarrierPricingModel, PricingResult};

    fn detector() -> InefficiencyDetector {
        InefficiencyDetector::with_threshold(0.10)
    }

    #[test]
    fn test_edge_classification() {
        let edge = detector().calculate_edge(0.8235, 0.18);
        assert_eq!(edge.recommendation, Recommendation::BetYes);
        assert!((edge.absolute - 0.6435).abs() < 1e-12);
        assert!((edge.percentage - 357.5).abs() < 1e-9);

        let edge = detector().calculate_edge(0.0001, 0.007);
        assert_eq!(edge.recommendation, Recommendation::BetNo);

        // 5% relative edge is below a 10% threshold
        let edge = detector().calculate_edge(0.105, 0.10);
        assert_eq!(edge.recommendation, Recommendation::Skip);
    }

    #[test]
    fn test_non_positive_market_price_is_invalid() {
        let edge = detector().calculate_edge(0.5, 0.0);
        assert_eq!(edge.recommendation, Recommendation::Invalid);
        assert_eq!(edge.absolute, 0.0);
        assert_eq!(edge.percentage, 0.0);
    }

    #[test]
    fn test_btc_130k_scenario_recommends_yes() {
        let model = BarrierPricingModel::default();
        let quote = sample_quote(130_000.0, 0.07);
        let priced = PricedQuote {
            pricing: model.price(&quote).unwrap(),
            quote,
        };

        let opportunity = detector().analyze(&priced);
        assert!(opportunity.theoretical_price() > opportunity.market_price());
        assert_eq!(opportunity.recommendation(), Recommendation::BetYes);
        assert!(opportunity.is_opportunity);
    }

    #[test]
    fn test_scan_sorts_by_absolute_edge() {
        let model = BarrierPricingModel::default();
        let quotes = vec![
            sample_quote(200_000.0, 0.007),
            sample_quote(110_000.0, 0.18),
            sample_quote(130_000.0, 0.07),
        ];
        let mut diagnostics = Diagnostics::new();
        let priced = model.price_batch(&quotes, &mut diagnostics);

        let scanned = detector().scan_markets(&priced, &mut diagnostics);

        assert_eq!(scanned.len(), 3);
        assert!(diagnostics.is_empty());
        for pair in scanned.windows(2) {
            assert!(pair[0].edge_percentage().abs() >= pair[1].edge_percentage().abs());
        }
    }

    #[test]
    fn test_scan_drops_invalid_quotes() {
        let mut quote = sample_quote(130_000.0, 0.07);
        quote.market_price = 0.0;
        let priced = vec![PricedQuote {
            quote,
            pricing: PricingResult {
                theoretical_price: 0.1,
                delta: 0.0,
                time_to_expiry: 0.1,
            },
        }];

        let mut diagnostics = Diagnostics::new();
        let scanned = detector().scan_markets(&priced, &mut diagnostics);

        assert!(scanned.is_empty());
        assert_eq!(diagnostics.len(), 1);
    }

    #[test]
    fn test_categorize_buckets_overlap() {
        let opportunities = vec![
            opportunity_with("a", "BTC", 0.30, 0.10), // +200%
            opportunity_with("b", "BTC", 0.13, 0.10), // +30%
            opportunity_with("c", "BTC", 0.085, 0.10), // -15%
            opportunity_with("d", "BTC", 0.102, 0.10), // +2%
        ];

        let buckets = detector().categorize(&opportunities);

        assert_eq!(buckets.all.len(), 4);
        assert_eq!(buckets.undervalued.len(), 2);
        assert_eq!(buckets.overvalued.len(), 1);
        assert_eq!(buckets.high_confidence.len(), 1);
        assert_eq!(buckets.medium_confidence.len(), 1);
        assert_eq!(buckets.low_confidence.len(), 1);
        assert_eq!(buckets.low_confidence[0].quote.market_id, "c");
    }

    #[test]
    fn test_summary_per_bucket() {
        let opportunities = vec![
            opportunity_with("a", "BTC", 0.30, 0.10),
            opportunity_with("c", "BTC", 0.085, 0.10),
        ];
        let buckets = detector().categorize(&opportunities);
        let summary = detector().summarize(&buckets);

        assert_eq!(summary.len(), 6);
        let all = &summary[0];
        assert_eq!(all.category, "all");
        assert_eq!(all.count, 2);
        assert!((all.max_edge - 200.0).abs() < 1e-9);
        assert!((all.min_edge + 15.0).abs() < 1e-9);
        assert!((all.total_ev - 21_500.0).abs() < 1e-6);

        let medium = summary.iter().find(|s| s.category == "medium_confidence").unwrap();
        assert_eq!(medium.count, 0);
        assert_eq!(medium.avg_edge, 0.0);
    }

    #[test]
    fn test_rank_takes_top_n() {
        let opportunities = vec![
            opportunity_with("small", "BTC", 0.12, 0.10),
            opportunity_with("big", "BTC", 0.01, 0.10),
            opportunity_with("mid", "BTC", 0.15, 0.10),
        ];

        let ranked = detector().rank(&opportunities, 2);

        assert_eq!(ranked.len(), 2);
        assert_eq!(ranked[0].opportunity.quote.market_id, "big");
        assert!((ranked[0].expected_value - 9_000.0).abs() < 1e-6);
        assert_eq!(ranked[1].opportunity.quote.market_id, "mid");
    }
}
