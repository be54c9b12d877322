use std::collections::HashSet;

use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use crate::shared_types::{ArbitrageOpportunity, BetLeg, Match, ProviderQuote};

/// Searches a match's quote set for a risk-free two-way split.
///
/// Every ordered pair of quotes from distinct providers is scored by the
/// implied-probability sum `1/odds[team1] + 1/odds[team2]`; the pair with
/// the smallest sum wins. A strict `<` comparison keeps the first minimal
/// pair in slice order, so results are reproducible for identical input.
///
/// Returns `None` when fewer than two distinct providers quoted the match
/// (a single book's two-sided prices always carry its margin) or when the
/// best sum is at or above 1.0 — the normal case, not an error.
pub fn find_arbitrage(
    m: &Match,
    quotes: &[ProviderQuote],
    total_stake: Decimal,
) -> Option<ArbitrageOpportunity> {
    let distinct: HashSet<&str> = quotes.iter().map(|q| q.provider.as_str()).collect();
    if distinct.len() < 2 {
        return None;
    }

    let mut best: Option<(usize, usize, Decimal)> = None;
    for (i, first) in quotes.iter().enumerate() {
        for (j, second) in quotes.iter().enumerate() {
            if first.provider == second.provider {
                continue;
            }
            let sum = Decimal::ONE / first.odds[0] + Decimal::ONE / second.odds[1];
            if best.map_or(true, |(_, _, current)| sum < current) {
                best = Some((i, j, sum));
            }
        }
    }

    let (i, j, sum) = best?;
    if sum >= Decimal::ONE {
        return None;
    }

    // Splitting T in proportion to the implied probabilities makes the
    // payout T/s on either outcome; the stakes themselves sum to T.
    let payout = total_stake / sum;
    let teams = m.team_names();
    let legs = [
        BetLeg {
            team: teams[0].to_string(),
            provider: quotes[i].provider.clone(),
            odds: quotes[i].odds[0],
            stake: payout / quotes[i].odds[0],
        },
        BetLeg {
            team: teams[1].to_string(),
            provider: quotes[j].provider.clone(),
            odds: quotes[j].odds[1],
            stake: payout / quotes[j].odds[1],
        },
    ];

    Some(ArbitrageOpportunity {
        legs,
        implied_sum: sum,
        margin_percent: (Decimal::ONE - sum) * dec!(100),
        total_stake,
        guaranteed_profit: payout - total_stake,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shared_types::MatchFormat;
    use chrono::{TimeZone, Utc};

    fn sample_match() -> Match {
        Match::try_new(
            vec!["TeamA".into(), "TeamB".into()],
            Utc.with_ymd_and_hms(2026, 8, 7, 18, 0, 0).unwrap(),
            None,
            MatchFormat::BestOf(3),
            "https://www.hltv.org/matches/1/teama-vs-teamb".into(),
        )
        .unwrap()
    }

    fn quote(provider: &str, a: &str, b: &str) -> ProviderQuote {
        ProviderQuote::try_new(
            provider.into(),
            [a.parse().unwrap(), b.parse().unwrap()],
        )
        .unwrap()
    }

    fn close(a: Decimal, b: Decimal) -> bool {
        (a - b).abs() < dec!(0.0000001)
    }

    #[test]
    fn finds_cross_provider_opportunity() {
        let m = sample_match();
        let quotes = vec![
            quote("ProviderX", "2.10", "1.90"),
            quote("ProviderY", "1.80", "2.30"),
        ];
        let opp = find_arbitrage(&m, &quotes, dec!(100)).expect("expected an opportunity");

        // s = 1/2.10 + 1/2.30 ~ 0.9110
        assert!(opp.implied_sum < Decimal::ONE);
        assert_eq!(opp.implied_sum.round_dp(4), dec!(0.9110));
        assert_eq!(opp.margin_percent.round_dp(2), dec!(8.90));
        assert_eq!(opp.legs[0].provider, "ProviderX");
        assert_eq!(opp.legs[0].odds, dec!(2.10));
        assert_eq!(opp.legs[1].provider, "ProviderY");
        assert_eq!(opp.legs[1].odds, dec!(2.30));
    }

    #[test]
    fn single_provider_never_arbitrages_against_itself() {
        let m = sample_match();
        let quotes = vec![quote("ProviderX", "1.50", "2.50")];
        assert!(find_arbitrage(&m, &quotes, dec!(100)).is_none());

        // Even generous prices from one book must not pair with themselves.
        let quotes = vec![quote("ProviderX", "3.00", "3.00")];
        assert!(find_arbitrage(&m, &quotes, dec!(100)).is_none());
    }

    #[test]
    fn winning_pair_has_distinct_providers() {
        let m = sample_match();
        // ProviderX is best on both sides, but a pair must cross books.
        let quotes = vec![
            quote("ProviderX", "3.00", "3.00"),
            quote("ProviderY", "2.05", "2.05"),
        ];
        let opp = find_arbitrage(&m, &quotes, dec!(100)).unwrap();
        assert_ne!(opp.legs[0].provider, opp.legs[1].provider);
    }

    #[test]
    fn no_opportunity_when_sum_at_or_above_one() {
        let m = sample_match();
        let quotes = vec![
            quote("ProviderX", "1.90", "1.90"),
            quote("ProviderY", "1.90", "1.90"),
        ];
        // s = 1/1.90 + 1/1.90 ~ 1.0526
        assert!(find_arbitrage(&m, &quotes, dec!(100)).is_none());

        // Exactly 1.0 is not risk-free either.
        let quotes = vec![
            quote("ProviderX", "2.00", "2.00"),
            quote("ProviderY", "2.00", "2.00"),
        ];
        assert!(find_arbitrage(&m, &quotes, dec!(100)).is_none());
    }

    #[test]
    fn payout_is_equal_on_either_outcome() {
        let m = sample_match();
        let quotes = vec![
            quote("ProviderX", "2.10", "1.90"),
            quote("ProviderY", "1.80", "2.30"),
        ];
        let total = dec!(250);
        let opp = find_arbitrage(&m, &quotes, total).unwrap();

        let payout_a = opp.legs[0].stake * opp.legs[0].odds;
        let payout_b = opp.legs[1].stake * opp.legs[1].odds;
        assert!(close(payout_a, payout_b));
        assert!(close(opp.legs[0].stake + opp.legs[1].stake, total));
        assert!(close(opp.guaranteed_profit, payout_a - total));
        assert!(opp.guaranteed_profit > Decimal::ZERO);
    }

    #[test]
    fn raising_one_price_never_worsens_the_best_sum() {
        let m = sample_match();
        let base = vec![
            quote("ProviderX", "2.10", "1.90"),
            quote("ProviderY", "1.80", "2.30"),
            quote("ProviderZ", "1.95", "2.05"),
        ];
        let before = find_arbitrage(&m, &base, dec!(100)).unwrap().implied_sum;

        let mut raised = base.clone();
        raised[2] = quote("ProviderZ", "2.40", "2.05");
        let after = find_arbitrage(&m, &raised, dec!(100)).unwrap().implied_sum;
        assert!(after <= before);
    }

    #[test]
    fn ties_resolve_to_first_pair_in_input_order() {
        let m = sample_match();
        // Two pairs with identical sums; the earlier slice order must win.
        let quotes = vec![
            quote("ProviderX", "2.50", "2.50"),
            quote("ProviderY", "2.50", "2.50"),
            quote("ProviderZ", "2.50", "2.50"),
        ];
        let first = find_arbitrage(&m, &quotes, dec!(100)).unwrap();
        let second = find_arbitrage(&m, &quotes, dec!(100)).unwrap();
        assert_eq!(first, second);
        assert_eq!(first.legs[0].provider, "ProviderX");
        assert_eq!(first.legs[1].provider, "ProviderY");
    }

    #[test]
    fn empty_quote_set_yields_none() {
        let m = sample_match();
        assert!(find_arbitrage(&m, &[], dec!(100)).is_none());
    }
}
