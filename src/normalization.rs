use std::collections::HashSet;

use rust_decimal::Decimal;
use strsim::normalized_damerau_levenshtein;
use tracing::debug;

use crate::shared_types::{Match, ProviderQuote, QuoteError, RawOddsTable, RawQuoteRow};

/// Below this combined similarity the odds table's team labels are treated
/// as inconclusive and the page row order is trusted as-is.
const LABEL_SIMILARITY_THRESHOLD: f64 = 0.6;

/// Parses a raw odds token into a canonical decimal price.
///
/// Accepts either `.` or `,` as the decimal separator. Empty tokens, the
/// site's "-" no-odds placeholder, non-numeric text and anything at or
/// below 1.0 yield `None`. Pure; the same token always parses identically.
pub fn normalize_odds(raw: &str) -> Option<Decimal> {
    let token = raw.trim();
    if token.is_empty() || token == "-" {
        return None;
    }
    let value = token.replace(',', ".").parse::<Decimal>().ok()?;
    if value > Decimal::ONE {
        Some(value)
    } else {
        None
    }
}

fn label_similarity(a: &str, b: &str) -> f64 {
    normalized_damerau_levenshtein(&a.to_lowercase(), &b.to_lowercase())
}

/// Decides whether the odds table lists teams in the opposite order to the
/// match record. Returns true only when the swapped orientation is clearly
/// the better fit; otherwise the page order stands.
fn labels_swapped(labels: &[String; 2], teams: [&str; 2]) -> bool {
    let straight = label_similarity(&labels[0], teams[0]) + label_similarity(&labels[1], teams[1]);
    let swapped = label_similarity(&labels[0], teams[1]) + label_similarity(&labels[1], teams[0]);
    swapped > straight && swapped >= 2.0 * LABEL_SIMILARITY_THRESHOLD
}

fn quote_from_row(row: &RawQuoteRow, swapped: bool, teams: [&str; 2]) -> Result<ProviderQuote, QuoteError> {
    let provider = row.provider.trim();
    if provider.is_empty() {
        return Err(QuoteError::EmptyProvider);
    }

    let (raw_first, raw_second) = if swapped {
        (&row.odds[1], &row.odds[0])
    } else {
        (&row.odds[0], &row.odds[1])
    };

    let malformed = |team: &str, token: &str| QuoteError::MalformedOdds {
        provider: provider.to_string(),
        team: team.to_string(),
        token: token.to_string(),
    };
    let first = normalize_odds(raw_first).ok_or_else(|| malformed(teams[0], raw_first))?;
    let second = normalize_odds(raw_second).ok_or_else(|| malformed(teams[1], raw_second))?;

    ProviderQuote::try_new(provider.to_string(), [first, second])
}

/// Turns a raw odds table into validated quotes for a match.
///
/// Rows with an empty provider, a missing or malformed odds token, or a
/// provider already seen for this match are dropped individually; a bad row
/// never invalidates the rest of the table. Drop reasons are logged so a
/// quiet scan can be told apart from a broken page.
pub fn build_quotes(table: &RawOddsTable, m: &Match) -> Vec<ProviderQuote> {
    let teams = m.team_names();
    let swapped = labels_swapped(&table.team_labels, teams);
    if swapped {
        debug!(match_page = %m.page_url, "odds table lists teams in reverse order");
    }

    let mut seen: HashSet<String> = HashSet::new();
    let mut quotes = Vec::with_capacity(table.rows.len());
    for row in &table.rows {
        match quote_from_row(row, swapped, teams) {
            Ok(quote) => {
                if !seen.insert(quote.provider.clone()) {
                    debug!(
                        reason = %QuoteError::DuplicateProvider { provider: quote.provider.clone() },
                        "dropping quote"
                    );
                    continue;
                }
                quotes.push(quote);
            }
            Err(reason) => debug!(%reason, "dropping quote"),
        }
    }
    quotes
}
