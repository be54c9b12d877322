use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Deserialize;
use thiserror::Error;
use url::Url;

use crate::renderer::RendererError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Team {
    pub name: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchFormat {
    BestOf(u8),
    Unknown,
}

impl std::fmt::Display for MatchFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MatchFormat::BestOf(n) => write!(f, "bo{}", n),
            MatchFormat::Unknown => write!(f, "?"),
        }
    }
}

/// One upcoming match as discovered from the matches page. Immutable after
/// construction; `try_new` is the only way in, so a `Match` always carries
/// exactly two distinct, non-empty team names and a dereferenceable page link.
#[derive(Debug, Clone)]
pub struct Match {
    pub teams: [Team; 2],
    pub start_time: DateTime<Utc>,
    pub event: Option<String>,
    pub format: MatchFormat,
    pub page_url: String,
}

impl Match {
    pub fn try_new(
        team_names: Vec<String>,
        start_time: DateTime<Utc>,
        event: Option<String>,
        format: MatchFormat,
        page_url: String,
    ) -> Result<Self, MatchError> {
        if team_names.len() != 2 {
            return Err(MatchError::TeamCount {
                found: team_names.len(),
            });
        }
        let mut names = team_names.into_iter();
        let first = names.next().unwrap_or_default().trim().to_string();
        let second = names.next().unwrap_or_default().trim().to_string();
        if first.is_empty() || second.is_empty() {
            return Err(MatchError::EmptyTeamName);
        }
        if first == second {
            return Err(MatchError::DuplicateTeamName { name: first });
        }
        if Url::parse(&page_url).is_err() {
            return Err(MatchError::BadLink { link: page_url });
        }
        Ok(Self {
            teams: [Team { name: first }, Team { name: second }],
            start_time,
            event,
            format,
            page_url,
        })
    }

    pub fn team_names(&self) -> [&str; 2] {
        [&self.teams[0].name, &self.teams[1].name]
    }
}

impl std::fmt::Display for Match {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} vs {}", self.teams[0].name, self.teams[1].name)
    }
}

/// One bookmaker's two-sided price for a match, odds indexed by team slot.
/// Only constructed through `try_new`, so both odds are strictly above 1.0
/// and the provider name is never empty.
#[derive(Debug, Clone, PartialEq)]
pub struct ProviderQuote {
    pub provider: String,
    pub odds: [Decimal; 2],
}

impl ProviderQuote {
    pub fn try_new(provider: String, odds: [Decimal; 2]) -> Result<Self, QuoteError> {
        let provider = provider.trim().to_string();
        if provider.is_empty() {
            return Err(QuoteError::EmptyProvider);
        }
        for value in odds {
            if value <= Decimal::ONE {
                return Err(QuoteError::OddsOutOfRange {
                    provider: provider.clone(),
                    value,
                });
            }
        }
        Ok(Self { provider, odds })
    }
}

/// One leg of an arbitrage split: which team to back, where, and for how much.
#[derive(Debug, Clone, PartialEq)]
pub struct BetLeg {
    pub team: String,
    pub provider: String,
    pub odds: Decimal,
    pub stake: Decimal,
}

/// A risk-free two-way split found for one match. Valid only for the quote
/// set that produced it; never cached across fetches.
#[derive(Debug, Clone, PartialEq)]
pub struct ArbitrageOpportunity {
    pub legs: [BetLeg; 2],
    pub implied_sum: Decimal,
    pub margin_percent: Decimal,
    pub total_stake: Decimal,
    pub guaranteed_profit: Decimal,
}

/// Per-match verdict. `NoArbitrage` and `NoData` are distinct on purpose:
/// a clean scan and an unreadable page mean different things to the caller.
#[derive(Debug, Clone)]
pub enum MatchOutcome {
    Opportunity(ArbitrageOpportunity),
    NoArbitrage { providers: usize },
    NoData { reason: String },
}

#[derive(Debug, Clone)]
pub struct MatchReport {
    pub match_info: Match,
    pub outcome: MatchOutcome,
}

/// Raw odds rows as extracted from a match page, before normalization.
/// The table carries its own team labels; the odds page may abbreviate or
/// reorder names relative to the matches page.
#[derive(Deserialize, Debug, Clone)]
pub struct RawOddsTable {
    pub team_labels: [String; 2],
    pub rows: Vec<RawQuoteRow>,
}

#[derive(Deserialize, Debug, Clone)]
pub struct RawQuoteRow {
    pub provider: String,
    pub odds: [String; 2],
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MatchError {
    #[error("expected exactly two teams, found {found}")]
    TeamCount { found: usize },
    #[error("team name is empty")]
    EmptyTeamName,
    #[error("both teams are named {name:?}")]
    DuplicateTeamName { name: String },
    #[error("match timestamp {raw} is not a valid unix time")]
    BadTimestamp { raw: i64 },
    #[error("match link {link:?} is not a valid url")]
    BadLink { link: String },
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum QuoteError {
    #[error("provider name is empty")]
    EmptyProvider,
    #[error("{provider}: odds token {token:?} for {team} does not parse above 1.0")]
    MalformedOdds {
        provider: String,
        team: String,
        token: String,
    },
    #[error("{provider}: odds {value} is not above 1.0")]
    OddsOutOfRange { provider: String, value: Decimal },
    #[error("{provider}: duplicate row for this provider")]
    DuplicateProvider { provider: String },
}

#[derive(Error, Debug)]
pub enum FetchError {
    #[error("renderer: {0}")]
    Renderer(#[from] RendererError),
    #[error("page is missing its {what}")]
    MissingSection { what: &'static str },
    #[error("malformed extraction payload: {0}")]
    BadPayload(#[from] serde_json::Error),
}
