use chrono::{DateTime, Duration as ChronoDuration, Utc};
use lazy_static::lazy_static;
use regex::Regex;
use serde::Deserialize;
use tokio::time::Duration;
use tracing::{info, warn};

use crate::renderer::{dismiss_cookie_banner, wait_for_selector, DocumentRenderer};
use crate::shared_types::{FetchError, Match, MatchError, MatchFormat};

const MATCHES_URL: &str = "https://www.hltv.org/matches";
const MATCH_LIST_SELECTOR: &str = ".upcomingMatchesWrapper";

lazy_static! {
    static ref RE_BEST_OF: Regex = Regex::new(r"(?i)\bbo\s*(\d{1,2})\b").unwrap();
}

// One script call per page load; walking the list element-by-element over
// the wire is an order of magnitude slower.
const EXTRACT_MATCHES_SCRIPT: &str = r#"
return Array.from(document.querySelectorAll('.upcomingMatch')).map(function (el) {
    var link = el.querySelector('a.match');
    var unix = parseInt(el.getAttribute('data-zonedgrouping-entry-unix'), 10);
    var event = el.querySelector('.matchEventName');
    var meta = el.querySelector('.matchMeta');
    return {
        link: link ? link.href : null,
        unix_ms: isNaN(unix) ? null : unix,
        team_names: Array.from(el.querySelectorAll('.matchTeam .matchTeamName'))
            .map(function (n) { return n.textContent.trim(); }),
        event: event ? event.textContent.trim() : null,
        format: meta ? meta.textContent.trim() : null,
    };
});
"#;

#[derive(Deserialize, Debug)]
struct RawMatch {
    link: Option<String>,
    unix_ms: Option<i64>,
    #[serde(default)]
    team_names: Vec<String>,
    event: Option<String>,
    format: Option<String>,
}

pub fn parse_format(text: Option<&str>) -> MatchFormat {
    text.and_then(|t| RE_BEST_OF.captures(t))
        .and_then(|caps| caps.get(1))
        .and_then(|n| n.as_str().parse::<u8>().ok())
        .map(MatchFormat::BestOf)
        .unwrap_or(MatchFormat::Unknown)
}

fn raw_to_match(raw: RawMatch) -> Result<Match, MatchError> {
    let link = raw.link.unwrap_or_default();
    let unix_ms = raw.unix_ms.unwrap_or(0);
    let start_time = DateTime::from_timestamp_millis(unix_ms)
        .filter(|_| unix_ms > 0)
        .ok_or(MatchError::BadTimestamp { raw: unix_ms })?;
    let format = parse_format(raw.format.as_deref());
    Match::try_new(raw.team_names, start_time, raw.event, format, link)
}

/// Scrapes the upcoming-matches page and returns validated matches starting
/// within the next `days_ahead` days, in page (discovery) order.
///
/// Records that fail validation are counted and logged, never fatal: the
/// matches page routinely lists TBD slots with one or zero named teams.
pub async fn fetch_upcoming_matches(
    renderer: &mut dyn DocumentRenderer,
    days_ahead: i64,
) -> Result<Vec<Match>, FetchError> {
    renderer.open(MATCHES_URL).await?;
    dismiss_cookie_banner(renderer).await;
    wait_for_selector(renderer, MATCH_LIST_SELECTOR, Duration::from_secs(20)).await?;

    let payload = renderer.eval(EXTRACT_MATCHES_SCRIPT).await?;
    let raw: Vec<RawMatch> = serde_json::from_value(payload)?;

    let now = Utc::now();
    let window_end = now + ChronoDuration::days(days_ahead);
    let mut matches = Vec::new();
    let mut rejected = 0usize;
    let mut outside_window = 0usize;

    for record in raw {
        match raw_to_match(record) {
            Ok(m) if m.start_time >= now && m.start_time <= window_end => matches.push(m),
            Ok(_) => outside_window += 1,
            Err(reason) => {
                rejected += 1;
                warn!(%reason, "skipping malformed match record");
            }
        }
    }

    info!(
        kept = matches.len(),
        outside_window, rejected, "match discovery finished"
    );
    Ok(matches)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_best_of_formats() {
        assert_eq!(parse_format(Some("bo3")), MatchFormat::BestOf(3));
        assert_eq!(parse_format(Some("BO5")), MatchFormat::BestOf(5));
        assert_eq!(parse_format(Some("bo 1")), MatchFormat::BestOf(1));
        assert_eq!(parse_format(Some("Showmatch")), MatchFormat::Unknown);
        assert_eq!(parse_format(None), MatchFormat::Unknown);
    }

    fn raw(link: Option<&str>, unix_ms: Option<i64>, teams: &[&str]) -> RawMatch {
        RawMatch {
            link: link.map(String::from),
            unix_ms,
            team_names: teams.iter().map(|t| t.to_string()).collect(),
            event: Some("BLAST Premier".into()),
            format: Some("bo3".into()),
        }
    }

    #[test]
    fn valid_record_becomes_a_match() {
        let m = raw_to_match(raw(
            Some("https://www.hltv.org/matches/1/astralis-vs-navi"),
            Some(1_775_000_000_000),
            &["Astralis", "NAVI"],
        ))
        .unwrap();
        assert_eq!(m.team_names(), ["Astralis", "NAVI"]);
        assert_eq!(m.format, MatchFormat::BestOf(3));
        assert_eq!(m.event.as_deref(), Some("BLAST Premier"));
    }

    #[test]
    fn record_without_timestamp_is_rejected() {
        let err = raw_to_match(raw(
            Some("https://www.hltv.org/matches/1/a-vs-b"),
            None,
            &["A", "B"],
        ))
        .unwrap_err();
        assert_eq!(err, MatchError::BadTimestamp { raw: 0 });
    }

    #[test]
    fn tbd_slot_with_one_team_is_rejected() {
        let err = raw_to_match(raw(
            Some("https://www.hltv.org/matches/1/a-vs-tbd"),
            Some(1_775_000_000_000),
            &["A"],
        ))
        .unwrap_err();
        assert_eq!(err, MatchError::TeamCount { found: 1 });
    }

    #[test]
    fn record_without_link_is_rejected() {
        let err = raw_to_match(raw(None, Some(1_775_000_000_000), &["A", "B"])).unwrap_err();
        assert!(matches!(err, MatchError::BadLink { .. }));
    }
}
