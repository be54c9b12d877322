use serde_json::Value;
use tokio::time::Duration;
use tracing::debug;

use crate::renderer::{dismiss_cookie_banner, wait_for_selector, DocumentRenderer};
use crate::shared_types::{FetchError, RawOddsTable};

const BETTING_SECTION_SELECTOR: &str = ".betting-section";

// Mirrors the betting table layout: the first row carries team-cell headers,
// each provider row carries its logo link (name in aria-label) and two odds
// cells. Rows flagged noOdds and cells without a priced link yield "-".
const EXTRACT_ODDS_SCRIPT: &str = r#"
return (function () {
    var section = document.querySelector('.betting-section');
    if (!section) return null;
    var cells = section.querySelectorAll('tr:first-child td.team-cell');
    var rows = Array.from(section.querySelectorAll('tr.provider'))
        .filter(function (row) { return !row.classList.contains('noOdds'); })
        .map(function (row) {
            var logo = row.querySelector('a.betting-logo-link');
            var odds = Array.from(row.querySelectorAll('td.odds-cell.border-left'))
                .map(function (cell) {
                    var priced = cell.querySelector('a');
                    return priced ? priced.textContent.trim() : '-';
                });
            return {
                provider: logo ? (logo.getAttribute('aria-label') || '') : '',
                odds: [
                    odds.length ? odds[0] : '-',
                    odds.length ? odds[odds.length - 1] : '-',
                ],
            };
        });
    return {
        team_labels: [
            cells.length ? cells[0].textContent.trim() : '',
            cells.length ? cells[cells.length - 1].textContent.trim() : '',
        ],
        rows: rows,
    };
})();
"#;

/// Extracts the raw bookmaker odds table from one match page.
///
/// Returns the table as the page presents it; token parsing, team-label
/// alignment and provider dedup all happen in normalization.
pub async fn fetch_match_odds(
    renderer: &mut dyn DocumentRenderer,
    page_url: &str,
) -> Result<RawOddsTable, FetchError> {
    renderer.open(page_url).await?;
    dismiss_cookie_banner(renderer).await;
    wait_for_selector(renderer, BETTING_SECTION_SELECTOR, Duration::from_secs(10)).await?;

    let payload = renderer.eval(EXTRACT_ODDS_SCRIPT).await?;
    if payload == Value::Null {
        return Err(FetchError::MissingSection {
            what: "betting section",
        });
    }

    let table: RawOddsTable = serde_json::from_value(payload)?;
    if table.team_labels.iter().all(|label| label.is_empty()) {
        return Err(FetchError::MissingSection {
            what: "team header cells",
        });
    }

    debug!(%page_url, rows = table.rows.len(), "extracted odds table");
    Ok(table)
}
