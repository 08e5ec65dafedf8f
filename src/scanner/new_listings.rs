use chrono::{DateTime, Utc};
use std::collections::BTreeSet;

use super::symbol::coin_symbol_or_unknown;
use crate::api::{Announcement, Exchange, ExchangeFeed, FetchError};
use crate::monitoring::KnownState;

/// Title fragments that mark an announcement as a new listing.
pub const LISTING_KEYWORDS: [&str; 6] = [
    "신규",
    "상장",
    "거래지원",
    "마켓 추가",
    "원화 마켓",
    "디지털 자산 추가",
];

/// One newly detected market or listing announcement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListingEvent {
    pub exchange: Exchange,
    pub title: String,
    pub coin_symbol: String,
    pub url: String,
    pub detected_at: DateTime<Utc>,
    /// Announcement id, or a synthesized market key. In-cycle dedup only.
    pub key: String,
}

impl ListingEvent {
    pub fn from_announcement(
        exchange: Exchange,
        announcement: &Announcement,
        detected_at: DateTime<Utc>,
    ) -> Self {
        Self {
            exchange,
            title: announcement.title.clone(),
            coin_symbol: coin_symbol_or_unknown(&announcement.title),
            url: announcement_url(exchange, &announcement.id),
            detected_at,
            key: announcement.id.clone(),
        }
    }

    pub fn from_market(exchange: Exchange, symbol: &str, detected_at: DateTime<Utc>) -> Self {
        let key_prefix = match exchange {
            Exchange::Upbit => "market",
            Exchange::Bithumb => "bithumb",
        };
        Self {
            exchange,
            title: format!("New Market Detected: {}/KRW", symbol),
            coin_symbol: symbol.to_string(),
            url: market_url(exchange, symbol),
            detected_at,
            key: format!("{}_{}_{}", key_prefix, symbol, detected_at.timestamp()),
        }
    }
}

fn announcement_url(exchange: Exchange, id: &str) -> String {
    match exchange {
        Exchange::Upbit => format!("https://upbit.com/service_center/notice?id={}", id),
        // No notice board is polled for Bithumb.
        Exchange::Bithumb => "https://www.bithumb.com".to_string(),
    }
}

fn market_url(exchange: Exchange, symbol: &str) -> String {
    match exchange {
        Exchange::Upbit => format!("https://upbit.com/exchange?code=CRIX.UPBIT.KRW-{}", symbol),
        Exchange::Bithumb => format!("https://www.bithumb.com/trade/order/{}_KRW", symbol),
    }
}

pub fn is_listing_title(title: &str) -> bool {
    LISTING_KEYWORDS.iter().any(|keyword| title.contains(keyword))
}

/// Announcement-based detection.
///
/// An unseen announcement with a listing keyword becomes an event and its id
/// is recorded. Announcements without a keyword are left unrecorded so a
/// later edit of the title can still qualify them.
pub fn diff_announcements(
    exchange: Exchange,
    announcements: &[Announcement],
    state: &mut KnownState,
    now: DateTime<Utc>,
) -> Vec<ListingEvent> {
    let mut events = Vec::new();

    for announcement in announcements {
        if announcement.id.is_empty()
            || state.knows_announcement(exchange, &announcement.id)
            || !is_listing_title(&announcement.title)
        {
            continue;
        }

        if state.record_announcement(exchange, &announcement.id) {
            events.push(ListingEvent::from_announcement(exchange, announcement, now));
        }
    }

    events
}

/// Market-snapshot detection: `current - known`, one event per symbol.
///
/// An empty known set is a first observation and emits nothing. The known
/// set is then replaced by `current` unless `current` is empty.
pub fn diff_markets(
    exchange: Exchange,
    current: BTreeSet<String>,
    state: &mut KnownState,
    now: DateTime<Utc>,
) -> Vec<ListingEvent> {
    let known = state.markets(exchange);

    let events: Vec<ListingEvent> = if known.is_empty() || current.is_empty() {
        Vec::new()
    } else {
        current
            .difference(known)
            .map(|symbol| {
                tracing::info!("New {} market: {}", exchange, symbol);
                ListingEvent::from_market(exchange, symbol, now)
            })
            .collect()
    };

    state.replace_markets(exchange, current);
    events
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Source {
    Announcements,
    Markets,
}

/// Result of checking one exchange.
#[derive(Debug, Default)]
pub struct ExchangeCheck {
    pub events: Vec<ListingEvent>,
    pub attempted: usize,
    pub failures: Vec<(Source, FetchError)>,
}

impl ExchangeCheck {
    pub fn all_failed(&self) -> bool {
        self.attempted > 0 && self.failures.len() == self.attempted
    }
}

/// Announcement ids kept when adopting a baseline.
pub const BASELINE_NOTICE_LIMIT: usize = 50;

/// Records the fetched page as already seen, without emitting events.
/// Returns the number of ids now known.
fn adopt_announcement_baseline(
    exchange: Exchange,
    announcements: Vec<Announcement>,
    state: &mut KnownState,
) -> usize {
    let ids = announcements
        .into_iter()
        .take(BASELINE_NOTICE_LIMIT)
        .map(|a| a.id);
    state.reset_announcements(exchange, ids);
    state
        .announcement_ids(exchange)
        .map(|ids| ids.len())
        .unwrap_or(0)
}

/// Diff engine over a single exchange feed.
pub struct NewListingDetector;

impl NewListingDetector {
    /// Runs announcement detection (when the exchange has a feed) and then
    /// market detection. Fetch errors are logged, recorded and treated as
    /// empty results.
    ///
    /// With no announcement baseline yet (bootstrap fetch failed, or a state
    /// file from before notices were tracked), the first page fetched becomes
    /// the baseline silently.
    pub async fn check(feed: &dyn ExchangeFeed, state: &mut KnownState) -> ExchangeCheck {
        let exchange = feed.exchange();
        let mut check = ExchangeCheck::default();

        if feed.has_announcements() {
            check.attempted += 1;
            let announcements = match feed.fetch_announcements().await {
                Ok(announcements) => announcements,
                Err(e) => {
                    tracing::error!("{} notices error: {}", exchange, e);
                    check.failures.push((Source::Announcements, e));
                    Vec::new()
                }
            };

            if state.announcement_baseline_pending(exchange) && !announcements.is_empty() {
                let count = adopt_announcement_baseline(exchange, announcements, state);
                tracing::info!("{}: Adopted {} notices as baseline", exchange, count);
            } else {
                check.events.extend(diff_announcements(
                    exchange,
                    &announcements,
                    state,
                    Utc::now(),
                ));
            }
        }

        check.attempted += 1;
        let current = match feed.fetch_market_symbols().await {
            Ok(symbols) => symbols,
            Err(e) => {
                tracing::error!("{} markets error: {}", exchange, e);
                check.failures.push((Source::Markets, e));
                BTreeSet::new()
            }
        };
        check
            .events
            .extend(diff_markets(exchange, current, state, Utc::now()));

        check
    }

    /// Records the current snapshot and the latest announcements without
    /// emitting anything. Returns how many (announcements, markets) were taken.
    pub async fn baseline(feed: &dyn ExchangeFeed, state: &mut KnownState) -> (usize, usize) {
        let exchange = feed.exchange();

        let markets = match feed.fetch_market_symbols().await {
            Ok(symbols) => symbols,
            Err(e) => {
                tracing::error!("{} markets error during baseline: {}", exchange, e);
                BTreeSet::new()
            }
        };
        let market_count = markets.len();
        if state.replace_markets(exchange, markets) {
            tracing::info!("{}: Loaded {} existing markets", exchange, market_count);
        }

        let mut notice_count = 0;
        if feed.has_announcements() {
            match feed.fetch_announcements().await {
                Ok(announcements) => {
                    notice_count = adopt_announcement_baseline(exchange, announcements, state);
                    tracing::info!("{}: Loaded {} existing notices", exchange, notice_count);
                }
                Err(e) => {
                    tracing::warn!("{} notices error during baseline: {}", exchange, e);
                }
            }
        }

        (notice_count, market_count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::MockExchangeFeed;
    use crate::scanner::UNKNOWN_SYMBOL;

    fn symbols(items: &[&str]) -> BTreeSet<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    fn notice(id: &str, title: &str) -> Announcement {
        Announcement {
            id: id.to_string(),
            title: title.to_string(),
        }
    }

    fn state_with_markets(exchange: Exchange, items: &[&str]) -> KnownState {
        let mut state = KnownState::default();
        state.replace_markets(exchange, symbols(items));
        state
    }

    #[test]
    fn test_set_difference() {
        let mut state = state_with_markets(Exchange::Upbit, &["A", "B"]);

        let events = diff_markets(Exchange::Upbit, symbols(&["B", "C"]), &mut state, Utc::now());

        assert_eq!(events.len(), 1);
        assert_eq!(events[0].coin_symbol, "C");
        assert_eq!(events[0].title, "New Market Detected: C/KRW");
        assert_eq!(
            events[0].url,
            "https://upbit.com/exchange?code=CRIX.UPBIT.KRW-C"
        );
        assert!(events[0].key.starts_with("market_C_"));
        assert_eq!(state.markets(Exchange::Upbit), &symbols(&["B", "C"]));
    }

    #[test]
    fn test_market_diff_is_idempotent() {
        let mut state = state_with_markets(Exchange::Bithumb, &["BTC"]);
        let fetched = symbols(&["BTC", "NEW"]);

        let first = diff_markets(Exchange::Bithumb, fetched.clone(), &mut state, Utc::now());
        let second = diff_markets(Exchange::Bithumb, fetched, &mut state, Utc::now());

        assert_eq!(first.len(), 1);
        assert_eq!(first[0].url, "https://www.bithumb.com/trade/order/NEW_KRW");
        assert!(first[0].key.starts_with("bithumb_NEW_"));
        assert!(second.is_empty());
    }

    #[test]
    fn test_first_observation_emits_nothing() {
        let mut state = KnownState::default();
        let fetched = symbols(&["BTC", "ETH", "XRP", "SOL"]);

        let events = diff_markets(Exchange::Upbit, fetched.clone(), &mut state, Utc::now());

        assert!(events.is_empty());
        assert_eq!(state.markets(Exchange::Upbit), &fetched);
    }

    #[test]
    fn test_empty_fetch_keeps_known_markets() {
        let mut state = state_with_markets(Exchange::Upbit, &["BTC", "ETH"]);

        let events = diff_markets(Exchange::Upbit, BTreeSet::new(), &mut state, Utc::now());

        assert!(events.is_empty());
        assert_eq!(state.markets(Exchange::Upbit), &symbols(&["BTC", "ETH"]));
    }

    #[test]
    fn test_relisted_symbol_counts_as_new() {
        let mut state = state_with_markets(Exchange::Upbit, &["A", "B"]);

        diff_markets(Exchange::Upbit, symbols(&["A"]), &mut state, Utc::now());
        let events = diff_markets(Exchange::Upbit, symbols(&["A", "B"]), &mut state, Utc::now());

        assert_eq!(events.len(), 1);
        assert_eq!(events[0].coin_symbol, "B");
    }

    #[test]
    fn test_announcement_dedup() {
        let mut state = KnownState::default();
        let notices = vec![notice("100", "신규 상장 안내 (ABC)")];

        let first = diff_announcements(Exchange::Upbit, &notices, &mut state, Utc::now());
        let second = diff_announcements(Exchange::Upbit, &notices, &mut state, Utc::now());

        assert_eq!(first.len(), 1);
        assert_eq!(first[0].coin_symbol, "ABC");
        assert_eq!(first[0].key, "100");
        assert_eq!(
            first[0].url,
            "https://upbit.com/service_center/notice?id=100"
        );
        assert!(second.is_empty());
        assert_eq!(
            state.announcement_ids(Exchange::Upbit).unwrap(),
            &["100".to_string()]
        );
    }

    #[test]
    fn test_keyword_gating_leaves_id_unrecorded() {
        let mut state = KnownState::default();
        let notices = vec![notice("200", "서버 점검 안내")];

        let events = diff_announcements(Exchange::Upbit, &notices, &mut state, Utc::now());

        assert!(events.is_empty());
        assert!(!state.knows_announcement(Exchange::Upbit, "200"));

        // Same id, title later edited into a listing notice.
        let edited = vec![notice("200", "디지털 자산 추가 안내")];
        let events = diff_announcements(Exchange::Upbit, &edited, &mut state, Utc::now());
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].coin_symbol, UNKNOWN_SYMBOL);
    }

    #[test]
    fn test_duplicate_ids_within_one_fetch() {
        let mut state = KnownState::default();
        let notices = vec![
            notice("300", "XYZ/KRW 마켓 추가"),
            notice("300", "XYZ/KRW 마켓 추가"),
        ];

        let events = diff_announcements(Exchange::Upbit, &notices, &mut state, Utc::now());
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].coin_symbol, "XYZ");
    }

    #[tokio::test]
    async fn test_check_orders_announcements_before_markets() {
        let mut feed = MockExchangeFeed::new();
        feed.expect_exchange().return_const(Exchange::Upbit);
        feed.expect_has_announcements().return_const(true);
        feed.expect_fetch_announcements()
            .times(1)
            .returning(|| Ok(vec![notice("1", "신규 거래지원 안내 (NEW)")]));
        feed.expect_fetch_market_symbols()
            .times(1)
            .returning(|| Ok(symbols(&["BTC", "MKT"])));

        let mut state = state_with_markets(Exchange::Upbit, &["BTC"]);
        state.record_announcement(Exchange::Upbit, "0");
        let check = NewListingDetector::check(&feed, &mut state).await;

        let coins: Vec<&str> = check.events.iter().map(|e| e.coin_symbol.as_str()).collect();
        assert_eq!(coins, vec!["NEW", "MKT"]);
        assert_eq!(check.attempted, 2);
        assert!(check.failures.is_empty());
        assert!(!check.all_failed());
    }

    #[tokio::test]
    async fn test_check_swallows_fetch_errors() {
        let mut feed = MockExchangeFeed::new();
        feed.expect_exchange().return_const(Exchange::Bithumb);
        feed.expect_has_announcements().return_const(false);
        feed.expect_fetch_announcements().never();
        feed.expect_fetch_market_symbols()
            .returning(|| Err(FetchError::Rejected("status 5600".to_string())));

        let mut state = state_with_markets(Exchange::Bithumb, &["BTC"]);
        let check = NewListingDetector::check(&feed, &mut state).await;

        assert!(check.events.is_empty());
        assert_eq!(check.failures.len(), 1);
        assert_eq!(check.failures[0].0, Source::Markets);
        assert!(check.all_failed());
        assert_eq!(state.markets(Exchange::Bithumb), &symbols(&["BTC"]));
    }

    #[tokio::test]
    async fn test_baseline_emits_nothing_and_caps_notices() {
        let total = BASELINE_NOTICE_LIMIT + 10;
        let mut feed = MockExchangeFeed::new();
        feed.expect_exchange().return_const(Exchange::Upbit);
        feed.expect_has_announcements().return_const(true);
        feed.expect_fetch_market_symbols()
            .returning(|| Ok(symbols(&["BTC", "ETH"])));
        feed.expect_fetch_announcements().returning(move || {
            Ok((0..total)
                .map(|i| notice(&i.to_string(), "신규 상장"))
                .collect())
        });

        let mut state = KnownState::default();
        let (notices, markets) = NewListingDetector::baseline(&feed, &mut state).await;

        assert_eq!((notices, markets), (BASELINE_NOTICE_LIMIT, 2));
        let ids = state.announcement_ids(Exchange::Upbit).unwrap();
        assert_eq!(ids.first().map(String::as_str), Some("0"));
        assert!(!state.knows_announcement(Exchange::Upbit, &BASELINE_NOTICE_LIMIT.to_string()));
        assert_eq!(state.markets(Exchange::Upbit), &symbols(&["BTC", "ETH"]));
    }

    #[tokio::test]
    async fn test_first_page_after_failed_baseline_is_silent() {
        let mut calls = 0;
        let mut feed = MockExchangeFeed::new();
        feed.expect_exchange().return_const(Exchange::Upbit);
        feed.expect_has_announcements().return_const(true);
        feed.expect_fetch_market_symbols()
            .returning(|| Ok(symbols(&["BTC"])));
        feed.expect_fetch_announcements().returning(move || {
            calls += 1;
            match calls {
                1 => Err(FetchError::Decode("timeout".to_string())),
                2 => Ok(vec![
                    notice("10", "신규 상장 안내 (OLD)"),
                    notice("11", "서버 점검 안내"),
                ]),
                _ => Ok(vec![
                    notice("12", "신규 거래지원 안내 (NEW)"),
                    notice("10", "신규 상장 안내 (OLD)"),
                    notice("11", "서버 점검 안내"),
                ]),
            }
        });

        let mut state = KnownState::default();
        assert_eq!(NewListingDetector::baseline(&feed, &mut state).await, (0, 1));
        assert!(state.announcement_baseline_pending(Exchange::Upbit));

        let first = NewListingDetector::check(&feed, &mut state).await;
        assert!(first.events.is_empty());
        assert!(state.knows_announcement(Exchange::Upbit, "10"));
        assert!(state.knows_announcement(Exchange::Upbit, "11"));

        let second = NewListingDetector::check(&feed, &mut state).await;
        let coins: Vec<&str> = second.events.iter().map(|e| e.coin_symbol.as_str()).collect();
        assert_eq!(coins, vec!["NEW"]);
    }
}
