use chrono::{DateTime, Utc};

use crate::api::Exchange;
use crate::scanner::ListingEvent;

const ALERT_TIME_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";
const CRASH_DETAIL_LIMIT: usize = 200;
const META_ALERT_DETAIL_LIMIT: usize = 100;

/// Escapes text for Telegram's HTML parse mode.
pub fn escape_html(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            _ => escaped.push(c),
        }
    }
    escaped
}

/// Cuts `text` to at most `limit` characters.
pub fn truncate_chars(text: &str, limit: usize) -> &str {
    match text.char_indices().nth(limit) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

pub fn format_alert(event: &ListingEvent) -> String {
    let exchange = event.exchange.name();
    let coin = escape_html(&event.coin_symbol);

    format!(
        "=== NEW LISTING ALERT ===\n\n\
         {}\n\
         Exchange: {}\n\
         Coin: {}\n\
         Info: {}\n\
         Link: {}\n\
         Time: {}\n\n\
         #NewListing #{} #{}",
        event.exchange.tag(),
        exchange,
        coin,
        escape_html(&event.title),
        escape_html(&event.url),
        event.detected_at.format(ALERT_TIME_FORMAT),
        exchange,
        coin,
    )
}

pub fn format_startup(exchanges: &[Exchange], interval_secs: u64, now: DateTime<Utc>) -> String {
    let names: Vec<&str> = exchanges.iter().map(Exchange::name).collect();
    format!(
        "<b>Listing Alert Bot Started!</b>\n\n\
         Monitoring: {}\n\
         Interval: {} seconds\n\
         Time: {}",
        names.join(", "),
        interval_secs,
        now.format("%Y-%m-%d %H:%M:%S"),
    )
}

pub fn format_stopped() -> String {
    "<b>Bot Stopped</b>\n\nListing Alert Bot has been stopped manually.".to_string()
}

pub fn format_crash(error: &str) -> String {
    format!(
        "<b>Bot Crashed!</b>\n\nError: {}",
        escape_html(truncate_chars(error, CRASH_DETAIL_LIMIT))
    )
}

pub fn format_repeated_failures(failures: u32, last_error: &str) -> String {
    format!(
        "<b>Bot Error Alert</b>\n\nRepeated errors: {}x\nError: {}",
        failures,
        escape_html(truncate_chars(last_error, META_ALERT_DETAIL_LIMIT))
    )
}
