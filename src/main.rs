use anyhow::Result;
use chrono::Utc;
use std::sync::Arc;

use listing_alert_bot::api::{self, BithumbClient, Exchange, ExchangeFeed, UpbitClient};
use listing_alert_bot::core::{logging, Config, Scheduler, ShutdownListener};
use listing_alert_bot::monitoring::{build_notifier, reporter, Notifier};

#[tokio::main]
async fn main() -> Result<()> {
    let config = Config::from_env()?;
    logging::init_logging(&config.monitor.log_level)?;

    let notifier = build_notifier(&config.telegram)?;
    let mut shutdown = ShutdownListener::install()?;

    tokio::select! {
        result = run(config, notifier.clone()) => {
            if let Err(e) = &result {
                tracing::error!("Fatal error: {:#}", e);
                notifier.deliver(&reporter::format_crash(&format!("{:#}", e))).await;
            }
            result
        }
        signal = shutdown.wait() => {
            tracing::info!("Bot stopped by {}", signal);
            notifier.deliver(&reporter::format_stopped()).await;
            Ok(())
        }
    }
}

async fn run(config: Config, notifier: Arc<dyn Notifier>) -> Result<()> {
    let interval = config.monitor.check_interval_secs;

    tracing::info!("{}", "=".repeat(50));
    tracing::info!("Listing Alert Bot v{} Started", env!("CARGO_PKG_VERSION"));
    tracing::info!("Check interval: {} seconds", interval);
    tracing::info!("Monitoring: Upbit (notices + markets), Bithumb (markets)");
    tracing::info!("{}", "=".repeat(50));

    let http = api::build_http_client(config.monitor.request_timeout_secs)?;
    let feeds: Vec<Arc<dyn ExchangeFeed>> = vec![
        Arc::new(UpbitClient::new(http.clone())),
        Arc::new(BithumbClient::new(http)),
    ];

    notifier
        .deliver(&reporter::format_startup(&Exchange::ALL, interval, Utc::now()))
        .await;

    let mut scheduler = Scheduler::new(&config.monitor, feeds, notifier);
    scheduler.run().await
}
