use anyhow::Result;
use tokio_cron_scheduler::{Job, JobScheduler};
use tracing::{error, info};

mod aggregator;
mod database;
mod models;
mod scrapers;
mod server;
mod traits;
mod trend_finder;

use trend_finder::TrendFinder;

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt::init();

    info!("Starting trend-finder service");

    let finder = TrendFinder::new().await?;

    // Set up scheduler to refresh stale cached queries in the background
    let refresh_cron =
        std::env::var("REFRESH_CRON").unwrap_or_else(|_| "0 0 */6 * * *".to_string());
    let sched = JobScheduler::new().await?;

    let job_finder = finder.clone();
    sched
        .add(Job::new_async(refresh_cron.as_str(), move |_uuid, _l| {
            let finder = job_finder.clone();
            Box::pin(async move {
                if let Err(e) = finder.refresh_stale().await {
                    error!("Error refreshing stale trends: {}", e);
                }
            })
        })?)
        .await?;

    sched.start().await?;
    info!("Background refresher scheduled ({})", refresh_cron);

    let bind_addr = std::env::var("BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:8001".to_string());
    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    info!("Listening on {}", bind_addr);

    axum::serve(listener, server::router(finder)).await?;

    Ok(())
}
