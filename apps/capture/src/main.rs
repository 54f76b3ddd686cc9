use std::sync::Arc;

use anyhow::Result;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use job_capture::browser::{CdpBrowser, TabAccessor};
use job_capture::capture::{CaptureController, CaptureEvents, CaptureOutcome};
use job_capture::config::Config;
use job_capture::list_view::{self, ListView};
use job_capture::service_client::{build_http_client, ExtractionClient, PersistenceClient};

// One thread: every pipeline step is an await point on the same event loop.
#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let config = Config::from_env()?;

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!("{}={}", env!("CARGO_CRATE_NAME"), &config.rust_log))
        }))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    info!("Starting job capture v{}", env!("CARGO_PKG_VERSION"));
    info!("Backend: {}, DevTools: {}", config.backend_url, config.devtools_url);

    let http = build_http_client(config.http_timeout)?;
    let browser = Arc::new(
        CdpBrowser::new(http.clone(), &config.devtools_url).with_timeout(config.http_timeout),
    );
    let extraction = Arc::new(ExtractionClient::new(http.clone(), &config.backend_url));
    let store = Arc::new(PersistenceClient::new(http, &config.backend_url));
    let events = Arc::new(CaptureEvents::new());

    match browser.current_tab().await {
        Ok(tab) => println!("Current URL: {}", tab.url),
        Err(e) => {
            warn!("Could not resolve the current tab: {e}");
            println!("Current URL: ");
        }
    }

    let list = ListView::new(store.clone());
    let mut rendered = list.watch();
    let list_task = list.mount(events.subscribe());
    let printer = tokio::spawn(async move {
        while rendered.changed().await.is_ok() {
            let records = rendered.borrow_and_update().records.clone();
            println!("{}", list_view::render(&records));
        }
    });

    let controller = Arc::new(
        CaptureController::new(browser.clone(), browser, extraction, store, events)
            .with_idempotency(config.idempotency),
    );

    println!("Press Enter to save the job application, or type q to quit.");
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        if line.trim().eq_ignore_ascii_case("q") {
            break;
        }
        let controller = controller.clone();
        tokio::spawn(async move {
            match controller.capture().await {
                CaptureOutcome::Completed { .. } => println!("Saved."),
                CaptureOutcome::Busy => println!("Processing..."),
                CaptureOutcome::Failed => println!("Capture did not complete."),
            }
        });
    }

    list_task.abort();
    printer.abort();
    info!("Popup closed");
    Ok(())
}
