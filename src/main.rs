use std::sync::Arc;

use lead_intake::channels::{ChatState, CliChannel, chat_routes};
use lead_intake::config::IntakeConfig;
use lead_intake::dialogue::lead_intake_script;
use lead_intake::error::Result;
use lead_intake::lead::{HttpLeadSubmitter, LeadSubmitter, MemoryLeadStore};
use lead_intake::tracking::{BufferedTracker, HttpTrackingTransport, NoopTracker, TrackingSink};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let cli_mode = std::env::args().skip(1).any(|a| a == "--cli");

    let config = IntakeConfig::from_env().unwrap_or_else(|e| {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    });

    let script = Arc::new(lead_intake_script()?);

    eprintln!("💬 Lead Intake v{}", env!("CARGO_PKG_VERSION"));
    eprintln!("   Script: {} ({} steps)", script.name(), script.len());
    eprintln!("   Source: {}", config.engine.source);
    eprintln!("   Typing delay: {:?}", config.engine.typing_delay);

    // ── Lead persistence ─────────────────────────────────────────────────
    let leads: Arc<dyn LeadSubmitter> = match config.lead_endpoint {
        Some(ref endpoint) => {
            eprintln!("   Leads: {}", endpoint);
            Arc::new(HttpLeadSubmitter::new(
                endpoint,
                config.lead_token.clone(),
                config.http_timeout,
            )?)
        }
        None => {
            eprintln!("   Leads: in-memory (LEAD_INTAKE_LEAD_ENDPOINT not set)");
            Arc::new(MemoryLeadStore::new())
        }
    };

    // ── Tracking ─────────────────────────────────────────────────────────
    let tracker: Arc<dyn TrackingSink> = match config.tracking_endpoint {
        Some(ref endpoint) => {
            eprintln!(
                "   Tracking: {} (batches of {})",
                endpoint, config.tracking_batch_size
            );
            let transport = HttpTrackingTransport::new(endpoint, config.http_timeout)?;
            Arc::new(BufferedTracker::new(
                Arc::new(transport),
                config.tracking_batch_size,
            ))
        }
        None => {
            eprintln!("   Tracking: disabled");
            Arc::new(NoopTracker)
        }
    };

    if cli_mode {
        eprintln!("   Channel: cli\n");
        let channel = CliChannel::new(script, config.engine, leads, tracker);
        channel.run().await?;
        return Ok(());
    }

    let app = chat_routes(ChatState {
        script,
        config: config.engine.clone(),
        leads,
        tracker,
    });

    eprintln!("   Chat WS: ws://0.0.0.0:{}/ws/chat", config.port);
    eprintln!("   Script API: http://0.0.0.0:{}/api/script\n", config.port);

    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{}", config.port)).await?;
    tracing::info!(port = config.port, "Chat server started");
    axum::serve(listener, app).await?;

    Ok(())
}
