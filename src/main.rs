use std::sync::Arc;
use std::time::Duration;

use carepod::advisory::{self, AdvisoryBackend, AdvisoryConfig, NoopAdvisory};
use carepod::bot::routes::{BotRouteState, bot_routes};
use carepod::bot::{Bot, BotDeps};
use carepod::channels::{Messenger, SimulatedMessenger, WhatsAppTransport};
use carepod::config::{BotConfig, SurchargeConfig};
use carepod::logistics::{Geocoder, HttpGeocoder, LogisticsResolver, NoopGeocoder};
use carepod::notify::NotificationScheduler;
use carepod::payment::{MpesaConfig, MpesaGateway, PaymentGateway, SimulatedGateway};
use carepod::session::{MemorySessionStore, RedisSessionStore, SessionStore};
use carepod::store::{Database, LibSqlBackend};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let config = BotConfig::default();

    let port: u16 = std::env::var("CAREPOD_PORT")
        .unwrap_or_else(|_| "8080".to_string())
        .parse()
        .unwrap_or(8080);

    eprintln!("CarePod v{}", env!("CARGO_PKG_VERSION"));
    eprintln!("   Webhook:  http://0.0.0.0:{port}/webhook/whatsapp");
    eprintln!("   Callback: http://0.0.0.0:{port}/api/payments/callback");

    // ── Database ─────────────────────────────────────────────────────────
    let db_path =
        std::env::var("CAREPOD_DB_PATH").unwrap_or_else(|_| "./data/carepod.db".to_string());
    let store: Arc<dyn Database> = Arc::new(
        LibSqlBackend::new_local(std::path::Path::new(&db_path))
            .await
            .unwrap_or_else(|e| {
                eprintln!("Error: Failed to open database at {db_path}: {e}");
                std::process::exit(1);
            }),
    );
    eprintln!("   Database: {db_path}");

    // ── Session store ────────────────────────────────────────────────────
    let sessions: Arc<dyn SessionStore> = match std::env::var("CAREPOD_REDIS_URL") {
        Ok(url) => {
            let redis = RedisSessionStore::new(&url, config.session_ttl)?;
            eprintln!("   Sessions: redis ({url})");
            Arc::new(redis)
        }
        Err(_) => {
            eprintln!("   Sessions: in-memory (set CAREPOD_REDIS_URL for durability)");
            Arc::new(MemorySessionStore::new(config.session_ttl))
        }
    };

    // ── Geo/pricing ──────────────────────────────────────────────────────
    let geocoder: Arc<dyn Geocoder> = match std::env::var("CAREPOD_MAPS_API_KEY") {
        Ok(key) => Arc::new(HttpGeocoder::new(secrecy::SecretString::from(key))),
        Err(_) => {
            tracing::warn!("No maps API key; unknown locations fall back to the default zone");
            Arc::new(NoopGeocoder)
        }
    };
    let logistics = LogisticsResolver::new(
        geocoder,
        SurchargeConfig::default(),
        config.utc_offset_hours,
        config.geocode_timeout,
    );

    // ── Advisory gateway ─────────────────────────────────────────────────
    let advisory: Arc<dyn carepod::advisory::AdvisoryGateway> =
        match std::env::var("ANTHROPIC_API_KEY") {
            Ok(key) => {
                let model = std::env::var("CAREPOD_ADVISORY_MODEL")
                    .unwrap_or_else(|_| "claude-sonnet-4-20250514".to_string());
                advisory::create_gateway(&AdvisoryConfig {
                    backend: AdvisoryBackend::Anthropic,
                    api_key: secrecy::SecretString::from(key),
                    model,
                })?
            }
            Err(_) => {
                tracing::warn!("No advisory API key; health questions get the menu fallback");
                Arc::new(NoopAdvisory)
            }
        };

    // ── Payment gateway ──────────────────────────────────────────────────
    let payments: Arc<dyn PaymentGateway> = match (
        std::env::var("MPESA_CONSUMER_KEY"),
        std::env::var("MPESA_CONSUMER_SECRET"),
    ) {
        (Ok(key), Ok(secret)) => Arc::new(MpesaGateway::new(MpesaConfig {
            consumer_key: secrecy::SecretString::from(key),
            consumer_secret: secrecy::SecretString::from(secret),
            business_short_code: std::env::var("MPESA_SHORT_CODE").unwrap_or_default(),
            passkey: secrecy::SecretString::from(
                std::env::var("MPESA_PASSKEY").unwrap_or_default(),
            ),
            base_url: std::env::var("MPESA_BASE_URL")
                .unwrap_or_else(|_| "https://sandbox.safaricom.co.ke".to_string()),
            callback_url: std::env::var("CAREPOD_BASE_URL")
                .map(|base| format!("{base}/api/payments/callback"))
                .unwrap_or_default(),
        })),
        _ => {
            tracing::warn!("No payment credentials; running payments in simulation mode");
            Arc::new(SimulatedGateway)
        }
    };

    // ── Outbound transport ───────────────────────────────────────────────
    let messenger: Arc<dyn Messenger> = match (
        std::env::var("TWILIO_ACCOUNT_SID"),
        std::env::var("TWILIO_AUTH_TOKEN"),
        std::env::var("TWILIO_PHONE_NUMBER"),
    ) {
        (Ok(sid), Ok(token), Ok(from)) => {
            let transport =
                WhatsAppTransport::new(sid, secrecy::SecretString::from(token), from);
            transport.validate()?;
            Arc::new(transport)
        }
        _ => {
            tracing::warn!("No transport credentials; outbound messages are simulated");
            Arc::new(SimulatedMessenger::new())
        }
    };

    // ── Background workers ───────────────────────────────────────────────
    let scheduler = Arc::new(NotificationScheduler::new(
        Arc::clone(&store),
        Arc::clone(&messenger),
        config.notifications.clone(),
    ));
    Arc::clone(&scheduler).spawn_ticker();
    Arc::clone(&scheduler).spawn_health_tip_ticker();

    // ── Bot + HTTP surface ───────────────────────────────────────────────
    let bot = Arc::new(Bot::new(
        config.clone(),
        BotDeps {
            sessions,
            store,
            logistics,
            advisory,
            payments,
            messenger,
        },
    ));

    {
        let bot = Arc::clone(&bot);
        let interval = config.session_purge_interval;
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval.max(Duration::from_secs(1)));
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            loop {
                ticker.tick().await;
                bot.purge_sessions().await;
            }
        });
    }

    let app = bot_routes(BotRouteState { bot });
    let listener = tokio::net::TcpListener::bind(("0.0.0.0", port)).await?;
    tracing::info!(port, "CarePod listening");
    axum::serve(listener, app).await?;

    Ok(())
}
