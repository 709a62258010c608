//! Outbound calling engine entry point

use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing_subscriber::EnvFilter;

use outcall_campaign::{CampaignDispatcher, DispatcherConfig, InMemoryLeadStore, VariantSampler};
use outcall_config::Settings;
use outcall_core::PersonaCatalog;
use outcall_pipeline::ResponseCache;
use outcall_server::{CampaignManifest, LoopbackDialer, SessionLauncher};
use outcall_services::{
    ClientConfig, EmotionServiceClient, GenerationServiceClient, SynthesisServiceClient,
    TranscriptionServiceClient,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .compact()
        .init();

    let config_path = std::env::var("OUTCALL_CONFIG").ok().map(PathBuf::from);
    let settings = Settings::load(config_path.as_deref())?;
    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        environment = ?settings.environment,
        config = ?config_path,
        "starting outbound calling engine"
    );

    let classifier = Arc::new(EmotionServiceClient::new(
        ClientConfig::new(&settings.services.emotion_url, settings.timeouts.classify())
            .with_api_key(settings.services.api_key.clone()),
    )?);
    let generator = Arc::new(GenerationServiceClient::new(
        ClientConfig::new(
            &settings.services.generation_url,
            settings.timeouts.generate(),
        )
        .with_api_key(settings.services.api_key.clone()),
    )?);
    let synthesizer = Arc::new(SynthesisServiceClient::new(
        ClientConfig::new(
            &settings.services.synthesis_url,
            settings.timeouts.synthesize(),
        )
        .with_api_key(settings.services.api_key.clone()),
    )?);
    let transcriber = Arc::new(TranscriptionServiceClient::new(
        ClientConfig::new(
            &settings.services.transcription_url,
            settings.timeouts.transcribe(),
        )
        .with_api_key(settings.services.api_key.clone()),
    )?);

    let catalog = PersonaCatalog::standard();
    let cache = Arc::new(ResponseCache::new());
    let warmed = cache
        .warm(synthesizer.as_ref(), &catalog, &settings.session.locale)
        .await;
    tracing::info!(warmed, "response cache ready");

    let store = Arc::new(InMemoryLeadStore::new());
    let (shutdown_tx, _) = broadcast::channel(4);

    let launcher = Arc::new(SessionLauncher::new(
        Arc::new(LoopbackDialer),
        classifier,
        generator,
        synthesizer,
        transcriber,
        cache,
        catalog,
        settings.clone(),
        shutdown_tx.clone(),
    ));
    tracing::info!("loopback dialer active; wire a telephony adapter for live calls");

    let dispatcher = Arc::new(CampaignDispatcher::new(
        store.clone(),
        launcher,
        VariantSampler::new(settings.dispatcher.explore_rounds_per_variant),
        DispatcherConfig {
            batch_interval: settings.dispatcher.batch_interval(),
            error_backoff: settings.dispatcher.error_backoff(),
            lead_batch_size: settings.dispatcher.lead_batch_size,
        },
    ));

    match std::env::var("OUTCALL_MANIFEST").ok().map(PathBuf::from) {
        Some(path) => {
            let manifest = CampaignManifest::load(&path).await?;
            tracing::info!(
                campaigns = manifest.campaigns.len(),
                leads = manifest.leads.len(),
                manifest = %path.display(),
                "campaign manifest loaded"
            );
            for campaign in manifest.campaigns {
                dispatcher.register_campaign(campaign)?;
            }
            for lead in manifest.leads {
                store.insert(lead);
            }
        },
        None => {
            tracing::warn!("no OUTCALL_MANIFEST set; dispatcher idles until campaigns are registered");
        },
    }

    let dispatcher_handle = tokio::spawn(dispatcher.run(shutdown_tx.subscribe()));

    tokio::signal::ctrl_c().await?;
    tracing::info!("shutdown signal received, stopping sessions and dispatcher");
    let _ = shutdown_tx.send(());
    let _ = dispatcher_handle.await;
    tracing::info!("shutdown complete");
    Ok(())
}
