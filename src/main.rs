use clap::Parser;
use glyph_relay::args::{Args, Command};
use glyph_relay::automation::{
    AutomationEvent, COMMAND_CHANNEL_CAPACITY, ControlFlags, EVENT_CHANNEL_CAPACITY,
    GlyphAutomation, create_automation_channels,
};
use glyph_relay::batch::{classify_files, collect_images};
use glyph_relay::capture::CaptureBackend;
use glyph_relay::config::{AppConfig, AutomationSettings};
use glyph_relay::input::{InputListener, help_text};
use glyph_relay::link::{DryRunLink, LinkBackend, SerialLink, available_ports, find_bridge};
use glyph_relay::notify::{Notifier, TelegramClient};
use glyph_relay::template_matching::{
    Classifier, CorrelationClassifier, RegionType, TemplateStore,
};
use glyph_relay::AppResult;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

#[tokio::main]
async fn main() {
    let args = Args::parse();

    let default_level = if args.debug { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level))
        .format_timestamp_millis()
        .init();

    if let Err(e) = run(args).await {
        log::error!("❌ {}", e);
        std::process::exit(1);
    }
}

async fn run(args: Args) -> AppResult<()> {
    let config = AppConfig::load(&args.config)?;

    match args.command {
        Command::CheckConfig => {
            config.region_specs()?;
            println!("✅ Configuration {:?} is valid\n", args.config);
            print!("{}", config.summary());
            Ok(())
        }
        Command::Classify {
            region,
            json,
            csv,
            paths,
        } => classify(&config, region, json, csv, &paths),
        Command::ListPorts => list_ports(),
        Command::Run {
            port,
            dry_run,
            replay,
        } => run_automation(config, port, dry_run, replay).await,
    }
}

fn load_classifier(
    config: &AppConfig,
    only: Option<RegionType>,
) -> AppResult<Arc<dyn Classifier>> {
    let specs: Vec<_> = config
        .region_specs()?
        .into_iter()
        .filter(|(region_type, _)| only.is_none_or(|r| r == *region_type))
        .collect();
    let store = TemplateStore::load_all(&config.templates_path, &specs)?;
    Ok(Arc::new(CorrelationClassifier::new(Arc::new(store))))
}

fn classify(
    config: &AppConfig,
    region: RegionType,
    json: bool,
    csv: Option<PathBuf>,
    paths: &[PathBuf],
) -> AppResult<()> {
    let classifier = load_classifier(config, Some(region))?;
    let files = collect_images(paths)?;
    let report = classify_files(classifier.as_ref(), region, &files);

    if let Some(csv) = csv {
        report.write_csv(&csv)?;
        log::info!("📝 {} rows appended to {:?}", report.results.len(), csv);
    }

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print!("{}", report.to_table());
    }
    Ok(())
}

fn list_ports() -> AppResult<()> {
    let ports = available_ports()?;
    if ports.is_empty() {
        println!("No serial ports found");
        return Ok(());
    }
    for port in &ports {
        let marker = if port.is_likely_bridge() { "*" } else { " " };
        println!("{marker} {port}");
    }
    println!("\n* likely keyboard bridge");
    Ok(())
}

fn capture_backend(config: &AppConfig, replay: Option<PathBuf>) -> AppResult<CaptureBackend> {
    if let Some(path) = replay {
        return Ok(CaptureBackend::replay(&path)?);
    }
    #[cfg(feature = "screen-capture")]
    {
        Ok(CaptureBackend::screen(config.capture.monitor_index))
    }
    #[cfg(not(feature = "screen-capture"))]
    {
        let _ = config;
        Err(glyph_relay::AppError::NoCaptureBackend)
    }
}

async fn link_backend(config: &AppConfig, dry_run: bool) -> AppResult<LinkBackend> {
    if dry_run {
        log::info!("🧪 Dry run, key commands are only logged");
        return Ok(LinkBackend::DryRun(DryRunLink::new()));
    }

    let port = match &config.link.port {
        Some(port) => Some(port.clone()),
        None if config.link.auto_detect => find_bridge()?.map(|p| PathBuf::from(p.name)),
        None => None,
    };
    let Some(port) = port else {
        log::warn!("🧪 No keyboard bridge configured or found, running dry");
        return Ok(LinkBackend::DryRun(DryRunLink::new()));
    };

    let link = SerialLink::open(
        &port,
        config.link.baud_rate,
        Duration::from_millis(config.link.ack_timeout_ms),
        Duration::from_millis(config.link.init_delay_ms),
    )
    .await?;
    Ok(LinkBackend::Serial(link))
}

fn notifier(config: &AppConfig) -> Notifier {
    if !config.notify.enabled {
        return Notifier::disabled();
    }
    match TelegramClient::from_parts(config.notify.bot_token.clone(), config.notify.chat_id.clone())
    {
        Ok(client) => Notifier::spawn_telegram(client),
        Err(e) => {
            log::warn!("⚠️ Notifications disabled: {}", e);
            Notifier::disabled()
        }
    }
}

async fn run_automation(
    mut config: AppConfig,
    port: Option<PathBuf>,
    dry_run: bool,
    replay: Option<PathBuf>,
) -> AppResult<()> {
    if port.is_some() {
        config.link.port = port;
    }

    let settings = AutomationSettings::from_config(&config)?;
    let classifier = load_classifier(&config, None)?;
    let capture = capture_backend(&config, replay)?;
    let link = link_backend(&config, dry_run).await?;
    log::info!(
        "🚀 Capture: {}, keyboard bridge: {}",
        capture.name(),
        link.name()
    );

    let flags = ControlFlags::new();
    let (cmd_tx, cmd_rx, event_tx, mut event_rx) =
        create_automation_channels(COMMAND_CHANNEL_CAPACITY, EVENT_CHANNEL_CAPACITY);

    tokio::spawn(async move {
        while let Some(event) = event_rx.recv().await {
            match event {
                AutomationEvent::StateChanged(state) => log::info!("🎮 State: {:?}", state),
                AutomationEvent::SequenceFinished(report) => {
                    log::debug!("🔤 Sequence: {:?}", report.steps)
                }
                AutomationEvent::SessionFinished(report) => log::info!(
                    "📋 Session: {} ({} iterations, {} re-triggers)",
                    report.outcome,
                    report.iterations,
                    report.retriggers
                ),
                AutomationEvent::Error(e) => log::error!("❌ {}", e),
            }
        }
    });

    InputListener::new(
        flags.clone(),
        cmd_tx,
        Duration::from_millis(settings.timing.trigger_debounce_ms),
        Duration::from_millis(settings.timing.stop_grace_ms),
    )
    .spawn_stdin();
    println!("{}", help_text());

    let mut automation = GlyphAutomation::new(
        capture,
        link,
        classifier,
        settings,
        flags,
        notifier(&config),
        cmd_rx,
        event_tx,
    );
    automation.run().await;
    Ok(())
}
