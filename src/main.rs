use anyhow::Context;
use clap::Parser;
use mailroom_engine::adapters::{
    AcceptAllResidents, ChannelEventSink, InMemoryPackageStore, LoggingNotifier, NotificationWorker,
};
use mailroom_engine::config::Command;
use mailroom_engine::utils::error::ErrorSeverity;
use mailroom_engine::utils::logger::{self, LogFormat};
use mailroom_engine::utils::validation::Validate;
use mailroom_engine::{
    CliConfig, EngineConfig, EngineError, MailroomEngine, MailroomId, NewPackage, OrganizationId,
    PackageStatus, PoolStatus,
};
use std::sync::Arc;

type Engine = MailroomEngine<InMemoryPackageStore>;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = CliConfig::parse();

    let config = match EngineConfig::from_file(&args.config) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("❌ Failed to load config file '{}': {}", args.config, e);
            eprintln!("💡 {}", e.recovery_suggestion());
            std::process::exit(1);
        }
    };

    logger::init_logger(
        LogFormat::from_flags(args.json_logs || config.logging.json),
        args.verbose || config.logging.verbose,
    );

    tracing::info!(engine = %config.engine.name, "Starting mailroom engine");
    tracing::debug!(?args, "CLI config");

    if let Err(e) = config.validate() {
        tracing::error!(error = %e, "Configuration validation failed");
        eprintln!("❌ {}", e.user_friendly_message());
        eprintln!("💡 {}", e.recovery_suggestion());
        std::process::exit(1);
    }

    let mut engine = MailroomEngine::new(
        Arc::new(InMemoryPackageStore::new()),
        Arc::new(config.ownership_directory()),
        Arc::new(AcceptAllResidents),
    );

    let worker = if config.notifications_enabled() {
        let (sink, receiver) = ChannelEventSink::channel(config.channel_capacity());
        engine = engine.with_event_sink(Arc::new(sink));
        Some(NotificationWorker::new(receiver, Arc::new(LoggingNotifier)).spawn())
    } else {
        None
    };
    let engine = Arc::new(engine);

    let mailrooms = config.mailrooms();
    for (organization, mailroom) in &mailrooms {
        engine
            .initialize_pool(organization, mailroom)
            .await
            .with_context(|| format!("provisioning mailroom {}", mailroom))?;
    }

    let outcome = match args.command {
        Command::Status { slots } => collect_status(&engine, &mailrooms, slots).await,
        Command::Simulate { packages } => simulate(&engine, &mailrooms, packages).await,
    };

    // Dropping the last engine handle closes the event channel.
    drop(engine);
    if let Some(worker) = worker {
        let delivered = worker.await.context("notification worker panicked")?;
        tracing::info!(delivered, "Notifications processed");
    }

    match outcome {
        Ok(statuses) => {
            println!("{}", serde_json::to_string_pretty(&statuses)?);
            Ok(())
        }
        Err(e) => {
            tracing::error!(
                error = %e,
                category = ?e.category(),
                severity = ?e.severity(),
                "Engine operation failed"
            );
            eprintln!("❌ {}", e.user_friendly_message());
            eprintln!("💡 {}", e.recovery_suggestion());

            let exit_code = match e.severity() {
                ErrorSeverity::Low => 0,
                ErrorSeverity::Medium => 2,
                ErrorSeverity::High => 1,
                ErrorSeverity::Critical => 3,
            };
            if exit_code > 0 {
                std::process::exit(exit_code);
            }
            Ok(())
        }
    }
}

async fn collect_status(
    engine: &Engine,
    mailrooms: &[(OrganizationId, MailroomId)],
    slots: bool,
) -> Result<Vec<PoolStatus>, EngineError> {
    let mut statuses = Vec::with_capacity(mailrooms.len());
    for (organization, mailroom) in mailrooms {
        let status = if slots {
            engine.pool_slots(organization, mailroom).await?
        } else {
            engine.pool_status(organization, mailroom).await?
        };
        statuses.push(status);
    }
    Ok(statuses)
}

/// Register `packages` packages per mailroom concurrently, then resolve every
/// other one so the pool ends up fragmented.
async fn simulate(
    engine: &Arc<Engine>,
    mailrooms: &[(OrganizationId, MailroomId)],
    packages: usize,
) -> Result<Vec<PoolStatus>, EngineError> {
    let mut handles = Vec::new();
    for (organization, mailroom) in mailrooms {
        for i in 0..packages {
            let engine = Arc::clone(engine);
            let organization = organization.clone();
            let request = NewPackage {
                mailroom_id: mailroom.clone(),
                resident_id: format!("resident-{}", i),
                staff_id: "simulator".to_string(),
                provider: Some("UPS".to_string()),
            };
            handles.push(tokio::spawn(async move {
                engine.register_package(&organization, request).await
            }));
        }
    }

    let mut registered = Vec::with_capacity(handles.len());
    for handle in handles {
        match handle.await {
            Ok(result) => registered.push(result?),
            Err(e) => tracing::error!(error = %e, "Registration task panicked"),
        }
    }
    tracing::info!(registered = registered.len(), "Simulated registrations complete");

    for package in registered.iter().filter(|p| p.number % 2 == 0) {
        engine
            .transition_package(
                &package.organization_id,
                &package.mailroom_id,
                &package.id,
                PackageStatus::Resolved,
                "simulator",
            )
            .await?;
    }

    collect_status(engine, mailrooms, false).await
}
