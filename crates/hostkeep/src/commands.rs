//! Command dispatch

use std::sync::Arc;

use color_eyre::Result;
use eyre::{WrapErr, eyre};
use hostkeep_exec::Connector;
use hostkeep_facts::{FactGatherer, Facts, GatherError, OsFamily, detect};
use hostkeep_lifecycle::{
    ContainerdClient, CriClient, Engine, PatchOutcome, ServiceManager, set_toml_value,
};
use tracing::{info, warn};

use crate::cli::{Commands, ContainerAction, ImageAction, PodAction, ServiceAction};
use crate::config::Config;

/// Run one CLI command against `connector`
pub async fn run(command: Commands, config: &Config, connector: Arc<dyn Connector>) -> Result<()> {
    let engine = Engine::new(Arc::clone(&connector)).with_options(config.exec_options());

    match command {
        Commands::Facts { json } => facts(connector, json).await,
        Commands::Service { action, name } => {
            service(engine, config, action, name.as_deref()).await
        }
        Commands::Container { action, id, cri } => {
            container(engine, config, action, &id, cri).await
        }
        Commands::Pod { action, id } => {
            let client = CriClient::new(engine);
            match action {
                PodAction::Stop => client.stop_pod(&id).await?,
                PodAction::Rm => client.remove_pod(&id).await?,
            }
            info!(pod = %id, ?action, "done");
            Ok(())
        }
        Commands::Image {
            action: ImageAction::Rm,
            reference,
            cri,
        } => {
            if cri {
                CriClient::new(engine).remove_image(&reference).await?;
            } else {
                ContainerdClient::with_namespace(engine, &config.containerd_namespace)
                    .remove_image(&reference)
                    .await?;
            }
            info!(image = %reference, "removed");
            Ok(())
        }
        Commands::PatchToml {
            path,
            table,
            key,
            value,
        } => {
            let outcome = set_toml_value(connector.as_ref(), &path, &table, &key, &value).await?;
            match outcome {
                PatchOutcome::Updated => println!("{path}: updated [{table}] {key}"),
                PatchOutcome::Unchanged => println!("{path}: unchanged"),
            }
            Ok(())
        }
    }
}

async fn facts(connector: Arc<dyn Connector>, json: bool) -> Result<()> {
    let facts = match FactGatherer::new(connector).gather().await {
        Ok(facts) => facts,
        Err(GatherError::Probes { partial, errors }) => {
            for error in &errors {
                warn!(%error, "probe failed");
            }
            print_facts(&partial, json)?;
            return Err(eyre!("{} fact probe(s) failed", errors.len()));
        }
        Err(e) => return Err(e).wrap_err("failed to gather facts"),
    };

    print_facts(&facts, json)
}

fn print_facts(facts: &Facts, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(facts)?);
        return Ok(());
    }

    let show = |value: Option<String>| value.unwrap_or_else(|| "-".to_string());
    println!("hostname:        {}", facts.hostname);
    println!("os:              {} {}", facts.os.id, facts.os.version_id);
    println!("kernel:          {} ({})", facts.os.kernel, facts.os.arch);
    println!("cpus:            {}", facts.total_cpu);
    println!("memory:          {} MiB", facts.total_memory_mib);
    println!("ipv4:            {}", show(facts.ipv4_default.map(|ip| ip.to_string())));
    println!("ipv6:            {}", show(facts.ipv6_default.map(|ip| ip.to_string())));
    println!(
        "package manager: {}",
        show(facts.package_manager.as_ref().map(|p| p.kind.to_string()))
    );
    println!(
        "init system:     {}",
        show(facts.init_system.as_ref().map(|s| s.kind.to_string()))
    );
    for warning in &facts.warnings {
        println!("warning:         {warning}");
    }
    Ok(())
}

async fn service(
    engine: Engine,
    config: &Config,
    action: ServiceAction,
    name: Option<&str>,
) -> Result<()> {
    let name = match (action, name) {
        (ServiceAction::DaemonReload, _) => "",
        (_, Some(name)) => name,
        (_, None) => return Err(eyre!("service name is required for {action:?}")),
    };

    let connector = Arc::clone(engine.connector());
    let os = connector.os_info().await.wrap_err("failed to identify host")?;
    let family = OsFamily::from_id(&os.id);
    let info = detect::init_system(connector.as_ref(), &family)
        .await
        .wrap_err("failed to detect init system")?;
    let services = ServiceManager::new(engine, info);

    match action {
        ServiceAction::Start => services.start(name).await?,
        ServiceAction::Stop => services.stop(name, config.stop_grace()).await?,
        ServiceAction::Restart => services.restart(name).await?,
        ServiceAction::Enable => services.enable(name).await?,
        ServiceAction::Disable => services.disable(name).await?,
        ServiceAction::DaemonReload => {
            services.daemon_reload().await?;
            info!(init = %services.init_system(), "unit definitions reloaded");
            return Ok(());
        }
        ServiceAction::Status => {
            let active = services.is_active(name).await?;
            let enabled = services.is_enabled(name).await?;
            println!(
                "{name}: {}, {}",
                if active { "active" } else { "inactive" },
                if enabled { "enabled" } else { "disabled" }
            );
            return Ok(());
        }
    }
    info!(service = name, ?action, "done");
    Ok(())
}

async fn container(
    engine: Engine,
    config: &Config,
    action: ContainerAction,
    id: &str,
    cri: bool,
) -> Result<()> {
    let grace = config.stop_grace();
    if cri {
        let client = CriClient::new(engine);
        match action {
            ContainerAction::Start => client.start_container(id).await?,
            ContainerAction::Stop => client.stop_container(id, grace).await?,
            ContainerAction::Rm => client.remove_container(id).await?,
        }
    } else {
        let client = ContainerdClient::with_namespace(engine, &config.containerd_namespace);
        match action {
            ContainerAction::Start => client.start_container(id).await?,
            ContainerAction::Stop => client.stop_container(id, grace).await?,
            ContainerAction::Rm => client.remove_container(id).await?,
        }
    }
    info!(container = id, ?action, "done");
    Ok(())
}
