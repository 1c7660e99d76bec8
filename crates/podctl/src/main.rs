use std::process::ExitCode;

use chrono::Utc;
use clap::Parser;
use podctl::api::ApiClient;
use podctl::api::models::PodRecord;
use podctl::cli::{Cli, Command};
use podctl::config::Config;
use podctl::error::Result;
use podctl::{lifecycle, logging};
use tracing::{error, info};

#[tokio::main]
async fn main() -> ExitCode {
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    let config = match Config::load() {
        Ok(config) => config,
        Err(error) => {
            eprintln!("configuration error: {error}");
            return ExitCode::FAILURE;
        }
    };

    logging::setup_logging(&config, &cli.tracing);

    info!(
        version = env!("CARGO_PKG_VERSION"),
        environment = if cfg!(debug_assertions) {
            "development"
        } else {
            "production"
        },
        "starting podctl"
    );

    match run(cli.command, &config).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(error) => {
            error!(%error, "command failed");
            ExitCode::FAILURE
        }
    }
}

async fn run(command: Command, config: &Config) -> Result<()> {
    let api = ApiClient::new(config.api_base_url.clone(), config.api_key.clone())?;

    match command {
        Command::Create(args) => {
            let options = lifecycle::CreateOptions::try_from(args)?;
            let pod = lifecycle::create(&api, config, options).await?;
            print_pod(&pod);
            if let Some((ip, port)) = pod.public_endpoint() {
                println!("connect with: ssh -p {port} user@{ip}");
            }
        }
        Command::List => {
            let pods = api.list_pods().await?;
            if pods.is_empty() {
                println!("no pods");
            }
            for pod in &pods {
                print_pod(pod);
                println!();
            }
        }
        Command::Get { pod_id } => {
            let pod = api.get_pod(&pod_id).await?;
            print_pod(&pod);
        }
        Command::Terminate { pod_id } => {
            lifecycle::terminate(&api, &pod_id).await?;
            println!("pod {pod_id} terminated");
        }
    }
    Ok(())
}

fn print_pod(pod: &PodRecord) {
    println!("id:     {}", pod.id);
    println!("name:   {}", pod.name);
    if let Some(status) = pod.desired_status {
        println!("status: {status:?}");
    }
    if let Some(machine) = &pod.machine {
        if let Some(gpu) = &machine.gpu_display_name {
            println!("gpu:    {gpu}");
        }
        if let Some(host) = &machine.pod_host_id {
            println!("host:   {host}");
        }
    }
    if let Some(count) = pod.gpu_count {
        println!("gpus:   {count}");
    }
    if let Some(cost) = pod.cost_per_hr {
        println!("cost:   ${cost:.2}/hr");
    }
    match pod.time_remaining(Utc::now()) {
        Some(remaining) => {
            let total = remaining.num_seconds();
            println!("time:   {}h {}m remaining", total / 3600, (total % 3600) / 60);
        }
        None => println!("time:   Unknown"),
    }
    match pod.public_endpoint() {
        Some((ip, port)) => println!("ssh:    {ip}:{port}"),
        None => println!("ssh:    not yet assigned"),
    }
}
