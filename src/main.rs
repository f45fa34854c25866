use std::time::Duration;

use anyhow::{Context, Result};
use clap::{value_parser, Arg, ArgMatches, Command};
use tracing::{error, info, warn};

use orchestrator::{wait_for_shutdown_signal, Application, DispatchOutcome, ShutdownManager};
use orchestrator_core::{config::AppConfig, logging::init_logging, JobDescriptor, JobStep};

fn cli() -> Command {
    Command::new("orchestrator")
        .version(env!("CARGO_PKG_VERSION"))
        .about("任务编排核心")
        .subcommand_required(true)
        .arg(
            Arg::new("config")
                .short('c')
                .long("config")
                .value_name("FILE")
                .help("配置文件路径")
                .global(true),
        )
        .arg(
            Arg::new("log-level")
                .short('l')
                .long("log-level")
                .value_name("LEVEL")
                .help("日志级别，默认使用配置中的值")
                .value_parser(["trace", "debug", "info", "warn", "error"])
                .global(true),
        )
        .arg(
            Arg::new("log-format")
                .long("log-format")
                .value_name("FORMAT")
                .help("日志格式，默认使用配置中的值")
                .value_parser(["json", "pretty"])
                .global(true),
        )
        .subcommand(
            Command::new("worker").about("消费任务队列并执行任务").arg(
                Arg::new("worker-id")
                    .long("worker-id")
                    .value_name("ID")
                    .help("覆盖配置中的 Worker ID"),
            ),
        )
        .subcommand(
            Command::new("route")
                .about("派发单个任务，未发布到消息代理时同步执行")
                .arg(
                    Arg::new("contract-key")
                        .long("contract-key")
                        .value_name("KEY")
                        .required(true),
                )
                .arg(
                    Arg::new("source-id")
                        .long("source-id")
                        .value_name("ID")
                        .value_parser(value_parser!(i32))
                        .required(true),
                )
                .arg(
                    Arg::new("integration-id")
                        .long("integration-id")
                        .value_name("ID")
                        .value_parser(value_parser!(i32))
                        .default_value("0"),
                )
                .arg(
                    Arg::new("server-id")
                        .long("server-id")
                        .value_name("ID")
                        .value_parser(value_parser!(i32))
                        .default_value("0"),
                )
                .arg(
                    Arg::new("step")
                        .long("step")
                        .value_name("STEP")
                        .value_parser(["Start", "Import", "Process", "Complete", "Retry"])
                        .default_value("Start"),
                )
                .arg(
                    Arg::new("time-zone")
                        .long("time-zone")
                        .value_name("TZ"),
                ),
        )
}

#[tokio::main]
async fn main() -> Result<()> {
    let matches = cli().get_matches();

    let config_path = matches.get_one::<String>("config").map(String::as_str);
    let mut config = AppConfig::load(config_path)
        .with_context(|| format!("加载配置失败: {}", config_path.unwrap_or("<默认路径>")))?;

    let log_level = matches
        .get_one::<String>("log-level")
        .cloned()
        .unwrap_or_else(|| config.observability.log_level.clone());
    let log_format = matches
        .get_one::<String>("log-format")
        .cloned()
        .unwrap_or_else(|| config.observability.log_format.clone());
    init_logging(&log_level, &log_format)?;

    match matches.subcommand() {
        Some(("worker", sub)) => {
            if let Some(id) = sub.get_one::<String>("worker-id") {
                config.worker.worker_id = id.clone();
            }
            run_worker(config).await
        }
        Some(("route", sub)) => run_route(config, sub).await,
        _ => Err(anyhow::anyhow!("未知的子命令")),
    }
}

async fn run_worker(config: AppConfig) -> Result<()> {
    let host = hostname::get()
        .map(|h| h.to_string_lossy().into_owned())
        .unwrap_or_else(|_| "unknown".to_string());
    info!(
        worker_id = %config.worker.worker_id,
        hostname = %host,
        "启动任务编排 worker"
    );

    let grace = Duration::from_secs(config.worker.shutdown_timeout_seconds + 5);
    let app = Application::new(config).await?;
    let shutdown_manager = ShutdownManager::new();
    let shutdown = shutdown_manager.subscribe();

    let worker = tokio::spawn(async move { app.run_worker(shutdown).await });

    wait_for_shutdown_signal().await;
    info!("收到关闭信号，开始优雅关闭...");
    shutdown_manager.shutdown();

    match tokio::time::timeout(grace, worker).await {
        Ok(Ok(Ok(()))) => info!("worker已优雅关闭"),
        Ok(Ok(Err(e))) => error!("worker运行失败: {e:#}"),
        Ok(Err(e)) => error!("worker任务异常退出: {e}"),
        Err(_) => warn!("worker关闭超时，强制退出"),
    }

    Ok(())
}

async fn run_route(config: AppConfig, matches: &ArgMatches) -> Result<()> {
    let step: JobStep = matches
        .get_one::<String>("step")
        .map(String::as_str)
        .unwrap_or("Start")
        .parse()?;

    let descriptor = JobDescriptor::builder()
        .contract_key(
            matches
                .get_one::<String>("contract-key")
                .cloned()
                .unwrap_or_default(),
        )
        .step(step)
        .source_id(*matches.get_one::<i32>("source-id").unwrap_or(&0))
        .integration_id(*matches.get_one::<i32>("integration-id").unwrap_or(&0))
        .server_id(*matches.get_one::<i32>("server-id").unwrap_or(&0))
        .time_zone(matches.get_one::<String>("time-zone").cloned())
        .build()
        .context("构建任务描述符失败")?;

    let job_id = descriptor.job_id();
    let app = Application::new(config).await?;

    match app.dispatch(descriptor).await? {
        DispatchOutcome::Routed => info!(job_id = %job_id, "任务已发布到消息代理"),
        DispatchOutcome::ExecutedInline(decision) => {
            info!(job_id = %job_id, ?decision, "任务已同步执行完毕")
        }
    }

    Ok(())
}
