use anyhow::{Context, Result};
use clap::Parser;
use ecosense::{config::Config, models::ModelManager, web::serve};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "ecosense")]
#[command(about = "Before/after deforestation change detection service")]
struct Args {
    /// Server bind address
    #[arg(long, default_value = "0.0.0.0:8000")]
    bind: String,

    /// Path to the ONNX deforestation classifier
    #[arg(long, default_value = "models/deforestation_model.onnx")]
    model_path: String,

    /// Number of async worker threads
    #[arg(long)]
    workers: Option<usize>,

    /// ONNX Runtime intra-op threads
    #[arg(long)]
    intra_threads: Option<usize>,

    /// Log level
    #[arg(long, default_value = "info")]
    log_level: String,

    /// Enable development mode
    #[arg(long)]
    dev: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();

    // 初始化日志系统
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level)),
        )
        .with_target(false)
        .init();

    tracing::info!("Starting EcoSense deforestation detection service...");
    tracing::info!("Bind address: {}", args.bind);
    tracing::info!("Model path: {}", args.model_path);

    let config = Config::new(
        args.bind,
        args.model_path,
        args.workers,
        args.intra_threads,
        args.dev,
    )?;

    // 模型加载失败则不启动服务
    let manager = ModelManager::init(config.clone()).context("failed to load deforestation model")?;

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(config.workers)
        .enable_all()
        .build()
        .context("failed to build tokio runtime")?;

    runtime.block_on(serve(manager))?;

    Ok(())
}
