use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use servlet_trace::cli::{self, Command};
use servlet_trace::config::AppConfig;

/// Web Component Deserialization Tracer
///
/// CLI 工具，默认输出人类可读格式
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// 日志级别 (RUST_LOG 优先)
    #[arg(long, default_value = "info")]
    log_level: String,

    /// 输出 JSON 格式 (默认输出人类可读格式)
    #[arg(long, global = true)]
    json: bool,

    /// YAML 配置文件
    #[arg(long, global = true, env = "SERVLET_TRACE_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

fn main() -> Result<()> {
    let args = Args::parse();

    // 初始化日志 (只输出到 stderr，stdout 留给报告)
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level));
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .finish();

    tracing::subscriber::set_global_default(subscriber).context("setting default subscriber failed")?;

    let config = AppConfig::load_or_default(args.config.as_deref())?;
    cli::handle_command(args.command, args.json, config)
}
