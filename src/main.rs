//! OxGi Core 命令行入口

use std::path::PathBuf;
use std::process;

use clap::{Parser, Subcommand};
use tracing::{error, info};

use oxgi_core::core::config::FrameworkConfig;
use oxgi_core::framework::{BundleCoordinator, BundleState};
use oxgi_core::utils::logger::Logger;
use oxgi_core::Result;

#[derive(Parser)]
#[command(name = "oxgi-core", version, about = "OSGi 风格的模块框架内核")]
struct Cli {
    /// 配置文件路径
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// 启动框架并保持运行
    Start,
    /// 校验配置文件
    CheckConfig,
    /// 安装扫描目录中的 Bundle 并解析指定 Bundle
    Resolve {
        /// 目标 Bundle 的符号名
        name: String,
    },
    /// 列出所有 Bundle 及其状态
    ListBundles,
    /// 显示版本信息
    Version,
}

async fn load_config(path: &Option<PathBuf>) -> Result<FrameworkConfig> {
    match path {
        Some(path) => FrameworkConfig::load(path).await,
        None => Ok(FrameworkConfig::default()),
    }
}

async fn run(cli: Cli) -> Result<()> {
    let config = load_config(&cli.config).await?;
    let _log_guard = Logger::init(config.logger_config())?;

    match cli.command {
        Command::Start => {
            let coordinator = BundleCoordinator::new(config)?;
            coordinator.start_framework().await?;
            info!("框架运行中，Ctrl+C 退出");
            tokio::signal::ctrl_c().await?;
            coordinator.shutdown().await?;
        }
        Command::CheckConfig => {
            // load_config 已完成校验
            println!("配置有效");
        }
        Command::Resolve { name } => {
            let coordinator = BundleCoordinator::new(config)?;
            coordinator.scan_bundle_dirs().await;
            let bundle = coordinator
                .find_by_name(&name)
                .await
                .ok_or_else(|| oxgi_core::CoreError::ModuleNotFound(name.clone()))?;
            coordinator.resolve_bundle(bundle.id()).await?;
            println!("{} {} 解析成功", bundle.symbolic_name(), bundle.version());
        }
        Command::ListBundles => {
            let coordinator = BundleCoordinator::new(config)?;
            coordinator.start_framework().await?;
            println!("{:<6} {:<12} {:<32} 版本", "ID", "状态", "符号名");
            for bundle in coordinator.bundles().await {
                let marker = if bundle.state() == BundleState::Active { "*" } else { " " };
                println!(
                    "{:<6} {:<12} {:<32} {} {}",
                    bundle.id(),
                    bundle.state().to_string(),
                    bundle.symbolic_name(),
                    bundle.version(),
                    marker,
                );
            }
        }
        Command::Version => {
            println!("{} v{}", oxgi_core::NAME, oxgi_core::VERSION);
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    if let Err(e) = run(cli).await {
        error!(error = %e, error_code = e.error_code(), "运行失败");
        eprintln!("错误: {}", e);
        process::exit(1);
    }
}
