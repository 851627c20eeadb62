mod accounts;
mod analytics;
mod api;
mod auth;
mod catalog;
mod config;
mod config_manager;
mod entity;
mod error;
mod expiry;
mod favorites;
mod geo;
mod google_auth;
mod jwt;
mod media;
mod merchants;
mod middleware;
mod migration;
mod notifications;
mod offers;
mod promotions;
mod reviews;
#[cfg(test)]
mod test_support;

use anyhow::Result;
use chrono::Utc;
use clap::{Parser, Subcommand};
use sea_orm::DatabaseConnection;
use sea_orm_migration::MigratorTrait;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use crate::config::{get_config, Config};
use crate::google_auth::GoogleVerifier;
use crate::notifications::push::{FcmSender, LogOnlySender, PushSender};

/// 应用状态
#[derive(Clone)]
pub struct AppState {
    pub db: DatabaseConnection,
    pub config: Arc<Config>,
    pub jwt_secret: String,
    pub config_manager: Arc<config_manager::ConfigManager>,
    pub push: Arc<dyn PushSender>,
    pub google: Arc<GoogleVerifier>,
}

#[derive(Parser)]
#[command(name = "tawfir", version, about = "Tawfir - 优惠券与折扣平台后端")]
struct Cli {
    /// 日志目录（按天滚动），覆盖配置文件中的 log_dir
    #[arg(long, global = true)]
    log_dir: Option<String>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// 启动 API 服务（默认）
    Serve,

    /// 立即执行一次推广到期清理
    ExpirePromotions {
        /// 只统计不修改
        #[arg(long)]
        dry_run: bool,
    },

    /// 创建管理员账号（邮箱已存在则提升为管理员），打印生成的密码
    CreateAdmin {
        #[arg(long)]
        email: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = get_config().await;

    // 初始化 tracing 日志系统
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,sqlx::query=warn"));

    let log_dir = cli.log_dir.clone().or_else(|| config.log_dir.clone());
    if let Some(dir) = &log_dir {
        let file_appender = tracing_appender::rolling::daily(dir, "tawfir.log");
        tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt::layer().with_writer(file_appender).with_ansi(false))
            .init();
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt::layer())
            .init();
    }

    // 初始化数据库
    let db = migration::connect(&config.database_url).await?;
    migration::Migrator::up(&db, None).await?;
    info!("✅ 数据库初始化完成");

    match cli.command.unwrap_or(Command::Serve) {
        Command::Serve => serve(config, db).await,
        Command::ExpirePromotions { dry_run } => {
            let report = expiry::sweep(&db, Utc::now().naive_utc(), dry_run).await?;
            info!(
                "🧹 到期清理{}: 置顶广告 {:?}，今日特惠 {:?}",
                if dry_run { "（预览）" } else { "" },
                report.featured_expired,
                report.deals_expired
            );
            println!("{}", serde_json::to_string_pretty(&report)?);
            Ok(())
        }
        Command::CreateAdmin { email } => {
            let (admin, password) = accounts::create_admin(&db, &email).await?;
            println!("👤 管理员: {}", admin.email);
            println!("🔑 密码: {}", password);
            Ok(())
        }
    }
}

async fn serve(config: &'static Config, db: DatabaseConnection) -> Result<()> {
    info!("📋 tawfir 启动");
    info!("🌐 API 端口: {}", config.web_port);

    // 初始化 admin 用户（如果不存在）
    initialize_admin_user(&db, &config.admin_email).await;

    // 初始化配置管理器
    let config_manager = Arc::new(config_manager::ConfigManager::new(db.clone()));
    if let Err(e) = config_manager.load_from_db().await {
        tracing::error!("加载系统配置失败: {}", e);
    }

    let http = reqwest::Client::new();
    let push = build_push_sender(config, http.clone());
    let google = Arc::new(GoogleVerifier::new(
        http,
        config.google_client_id.clone(),
        config.dev_mode,
    ));
    if config.dev_mode {
        warn!("⚠️ 开发模式：Google 令牌不做远程校验");
    }

    tokio::fs::create_dir_all(&config.media_dir).await?;

    let app_state = AppState {
        db: db.clone(),
        config: Arc::new(config.clone()),
        jwt_secret: config.get_jwt_secret()?,
        config_manager,
        push,
        google,
    };

    // 启动 Web API 服务
    let _web_handle = api::start_web_server(app_state);

    // 启动推广到期清理
    expiry::spawn_sweeper(db, config.expiry_sweep_interval_secs);

    // 等待终止信号
    info!("✅ 所有服务已启动，等待终止信号...");

    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            info!("收到 Ctrl+C 信号，正在关闭服务...");
        }
        _ = wait_for_sigterm() => {
            info!("收到 SIGTERM 信号，正在关闭服务...");
        }
    }

    Ok(())
}

async fn wait_for_sigterm() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!("无法监听 SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    }
    #[cfg(not(unix))]
    {
        std::future::pending::<()>().await;
    }
}

/// 有服务账号文件时走 FCM，否则只写日志
fn build_push_sender(config: &Config, http: reqwest::Client) -> Arc<dyn PushSender> {
    match &config.fcm_credentials_path {
        Some(path) => match FcmSender::from_file(Path::new(path), http) {
            Ok(sender) => {
                info!("📲 FCM 推送已启用");
                Arc::new(sender)
            }
            Err(e) => {
                warn!("加载 FCM 凭据失败，推送只写日志: {:#}", e);
                Arc::new(LogOnlySender)
            }
        },
        None => {
            warn!("未配置 fcm_credentials_path，推送只写日志");
            Arc::new(LogOnlySender)
        }
    }
}

/// 没有任何管理员时创建一个，密码写入 ./data/admin_password.txt
async fn initialize_admin_user(db: &DatabaseConnection, email: &str) {
    match accounts::has_admin(db).await {
        Ok(true) => {
            info!("🔐 管理员已存在");
        }
        Ok(false) => match accounts::create_admin(db, email).await {
            Ok((admin, password)) => {
                info!("🔐 管理员已创建");
                info!("═══════════════════════════════════════════════════════════════");
                info!("👤 管理员邮箱: {}", admin.email);
                info!("🔑 管理员密码: {}", password);
                info!("⚠️  请妥善保存此密码，仅在创建时显示一次！");
                info!("═══════════════════════════════════════════════════════════════");
                save_admin_password(&admin.email, &password);
            }
            Err(e) => {
                tracing::error!("创建管理员失败: {}", e);
            }
        },
        Err(e) => {
            tracing::error!("检查管理员失败: {}", e);
        }
    }
}

fn save_admin_password(email: &str, password: &str) {
    let data_dir = PathBuf::from("./data");
    if let Err(e) = std::fs::create_dir_all(&data_dir) {
        tracing::error!("无法创建 data 目录: {}", e);
        return;
    }

    let password_file = data_dir.join("admin_password.txt");
    let content = format!(
        "管理员初始密码\n═══════════════════════════════════════\n邮箱: {}\n密码: {}\n═══════════════════════════════════════\n⚠️ 请妥善保管此文件，登录后建议修改密码并删除此文件！\n",
        email, password
    );
    match std::fs::write(&password_file, &content) {
        Ok(_) => info!("📁 密码已保存到: {}", password_file.display()),
        Err(e) => tracing::error!("无法保存密码文件: {}", e),
    }
}
