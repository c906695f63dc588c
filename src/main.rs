use actix_web::{App, HttpServer, middleware::Logger, web};
use chrono::Local; // timestamp in log lines
use env_logger::{Env, Target};
use std::io::Write; // for env_logger custom formatter
use std::sync::Arc;

use rescue_meals_backend::{
    config::Config,
    database::{create_pool, run_migrations},
    external::TwilioService,
    handlers,
    middlewares::create_cors,
    services::*,
    swagger::swagger_config,
    tasks,
    utils::{Clock, PickupCodeGenerator, SystemClock},
};

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(Env::default().default_filter_or("info"))
        .format(|buf, record| {
            let ts = Local::now().format("%Y-%m-%dT%H:%M:%S%.3f%:z");
            let level = record.level().as_str().to_ascii_lowercase();
            let msg_json = serde_json::to_string(&format!("{}", record.args()))
                .unwrap_or_else(|_| "\"<invalid utf8>\"".to_string());
            writeln!(
                buf,
                "{{\"timestamp\":\"{}\",\"level\":\"{}\",\"message\":{},\"target\":\"{}\"}}",
                ts,
                level,
                msg_json,
                record.target(),
            )
        })
        .target(Target::Stdout)
        .init();

    // 加载配置
    let config = Config::from_toml()
        .map_err(|e| anyhow::anyhow!("Failed to load configuration: {e}"))?;

    // 创建数据库连接池并运行迁移
    let pool = create_pool(&config.database).await?;
    run_migrations(&pool).await?;

    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let codes = PickupCodeGenerator::from_config(&config.pickup)?;

    // 短信通道：未配置 Twilio 时只写日志
    let channel: Arc<dyn PickupCodeChannel> = if config.twilio.is_configured() {
        Arc::new(TwilioService::new(config.twilio.clone()))
    } else {
        log::warn!("Twilio is not configured, pickup codes will only be logged (masked)");
        Arc::new(LogOnlyChannel)
    };

    // 创建服务
    let commission = CommissionEngine::new(&config.commission);
    let notifier = NotificationDispatcher::new(pool.clone(), channel, clock.clone());
    let order_service = OrderService::new(
        pool.clone(),
        codes,
        config.pickup.clone(),
        commission.clone(),
        notifier,
        clock.clone(),
    );
    let expiry_service = ExpiryService::new(
        pool.clone(),
        order_service.clone(),
        config.scheduler.clone(),
        clock.clone(),
    );
    let invoice_service = InvoiceService::new(pool.clone(), commission, clock.clone());

    tasks::spawn_all(
        expiry_service.clone(),
        invoice_service.clone(),
        &config.scheduler,
    );

    // 启动HTTP服务器
    log::info!(
        "Starting HTTP server at {}:{}",
        config.server.host,
        config.server.port
    );

    HttpServer::new(move || {
        App::new()
            .wrap(Logger::default())
            .wrap(create_cors())
            .app_data(web::Data::new(order_service.clone()))
            .app_data(web::Data::new(expiry_service.clone()))
            .app_data(web::Data::new(invoice_service.clone()))
            .configure(swagger_config)
            .service(
                web::scope("/api/v1")
                    .configure(handlers::order_config)
                    .configure(handlers::admin_config),
            )
    })
    .bind((config.server.host.as_str(), config.server.port))?
    .run()
    .await?;

    Ok(())
}
