use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::env;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub pickup: PickupConfig,
    #[serde(default)]
    pub scheduler: SchedulerConfig,
    #[serde(default)]
    pub commission: CommissionConfig,
    #[serde(default)]
    pub twilio: TwilioConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
}

/// 取件码相关配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PickupConfig {
    /// base64 编码的 32 字节 AES-256-GCM 密钥；轮换后未核销的取件码全部失效
    pub secret_key: String,
    #[serde(default = "default_code_length")]
    pub code_length: usize,
    #[serde(default = "default_max_attempts")]
    pub max_attempts: i32,
    #[serde(default = "default_resend_cooldown_seconds")]
    pub resend_cooldown_seconds: i64,
    #[serde(default = "default_claim_code_ttl_seconds")]
    pub claim_code_ttl_seconds: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// 取餐窗口结束后的宽限期
    #[serde(default = "default_grace_minutes")]
    pub grace_minutes: i64,
    /// 待接单超时自动取消
    #[serde(default = "default_pending_timeout_minutes")]
    pub pending_timeout_minutes: i64,
    #[serde(default = "default_true")]
    pub restock_on_release: bool,
    #[serde(default = "default_expiry_interval_seconds")]
    pub expiry_interval_seconds: u64,
    #[serde(default = "default_invoice_interval_seconds")]
    pub invoice_interval_seconds: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommissionConfig {
    /// 全局默认佣金费率（百分比，7.0 = 7%）
    #[serde(default = "default_commission_rate")]
    pub default_rate_percent: Decimal,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct TwilioConfig {
    pub account_sid: String,
    pub auth_token: String,
    pub from_phone: String,
}

impl TwilioConfig {
    pub fn is_configured(&self) -> bool {
        !self.account_sid.is_empty() && !self.auth_token.is_empty() && !self.from_phone.is_empty()
    }
}

fn default_code_length() -> usize {
    6
}
fn default_max_attempts() -> i32 {
    5
}
fn default_resend_cooldown_seconds() -> i64 {
    60
}
fn default_claim_code_ttl_seconds() -> i64 {
    300
}
fn default_grace_minutes() -> i64 {
    10
}
fn default_pending_timeout_minutes() -> i64 {
    15
}
fn default_true() -> bool {
    true
}
fn default_expiry_interval_seconds() -> u64 {
    60
}
fn default_invoice_interval_seconds() -> u64 {
    24 * 3600
}
fn default_commission_rate() -> Decimal {
    Decimal::new(70, 1)
}

impl PickupConfig {
    pub fn with_secret(secret_key: impl Into<String>) -> Self {
        Self {
            secret_key: secret_key.into(),
            code_length: default_code_length(),
            max_attempts: default_max_attempts(),
            resend_cooldown_seconds: default_resend_cooldown_seconds(),
            claim_code_ttl_seconds: default_claim_code_ttl_seconds(),
        }
    }
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            grace_minutes: default_grace_minutes(),
            pending_timeout_minutes: default_pending_timeout_minutes(),
            restock_on_release: true,
            expiry_interval_seconds: default_expiry_interval_seconds(),
            invoice_interval_seconds: default_invoice_interval_seconds(),
        }
    }
}

impl Default for CommissionConfig {
    fn default() -> Self {
        Self {
            default_rate_percent: default_commission_rate(),
        }
    }
}

impl Config {
    pub fn from_toml() -> Result<Self, Box<dyn std::error::Error>> {
        let config_path = env::var("CONFIG_PATH").unwrap_or_else(|_| "config.toml".to_string());
        use std::io::ErrorKind;

        // 尝试读取配置文件，如果不存在则完全依赖环境变量
        let config_result = std::fs::read_to_string(&config_path);

        let mut config: Config = match config_result {
            Ok(config_str) => {
                // 有配置文件：先解析再用环境变量覆盖
                toml::from_str(&config_str).map_err(|e| format!("解析配置文件失败: {e}"))?
            }
            Err(e) if e.kind() == ErrorKind::NotFound => {
                // 数据库 URL 与取件码密钥在无配置文件时必须提供
                let database_url = get_env("DATABASE_URL")
                    .ok_or("缺少 DATABASE_URL 环境变量，且未找到配置文件 config.toml")?;
                let secret_key = get_env("PICKUP_CODE_SECRET")
                    .ok_or("缺少 PICKUP_CODE_SECRET 环境变量，且未找到配置文件 config.toml")?;

                Config {
                    server: ServerConfig {
                        host: get_env("SERVER_HOST").unwrap_or_else(|| "0.0.0.0".to_string()),
                        port: get_env_parse("SERVER_PORT", 8080u16),
                    },
                    database: DatabaseConfig {
                        url: database_url,
                        max_connections: get_env_parse("DB_MAX_CONNECTIONS", 10u32),
                    },
                    pickup: PickupConfig::with_secret(secret_key),
                    scheduler: SchedulerConfig::default(),
                    commission: CommissionConfig::default(),
                    twilio: TwilioConfig::default(),
                }
            }
            Err(e) => {
                return Err(format!("无法读取配置文件 {config_path}: {e}").into());
            }
        };

        config.apply_env_overrides();
        Ok(config)
    }

    /// 环境变量覆盖（即便文件存在时也覆盖）
    fn apply_env_overrides(&mut self) {
        if let Some(v) = get_env("SERVER_HOST") {
            self.server.host = v;
        }
        if let Some(p) = get_env_opt_parse("SERVER_PORT") {
            self.server.port = p;
        }
        if let Some(v) = get_env("DATABASE_URL") {
            self.database.url = v;
        }
        if let Some(mc) = get_env_opt_parse("DB_MAX_CONNECTIONS") {
            self.database.max_connections = mc;
        }

        // Pickup code
        if let Some(v) = get_env("PICKUP_CODE_SECRET") {
            self.pickup.secret_key = v;
        }
        if let Some(n) = get_env_opt_parse("PICKUP_CODE_LENGTH") {
            self.pickup.code_length = n;
        }
        if let Some(n) = get_env_opt_parse("PICKUP_CODE_MAX_ATTEMPTS") {
            self.pickup.max_attempts = n;
        }
        if let Some(n) = get_env_opt_parse("PICKUP_CODE_RESEND_COOLDOWN_SECONDS") {
            self.pickup.resend_cooldown_seconds = n;
        }
        if let Some(n) = get_env_opt_parse("CLAIM_CODE_TTL_SECONDS") {
            self.pickup.claim_code_ttl_seconds = n;
        }

        // Scheduler
        if let Some(n) = get_env_opt_parse("EXPIRY_GRACE_MINUTES") {
            self.scheduler.grace_minutes = n;
        }
        if let Some(n) = get_env_opt_parse("PENDING_TIMEOUT_MINUTES") {
            self.scheduler.pending_timeout_minutes = n;
        }
        if let Some(b) = get_env_opt_parse("RESTOCK_ON_RELEASE") {
            self.scheduler.restock_on_release = b;
        }
        if let Some(n) = get_env_opt_parse("EXPIRY_INTERVAL_SECONDS") {
            self.scheduler.expiry_interval_seconds = n;
        }
        if let Some(n) = get_env_opt_parse("INVOICE_INTERVAL_SECONDS") {
            self.scheduler.invoice_interval_seconds = n;
        }

        if let Some(rate) = get_env_opt_parse("DEFAULT_COMMISSION_RATE") {
            self.commission.default_rate_percent = rate;
        }

        // Twilio
        if let Some(v) = get_env("TWILIO_ACCOUNT_SID") {
            self.twilio.account_sid = v;
        }
        if let Some(v) = get_env("TWILIO_AUTH_TOKEN") {
            self.twilio.auth_token = v;
        }
        if let Some(v) = get_env("TWILIO_FROM_PHONE") {
            self.twilio.from_phone = v;
        }
    }
}

fn get_env(name: &str) -> Option<String> {
    env::var(name).ok()
}

fn get_env_parse<T: std::str::FromStr>(name: &str, default: T) -> T {
    get_env_opt_parse(name).unwrap_or(default)
}

fn get_env_opt_parse<T: std::str::FromStr>(name: &str) -> Option<T> {
    env::var(name).ok().and_then(|v| v.parse::<T>().ok())
}
