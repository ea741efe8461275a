use std::net::{IpAddr, Ipv4Addr, SocketAddr};

#[derive(Debug, Clone)]
pub struct Config {
    pub host: IpAddr,
    pub port: u16,
    pub log_level: String,
    pub debug: bool,
    pub default_quiz_size: i64,
    pub chunk_size_min: usize,
    pub chunk_size_max: usize,
    pub chunk_overlap: usize,
    pub default_plan_minutes: i64,
    pub otp_length: usize,
    pub otp_expiry_minutes: i64,
}

impl Config {
    pub fn from_env() -> Self {
        let port = std::env::var("PORT")
            .ok()
            .and_then(|value| value.parse::<u16>().ok())
            .unwrap_or(3000);

        let host = std::env::var("HOST")
            .ok()
            .and_then(|value| value.parse::<IpAddr>().ok())
            .unwrap_or(IpAddr::V4(Ipv4Addr::new(0, 0, 0, 0)));

        let log_level = std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string());

        let debug = std::env::var("DEBUG")
            .map(|v| v == "true" || v == "1")
            .unwrap_or(false);

        Self {
            host,
            port,
            log_level,
            debug,
            default_quiz_size: env_i64("DEFAULT_QUIZ_SIZE").unwrap_or(5),
            chunk_size_min: env_usize("CHUNK_SIZE_MIN").unwrap_or(300),
            chunk_size_max: env_usize("CHUNK_SIZE_MAX").unwrap_or(700),
            chunk_overlap: env_usize("CHUNK_OVERLAP").unwrap_or(50),
            default_plan_minutes: env_i64("STUDY_PLAN_DURATION_MINUTES").unwrap_or(120),
            otp_length: env_usize("OTP_LENGTH").unwrap_or(6),
            otp_expiry_minutes: env_i64("OTP_EXPIRY_MINUTES").unwrap_or(5),
        }
    }

    pub fn bind_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }
}

fn env_i64(key: &str) -> Option<i64> {
    std::env::var(key).ok().and_then(|v| v.parse().ok())
}

fn env_usize(key: &str) -> Option<usize> {
    std::env::var(key).ok().and_then(|v| v.parse().ok())
}
