use std::env;

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub port: u16,
    pub jwt_secret: String,
    pub jwt_expiry_hours: i64,
    pub smtp: SmtpConfig,
}

#[derive(Debug, Clone)]
pub struct SmtpConfig {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: String,
    pub from: String,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let database_url = match env::var("DATABASE_URL") {
            Ok(url) => url,
            Err(_) => {
                let host = env::var("DB_HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
                let port = env::var("DB_PORT").unwrap_or_else(|_| "5432".to_string());
                let user = env::var("DB_USER")?;
                let password = env::var("DB_PASSWORD")?;
                let name = env::var("DB_NAME")?;
                let sslmode = env::var("DB_SSLMODE").unwrap_or_else(|_| "disable".to_string());
                format!("postgres://{user}:{password}@{host}:{port}/{name}?sslmode={sslmode}")
            }
        };

        let port = env::var("PORT")
            .ok()
            .and_then(|p| p.parse::<u16>().ok())
            .unwrap_or(8080);

        let jwt_secret = env::var("JWT_SECRET")?;
        let jwt_expiry_hours = env::var("JWT_EXPIRY_HOURS")
            .ok()
            .and_then(|h| h.parse::<i64>().ok())
            .unwrap_or(24);

        let smtp = SmtpConfig {
            host: env::var("SMTP_HOST").unwrap_or_else(|_| "smtp.gmail.com".to_string()),
            port: env::var("SMTP_PORT")
                .ok()
                .and_then(|p| p.parse::<u16>().ok())
                .unwrap_or(587),
            username: env::var("SMTP_USERNAME").unwrap_or_default(),
            password: env::var("SMTP_PASSWORD").unwrap_or_default(),
            from: env::var("SMTP_FROM")
                .or_else(|_| env::var("SMTP_USERNAME"))
                .unwrap_or_default(),
        };

        Ok(Self {
            database_url,
            port,
            jwt_secret,
            jwt_expiry_hours,
            smtp,
        })
    }
}
