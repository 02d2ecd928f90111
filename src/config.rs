use anyhow::Context;
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct JwtConfig {
    pub secret: String,
    pub issuer: String,
    pub audience: String,
    pub ttl_minutes: i64,
}

/// Page-size bounds for the user listing.
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct ListingConfig {
    pub default_per_page: u64,
    pub max_per_page: u64,
}

impl Default for ListingConfig {
    fn default() -> Self {
        Self {
            default_per_page: 50,
            max_per_page: 100,
        }
    }
}

/// Initial admin account created at startup when it does not exist yet.
#[derive(Debug, Clone, Deserialize)]
pub struct AdminSeed {
    pub name: String,
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub database_url: String,
    pub jwt: JwtConfig,
    pub listing: ListingConfig,
    pub admin_seed: Option<AdminSeed>,
    pub host: String,
    pub port: u16,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let database_url = std::env::var("DATABASE_URL").context("DATABASE_URL is not set")?;
        let jwt = JwtConfig {
            secret: std::env::var("JWT_SECRET").context("JWT_SECRET is not set")?,
            issuer: std::env::var("JWT_ISSUER").unwrap_or_else(|_| "user-management".into()),
            audience: std::env::var("JWT_AUDIENCE")
                .unwrap_or_else(|_| "user-management-admins".into()),
            ttl_minutes: env_parse("JWT_TTL_MINUTES").unwrap_or(60),
        };

        let defaults = ListingConfig::default();
        let listing = ListingConfig {
            default_per_page: env_parse("USERS_DEFAULT_PER_PAGE")
                .unwrap_or(defaults.default_per_page),
            max_per_page: env_parse("USERS_MAX_PER_PAGE").unwrap_or(defaults.max_per_page),
        };
        anyhow::ensure!(
            listing.max_per_page >= 1,
            "USERS_MAX_PER_PAGE must be at least 1"
        );
        anyhow::ensure!(
            (1..=listing.max_per_page).contains(&listing.default_per_page),
            "USERS_DEFAULT_PER_PAGE must be between 1 and USERS_MAX_PER_PAGE"
        );

        let admin_seed = match (std::env::var("ADMIN_EMAIL"), std::env::var("ADMIN_PASSWORD")) {
            (Ok(email), Ok(password)) => Some(AdminSeed {
                name: std::env::var("ADMIN_NAME").unwrap_or_else(|_| "Administrator".into()),
                email,
                password,
            }),
            _ => None,
        };

        Ok(Self {
            database_url,
            jwt,
            listing,
            admin_seed,
            host: std::env::var("APP_HOST").unwrap_or_else(|_| "0.0.0.0".into()),
            port: env_parse("APP_PORT").unwrap_or(8080),
        })
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|v| v.parse::<T>().ok())
}
