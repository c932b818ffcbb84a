use std::{env, path::PathBuf};

#[derive(Clone, Debug)]
pub struct Config {
    pub database_url: String,
    pub port: u16,
    pub upload_dir: PathBuf,
    pub admin: AdminSeed,
    pub seed_catalog: bool,
}

#[derive(Clone, Debug)]
pub struct AdminSeed {
    pub email: String,
    pub password: String,
    pub name: String,
}

impl Config {
    /// Reads configuration from the environment, after loading `.env` if present.
    pub fn from_env() -> Self {
        let _ = dotenvy::dotenv();

        let database_url =
            env::var("DATABASE_URL").unwrap_or_else(|_| "sqlite://./data/micks_barber.db".to_string());
        let port = env::var("PORT")
            .ok()
            .and_then(|value| value.parse().ok())
            .unwrap_or(3000);
        let upload_dir = env::var("UPLOAD_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("./uploads"));
        let seed_catalog = env::var("SEED_CATALOG")
            .map(|value| value != "false")
            .unwrap_or(true);

        Self {
            database_url,
            port,
            upload_dir,
            admin: AdminSeed {
                email: env::var("ADMIN_EMAIL").unwrap_or_else(|_| "admin@micksbarber.com".to_string()),
                password: env::var("ADMIN_PASSWORD").unwrap_or_else(|_| "admin123".to_string()),
                name: env::var("ADMIN_NAME").unwrap_or_else(|_| "Mick's Admin".to_string()),
            },
            seed_catalog,
        }
    }

    pub fn receipts_dir(&self) -> PathBuf {
        self.upload_dir.join("receipts")
    }
}
