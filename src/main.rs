use actix_files::Files;
use actix_web::{middleware, web, App, HttpServer};

use micks_barber::{config::Config, db, routes, state::AppState};

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    if let Err(err) = run().await {
        eprintln!("Startup error: {err}");
        std::process::exit(1);
    }
    Ok(())
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .init();

    let config = Config::from_env();
    db::ensure_sqlite_dir(&config.database_url)?;

    let pool = db::connect(&config.database_url).await?;
    db::run_migrations(&pool).await?;
    db::seed_defaults(&pool, &config).await?;

    std::fs::create_dir_all(config.receipts_dir())?;

    let address = format!("0.0.0.0:{}", config.port);
    let upload_dir = config.upload_dir.clone();
    let state = AppState::new(pool, config);

    log::info!("Starting Mick's Barber API on http://{address}");

    HttpServer::new(move || {
        App::new()
            .app_data(web::Data::new(state.clone()))
            .wrap(middleware::Logger::default())
            .service(Files::new("/uploads", upload_dir.clone()))
            .configure(routes::configure)
    })
    .bind(address)?
    .run()
    .await?;

    Ok(())
}
