mod api;
mod config;
mod db;
mod engine;
mod error;
mod logging;
mod models;
mod run;

use anyhow::Result;

fn main() -> Result<()> {
    let args: Vec<String> = std::env::args().collect();
    let config = config::AppConfig::load()?;
    logging::init(config.log_json)?;

    let db_path = config.database_path()?;
    let mut db = db::Database::open(&db_path, config.busy_timeout())?;

    match args.len() {
        1 => {
            drop(db);
            run::serve(&config, &db_path)
        }
        2.. => run::as_cli(&args, &mut db, &config),
        _ => {
            eprintln!("Usage: limitguard [command]");
            Ok(())
        }
    }
}
