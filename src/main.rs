mod app;
mod config;
mod core;
mod models;
mod utils;

const USAGE: &str = "usage: letterboxd-buckets [scrape | check <film-url> | mirror <list-url> [file-name] [--no-push]]";

#[tokio::main]
async fn main() {
    // A missing .env is fine; everything has a default or comes from config.toml.
    dotenvy::dotenv().ok();

    let config = match config::Config::init() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Failed to initialize configuration: {e}");
            return;
        }
    };
    app::common::init_logging(&config);
    if let Err(e) = app::common::ensure_output_dir(&config) {
        tracing::error!("{e}");
        return;
    }

    let credentials = match config::Credentials::load(&config.paths.credentials) {
        Ok(credentials) => credentials,
        Err(e) => {
            tracing::error!("Failed to read credentials: {e}");
            return;
        }
    };

    let args: Vec<String> = std::env::args().skip(1).collect();
    let result = match args.first().map(String::as_str) {
        None | Some("scrape") => app::scrape::run(&config, &credentials).await.map(|_| ()),
        Some("check") => match args.get(1) {
            Some(url) => app::check::run(&config, url).await.map(|_| ()),
            None => {
                eprintln!("{USAGE}");
                return;
            }
        },
        Some("mirror") => {
            let push = !args.iter().any(|a| a == "--no-push");
            let positional: Vec<&str> = args[1..]
                .iter()
                .map(String::as_str)
                .filter(|a| !a.starts_with("--"))
                .collect();
            match positional.first() {
                Some(list_url) => {
                    app::mirror::run(&config, &credentials, list_url, positional.get(1).copied(), push)
                        .await
                        .map(|_| ())
                }
                None => {
                    eprintln!("{USAGE}");
                    return;
                }
            }
        }
        Some(other) => {
            eprintln!("unknown command '{other}'\n{USAGE}");
            return;
        }
    };

    if let Err(e) = result {
        tracing::error!("Run failed: {e}");
    }
}
