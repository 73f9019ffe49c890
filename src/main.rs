use clap::{Parser, Subcommand};
use std::sync::Arc;
use tokio::io::{self, AsyncWriteExt, BufReader};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use validator::Validate;

use rental_desk::config::Config;
use rental_desk::console::{self, Console};
use rental_desk::db::DatabasePool;
use rental_desk::models::{LoginRequest, Theme};
use rental_desk::services::{HttpReservationApi, ReservationCache, ReservationForm, SessionStore};

#[derive(Debug, Parser)]
#[command(name = "rental-desk", about = "Pickup and return desk for rental reservations", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Sign in and remember the access token
    Login {
        #[arg(long)]
        username: String,
        #[arg(long, env = "RENTAL_DESK_PASSWORD", hide_env_values = true)]
        password: String,
    },
    /// Sign out and forget the access token
    Logout,
    /// List stock plans
    Plans,
    /// List reservations
    Reservations,
    /// Show reservation `id` with its items
    Reservation { id: i64 },
    /// Show or change the stored theme
    Theme { theme: Option<Theme> },
    /// Record a new pickup interactively
    Pickup,
    /// Return reservation `id` interactively
    Return { id: i64 },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "rental_desk=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    let config = Config::load()?;
    info!("Configuration loaded: {:?}", config);

    let db_pool = DatabasePool::new(&config).await?;
    db_pool.migrate().await?;

    let session = Arc::new(SessionStore::load(db_pool).await?);
    let api = Arc::new(HttpReservationApi::new(&config.api, session.clone())?);
    let cache = Arc::new(ReservationCache::new());
    let mut stdout = io::stdout();

    match cli.command {
        Commands::Login { username, password } => {
            let request = LoginRequest { username, password };
            request.validate()?;
            let data = api.login(&request).await?;
            let name = data
                .user
                .map(|u| u.username)
                .unwrap_or(request.username);
            stdout
                .write_all(format!("Signed in as {}\n", name).as_bytes())
                .await?;
        }
        Commands::Logout => {
            let message = api.logout().await?;
            let message = message.unwrap_or_else(|| "Signed out".to_string());
            stdout.write_all(format!("{}\n", message).as_bytes()).await?;
        }
        Commands::Plans => console::print_plans(api.as_ref(), &mut stdout).await?,
        Commands::Reservations => {
            console::print_reservations(&cache, api.as_ref(), &mut stdout).await?
        }
        Commands::Reservation { id } => {
            console::print_reservation(api.as_ref(), id, &mut stdout).await?
        }
        Commands::Theme { theme } => {
            if let Some(theme) = theme {
                session.set_theme(theme).await?;
            }
            let theme = session.theme().await;
            stdout.write_all(format!("{}\n", theme).as_bytes()).await?;
        }
        Commands::Pickup => {
            let form = ReservationForm::pickup(api.clone()).with_cache(cache.clone());
            let stdin = BufReader::new(io::stdin());
            Console::new(form, stdin, stdout, config.scanner.interval())
                .run()
                .await?;
        }
        Commands::Return { id } => {
            let form = ReservationForm::open(api.clone(), id)
                .await?
                .with_cache(cache.clone());
            let stdin = BufReader::new(io::stdin());
            Console::new(form, stdin, stdout, config.scanner.interval())
                .run()
                .await?;
        }
    }

    Ok(())
}
