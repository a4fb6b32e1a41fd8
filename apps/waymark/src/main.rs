use std::{path::PathBuf, sync::Arc};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use client_core::{
    DestinationClient, MediaStore, MissingMediaStore, MissingSuggestionProvider,
    UnsignedMediaUpload, COMPLETION_NOTIFY_DELAY,
};
use shared::{domain::normalize_username, session::SessionStore};
use storage::SqliteSessionStore;
use tracing::info;

mod config;

use config::{load_settings, normalize_database_url, validate};

#[derive(Parser, Debug)]
#[command(name = "waymark", about = "Publish destinations to the shared map")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Verify credentials and persist the session.
    Verify {
        #[arg(long)]
        username: String,
        #[arg(long)]
        password: String,
    },
    /// Submit a destination using the verified session.
    Submit {
        #[arg(long)]
        place: String,
        /// Administrative region (auto-filled by autocomplete in the web UI).
        #[arg(long, default_value = "")]
        region: String,
        #[arg(long, default_value = "")]
        country: String,
        /// Comma-separated "<lat>, <lon>" pair.
        #[arg(long)]
        coordinates: String,
        /// Image to attach (10 MiB max).
        #[arg(long)]
        image: Option<PathBuf>,
    },
    /// Forget the persisted session ("change user").
    Reset,
    /// List the destinations recorded for a user.
    Places {
        #[arg(long, default_value = "rohit")]
        username: String,
    },
}

async fn print_status(client: &Arc<DestinationClient>) {
    if let Some(message) = client.status().await.message {
        println!("{message}");
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt().init();
    let cli = Cli::parse();

    let settings = load_settings();
    validate(&settings)?;

    let session_db = normalize_database_url(&settings.session_db);
    let session = Arc::new(SqliteSessionStore::new(&session_db).await?);
    let media: Arc<dyn MediaStore> = if settings.media_upload_url.is_empty() {
        Arc::new(MissingMediaStore)
    } else {
        Arc::new(UnsignedMediaUpload::new(
            settings.media_upload_url.clone(),
            settings.media_upload_preset.clone(),
        ))
    };

    let client = DestinationClient::new_with_dependencies(
        settings.backend_url.clone(),
        session as Arc<dyn SessionStore>,
        media,
        Arc::new(MissingSuggestionProvider),
    );
    client.restore_session().await?;

    match cli.command {
        Command::Verify { username, password } => {
            let form = client.form_state().await;
            if form.verified {
                println!(
                    "Already verified as '{}'. Run `waymark reset` to change user.",
                    form.username
                );
                return Ok(());
            }
            client.set_username(username).await?;
            client.set_password(password).await?;
            let outcome = client.verify_password().await;
            print_status(&client).await;
            outcome?;
        }
        Command::Submit {
            place,
            region,
            country,
            coordinates,
            image,
        } => {
            client.set_place(place).await;
            client.set_region(region).await;
            client.set_country(country).await;
            client.set_coordinates(coordinates).await;
            if let Some(path) = image {
                let bytes = tokio::fs::read(&path)
                    .await
                    .with_context(|| format!("failed to read image '{}'", path.display()))?;
                let filename = path
                    .file_name()
                    .map(|name| name.to_string_lossy().into_owned())
                    .unwrap_or_else(|| "image".to_string());
                client.attach_image(filename, bytes).await?;
            }

            let (refresh_tx, mut refresh_rx) = tokio::sync::mpsc::unbounded_channel();
            client
                .set_completion_callback(move || {
                    let _ = refresh_tx.send(());
                })
                .await;

            let outcome = client.submit().await;
            print_status(&client).await;
            let success = outcome?;
            if !success.image_url.is_empty() {
                println!("Image: {}", success.image_url);
            }

            // Wait for the deferred refresh signal, then show the map data
            // the collaborator would render.
            let _ = tokio::time::timeout(COMPLETION_NOTIFY_DELAY * 2, refresh_rx.recv()).await;
            let username = normalize_username(&client.form_state().await.username);
            let places = client.fetch_places(&username).await;
            info!(count = places.len(), username = %username, "map data refreshed");
            println!("{} destination(s) on the map for '{username}'.", places.len());
        }
        Command::Reset => {
            client.reset().await?;
            println!("Session cleared. Verify again to upload.");
        }
        Command::Places { username } => {
            let places = client.fetch_places(&username).await;
            if places.is_empty() {
                println!("No destinations recorded for '{username}'.");
            }
            for place in places {
                let image = if place.image_url.is_empty() {
                    String::new()
                } else {
                    format!(" [{}]", place.image_url)
                };
                println!(
                    "{} ({}, {}) at {}, {}{image}",
                    place.place, place.region, place.country, place.latitude, place.longitude
                );
            }
        }
    }

    Ok(())
}
