//! Server assembly: builds the catalog, storage backend, and auth store,
//! then wires the actix application.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use actix_cors::Cors;
use actix_files::Files;
use actix_web::http::header;
use actix_web::middleware::Logger;
use actix_web::{web, App, HttpServer};
use anyhow::Result;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::api;
use crate::auth::AuthStore;
use crate::catalog::CatalogDb;
use crate::config::{self, ServerConfig, StorageConfigResolved};
use crate::ingest::Ingestor;
use crate::openapi;
use crate::state::AppState;
use crate::storage::{LocalStorage, StorageBackend, WebDavStorage};
use crate::tags::LoftyTagReader;

pub async fn run(cfg: ServerConfig, bind: SocketAddr) -> Result<()> {
    let db_path = config::database_path_from_config(&cfg);
    let catalog = CatalogDb::new(&db_path)?;

    let mut static_uploads: Option<PathBuf> = None;
    let storage: Arc<dyn StorageBackend> = match config::storage_from_config(&cfg)? {
        StorageConfigResolved::Local { upload_dir } => {
            let local = LocalStorage::create(&upload_dir).await?;
            static_uploads = Some(local.upload_dir().to_path_buf());
            tracing::info!(upload_dir = %upload_dir.display(), "using local storage");
            Arc::new(local)
        }
        StorageConfigResolved::WebDav { url, base_path, public_url, username, password } => {
            tracing::info!(url = %url, public_url = %public_url, "using webdav storage");
            Arc::new(WebDavStorage::new(&url, &base_path, &public_url, &username, &password)?)
        }
    };

    let auth_cfg = config::auth_from_config(&cfg)?;
    let auth = AuthStore::new(catalog.clone(), auth_cfg.session_ttl);
    auth.ensure_bootstrap_user(&auth_cfg.admin_username, &auth_cfg.admin_password)?;
    spawn_session_purge(auth.clone());

    let limits = config::upload_limits_from_config(&cfg);
    let ingestor = Ingestor::new(catalog.clone(), storage.clone(), Arc::new(LoftyTagReader));
    let state = web::Data::new(AppState { catalog, storage, auth, ingestor, limits });

    setup_shutdown();
    tracing::info!(bind = %bind, db = %db_path.display(), "starting flacvault");

    HttpServer::new(move || {
        let cors = Cors::default()
            .allow_any_origin()
            .allowed_methods(vec!["GET", "POST", "PUT", "DELETE", "HEAD"])
            .allowed_headers(vec![header::AUTHORIZATION, header::CONTENT_TYPE])
            .max_age(3600);

        let mut app = App::new()
            .app_data(state.clone())
            .wrap(cors)
            .wrap(Logger::default().exclude("/health"))
            .service(
                SwaggerUi::new("/swagger-ui/{_:.*}")
                    .url("/api-doc/openapi.json", openapi::ApiDoc::openapi()),
            )
            .service(api::health)
            .service(api::auth::login)
            .service(api::auth::logout)
            .service(api::auth::me)
            .service(api::tracks::upload_tracks)
            .service(api::tracks::list_tracks)
            .service(api::tracks::stream_track)
            .service(api::tracks::download_track)
            .service(api::tracks::upload_track_cover)
            .service(api::credits::get_credits)
            .service(api::credits::add_credit)
            .service(api::credits::update_credit)
            .service(api::credits::delete_credit)
            .service(api::lyrics::upload_lyrics)
            .service(api::lyrics::get_lyrics)
            .service(api::lyrics::delete_lyrics)
            .service(api::tracks::get_track)
            .service(api::tracks::update_track)
            .service(api::tracks::delete_track)
            .service(api::albums::list_albums)
            .service(api::albums::get_album)
            .service(api::albums::update_album)
            .service(api::albums::delete_album)
            .service(api::albums::upload_album_cover)
            .service(api::artists::list_artists)
            .service(api::artists::get_artist)
            .service(api::artists::update_artist);

        if let Some(dir) = static_uploads.clone() {
            app = app.service(Files::new("/uploads", dir));
        }
        app
    })
    .bind(bind)?
    .run()
    .await?;

    Ok(())
}

const SESSION_PURGE_INTERVAL: Duration = Duration::from_secs(3600);

/// Sweeps expired sessions hourly so the table stays bounded even when
/// stale tokens are never presented again. The first tick fires
/// immediately, covering startup.
fn spawn_session_purge(auth: AuthStore) {
    actix_web::rt::spawn(async move {
        let mut interval = tokio::time::interval(SESSION_PURGE_INTERVAL);
        loop {
            interval.tick().await;
            match auth.purge_expired_sessions() {
                Ok(purged) if purged > 0 => tracing::info!(purged, "purged expired sessions"),
                Ok(_) => {}
                Err(err) => {
                    tracing::warn!(error = %format!("{err:#}"), "session purge failed");
                }
            }
        }
    });
}

fn setup_shutdown() {
    let _ = ctrlc::set_handler(|| {
        if let Some(system) = actix_web::rt::System::try_current() {
            system.stop();
        } else {
            std::process::exit(0);
        }
    });
}
