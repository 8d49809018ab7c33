pub mod config;
pub mod db;
pub mod errors;
pub mod expiry;
pub mod models;
pub mod rate_limit;
pub mod repository;
pub mod routes;
pub mod session;
pub mod signaling;
pub mod storage;

use config::AppConfig;
use db::Db;
use rate_limit::{AdmissionController, DegradingCounterStore, InMemoryCounterStore, RedisCounterStore};
use rocket_cors::CorsOptions;
use signaling::Registry;
use std::env;
use std::sync::Arc;
use storage::{Gateway, InMemoryObjectStore, ObjectStore, S3ObjectStore};

/// Builds the Rocket instance from the environment, mirroring the
/// teacher's `rocket()` -> `rocket_with_db()` -> `build_rocket()` chain so
/// both the binary and the integration tests can construct a server
/// against a chosen database path.
pub fn rocket() -> rocket::Rocket<rocket::Build> {
    let db_path = env::var("FILEDROP_DATABASE_PATH").unwrap_or_else(|_| "data/filedrop.db".to_string());
    rocket_with_db(&db_path)
}

pub fn rocket_with_db(db_path: &str) -> rocket::Rocket<rocket::Build> {
    build_rocket(db_path, AppConfig::from_env())
}

pub fn rocket_with_db_and_config(db_path: &str, config: AppConfig) -> rocket::Rocket<rocket::Build> {
    build_rocket(db_path, config)
}

/// Picks the object-storage backend. `InMemoryObjectStore` is the default
/// so the server runs end to end with nothing more than a working
/// directory (§8 scenario S1 relies on this); set `FILEDROP_USE_S3=1` with
/// `FILEDROP_S3_BUCKET`/`FILEDROP_S3_ENDPOINT` to target a real bucket.
async fn build_object_store(config: &AppConfig) -> (Arc<dyn ObjectStore>, Option<Arc<InMemoryObjectStore>>) {
    let use_s3 = env::var("FILEDROP_USE_S3").map(|v| v == "1").unwrap_or(false);
    if use_s3 {
        let store = S3ObjectStore::new(config.s3_bucket.clone(), config.s3_endpoint.clone(), config.s3_region.clone()).await;
        (Arc::new(store), None)
    } else {
        let base_url = env::var("FILEDROP_PUBLIC_BASE_URL").unwrap_or_else(|_| "http://127.0.0.1:8000".to_string());
        let store = Arc::new(InMemoryObjectStore::new(base_url));
        (store.clone() as Arc<dyn ObjectStore>, Some(store))
    }
}

/// Picks the admission controller's shared counter backend. Falls back to
/// purely local counters — with a warning, never silently failing open —
/// both when no Redis URL is configured and when the configured Redis is
/// unreachable at startup (§4.5).
async fn build_admission_controller(config: &AppConfig) -> AdmissionController {
    let store: Box<dyn rate_limit::CounterStore> = match &config.redis_url {
        Some(url) => match RedisCounterStore::connect(url).await {
            Ok(redis_store) => Box::new(DegradingCounterStore::new(Box::new(redis_store))),
            Err(e) => {
                tracing::warn!(error = %e, "failed to connect to redis, admission controller starting local-only");
                Box::new(InMemoryCounterStore::new())
            }
        },
        None => Box::new(InMemoryCounterStore::new()),
    };
    AdmissionController::new(store, config.rate_limits)
}

fn build_rocket(db_path: &str, config: AppConfig) -> rocket::Rocket<rocket::Build> {
    if let Some(parent) = std::path::Path::new(db_path).parent() {
        std::fs::create_dir_all(parent).ok();
    }

    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .try_init()
        .ok();

    let db = Arc::new(Db::new(db_path));
    let config = Arc::new(config);
    let registry = Arc::new(Registry::new(config.room_cap, config.max_rooms));

    let cors = CorsOptions::default().to_cors().expect("failed to build CORS policy");
    let figment = rocket::Config::figment();

    let db_for_gateway = db.clone();
    let config_for_gateway = config.clone();
    let config_for_admission = config.clone();
    let db_for_sweeper = db.clone();
    let config_for_sweeper = config.clone();

    rocket::custom(figment)
        .manage(db)
        .manage(config.clone())
        .manage(registry)
        .attach(cors)
        .register("/", rocket::catchers![routes::too_many_requests, routes::not_found])
        .mount(
            "/",
            rocket::routes![
                routes::health,
                routes::metrics,
                routes::issue_upload,
                routes::finalize_upload,
                routes::get_share,
                routes::get_share_alias,
                routes::download_share,
                routes::list_my_shares,
                routes::revoke_share,
                routes::room_snapshot,
                routes::signaling_endpoint,
            ],
        )
        .attach(rocket::fairing::AdHoc::on_ignite("Object Storage Gateway", |rocket| {
            Box::pin(async move {
                let (object_store, in_memory_stub) = build_object_store(&config_for_gateway).await;
                let gateway = Gateway::new(db_for_gateway, object_store, (*config_for_gateway).clone());

                let mut rocket = rocket.manage(gateway);
                if let Some(stub) = in_memory_stub {
                    rocket = rocket
                        .manage(stub)
                        .mount("/", rocket::routes![routes::object_store_put, routes::object_store_get]);
                }
                rocket
            })
        }))
        .attach(rocket::fairing::AdHoc::on_ignite("Admission Controller", |rocket| {
            Box::pin(async move {
                let admission = build_admission_controller(&config_for_admission).await;
                rocket.manage(admission)
            })
        }))
        .attach(rocket::fairing::AdHoc::on_liftoff("Expiry Sweeper", move |rocket| {
            Box::pin(async move {
                let Some(gateway) = rocket.state::<Gateway>() else {
                    tracing::error!("gateway not available at liftoff, expiry sweeper not started");
                    return;
                };
                expiry::spawn_sweeper(db_for_sweeper, gateway.store.clone(), config_for_sweeper);
                tracing::info!("expiry sweeper started");
            })
        }))
}
