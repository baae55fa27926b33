use std::io;
use std::sync::Arc;

use actix_web::{middleware, web, App, HttpServer};

use marketplace::auth::{DbIdentityResolver, IdentityResolver, JwtVerifier, TokenVerifier};
use marketplace::config::Config;
use marketplace::db;
use marketplace::push::{HttpPushSender, PushSender};
use marketplace::routes;

#[actix_web::main]
async fn main() -> io::Result<()> {
    env_logger::init_from_env(env_logger::Env::new().default_filter_or("info"));

    let config = Config::from_env().map_err(io::Error::other)?;

    // initialize DB pool outside of `HttpServer::new` so that it is shared across all workers
    let pool = db::initialize_db_pool(&config.database_url, &config.pool).map_err(io::Error::other)?;

    if config.run_migrations {
        let mut conn = pool.get().map_err(io::Error::other)?;
        let applied = db::run_migrations(&mut conn).map_err(io::Error::other)?;
        log::info!("database schema up to date ({} migrations applied)", applied);
    }

    let verifier: Arc<dyn TokenVerifier> = Arc::new(
        JwtVerifier::from_rsa_pem(&config.jwt_public_key, config.jwt_issuer.as_deref()).map_err(io::Error::other)?,
    );
    let resolver: Arc<dyn IdentityResolver> = Arc::new(DbIdentityResolver::new(pool.clone()));
    let push: Arc<dyn PushSender> =
        Arc::new(HttpPushSender::new(&config.push_gateway_url, config.push_timeout).map_err(io::Error::other)?);

    let verifier = web::Data::from(verifier);
    let resolver = web::Data::from(resolver);
    let push = web::Data::from(push);
    let pool_data = web::Data::new(pool.clone());

    let (host, port) = config.bind_address();
    log::info!("starting HTTP server at http://{}:{}", host, port);

    HttpServer::new(move || {
        App::new()
            .app_data(pool_data.clone())
            .app_data(verifier.clone())
            .app_data(resolver.clone())
            .app_data(push.clone())
            .wrap(middleware::NormalizePath::trim())
            .wrap(middleware::Logger::default())
            .configure(routes::configure)
    })
    .bind((host, port))?
    .run()
    .await?;

    log::info!("server stopped, closing database pool");
    drop(pool);
    Ok(())
}
