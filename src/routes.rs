use actix_web::{
    error::{self, JsonPayloadError},
    http::StatusCode,
    web,
};

use crate::error::{bad_request, error_envelope};
use crate::handlers;

fn json_config() -> web::JsonConfig {
    web::JsonConfig::default().error_handler(|err, _req| {
        let response = match err {
            JsonPayloadError::ContentType => {
                error_envelope(StatusCode::UNSUPPORTED_MEDIA_TYPE, "Content-Type must be application/json")
            }
            JsonPayloadError::Deserialize(ref e) => bad_request(format!("invalid request body: {}", e)),
            _ => bad_request(err.to_string()),
        };
        error::InternalError::from_response(err, response).into()
    })
}

fn query_config() -> web::QueryConfig {
    web::QueryConfig::default().error_handler(|err, _req| {
        let response = bad_request(format!("invalid query string: {}", err));
        error::InternalError::from_response(err, response).into()
    })
}

fn path_config() -> web::PathConfig {
    web::PathConfig::default().error_handler(|err, _req| {
        let response = bad_request(format!("invalid path parameter: {}", err));
        error::InternalError::from_response(err, response).into()
    })
}

/// Registers every route. `/vendors/featured` and `/vendors/recommended` are
/// registered ahead of `/vendors/{id}` so they are not captured as ids.
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.app_data(json_config())
        .app_data(query_config())
        .app_data(path_config())
        .service(handlers::health)
        .service(handlers::create_user)
        .service(handlers::list_users)
        .service(handlers::create_vendor)
        .service(handlers::list_vendors)
        .service(handlers::featured_vendors)
        .service(handlers::recommended_vendors)
        .service(handlers::get_vendor)
        .service(handlers::delete_vendor)
        .service(handlers::search_vendors)
        .service(handlers::save_vendor)
        .service(handlers::unsave_vendor)
        .service(handlers::my_saved_vendors)
        .service(handlers::create_booking)
        .service(handlers::my_bookings)
        .service(handlers::create_unavailable_date)
        .service(handlers::list_unavailable_dates)
        .service(handlers::create_vendor_deal)
        .service(handlers::list_vendor_deals)
        .service(handlers::save_push_token)
        .service(handlers::send_notification);
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use actix_web::{
        body::MessageBody,
        dev::{ServiceFactory, ServiceRequest, ServiceResponse},
        http::header,
        middleware::NormalizePath,
        test, App,
    };
    use async_trait::async_trait;
    use diesel::{r2d2, PgConnection};
    use serde_json::{Map, Value};

    use super::*;
    use crate::auth::{IdentityResolver, TokenVerifier};
    use crate::db::DbPool;
    use crate::error::AppError;
    use crate::push::{PushError, PushSender};

    struct FixtureVerifier;

    impl TokenVerifier for FixtureVerifier {
        fn verify(&self, token: &str) -> Result<String, AppError> {
            match token {
                "known-token" => Ok("user_known".to_owned()),
                "stranger-token" => Ok("user_stranger".to_owned()),
                _ => Err(AppError::unauthorized("invalid or expired token")),
            }
        }
    }

    struct FixtureResolver;

    impl IdentityResolver for FixtureResolver {
        fn resolve_identity(&self, external_id: &str) -> Result<Option<i32>, AppError> {
            Ok((external_id == "user_known").then_some(7))
        }
    }

    struct SilentPush;

    #[async_trait]
    impl PushSender for SilentPush {
        async fn send_push(&self, _: &str, _: &str, _: &str, _: Option<Map<String, Value>>) -> Result<(), PushError> {
            Ok(())
        }
    }

    /// Pool that never connects; only requests rejected before reaching the
    /// database are exercised here.
    fn lazy_pool() -> DbPool {
        let manager = r2d2::ConnectionManager::<PgConnection>::new("postgres://invalid.invalid/none");
        r2d2::Pool::builder()
            .min_idle(Some(0))
            .connection_timeout(Duration::from_millis(50))
            .build_unchecked(manager)
    }

    fn app() -> App<
        impl ServiceFactory<
            ServiceRequest,
            Config = (),
            Response = ServiceResponse<impl MessageBody>,
            Error = actix_web::Error,
            InitError = (),
        >,
    > {
        let verifier: Arc<dyn TokenVerifier> = Arc::new(FixtureVerifier);
        let resolver: Arc<dyn IdentityResolver> = Arc::new(FixtureResolver);
        let push: Arc<dyn PushSender> = Arc::new(SilentPush);

        App::new()
            .app_data(web::Data::new(lazy_pool()))
            .app_data(web::Data::from(verifier))
            .app_data(web::Data::from(resolver))
            .app_data(web::Data::from(push))
            .wrap(NormalizePath::trim())
            .configure(configure)
    }

    async fn call(req: test::TestRequest) -> (StatusCode, Value) {
        let app = test::init_service(app()).await;
        let resp = test::call_service(&app, req.to_request()).await;
        let status = resp.status();
        let body = test::read_body(resp).await;
        let json = serde_json::from_slice(&body).unwrap_or(Value::Null);
        (status, json)
    }

    fn bearer(token: &str) -> (header::HeaderName, String) {
        (header::AUTHORIZATION, format!("Bearer {}", token))
    }

    #[actix_web::test]
    async fn health_reports_healthy() {
        let (status, body) = call(test::TestRequest::get().uri("/health")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, serde_json::json!({ "status": "healthy" }));
    }

    #[actix_web::test]
    async fn trailing_slash_is_ignored() {
        let (status, _) = call(test::TestRequest::get().uri("/health/")).await;
        assert_eq!(status, StatusCode::OK);
    }

    #[actix_web::test]
    async fn search_requires_query() {
        for uri in ["/search/vendors", "/search/vendors?q=", "/search/vendors?q=%20%20"] {
            let (status, body) = call(test::TestRequest::get().uri(uri)).await;
            assert_eq!(status, StatusCode::BAD_REQUEST, "{}", uri);
            assert_eq!(body["status"], "error");
            assert_eq!(body["message"], "Search query is required");
        }
    }

    #[actix_web::test]
    async fn search_rejects_bad_dates() {
        let (status, body) =
            call(test::TestRequest::get().uri("/search/vendors?q=hall&from_date=2025-13-01&to_date=2025-06-05")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["status"], "error");

        let (status, _) =
            call(test::TestRequest::get().uri("/search/vendors?q=hall&from_date=2025-06-09&to_date=2025-06-05")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[actix_web::test]
    async fn protected_routes_need_bearer() {
        let (status, body) = call(test::TestRequest::get().uri("/bookings")).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["status"], "error");

        let (status, _) = call(
            test::TestRequest::get()
                .uri("/saved-vendors/me")
                .insert_header(bearer("forged-token")),
        )
        .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[actix_web::test]
    async fn unknown_subject_is_unauthorized() {
        let (status, body) = call(
            test::TestRequest::get()
                .uri("/bookings")
                .insert_header(bearer("stranger-token")),
        )
        .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["message"], "user not found");
    }

    #[actix_web::test]
    async fn malformed_json_is_bad_request() {
        let (status, body) = call(
            test::TestRequest::post()
                .uri("/users")
                .insert_header((header::CONTENT_TYPE, "application/json"))
                .set_payload("{\"full_name\": "),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["status"], "error");
    }

    #[actix_web::test]
    async fn non_numeric_vendor_id_is_bad_request() {
        let (status, body) = call(test::TestRequest::get().uri("/vendors/abc")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["status"], "error");
    }

    #[actix_web::test]
    async fn unknown_category_is_bad_request() {
        let (status, body) = call(test::TestRequest::get().uri("/vendors?category=florist")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["status"], "error");
    }

    #[actix_web::test]
    async fn unsave_rejects_zero_vendor() {
        let (status, body) = call(
            test::TestRequest::delete()
                .uri("/saved-vendors/0")
                .insert_header(bearer("known-token")),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["message"], "invalid vendor_id");
    }

    #[actix_web::test]
    async fn notification_needs_title() {
        let (status, body) = call(
            test::TestRequest::post()
                .uri("/notif")
                .insert_header(bearer("known-token"))
                .set_json(serde_json::json!({ "title": " ", "body": "hello" })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["message"], "title is required");
    }
}
