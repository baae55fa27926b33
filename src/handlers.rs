use actix_web::{delete, get, post, web, HttpResponse};
use diesel::PgConnection;

use crate::actions;
use crate::auth::AuthenticatedUser;
use crate::db::DbPool;
use crate::error::AppError;
use crate::models::{self, ApiResponse, MessageResponse, VendorCategory};
use crate::push::PushSender;
use crate::search::{self, VendorSearch};

type HandlerResult = Result<HttpResponse, AppError>;

/// Runs a blocking adapter call on the blocking pool with a pooled connection.
async fn with_conn<T, F>(pool: web::Data<DbPool>, f: F) -> Result<T, AppError>
where
    F: FnOnce(&mut PgConnection) -> Result<T, AppError> + Send + 'static,
    T: Send + 'static,
{
    web::block(move || {
        let mut conn = pool.get()?;
        f(&mut conn)
    })
    .await?
}

fn parse_category(raw: Option<&str>) -> Result<Option<VendorCategory>, AppError> {
    match raw.map(str::trim).filter(|c| !c.is_empty()) {
        Some(c) => c.parse().map(Some).map_err(AppError::Validation),
        None => Ok(None),
    }
}

fn ok<T: serde::Serialize>(data: T) -> HandlerResult {
    Ok(HttpResponse::Ok().json(ApiResponse::success(data)))
}

fn created<T: serde::Serialize>(data: T) -> HandlerResult {
    Ok(HttpResponse::Created().json(ApiResponse::success(data)))
}

fn message(text: &str) -> MessageResponse {
    MessageResponse { message: text.to_owned() }
}

#[get("/health")]
pub async fn health() -> HttpResponse {
    HttpResponse::Ok().json(serde_json::json!({ "status": "healthy" }))
}

// Users

#[post("/users")]
pub async fn create_user(pool: web::Data<DbPool>, form: web::Json<models::CreateUserRequest>) -> HandlerResult {
    let form = form.into_inner();
    let user = with_conn(pool, move |conn| actions::insert_new_user(conn, &form)).await?;
    log::info!("created user {}", user.id);
    created(user)
}

#[get("/users")]
pub async fn list_users(pool: web::Data<DbPool>) -> HandlerResult {
    ok(with_conn(pool, actions::list_users).await?)
}

// Vendors

#[post("/vendors")]
pub async fn create_vendor(pool: web::Data<DbPool>, form: web::Json<models::CreateVendorRequest>) -> HandlerResult {
    let form = form.into_inner();
    let vendor = with_conn(pool, move |conn| actions::create_vendor(conn, &form)).await?;
    log::info!("created vendor {} ({})", vendor.id, vendor.category);
    created(vendor)
}

#[get("/vendors")]
pub async fn list_vendors(pool: web::Data<DbPool>, params: web::Query<models::CategoryParams>) -> HandlerResult {
    let category = parse_category(params.category.as_deref())?;
    ok(with_conn(pool, move |conn| actions::list_vendors(conn, category)).await?)
}

#[get("/vendors/featured")]
pub async fn featured_vendors(pool: web::Data<DbPool>) -> HandlerResult {
    ok(with_conn(pool, actions::list_featured_vendors).await?)
}

#[get("/vendors/recommended")]
pub async fn recommended_vendors(pool: web::Data<DbPool>, params: web::Query<models::RecommendedParams>) -> HandlerResult {
    let params = params.into_inner();
    let category = parse_category(params.category.as_deref())?;
    let location = params.location.map(|l| l.trim().to_owned()).filter(|l| !l.is_empty());
    let vendors = with_conn(pool, move |conn| {
        actions::list_recommended_vendors(conn, location.as_deref(), category)
    })
    .await?;
    ok(vendors)
}

#[get("/vendors/{id}")]
pub async fn get_vendor(
    pool: web::Data<DbPool>,
    path: web::Path<i32>,
    params: web::Query<models::CategoryParams>,
) -> HandlerResult {
    let vendor_pk = path.into_inner();
    let category = parse_category(params.category.as_deref())?;
    ok(with_conn(pool, move |conn| actions::get_vendor_by_id(conn, vendor_pk, category)).await?)
}

#[delete("/vendors/{id}")]
pub async fn delete_vendor(pool: web::Data<DbPool>, path: web::Path<i32>) -> HandlerResult {
    let vendor_pk = path.into_inner();
    with_conn(pool, move |conn| actions::delete_vendor(conn, vendor_pk)).await?;
    log::info!("deleted vendor {}", vendor_pk);
    ok(message("Vendor deleted successfully"))
}

// Search

#[get("/search/vendors")]
pub async fn search_vendors(pool: web::Data<DbPool>, params: web::Query<models::SearchParams>) -> HandlerResult {
    let query = VendorSearch::from_params(&params)?;
    ok(with_conn(pool, move |conn| search::search_vendors(conn, &query)).await?)
}

// Saved vendors

#[post("/saved-vendors")]
pub async fn save_vendor(
    pool: web::Data<DbPool>,
    user: AuthenticatedUser,
    form: web::Json<models::SaveVendorRequest>,
) -> HandlerResult {
    let vendor_pk = form.vendor_id;
    let saved = with_conn(pool, move |conn| actions::save_vendor(conn, user.user_id, vendor_pk)).await?;
    created(saved)
}

#[delete("/saved-vendors/{vendor_id}")]
pub async fn unsave_vendor(pool: web::Data<DbPool>, user: AuthenticatedUser, path: web::Path<i32>) -> HandlerResult {
    let vendor_pk = path.into_inner();
    if vendor_pk == 0 {
        return Err(AppError::validation("invalid vendor_id"));
    }
    with_conn(pool, move |conn| actions::unsave_vendor(conn, user.user_id, vendor_pk)).await?;
    ok(message("vendor unsaved"))
}

#[get("/saved-vendors/me")]
pub async fn my_saved_vendors(pool: web::Data<DbPool>, user: AuthenticatedUser) -> HandlerResult {
    ok(with_conn(pool, move |conn| actions::list_saved_vendors(conn, user.user_id)).await?)
}

// Bookings

#[post("/bookings")]
pub async fn create_booking(
    pool: web::Data<DbPool>,
    user: AuthenticatedUser,
    form: web::Json<models::CreateBookingRequest>,
) -> HandlerResult {
    let form = form.into_inner();
    let booking = with_conn(pool, move |conn| actions::create_booking(conn, user.user_id, &form)).await?;
    log::info!("created booking {} for user {}", booking.id, booking.user_id);
    created(booking)
}

#[get("/bookings")]
pub async fn my_bookings(pool: web::Data<DbPool>, user: AuthenticatedUser) -> HandlerResult {
    let user_id = user.user_id;
    let bookings = with_conn(pool, move |conn| actions::list_bookings_with_vendor(conn, user_id)).await?;
    log::debug!("user {} has {} bookings", user_id, bookings.len());
    ok(bookings)
}

// Unavailability windows

#[post("/unavailable-dates/{vendor_id}")]
pub async fn create_unavailable_date(
    pool: web::Data<DbPool>,
    _user: AuthenticatedUser,
    path: web::Path<i32>,
    form: web::Json<models::CreateUnavailableDateRequest>,
) -> HandlerResult {
    let vendor_pk = path.into_inner();
    let form = form.into_inner();
    let window = with_conn(pool, move |conn| actions::create_unavailable_date(conn, vendor_pk, &form)).await?;
    created(window)
}

#[get("/unavailable-dates")]
pub async fn list_unavailable_dates(pool: web::Data<DbPool>, params: web::Query<models::VendorIdParams>) -> HandlerResult {
    let vendor_filter = params.vendor_id;
    ok(with_conn(pool, move |conn| actions::list_unavailable_dates(conn, vendor_filter)).await?)
}

// Deals

#[post("/vendor-deals/{vendor_id}")]
pub async fn create_vendor_deal(
    pool: web::Data<DbPool>,
    path: web::Path<i32>,
    form: web::Json<models::CreateVendorDealRequest>,
) -> HandlerResult {
    let vendor_pk = path.into_inner();
    let form = form.into_inner();
    let deal = with_conn(pool, move |conn| actions::create_vendor_deal(conn, vendor_pk, &form)).await?;
    created(deal)
}

#[get("/vendor-deals")]
pub async fn list_vendor_deals(pool: web::Data<DbPool>, params: web::Query<models::VendorIdParams>) -> HandlerResult {
    let vendor_filter = params.vendor_id;
    ok(with_conn(pool, move |conn| actions::list_vendor_deals(conn, vendor_filter)).await?)
}

// Notifications

#[post("/notif/push-token")]
pub async fn save_push_token(
    pool: web::Data<DbPool>,
    user: AuthenticatedUser,
    form: web::Json<models::SavePushTokenRequest>,
) -> HandlerResult {
    let token = form.into_inner().token;
    let stored = with_conn(pool, move |conn| actions::save_push_token(conn, user.user_id, &token)).await?;
    ok(stored)
}

#[post("/notif")]
pub async fn send_notification(
    pool: web::Data<DbPool>,
    sender: web::Data<dyn PushSender>,
    user: AuthenticatedUser,
    form: web::Json<models::SendNotificationRequest>,
) -> HandlerResult {
    let form = form.into_inner();
    if form.title.trim().is_empty() {
        return Err(AppError::validation("title is required"));
    }

    let user_id = user.user_id;
    let token = with_conn(pool, move |conn| actions::find_push_token(conn, user_id))
        .await?
        .ok_or_else(|| AppError::not_found("no push token registered"))?;

    sender.send_push(&token, &form.title, &form.body, form.data).await.map_err(|e| {
        log::error!("push to user {} failed: {}", user_id, e);
        AppError::from(e)
    })?;

    ok(message("notification sent"))
}
