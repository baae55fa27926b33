//! Entity read/write adapters. Every function here is blocking and is meant to
//! run inside `web::block` with a pooled connection.

use std::sync::OnceLock;

use chrono::Utc;
use diesel::{
    connection::DefaultLoadingMode,
    prelude::*,
    result::{DatabaseErrorKind, Error as DieselError},
    upsert::excluded,
};
use regex::Regex;

use crate::error::AppError;
use crate::models::{
    self, Booking, BookingWithVendor, PushToken, SavedVendor, UnavailableDate, User, Vendor, VendorCategory,
    VendorDeal,
};
use crate::search::contains_pattern;

const RECOMMENDED_LIMIT: i64 = 10;

/// Drains a row iterator, logging and dropping rows that fail to decode so one
/// bad row does not fail the whole listing.
pub fn collect_rows<T, I>(rows: I, what: &str) -> Vec<T>
where
    I: Iterator<Item = QueryResult<T>>,
{
    rows.filter_map(|row| match row {
        Ok(row) => Some(row),
        Err(e) => {
            log::warn!("skipping {} row: {}", what, e);
            None
        }
    })
    .collect()
}

fn email_pattern() -> &'static Regex {
    static EMAIL: OnceLock<Regex> = OnceLock::new();
    EMAIL.get_or_init(|| Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").expect("email pattern compiles"))
}

// Users

pub fn insert_new_user(conn: &mut PgConnection, form: &models::CreateUserRequest) -> Result<User, AppError> {
    use crate::schema::users::dsl::users;

    let full_name = form.full_name.trim();
    let email = form.email.trim();
    if full_name.is_empty() || email.is_empty() {
        return Err(AppError::validation("full_name and email are required"));
    }
    if !email_pattern().is_match(email) {
        return Err(AppError::validation("email is not a valid address"));
    }

    let now = Utc::now();
    let new_user = models::NewUser {
        clerk_id: form.clerk_id.as_deref().map(str::trim).filter(|id| !id.is_empty()).map(str::to_owned),
        full_name: full_name.to_owned(),
        email: email.to_owned(),
        role: form.role.unwrap_or_default(),
        created_at: now,
        updated_at: now,
    };

    match diesel::insert_into(users)
        .values(&new_user)
        .returning(User::as_returning())
        .get_result(conn)
    {
        Ok(user) => Ok(user),
        Err(DieselError::DatabaseError(DatabaseErrorKind::UniqueViolation, _)) => {
            Err(AppError::validation("user already exists"))
        }
        Err(e) => Err(e.into()),
    }
}

pub fn list_users(conn: &mut PgConnection) -> Result<Vec<User>, AppError> {
    use crate::schema::users::dsl::{created_at, users};

    let rows = users
        .order(created_at.desc())
        .select(User::as_select())
        .load_iter::<User, DefaultLoadingMode>(conn)?;

    Ok(collect_rows(rows, "user"))
}

/// Maps an identity-provider subject to the internal user id.
pub fn find_user_id_by_clerk_id(conn: &mut PgConnection, external_id: &str) -> Result<Option<i32>, AppError> {
    use crate::schema::users::dsl::{clerk_id, id, users};

    let user_id = users
        .filter(clerk_id.eq(external_id))
        .select(id)
        .first::<i32>(conn)
        .optional()?;

    Ok(user_id)
}

// Vendors

pub fn create_vendor(conn: &mut PgConnection, form: &models::CreateVendorRequest) -> Result<Vendor, AppError> {
    use crate::schema::vendors::dsl::vendors;

    if form.vendor_id == 0 {
        return Err(AppError::validation("vendor_id is required"));
    }
    let title = form.title.trim();
    if title.is_empty() {
        return Err(AppError::validation("title is required"));
    }
    let category = form.category.ok_or_else(|| AppError::validation("category is required"))?;

    let now = Utc::now();
    let new_vendor = models::NewVendor {
        vendor_id: form.vendor_id,
        title: title.to_owned(),
        description: form.description.clone(),
        category,
        price_range: form.price_range.clone(),
        location: form.location.clone(),
        photos: form.photos.clone(),
        rating: form.rating.unwrap_or(0.0),
        featured: form.featured.unwrap_or(false),
        created_at: now,
        updated_at: now,
    };

    let vendor = diesel::insert_into(vendors)
        .values(&new_vendor)
        .returning(Vendor::as_returning())
        .get_result(conn)?;

    Ok(vendor)
}

pub fn list_vendors(conn: &mut PgConnection, category_filter: Option<VendorCategory>) -> Result<Vec<Vendor>, AppError> {
    use crate::schema::vendors::dsl::{category, created_at, vendors};

    let mut query = vendors.order(created_at.desc()).select(Vendor::as_select()).into_boxed();
    if let Some(c) = category_filter {
        query = query.filter(category.eq(c));
    }

    let rows = query.load_iter::<Vendor, DefaultLoadingMode>(conn)?;
    Ok(collect_rows(rows, "vendor"))
}

pub fn get_vendor_by_id(
    conn: &mut PgConnection,
    vendor_pk: i32,
    category_filter: Option<VendorCategory>,
) -> Result<Vendor, AppError> {
    use crate::schema::vendors::dsl::{category, vendors};

    let mut query = vendors.find(vendor_pk).select(Vendor::as_select()).into_boxed();
    if let Some(c) = category_filter {
        query = query.filter(category.eq(c));
    }

    query
        .first::<Vendor>(conn)
        .optional()?
        .ok_or_else(|| AppError::not_found("Vendor not found"))
}

pub fn vendor_exists(conn: &mut PgConnection, vendor_pk: i32) -> Result<bool, AppError> {
    use crate::schema::vendors::dsl::vendors;

    let exists = diesel::select(diesel::dsl::exists(vendors.find(vendor_pk))).get_result(conn)?;
    Ok(exists)
}

/// Takes a share lock on the vendor row for the rest of the transaction.
/// Returns false when the vendor does not exist.
fn lock_vendor(conn: &mut PgConnection, vendor_pk: i32) -> Result<bool, AppError> {
    use crate::schema::vendors::dsl::{id, vendors};

    let locked = vendors
        .find(vendor_pk)
        .select(id)
        .for_share()
        .first::<i32>(conn)
        .optional()?;
    Ok(locked.is_some())
}

pub fn delete_vendor(conn: &mut PgConnection, vendor_pk: i32) -> Result<(), AppError> {
    use crate::schema::vendors::dsl::vendors;

    let deleted = diesel::delete(vendors.find(vendor_pk)).execute(conn)?;
    if deleted == 0 {
        return Err(AppError::not_found("Vendor not found"));
    }
    Ok(())
}

pub fn list_featured_vendors(conn: &mut PgConnection) -> Result<Vec<Vendor>, AppError> {
    use crate::schema::vendors::dsl::{featured, updated_at, vendors};

    let rows = vendors
        .filter(featured.eq(true))
        .order(updated_at.desc())
        .select(Vendor::as_select())
        .load_iter::<Vendor, DefaultLoadingMode>(conn)?;

    Ok(collect_rows(rows, "featured vendor"))
}

/// Top featured vendors by rating, optionally narrowed by category and a
/// case-insensitive location substring.
pub fn list_recommended_vendors(
    conn: &mut PgConnection,
    location_filter: Option<&str>,
    category_filter: Option<VendorCategory>,
) -> Result<Vec<Vendor>, AppError> {
    use crate::schema::vendors::dsl::{category, featured, location, rating, updated_at, vendors};

    let mut query = vendors
        .filter(featured.eq(true))
        .order((rating.desc(), updated_at.desc()))
        .limit(RECOMMENDED_LIMIT)
        .select(Vendor::as_select())
        .into_boxed();
    if let Some(c) = category_filter {
        query = query.filter(category.eq(c));
    }
    if let Some(loc) = location_filter {
        query = query.filter(location.ilike(contains_pattern(loc)));
    }

    let rows = query.load_iter::<Vendor, DefaultLoadingMode>(conn)?;
    Ok(collect_rows(rows, "recommended vendor"))
}

// Bookings

pub fn create_booking(
    conn: &mut PgConnection,
    uid: i32,
    form: &models::CreateBookingRequest,
) -> Result<Booking, AppError> {
    use crate::schema::bookings::dsl::bookings;

    let date = match form.event_date {
        Some(date) if uid != 0 && form.vendor_id != 0 => date,
        _ => return Err(AppError::validation("user_id, vendor_id, and event_date are required")),
    };

    let now = Utc::now();
    let new_booking = models::NewBooking {
        user_id: uid,
        vendor_id: form.vendor_id,
        event_date: date,
        status: form.status.unwrap_or_default(),
        notes: form.notes.clone().unwrap_or_default(),
        created_at: now,
        updated_at: now,
    };

    // bookings.vendor_id has no foreign key; the share lock keeps the vendor
    // from being deleted between the check and the insert.
    conn.transaction(|conn| {
        if !lock_vendor(conn, new_booking.vendor_id)? {
            return Err(AppError::validation("invalid vendor_id"));
        }
        let booking = diesel::insert_into(bookings)
            .values(&new_booking)
            .returning(Booking::as_returning())
            .get_result(conn)?;
        Ok(booking)
    })
}

/// Lists a user's bookings newest first. Outer join: a booking whose vendor
/// was deleted is still returned, with `vendor: None`.
pub fn list_bookings_with_vendor(conn: &mut PgConnection, uid: i32) -> Result<Vec<BookingWithVendor>, AppError> {
    use crate::schema::{bookings, vendors};

    let rows = bookings::table
        .left_join(vendors::table)
        .filter(bookings::user_id.eq(uid))
        .order(bookings::created_at.desc())
        .select((bookings::all_columns, vendors::all_columns.nullable()))
        .load_iter::<(Booking, Option<Vendor>), DefaultLoadingMode>(conn)?;

    Ok(collect_rows(rows, "booking")
        .into_iter()
        .map(|(booking, vendor)| BookingWithVendor { booking, vendor })
        .collect())
}

// Saved vendors

/// Saves `vendor_pk` for the user. Saving an already saved vendor refreshes
/// its timestamp instead of adding a second edge.
pub fn save_vendor(conn: &mut PgConnection, uid: i32, vendor_pk: i32) -> Result<SavedVendor, AppError> {
    use crate::schema::saved_items::dsl::{created_at, saved_items, user_id, vendor_id};

    if vendor_pk == 0 {
        return Err(AppError::validation("vendor_id is required"));
    }

    let new_saved = models::NewSavedVendor {
        user_id: uid,
        vendor_id: vendor_pk,
        created_at: Utc::now(),
    };

    conn.transaction(|conn| {
        if !lock_vendor(conn, vendor_pk)? {
            return Err(AppError::validation("invalid vendor_id"));
        }
        let saved = diesel::insert_into(saved_items)
            .values(&new_saved)
            .on_conflict((user_id, vendor_id))
            .do_update()
            .set(created_at.eq(excluded(created_at)))
            .returning(SavedVendor::as_returning())
            .get_result(conn)?;
        Ok(saved)
    })
}

pub fn unsave_vendor(conn: &mut PgConnection, uid: i32, vendor_pk: i32) -> Result<(), AppError> {
    use crate::schema::saved_items::dsl::{saved_items, user_id, vendor_id};

    let deleted = diesel::delete(saved_items.filter(user_id.eq(uid)).filter(vendor_id.eq(vendor_pk))).execute(conn)?;
    if deleted == 0 {
        return Err(AppError::not_found("Saved vendor not found"));
    }
    Ok(())
}

pub fn list_saved_vendors(conn: &mut PgConnection, uid: i32) -> Result<Vec<Vendor>, AppError> {
    use crate::schema::{saved_items, vendors};

    let rows = saved_items::table
        .inner_join(vendors::table)
        .filter(saved_items::user_id.eq(uid))
        .order(saved_items::created_at.desc())
        .select(Vendor::as_select())
        .load_iter::<Vendor, DefaultLoadingMode>(conn)?;

    Ok(collect_rows(rows, "saved vendor"))
}

// Unavailability windows

pub fn create_unavailable_date(
    conn: &mut PgConnection,
    vendor_pk: i32,
    form: &models::CreateUnavailableDateRequest,
) -> Result<UnavailableDate, AppError> {
    use crate::schema::vendor_bookings::dsl::vendor_bookings;

    if form.booked_from > form.booked_to {
        return Err(AppError::validation("booked_from must not be after booked_to"));
    }
    if !vendor_exists(conn, vendor_pk)? {
        return Err(AppError::not_found("Vendor not found"));
    }

    let now = Utc::now();
    let window = models::NewUnavailableDate {
        vendor_id: vendor_pk,
        booked_from: form.booked_from,
        booked_to: form.booked_to,
        created_at: now,
        updated_at: now,
    };

    let created = diesel::insert_into(vendor_bookings)
        .values(&window)
        .returning(UnavailableDate::as_returning())
        .get_result(conn)?;

    Ok(created)
}

pub fn list_unavailable_dates(
    conn: &mut PgConnection,
    vendor_filter: Option<i32>,
) -> Result<Vec<UnavailableDate>, AppError> {
    use crate::schema::vendor_bookings::dsl::{booked_from, vendor_bookings, vendor_id};

    let mut query = vendor_bookings
        .order(booked_from.asc())
        .select(UnavailableDate::as_select())
        .into_boxed();
    if let Some(v) = vendor_filter {
        query = query.filter(vendor_id.eq(v));
    }

    let rows = query.load_iter::<UnavailableDate, DefaultLoadingMode>(conn)?;
    Ok(collect_rows(rows, "unavailable date"))
}

// Deals

pub fn create_vendor_deal(
    conn: &mut PgConnection,
    vendor_pk: i32,
    form: &models::CreateVendorDealRequest,
) -> Result<VendorDeal, AppError> {
    use crate::schema::vendor_deals::dsl::vendor_deals;

    let title = form.title.trim();
    if title.is_empty() {
        return Err(AppError::validation("title is required"));
    }
    if !(0..=100).contains(&form.discount_percent) {
        return Err(AppError::validation("discount_percent must be between 0 and 100"));
    }
    if form.original_price < 0 || form.deal_price < 0 {
        return Err(AppError::validation("prices must not be negative"));
    }
    if form.start_date > form.end_date {
        return Err(AppError::validation("start_date must not be after end_date"));
    }
    if !vendor_exists(conn, vendor_pk)? {
        return Err(AppError::not_found("Vendor not found"));
    }

    let deal = models::NewVendorDeal {
        vendor_id: vendor_pk,
        title: title.to_owned(),
        description: form.description.clone(),
        discount_percent: form.discount_percent,
        original_price: form.original_price,
        deal_price: form.deal_price,
        start_date: form.start_date,
        end_date: form.end_date,
        photos: form.photos.clone(),
        created_at: Utc::now(),
    };

    let created = diesel::insert_into(vendor_deals)
        .values(&deal)
        .returning(VendorDeal::as_returning())
        .get_result(conn)?;

    Ok(created)
}

pub fn list_vendor_deals(conn: &mut PgConnection, vendor_filter: Option<i32>) -> Result<Vec<VendorDeal>, AppError> {
    use crate::schema::vendor_deals::dsl::{start_date, vendor_deals, vendor_id};

    let mut query = vendor_deals
        .order(start_date.asc())
        .select(VendorDeal::as_select())
        .into_boxed();
    if let Some(v) = vendor_filter {
        query = query.filter(vendor_id.eq(v));
    }

    let rows = query.load_iter::<VendorDeal, DefaultLoadingMode>(conn)?;
    Ok(collect_rows(rows, "vendor deal"))
}

// Push tokens

/// Stores the device token for a user, replacing any previous one.
pub fn save_push_token(conn: &mut PgConnection, uid: i32, device_token: &str) -> Result<PushToken, AppError> {
    use crate::schema::push_tokens::dsl::{push_tokens, token, updated_at, user_id};

    let device_token = device_token.trim();
    if device_token.is_empty() {
        return Err(AppError::validation("token is required"));
    }

    let now = Utc::now();
    let new_token = models::NewPushToken {
        user_id: uid,
        token: device_token.to_owned(),
        created_at: now,
        updated_at: now,
    };

    let stored = diesel::insert_into(push_tokens)
        .values(&new_token)
        .on_conflict(user_id)
        .do_update()
        .set((token.eq(excluded(token)), updated_at.eq(excluded(updated_at))))
        .returning(PushToken::as_returning())
        .get_result(conn)?;

    Ok(stored)
}

pub fn find_push_token(conn: &mut PgConnection, uid: i32) -> Result<Option<String>, AppError> {
    use crate::schema::push_tokens::dsl::{push_tokens, token, user_id};

    let found = push_tokens
        .filter(user_id.eq(uid))
        .select(token)
        .first::<String>(conn)
        .optional()?;

    Ok(found)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[test]
    fn collect_rows_skips_failures() {
        let rows = vec![
            Ok(1),
            Err(DieselError::DeserializationError("bad photo array".into())),
            Ok(3),
        ];
        assert_eq!(collect_rows(rows.into_iter(), "test"), vec![1, 3]);
    }

    #[rstest]
    #[case("ana@example.com", true)]
    #[case("first.last@events.co.uk", true)]
    #[case("not-an-email", false)]
    #[case("two@@example.com", false)]
    #[case("spaces in@example.com", false)]
    fn validates_email_shape(#[case] email: &str, #[case] valid: bool) {
        assert_eq!(email_pattern().is_match(email), valid);
    }
}
