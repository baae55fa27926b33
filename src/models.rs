use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use diesel::{
    deserialize::{self, FromSql},
    pg::{Pg, PgValue},
    prelude::*,
    serialize::{self, Output, ToSql},
    sql_types::Text,
};
use serde::{Deserialize, Serialize};

use crate::schema::{bookings, push_tokens, saved_items, users, vendor_bookings, vendor_deals, vendors};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, AsExpression, FromSqlRow)]
#[diesel(sql_type = crate::schema::sql_types::UserRole)]
#[serde(rename_all = "lowercase")]
pub enum UserRole {
    #[default]
    User,
    Vendor,
    Admin,
}

impl ToSql<crate::schema::sql_types::UserRole, Pg> for UserRole {
    fn to_sql<'b>(&'b self, out: &mut Output<'b, '_, Pg>) -> serialize::Result {
        let s = match *self {
            UserRole::User => "user",
            UserRole::Vendor => "vendor",
            UserRole::Admin => "admin",
        };
        <str as ToSql<Text, Pg>>::to_sql(s, out)
    }
}

impl FromSql<crate::schema::sql_types::UserRole, Pg> for UserRole {
    fn from_sql(bytes: PgValue) -> deserialize::Result<Self> {
        match <String as FromSql<Text, Pg>>::from_sql(bytes)?.as_str() {
            "user" => Ok(UserRole::User),
            "vendor" => Ok(UserRole::Vendor),
            "admin" => Ok(UserRole::Admin),
            s => Err(format!("Unrecognized user role: {}", s).into()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, AsExpression, FromSqlRow)]
#[diesel(sql_type = crate::schema::sql_types::BookingStatus)]
#[serde(rename_all = "lowercase")]
pub enum BookingStatus {
    #[default]
    Pending,
    Confirmed,
    Cancelled,
}

impl ToSql<crate::schema::sql_types::BookingStatus, Pg> for BookingStatus {
    fn to_sql<'b>(&'b self, out: &mut Output<'b, '_, Pg>) -> serialize::Result {
        let s = match *self {
            BookingStatus::Pending => "pending",
            BookingStatus::Confirmed => "confirmed",
            BookingStatus::Cancelled => "cancelled",
        };
        <str as ToSql<Text, Pg>>::to_sql(s, out)
    }
}

impl FromSql<crate::schema::sql_types::BookingStatus, Pg> for BookingStatus {
    fn from_sql(bytes: PgValue) -> deserialize::Result<Self> {
        match <String as FromSql<Text, Pg>>::from_sql(bytes)?.as_str() {
            "pending" => Ok(BookingStatus::Pending),
            "confirmed" => Ok(BookingStatus::Confirmed),
            "cancelled" => Ok(BookingStatus::Cancelled),
            s => Err(format!("Unrecognized booking status: {}", s).into()),
        }
    }
}

/// Vendor categories. Stored as checked text rather than a Postgres enum so the
/// generated search vector can index the raw label.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, AsExpression, FromSqlRow)]
#[diesel(sql_type = Text)]
#[serde(rename_all = "lowercase")]
pub enum VendorCategory {
    Venue,
    Catering,
    Decor,
    Photography,
}

impl VendorCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            VendorCategory::Venue => "venue",
            VendorCategory::Catering => "catering",
            VendorCategory::Decor => "decor",
            VendorCategory::Photography => "photography",
        }
    }
}

impl fmt::Display for VendorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for VendorCategory {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "venue" => Ok(VendorCategory::Venue),
            "catering" => Ok(VendorCategory::Catering),
            "decor" => Ok(VendorCategory::Decor),
            "photography" => Ok(VendorCategory::Photography),
            other => Err(format!("unknown category '{}'", other)),
        }
    }
}

// Bodies and query strings accept the same spellings.
impl<'de> Deserialize<'de> for VendorCategory {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

impl ToSql<Text, Pg> for VendorCategory {
    fn to_sql<'b>(&'b self, out: &mut Output<'b, '_, Pg>) -> serialize::Result {
        <str as ToSql<Text, Pg>>::to_sql(self.as_str(), out)
    }
}

impl FromSql<Text, Pg> for VendorCategory {
    fn from_sql(bytes: PgValue) -> deserialize::Result<Self> {
        let raw = <String as FromSql<Text, Pg>>::from_sql(bytes)?;
        raw.parse().map_err(|e: String| e.into())
    }
}

#[derive(Debug, Clone, Queryable, Selectable, Serialize)]
#[diesel(table_name = users)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct User {
    pub id: i32,
    pub clerk_id: Option<String>,
    pub full_name: String,
    pub email: String,
    pub role: UserRole,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = users)]
pub struct NewUser {
    pub clerk_id: Option<String>,
    pub full_name: String,
    pub email: String,
    pub role: UserRole,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CreateUserRequest {
    #[serde(default)]
    pub full_name: String,
    #[serde(default)]
    pub email: String,
    pub clerk_id: Option<String>,
    pub role: Option<UserRole>,
}

#[derive(Debug, Clone, PartialEq, Queryable, QueryableByName, Selectable, Serialize)]
#[diesel(table_name = vendors)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct Vendor {
    pub id: i32,
    pub vendor_id: i32,
    pub title: String,
    pub description: String,
    pub category: VendorCategory,
    pub price_range: String,
    pub location: String,
    pub photos: Vec<String>,
    pub rating: f64,
    pub featured: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = vendors)]
pub struct NewVendor {
    pub vendor_id: i32,
    pub title: String,
    pub description: String,
    pub category: VendorCategory,
    pub price_range: String,
    pub location: String,
    pub photos: Vec<String>,
    pub rating: f64,
    pub featured: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CreateVendorRequest {
    #[serde(default)]
    pub vendor_id: i32,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub category: Option<VendorCategory>,
    #[serde(default)]
    pub price_range: String,
    #[serde(default)]
    pub location: String,
    #[serde(default)]
    pub photos: Vec<String>,
    pub rating: Option<f64>,
    pub featured: Option<bool>,
}

#[derive(Debug, Clone, Queryable, Selectable, Serialize)]
#[diesel(table_name = bookings)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct Booking {
    pub id: i32,
    pub user_id: i32,
    pub vendor_id: i32,
    pub event_date: NaiveDate,
    pub status: BookingStatus,
    pub notes: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = bookings)]
pub struct NewBooking {
    pub user_id: i32,
    pub vendor_id: i32,
    pub event_date: NaiveDate,
    pub status: BookingStatus,
    pub notes: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CreateBookingRequest {
    #[serde(default)]
    pub vendor_id: i32,
    pub event_date: Option<NaiveDate>,
    pub notes: Option<String>,
    pub status: Option<BookingStatus>,
}

/// A booking with its vendor. `vendor` is `None` once the vendor row is gone.
#[derive(Debug, Clone, Serialize)]
pub struct BookingWithVendor {
    #[serde(flatten)]
    pub booking: Booking,
    pub vendor: Option<Vendor>,
}

#[derive(Debug, Clone, Queryable, Selectable, Serialize)]
#[diesel(table_name = saved_items)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct SavedVendor {
    pub id: i32,
    pub user_id: i32,
    pub vendor_id: i32,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = saved_items)]
pub struct NewSavedVendor {
    pub user_id: i32,
    pub vendor_id: i32,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SaveVendorRequest {
    #[serde(default)]
    pub vendor_id: i32,
}

#[derive(Debug, Clone, Queryable, Selectable, Serialize)]
#[diesel(table_name = vendor_bookings)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct UnavailableDate {
    pub id: i32,
    pub vendor_id: i32,
    pub booked_from: NaiveDate,
    pub booked_to: NaiveDate,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = vendor_bookings)]
pub struct NewUnavailableDate {
    pub vendor_id: i32,
    pub booked_from: NaiveDate,
    pub booked_to: NaiveDate,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateUnavailableDateRequest {
    pub booked_from: NaiveDate,
    pub booked_to: NaiveDate,
}

#[derive(Debug, Clone, Queryable, Selectable, Serialize)]
#[diesel(table_name = vendor_deals)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct VendorDeal {
    pub id: i32,
    pub vendor_id: i32,
    pub title: String,
    pub description: String,
    pub discount_percent: i32,
    pub original_price: i32,
    pub deal_price: i32,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub photos: Vec<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = vendor_deals)]
pub struct NewVendorDeal {
    pub vendor_id: i32,
    pub title: String,
    pub description: String,
    pub discount_percent: i32,
    pub original_price: i32,
    pub deal_price: i32,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub photos: Vec<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateVendorDealRequest {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub discount_percent: i32,
    #[serde(default)]
    pub original_price: i32,
    #[serde(default)]
    pub deal_price: i32,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    #[serde(default)]
    pub photos: Vec<String>,
}

#[derive(Debug, Clone, Queryable, Selectable, Serialize)]
#[diesel(table_name = push_tokens)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct PushToken {
    pub id: i32,
    pub user_id: i32,
    pub token: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = push_tokens)]
pub struct NewPushToken {
    pub user_id: i32,
    pub token: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SavePushTokenRequest {
    #[serde(default)]
    pub token: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SendNotificationRequest {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub body: String,
    pub data: Option<serde_json::Map<String, serde_json::Value>>,
}

// Query strings

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CategoryParams {
    pub category: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RecommendedParams {
    pub location: Option<String>,
    pub category: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SearchParams {
    pub q: Option<String>,
    pub location: Option<String>,
    pub category: Option<String>,
    pub from_date: Option<String>,
    pub to_date: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct VendorIdParams {
    pub vendor_id: Option<i32>,
}

/// Success envelope shared by every handler.
#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub status: &'static str,
    pub data: T,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self { status: "success", data }
    }
}

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("venue", VendorCategory::Venue)]
    #[case("Catering", VendorCategory::Catering)]
    #[case(" DECOR ", VendorCategory::Decor)]
    #[case("photography", VendorCategory::Photography)]
    fn parses_categories_case_insensitively(#[case] raw: &str, #[case] expected: VendorCategory) {
        assert_eq!(raw.parse::<VendorCategory>(), Ok(expected));
    }

    #[test]
    fn rejects_unknown_category() {
        assert!("florist".parse::<VendorCategory>().is_err());
    }

    #[rstest]
    #[case("\"venue\"", VendorCategory::Venue)]
    #[case("\"Venue\"", VendorCategory::Venue)]
    #[case("\"PHOTOGRAPHY\"", VendorCategory::Photography)]
    fn body_category_matches_query_parsing(#[case] raw: &str, #[case] expected: VendorCategory) {
        assert_eq!(serde_json::from_str::<VendorCategory>(raw).unwrap(), expected);
    }

    #[test]
    fn body_rejects_unknown_category() {
        let err = serde_json::from_str::<CreateVendorRequest>(r#"{"title":"x","category":"florist"}"#).unwrap_err();
        assert!(err.to_string().contains("unknown category"));
    }

    #[test]
    fn category_serializes_lowercase() {
        assert_eq!(serde_json::to_value(VendorCategory::Decor).unwrap(), serde_json::json!("decor"));
    }

    #[test]
    fn category_binds_as_text() {
        use crate::schema::vendors::dsl::{category, vendors};

        let query = vendors.filter(category.eq(VendorCategory::Catering)).select(category);
        let sql = diesel::debug_query::<Pg, _>(&query).to_string();
        assert!(sql.contains("\"vendors\".\"category\" = $1"), "{}", sql);
        assert!(sql.contains("Catering"), "{}", sql);
    }

    #[test]
    fn booking_status_defaults_to_pending() {
        assert_eq!(BookingStatus::default(), BookingStatus::Pending);
        let json = serde_json::to_value(BookingStatus::Cancelled).unwrap();
        assert_eq!(json, serde_json::json!("cancelled"));
    }

    #[test]
    fn user_role_deserializes_lowercase() {
        let role: UserRole = serde_json::from_str("\"vendor\"").unwrap();
        assert_eq!(role, UserRole::Vendor);
        assert_eq!(UserRole::default(), UserRole::User);
    }

    #[test]
    fn booking_with_missing_vendor_serializes_null() {
        let now = Utc::now();
        let row = BookingWithVendor {
            booking: Booking {
                id: 7,
                user_id: 1,
                vendor_id: 99,
                event_date: NaiveDate::from_ymd_opt(2024, 6, 1).unwrap(),
                status: BookingStatus::Pending,
                notes: String::new(),
                created_at: now,
                updated_at: now,
            },
            vendor: None,
        };
        let json = serde_json::to_value(&row).unwrap();
        assert_eq!(json["id"], 7);
        assert_eq!(json["status"], "pending");
        assert!(json["vendor"].is_null());
    }
}
