//! Event listing and event detail (seat map) reads.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};

use crate::models::{Category, Event, SeatRow};

pub const DEFAULT_PAGE_SIZE: u32 = 12;
pub const MAX_PAGE_SIZE: u32 = 50;
const ROW_SPACING: i64 = 120;
const ROW_LABEL_OFFSET: i64 = 50;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct EventQuery {
    pub q: Option<String>,
    pub city: Option<String>,
    pub date: Option<String>,
    pub category: Option<String>,
    pub sort: Option<String>,
    pub page: Option<u32>,
    pub page_size: Option<u32>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SortOrder {
    #[default]
    DateAsc,
    DateDesc,
    NameAsc,
    NameDesc,
}

impl SortOrder {
    pub fn parse(value: &str) -> Self {
        match value {
            "-date" => SortOrder::DateDesc,
            "name" => SortOrder::NameAsc,
            "-name" => SortOrder::NameDesc,
            _ => SortOrder::DateAsc,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SortOrder::DateAsc => "date",
            SortOrder::DateDesc => "-date",
            SortOrder::NameAsc => "name",
            SortOrder::NameDesc => "-name",
        }
    }

    fn order_by(&self) -> &'static str {
        match self {
            SortOrder::DateAsc => "e.date ASC, e.id ASC",
            SortOrder::DateDesc => "e.date DESC, e.id DESC",
            SortOrder::NameAsc => "e.name ASC, e.id ASC",
            SortOrder::NameDesc => "e.name DESC, e.id DESC",
        }
    }
}

/// Normalized listing filter. Blank strings become `None`, unparseable dates
/// are dropped and paging is clamped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventFilter {
    pub q: Option<String>,
    pub city: Option<String>,
    pub date: Option<NaiveDate>,
    pub category: Option<String>,
    pub sort: SortOrder,
    pub page: u32,
    pub page_size: u32,
}

fn non_blank(value: &Option<String>) -> Option<String> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

impl EventFilter {
    pub fn from_query(query: &EventQuery) -> Self {
        Self {
            q: non_blank(&query.q),
            city: non_blank(&query.city),
            date: query
                .date
                .as_deref()
                .and_then(|d| NaiveDate::parse_from_str(d.trim(), "%Y-%m-%d").ok()),
            category: non_blank(&query.category),
            sort: query.sort.as_deref().map(SortOrder::parse).unwrap_or_default(),
            page: query.page.unwrap_or(1).max(1),
            page_size: query.page_size.unwrap_or(DEFAULT_PAGE_SIZE).clamp(1, MAX_PAGE_SIZE),
        }
    }

    pub fn cache_key(&self) -> String {
        format!(
            "events:q={}&city={}&date={}&category={}&sort={}&p={}&ps={}",
            self.q.as_deref().unwrap_or_default().to_lowercase(),
            self.city.as_deref().unwrap_or_default().to_lowercase(),
            self.date.map(|d| d.to_string()).unwrap_or_default(),
            self.category.as_deref().unwrap_or_default().to_lowercase(),
            self.sort.as_str(),
            self.page,
            self.page_size,
        )
    }

    fn limit(&self) -> i64 {
        i64::from(self.page_size)
    }

    fn offset(&self) -> i64 {
        i64::from(self.page - 1) * i64::from(self.page_size)
    }
}

/// `ILIKE` pattern matching `term` anywhere, with wildcards in the term
/// escaped.
fn contains_pattern(term: &str) -> String {
    let escaped: String = term
        .chars()
        .flat_map(|c| match c {
            '%' | '_' | '\\' => vec!['\\', c],
            _ => vec![c],
        })
        .collect();
    format!("%{escaped}%")
}

const LISTING_WHERE: &str = r#"
    WHERE ($1::text IS NULL OR e.name ILIKE $1 OR e.description ILIKE $1 OR e.location ILIKE $1)
      AND ($2::text IS NULL OR e.location ILIKE $2)
      AND ($3::date IS NULL OR (e.date AT TIME ZONE 'UTC')::date = $3)
      AND ($4::text IS NULL OR EXISTS (
            SELECT 1 FROM event_categories ec
            JOIN categories c ON c.id = ec.category_id
            WHERE ec.event_id = e.id AND (c.slug = $4 OR lower(c.name) = lower($4))
      ))
"#;

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct EventSummary {
    pub id: i64,
    pub name: String,
    pub date: DateTime<Utc>,
    pub location: String,
    pub description: Option<String>,
    pub image_url: Option<String>,
    #[serde(with = "rust_decimal::serde::float_option")]
    pub min_price: Option<Decimal>,
    pub available_seats: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventPage {
    pub events: Vec<EventSummary>,
    pub total: i64,
    pub page: u32,
    pub page_size: u32,
    pub total_pages: u32,
}

#[derive(Debug, Clone, FromRow)]
pub struct RowStats {
    #[sqlx(flatten)]
    pub row: SeatRow,
    pub available_seats: i64,
    pub booked_seats: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct RowLayout {
    #[serde(flatten)]
    pub row: SeatRow,
    pub available_seats: i64,
    pub booked_seats: i64,
    pub x_position: i64,
    pub text_x_position: i64,
}

/// Lays rows out left to right in the order given.
pub fn layout_rows(rows: Vec<RowStats>) -> Vec<RowLayout> {
    rows.into_iter()
        .zip(0i64..)
        .map(|(stats, i)| RowLayout {
            row: stats.row,
            available_seats: stats.available_seats,
            booked_seats: stats.booked_seats,
            x_position: i * ROW_SPACING,
            text_x_position: i * ROW_SPACING + ROW_LABEL_OFFSET,
        })
        .collect()
}

#[derive(Debug, Clone, FromRow, Serialize)]
pub struct SeatView {
    pub seat_id: i64,
    pub row_id: i64,
    pub row_name: String,
    pub number: i32,
    pub is_booked: bool,
    pub ticket_id: Option<i64>,
    #[serde(with = "rust_decimal::serde::float_option")]
    pub price: Option<Decimal>,
}

#[derive(Debug, Clone, Serialize)]
pub struct EventDetail {
    pub event: Event,
    pub categories: Vec<Category>,
    pub rows: Vec<RowLayout>,
    pub seats: Vec<SeatView>,
}

#[derive(Clone)]
pub struct EventCatalog {
    pool: PgPool,
}

impl EventCatalog {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn list_events(&self, filter: &EventFilter) -> Result<EventPage, sqlx::Error> {
        let q = filter.q.as_deref().map(contains_pattern);
        let city = filter.city.as_deref().map(contains_pattern);

        let total: i64 = sqlx::query_scalar(&format!("SELECT COUNT(*) FROM events e {LISTING_WHERE}"))
            .bind(&q)
            .bind(&city)
            .bind(filter.date)
            .bind(&filter.category)
            .fetch_one(&self.pool)
            .await?;

        let sql = format!(
            r#"
            SELECT e.id, e.name, e.date, e.location, e.description, e.image_url,
                   (SELECT MIN(r.price) FROM seat_rows r WHERE r.event_id = e.id) AS min_price,
                   (SELECT COUNT(*) FROM seats s JOIN seat_rows r ON r.id = s.row_id
                     WHERE r.event_id = e.id AND NOT s.is_booked) AS available_seats
            FROM events e
            {LISTING_WHERE}
            ORDER BY {}
            LIMIT $5 OFFSET $6
            "#,
            filter.sort.order_by()
        );
        let events = sqlx::query_as::<_, EventSummary>(&sql)
            .bind(&q)
            .bind(&city)
            .bind(filter.date)
            .bind(&filter.category)
            .bind(filter.limit())
            .bind(filter.offset())
            .fetch_all(&self.pool)
            .await?;

        let page_size = i64::from(filter.page_size);
        let total_pages = u32::try_from((total + page_size - 1) / page_size).unwrap_or(u32::MAX);

        Ok(EventPage {
            events,
            total,
            page: filter.page,
            page_size: filter.page_size,
            total_pages,
        })
    }

    pub async fn event_detail(&self, event_id: i64) -> Result<Option<EventDetail>, sqlx::Error> {
        let Some(event) = sqlx::query_as::<_, Event>("SELECT * FROM events WHERE id = $1")
            .bind(event_id)
            .fetch_optional(&self.pool)
            .await?
        else {
            return Ok(None);
        };

        let categories = sqlx::query_as::<_, Category>(
            r#"
            SELECT c.id, c.name, c.slug
            FROM categories c
            JOIN event_categories ec ON ec.category_id = c.id
            WHERE ec.event_id = $1
            ORDER BY c.name
            "#,
        )
        .bind(event_id)
        .fetch_all(&self.pool)
        .await?;

        let rows = sqlx::query_as::<_, RowStats>(
            r#"
            SELECT r.id, r.event_id, r.name, r.capacity, r.price, r.svg_id,
                   COUNT(s.id) FILTER (WHERE NOT s.is_booked) AS available_seats,
                   COUNT(s.id) FILTER (WHERE s.is_booked) AS booked_seats
            FROM seat_rows r
            LEFT JOIN seats s ON s.row_id = r.id
            WHERE r.event_id = $1
            GROUP BY r.id
            ORDER BY r.name
            "#,
        )
        .bind(event_id)
        .fetch_all(&self.pool)
        .await?;

        let seats = sqlx::query_as::<_, SeatView>(
            r#"
            SELECT s.id AS seat_id, s.row_id, r.name AS row_name, s.number, s.is_booked,
                   t.id AS ticket_id, t.price
            FROM seats s
            JOIN seat_rows r ON r.id = s.row_id
            LEFT JOIN tickets t ON t.seat_id = s.id
            WHERE r.event_id = $1
            ORDER BY r.name, s.number
            "#,
        )
        .bind(event_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(Some(EventDetail {
            event,
            categories,
            rows: layout_rows(rows),
            seats,
        }))
    }
}
