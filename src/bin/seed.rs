//! Loads demo data: a test user, one event with five priced rows and two
//! coupons. Safe to run repeatedly.

use chrono::{Duration, Utc};
use rust_decimal::Decimal;
use tracing::info;

use seatscape::{
    config::DatabaseConfig,
    database::Database,
    models::SeatRow,
    services::{auth::hash_password, seats::generate_seats},
};

const ROWS: [(&str, i32, i64); 5] = [
    ("Row A", 20, 50),
    ("Row B", 25, 45),
    ("Row C", 30, 40),
    ("Row D", 25, 35),
    ("Row E", 20, 30),
];

const COUPONS: [(&str, i32); 2] = [("WELCOME10", 10), ("SUMMER20", 20)];

async fn seed_user(db: &Database) -> anyhow::Result<()> {
    let hash = hash_password("testpass123")?;
    let created = sqlx::query(
        r#"
        INSERT INTO users (username, email, password_hash)
        VALUES ('testuser', 'test@example.com', $1)
        ON CONFLICT (username) DO NOTHING
        "#,
    )
    .bind(hash)
    .execute(&db.pool)
    .await?
    .rows_affected();

    if created > 0 {
        info!("Created test user: testuser / testpass123");
    }
    Ok(())
}

async fn seed_event(db: &Database) -> anyhow::Result<i64> {
    let existing: Option<i64> = sqlx::query_scalar("SELECT id FROM events WHERE name = $1")
        .bind("Concert at Central Park")
        .fetch_optional(&db.pool)
        .await?;
    if let Some(id) = existing {
        return Ok(id);
    }

    let id: i64 = sqlx::query_scalar(
        r#"
        INSERT INTO events (name, date, location, description)
        VALUES ($1, $2, $3, $4)
        RETURNING id
        "#,
    )
    .bind("Concert at Central Park")
    .bind(Utc::now() + Duration::days(30))
    .bind("Central Park Amphitheater")
    .bind("An amazing outdoor concert featuring top artists.")
    .fetch_one(&db.pool)
    .await?;

    info!("Created event {}", id);
    Ok(id)
}

async fn seed_rows(db: &Database, event_id: i64) -> anyhow::Result<()> {
    for (name, capacity, price) in ROWS {
        let row = match sqlx::query_as::<_, SeatRow>("SELECT * FROM seat_rows WHERE event_id = $1 AND name = $2")
            .bind(event_id)
            .bind(name)
            .fetch_optional(&db.pool)
            .await?
        {
            Some(row) => row,
            None => {
                sqlx::query_as::<_, SeatRow>(
                    r#"
                    INSERT INTO seat_rows (event_id, name, capacity, price)
                    VALUES ($1, $2, $3, $4)
                    RETURNING *
                    "#,
                )
                .bind(event_id)
                .bind(name)
                .bind(capacity)
                .bind(Decimal::new(price, 0))
                .fetch_one(&db.pool)
                .await?
            }
        };

        let created = generate_seats(db, &row).await?;
        info!("{}: {} seats created", row.name, created);
    }
    Ok(())
}

async fn seed_coupons(db: &Database) -> anyhow::Result<()> {
    let valid_until = Utc::now() + Duration::days(365);
    for (code, percent) in COUPONS {
        sqlx::query(
            r#"
            INSERT INTO coupons (code, discount_percent, valid_until)
            VALUES ($1, $2, $3)
            ON CONFLICT (code) DO NOTHING
            "#,
        )
        .bind(code)
        .bind(percent)
        .bind(valid_until)
        .execute(&db.pool)
        .await?;
    }
    info!("Coupons ready: WELCOME10, SUMMER20");
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt().with_env_filter("info").init();

    let database = DatabaseConfig::from_env()?;
    let db = Database::connect(&database).await?;
    db.run_migrations().await?;

    seed_user(&db).await?;
    let event_id = seed_event(&db).await?;
    seed_rows(&db, event_id).await?;
    seed_coupons(&db).await?;

    info!("Sample data created");
    Ok(())
}
