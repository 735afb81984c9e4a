use std::future::Future;

use tracing::{debug, warn};

use super::{BookingOrder, BookingStore, CaptureReceipt};
use crate::{
    database::Database,
    error::{AppError, AppResult},
    models::{BookedTicket, BookingConfirmation, Coupon, Payment, PaymentStatus, SeatRow, TicketDetails},
};

impl BookingStore for Database {
    async fn ticket_details(&self, ticket_id: i64) -> AppResult<Option<TicketDetails>> {
        let details = sqlx::query_as::<_, TicketDetails>(
            r#"
            SELECT t.id AS ticket_id, t.price,
                   s.id AS seat_id, s.number AS seat_number, s.is_booked,
                   r.id AS row_id, r.name AS row_name,
                   e.id AS event_id, e.name AS event_name,
                   e.date AS event_date, e.location AS event_location
            FROM tickets t
            JOIN seats s ON s.id = t.seat_id
            JOIN seat_rows r ON r.id = s.row_id
            JOIN events e ON e.id = r.event_id
            WHERE t.id = $1
            "#,
        )
        .bind(ticket_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(details)
    }

    async fn coupon_by_code(&self, code: &str) -> AppResult<Option<Coupon>> {
        let coupon = sqlx::query_as::<_, Coupon>(
            "SELECT id, code, discount_percent, valid_until FROM coupons WHERE code = $1",
        )
        .bind(code)
        .fetch_optional(&self.pool)
        .await?;
        Ok(coupon)
    }

    async fn count_seats(&self, row_id: i64) -> AppResult<i64> {
        let count = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM seats WHERE row_id = $1")
            .bind(row_id)
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    async fn insert_seats(&self, row: &SeatRow, numbers: &[i32]) -> AppResult<u32> {
        // One statement: seats and their tickets appear together
        let result = sqlx::query(
            r#"
            WITH new_seats AS (
                INSERT INTO seats (row_id, number)
                SELECT $1, n FROM UNNEST($2::int4[]) AS n
                RETURNING id
            )
            INSERT INTO tickets (seat_id, price)
            SELECT id, $3 FROM new_seats
            "#,
        )
        .bind(row.id)
        .bind(numbers)
        .bind(row.price)
        .execute(&self.pool)
        .await?;

        u32::try_from(result.rows_affected())
            .map_err(|_| AppError::Internal("seat count overflow".to_string()))
    }

    async fn book_ticket<F, Fut>(&self, order: BookingOrder, capture: F) -> AppResult<Payment>
    where
        F: FnOnce() -> Fut + Send,
        Fut: Future<Output = AppResult<CaptureReceipt>> + Send,
    {
        let mut tx = self.pool.begin().await?;

        // 1) Claim the seat. Zero rows means somebody else already has it.
        let claimed = sqlx::query("UPDATE seats SET is_booked = TRUE WHERE id = $1 AND is_booked = FALSE")
            .bind(order.seat_id)
            .execute(&mut *tx)
            .await?
            .rows_affected();

        if claimed == 0 {
            let _ = tx.rollback().await;
            return Err(AppError::AlreadyBooked);
        }

        // 2) Capture while the claim is held, so a losing racer is never charged
        let receipt = match capture().await {
            Ok(receipt) => receipt,
            Err(e) => {
                warn!("capture failed for ticket {}: {}", order.ticket_id, e);
                let _ = tx.rollback().await;
                return Err(e);
            }
        };

        // 3) Attach the ticket
        sqlx::query(
            "UPDATE tickets SET user_id = COALESCE($2, user_id), booked_at = $3 WHERE id = $1",
        )
        .bind(order.ticket_id)
        .bind(order.user_id)
        .bind(order.booked_at)
        .execute(&mut *tx)
        .await?;

        // 4) Payment record
        let payment = sqlx::query_as::<_, Payment>(
            r#"
            INSERT INTO payments (
                user_id, amount, payment_date, status, payment_method, stripe_payment_id,
                contact_name, contact_email, contact_phone
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            RETURNING id, user_id, amount, payment_date, status, payment_method,
                      stripe_payment_id, contact_name, contact_email, contact_phone
            "#,
        )
        .bind(order.user_id)
        .bind(order.amount)
        .bind(order.booked_at)
        .bind(PaymentStatus::Completed.as_str())
        .bind(&order.payment_method)
        .bind(&receipt.external_ref)
        .bind(&order.contact.full_name)
        .bind(&order.contact.email)
        .bind(&order.contact.phone)
        .fetch_one(&mut *tx)
        .await?;

        sqlx::query("INSERT INTO payment_tickets (payment_id, ticket_id) VALUES ($1, $2)")
            .bind(payment.id)
            .bind(order.ticket_id)
            .execute(&mut *tx)
            .await?;

        // 5) Commit
        tx.commit().await?;
        debug!("ticket {} booked under payment {}", order.ticket_id, payment.id);

        Ok(payment)
    }

    async fn booking_confirmation(&self, payment_id: i64) -> AppResult<Option<BookingConfirmation>> {
        let payment = sqlx::query_as::<_, Payment>(
            r#"
            SELECT id, user_id, amount, payment_date, status, payment_method,
                   stripe_payment_id, contact_name, contact_email, contact_phone
            FROM payments
            WHERE id = $1
            "#,
        )
        .bind(payment_id)
        .fetch_optional(&self.pool)
        .await?;

        let Some(payment) = payment else {
            return Ok(None);
        };

        let tickets = sqlx::query_as::<_, BookedTicket>(
            r#"
            SELECT t.id AS ticket_id, t.price,
                   s.number AS seat_number, r.name AS row_name,
                   e.id AS event_id, e.name AS event_name,
                   e.date AS event_date, e.location AS event_location
            FROM payment_tickets pt
            JOIN tickets t ON t.id = pt.ticket_id
            JOIN seats s ON s.id = t.seat_id
            JOIN seat_rows r ON r.id = s.row_id
            JOIN events e ON e.id = r.event_id
            WHERE pt.payment_id = $1
            ORDER BY r.name, s.number
            "#,
        )
        .bind(payment_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(Some(BookingConfirmation { payment, tickets }))
    }
}
