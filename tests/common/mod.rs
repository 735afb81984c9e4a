#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::future::Future;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;

use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;

use seatscape::error::{AppError, AppResult};
use seatscape::forms::CheckoutForm;
use seatscape::models::{
    BookedTicket, BookingConfirmation, Coupon, Payment, PaymentStatus, SeatRow, TicketDetails,
};
use seatscape::services::payment::{CaptureRequest, PaymentGateway};
use seatscape::store::{BookingOrder, BookingStore, CaptureReceipt};

pub const EVENT_ID: i64 = 1;

#[derive(Debug, Clone)]
pub struct SeatState {
    pub row_id: i64,
    pub number: i32,
    pub is_booked: bool,
}

#[derive(Debug, Clone)]
pub struct TicketState {
    pub seat_id: i64,
    pub user_id: Option<i64>,
    pub price: Decimal,
    pub booked_at: Option<DateTime<Utc>>,
}

#[derive(Default)]
struct Inner {
    next_id: i64,
    rows: HashMap<i64, SeatRow>,
    seats: HashMap<i64, SeatState>,
    tickets: HashMap<i64, TicketState>,
    coupons: Vec<Coupon>,
    payments: Vec<Payment>,
    payment_tickets: Vec<(i64, i64)>,
    /// Seats claimed by an in-flight booking (the row lock of the real store).
    claimed: HashSet<i64>,
}

impl Inner {
    fn id(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }
}

/// In-memory `BookingStore` with the same all-or-nothing booking semantics as
/// the Postgres one.
#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
    /// Makes the write after capture fail, as a lost connection would.
    pub fail_persist: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_row(&self, name: &str, capacity: i32, price: Decimal) -> SeatRow {
        let mut inner = self.inner.lock().unwrap();
        let row = SeatRow {
            id: inner.id(),
            event_id: EVENT_ID,
            name: name.to_string(),
            capacity,
            price,
            svg_id: None,
        };
        inner.rows.insert(row.id, row.clone());
        row
    }

    pub fn add_coupon(&self, code: &str, percent: i32, valid_until: DateTime<Utc>) {
        let mut inner = self.inner.lock().unwrap();
        let id = inner.id();
        inner.coupons.push(Coupon {
            id,
            code: code.to_string(),
            discount_percent: percent,
            valid_until,
        });
    }

    pub fn seats_of(&self, row_id: i64) -> Vec<SeatState> {
        let inner = self.inner.lock().unwrap();
        let mut seats: Vec<_> = inner.seats.values().filter(|s| s.row_id == row_id).cloned().collect();
        seats.sort_by_key(|s| s.number);
        seats
    }

    /// Ticket ids of a row, ordered by seat number.
    pub fn tickets_of(&self, row_id: i64) -> Vec<i64> {
        let inner = self.inner.lock().unwrap();
        let mut tickets: Vec<(i32, i64)> = inner
            .tickets
            .iter()
            .filter_map(|(id, t)| {
                let seat = inner.seats.get(&t.seat_id)?;
                (seat.row_id == row_id).then_some((seat.number, *id))
            })
            .collect();
        tickets.sort();
        tickets.into_iter().map(|(_, id)| id).collect()
    }

    pub fn ticket(&self, ticket_id: i64) -> Option<TicketState> {
        self.inner.lock().unwrap().tickets.get(&ticket_id).cloned()
    }

    pub fn seat_booked(&self, ticket_id: i64) -> bool {
        let inner = self.inner.lock().unwrap();
        inner
            .tickets
            .get(&ticket_id)
            .and_then(|t| inner.seats.get(&t.seat_id))
            .is_some_and(|s| s.is_booked)
    }

    pub fn payments(&self) -> Vec<Payment> {
        self.inner.lock().unwrap().payments.clone()
    }

    pub fn payments_for_ticket(&self, ticket_id: i64) -> usize {
        let inner = self.inner.lock().unwrap();
        inner.payment_tickets.iter().filter(|(_, t)| *t == ticket_id).count()
    }
}

impl BookingStore for MemoryStore {
    async fn ticket_details(&self, ticket_id: i64) -> AppResult<Option<TicketDetails>> {
        let inner = self.inner.lock().unwrap();
        let Some(ticket) = inner.tickets.get(&ticket_id) else {
            return Ok(None);
        };
        let seat = &inner.seats[&ticket.seat_id];
        let row = &inner.rows[&seat.row_id];
        Ok(Some(TicketDetails {
            ticket_id,
            price: ticket.price,
            seat_id: ticket.seat_id,
            seat_number: seat.number,
            is_booked: seat.is_booked,
            row_id: row.id,
            row_name: row.name.clone(),
            event_id: row.event_id,
            event_name: "Concert at Central Park".to_string(),
            event_date: Utc::now() + Duration::days(30),
            event_location: "Central Park Amphitheater".to_string(),
        }))
    }

    async fn coupon_by_code(&self, code: &str) -> AppResult<Option<Coupon>> {
        let inner = self.inner.lock().unwrap();
        Ok(inner.coupons.iter().find(|c| c.code == code).cloned())
    }

    async fn count_seats(&self, row_id: i64) -> AppResult<i64> {
        let inner = self.inner.lock().unwrap();
        Ok(inner.seats.values().filter(|s| s.row_id == row_id).count() as i64)
    }

    async fn insert_seats(&self, row: &SeatRow, numbers: &[i32]) -> AppResult<u32> {
        let mut inner = self.inner.lock().unwrap();
        for &number in numbers {
            let seat_id = inner.id();
            inner.seats.insert(
                seat_id,
                SeatState {
                    row_id: row.id,
                    number,
                    is_booked: false,
                },
            );
            let ticket_id = inner.id();
            inner.tickets.insert(
                ticket_id,
                TicketState {
                    seat_id,
                    user_id: None,
                    price: row.price,
                    booked_at: None,
                },
            );
        }
        Ok(numbers.len() as u32)
    }

    async fn book_ticket<F, Fut>(&self, order: BookingOrder, capture: F) -> AppResult<Payment>
    where
        F: FnOnce() -> Fut + Send,
        Fut: Future<Output = AppResult<CaptureReceipt>> + Send,
    {
        {
            let mut inner = self.inner.lock().unwrap();
            let booked = inner.seats.get(&order.seat_id).map_or(true, |s| s.is_booked);
            if booked || !inner.claimed.insert(order.seat_id) {
                return Err(AppError::AlreadyBooked);
            }
        }

        let receipt = capture().await;
        let mut inner = self.inner.lock().unwrap();
        inner.claimed.remove(&order.seat_id);
        let receipt = receipt?;

        if self.fail_persist.load(Ordering::SeqCst) {
            return Err(AppError::Database(sqlx::Error::PoolTimedOut));
        }

        if let Some(seat) = inner.seats.get_mut(&order.seat_id) {
            seat.is_booked = true;
        }
        if let Some(ticket) = inner.tickets.get_mut(&order.ticket_id) {
            ticket.user_id = order.user_id.or(ticket.user_id);
            ticket.booked_at = Some(order.booked_at);
        }

        let payment = Payment {
            id: inner.id(),
            user_id: order.user_id,
            amount: order.amount,
            payment_date: order.booked_at,
            status: PaymentStatus::Completed.as_str().to_string(),
            payment_method: order.payment_method,
            stripe_payment_id: receipt.external_ref,
            contact_name: order.contact.full_name,
            contact_email: order.contact.email,
            contact_phone: order.contact.phone,
        };
        inner.payments.push(payment.clone());
        inner.payment_tickets.push((payment.id, order.ticket_id));
        Ok(payment)
    }

    async fn booking_confirmation(&self, payment_id: i64) -> AppResult<Option<BookingConfirmation>> {
        let ticket_ids: Vec<i64> = {
            let inner = self.inner.lock().unwrap();
            if !inner.payments.iter().any(|p| p.id == payment_id) {
                return Ok(None);
            }
            inner
                .payment_tickets
                .iter()
                .filter(|(p, _)| *p == payment_id)
                .map(|(_, t)| *t)
                .collect()
        };

        let mut tickets = Vec::new();
        for ticket_id in ticket_ids {
            if let Some(d) = self.ticket_details(ticket_id).await? {
                tickets.push(BookedTicket {
                    ticket_id,
                    price: d.price,
                    seat_number: d.seat_number,
                    row_name: d.row_name,
                    event_id: d.event_id,
                    event_name: d.event_name,
                    event_date: d.event_date,
                    event_location: d.event_location,
                });
            }
        }

        let inner = self.inner.lock().unwrap();
        let payment = inner.payments.iter().find(|p| p.id == payment_id).cloned();
        Ok(payment.map(|payment| BookingConfirmation { payment, tickets }))
    }
}

/// Local-style gateway that counts captures and refunds, or declines
/// captures when told to.
#[derive(Default)]
pub struct TestGateway {
    pub captures: AtomicUsize,
    pub refunds: AtomicUsize,
    pub decline: AtomicBool,
    pub idempotency_keys: Mutex<Vec<String>>,
}

impl PaymentGateway for TestGateway {
    async fn capture(&self, request: CaptureRequest) -> AppResult<CaptureReceipt> {
        // Yield so concurrent checkouts interleave around the claim
        tokio::task::yield_now().await;
        if self.decline.load(Ordering::SeqCst) {
            return Err(AppError::PaymentGateway("Your card was declined.".to_string()));
        }
        self.idempotency_keys.lock().unwrap().push(request.idempotency_key.clone());
        self.captures.fetch_add(1, Ordering::SeqCst);
        Ok(CaptureReceipt {
            external_ref: Some(format!("test_{}", request.ticket_id)),
        })
    }

    async fn refund(&self, receipt: &CaptureReceipt, request: &CaptureRequest) -> AppResult<()> {
        assert_eq!(receipt.external_ref, Some(format!("test_{}", request.ticket_id)));
        self.refunds.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

pub fn card_form(token: &str) -> CheckoutForm {
    CheckoutForm {
        checkout_token: token.to_string(),
        full_name: "Jane Doe".into(),
        email: "jane@example.com".into(),
        phone: "+123456789012".into(),
        payment_method: "credit_card".into(),
        card_number: Some("4242 4242 4242 4242".into()),
        card_holder_name: Some("Jane Doe".into()),
        expiry_date: Some("12/30".into()),
        cvv: Some("123".into()),
        terms_accepted: Some("on".into()),
        stripe_payment_method: None,
    }
}
