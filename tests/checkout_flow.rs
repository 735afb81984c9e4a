mod common;

use std::sync::atomic::Ordering;

use chrono::{Duration, Utc};
use rust_decimal::Decimal;

use common::{card_form, MemoryStore, TestGateway};
use seatscape::error::AppError;
use seatscape::services::checkout::CheckoutService;
use seatscape::services::pricing::DEFAULT_TAX_RATE;
use seatscape::services::seats::generate_seats;

type Service = CheckoutService<MemoryStore, TestGateway>;

fn dec(units: i64) -> Decimal {
    Decimal::new(units, 0)
}

/// One row of `capacity` seats at 100.00 plus the two demo coupons.
async fn setup(capacity: i32) -> (Service, Vec<i64>) {
    let store = MemoryStore::new();
    let row = store.add_row("Row A", capacity, dec(100));
    generate_seats(&store, &row).await.unwrap();
    store.add_coupon("WELCOME10", 10, Utc::now() + Duration::days(30));
    store.add_coupon("OLD5", 5, Utc::now() - Duration::days(1));

    let tickets = store.tickets_of(row.id);
    let service = CheckoutService::new(store, TestGateway::default(), DEFAULT_TAX_RATE, "usd");
    (service, tickets)
}

#[tokio::test]
async fn generate_seats_creates_capacity_seats_once() {
    let store = MemoryStore::new();
    let row = store.add_row("Row B", 25, dec(45));

    assert_eq!(generate_seats(&store, &row).await.unwrap(), 25);
    assert_eq!(generate_seats(&store, &row).await.unwrap(), 0);

    let numbers: Vec<i32> = store.seats_of(row.id).iter().map(|s| s.number).collect();
    assert_eq!(numbers, (1..=25).collect::<Vec<_>>());
    assert!(store.seats_of(row.id).iter().all(|s| !s.is_booked));
    assert_eq!(store.tickets_of(row.id).len(), 25);
}

#[tokio::test]
async fn begin_prices_ticket_with_tax() {
    let (service, tickets) = setup(5).await;
    let (ticket, session) = service.begin(tickets[0], Utc::now()).await.unwrap();

    assert_eq!(ticket.seat_number, 1);
    assert_eq!(session.ticket_id, tickets[0]);
    assert_eq!(session.pricing.subtotal, dec(100));
    assert_eq!(session.pricing.tax_amount, dec(15));
    assert_eq!(session.pricing.discount_amount, Decimal::ZERO);
    assert_eq!(session.pricing.total_amount, dec(115));
}

#[tokio::test]
async fn begin_unknown_ticket_is_not_found() {
    let (service, _) = setup(1).await;
    let err = service.begin(9999, Utc::now()).await.unwrap_err();
    assert!(matches!(err, AppError::NotFound("Ticket")));
}

#[tokio::test]
async fn coupon_reprices_session() {
    let (service, tickets) = setup(1).await;
    let (_, mut session) = service.begin(tickets[0], Utc::now()).await.unwrap();

    let applied = service.apply_coupon(&mut session, " welcome10 ", Utc::now()).await.unwrap();

    assert!(applied.success);
    assert_eq!(applied.discount_percent, 10);
    assert_eq!(applied.discount_amount, dec(10));
    assert_eq!(applied.total_amount, dec(105));
    assert_eq!(session.pricing.total_amount, dec(105));
    assert_eq!(session.coupon_code.as_deref(), Some("WELCOME10"));
}

#[tokio::test]
async fn expired_or_unknown_coupon_leaves_session_alone() {
    let (service, tickets) = setup(1).await;
    let (_, mut session) = service.begin(tickets[0], Utc::now()).await.unwrap();
    let before = session.clone();

    let err = service.apply_coupon(&mut session, "OLD5", Utc::now()).await.unwrap_err();
    assert!(matches!(err, AppError::ExpiredCoupon));

    let err = service.apply_coupon(&mut session, "NOPE", Utc::now()).await.unwrap_err();
    assert!(matches!(err, AppError::InvalidCoupon));

    assert_eq!(session, before);
}

#[tokio::test]
async fn successful_checkout_books_seat_with_one_payment() {
    let (service, tickets) = setup(3).await;
    let ticket_id = tickets[1];
    let (_, mut session) = service.begin(ticket_id, Utc::now()).await.unwrap();
    service.apply_coupon(&mut session, "WELCOME10", Utc::now()).await.unwrap();

    let form = card_form(&session.token.to_string());
    let payment = service
        .complete(&session, ticket_id, &form, Some(42), Utc::now())
        .await
        .unwrap();

    assert_eq!(payment.amount, dec(105));
    assert_eq!(payment.status, "completed");
    assert_eq!(payment.payment_method, "credit_card");
    assert_eq!(payment.contact_email, "jane@example.com");

    let store = service.store();
    assert!(store.seat_booked(ticket_id));
    assert_eq!(store.payments_for_ticket(ticket_id), 1);
    assert_eq!(store.ticket(ticket_id).unwrap().user_id, Some(42));
    assert!(!store.seat_booked(tickets[0]));

    let confirmation = service.confirmation(payment.id).await.unwrap();
    assert_eq!(confirmation.payment.id, payment.id);
    assert_eq!(confirmation.tickets.len(), 1);
    assert_eq!(confirmation.tickets[0].seat_number, 2);
    assert_eq!(confirmation.tickets[0].row_name, "Row A");
}

#[tokio::test]
async fn anonymous_checkout_leaves_ticket_unowned() {
    let (service, tickets) = setup(1).await;
    let (_, session) = service.begin(tickets[0], Utc::now()).await.unwrap();
    let form = card_form(&session.token.to_string());

    service.complete(&session, tickets[0], &form, None, Utc::now()).await.unwrap();

    let ticket = service.store().ticket(tickets[0]).unwrap();
    assert_eq!(ticket.user_id, None);
    assert!(ticket.booked_at.is_some());
}

#[tokio::test]
async fn booked_seat_is_never_paid_twice() {
    let (service, tickets) = setup(1).await;
    let ticket_id = tickets[0];
    let (_, first) = service.begin(ticket_id, Utc::now()).await.unwrap();
    service
        .complete(&first, ticket_id, &card_form(&first.token.to_string()), None, Utc::now())
        .await
        .unwrap();

    let err = service.begin(ticket_id, Utc::now()).await.unwrap_err();
    assert!(matches!(err, AppError::AlreadyBooked));

    // A session opened before the booking cannot complete either
    let err = service
        .complete(&first, ticket_id, &card_form(&first.token.to_string()), None, Utc::now())
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::AlreadyBooked));

    assert_eq!(service.store().payments().len(), 1);
    assert_eq!(service.gateway().captures.load(Ordering::SeqCst), 1);
    assert_eq!(service.gateway().refunds.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn concurrent_checkouts_commit_at_most_once() {
    let (service, tickets) = setup(1).await;
    let ticket_id = tickets[0];
    let (_, a) = service.begin(ticket_id, Utc::now()).await.unwrap();
    let (_, b) = service.begin(ticket_id, Utc::now()).await.unwrap();
    let form_a = card_form(&a.token.to_string());
    let form_b = card_form(&b.token.to_string());

    let (ra, rb) = tokio::join!(
        service.complete(&a, ticket_id, &form_a, Some(1), Utc::now()),
        service.complete(&b, ticket_id, &form_b, Some(2), Utc::now()),
    );

    assert_eq!([ra.is_ok(), rb.is_ok()].iter().filter(|ok| **ok).count(), 1);
    assert!(matches!(ra.err().or(rb.err()), Some(AppError::AlreadyBooked)));
    assert_eq!(service.store().payments_for_ticket(ticket_id), 1);
    assert_eq!(service.gateway().captures.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn declined_capture_changes_nothing() {
    let (service, tickets) = setup(1).await;
    let ticket_id = tickets[0];
    let (_, session) = service.begin(ticket_id, Utc::now()).await.unwrap();
    service.gateway().decline.store(true, Ordering::SeqCst);

    let err = service
        .complete(&session, ticket_id, &card_form(&session.token.to_string()), Some(7), Utc::now())
        .await
        .unwrap_err();

    assert!(matches!(err, AppError::PaymentGateway(_)));
    assert!(!service.store().seat_booked(ticket_id));
    assert!(service.store().payments().is_empty());
    assert_eq!(service.store().ticket(ticket_id).unwrap().user_id, None);
    assert_eq!(service.gateway().refunds.load(Ordering::SeqCst), 0);

    // The seat is still available afterwards
    service.gateway().decline.store(false, Ordering::SeqCst);
    service
        .complete(&session, ticket_id, &card_form(&session.token.to_string()), Some(7), Utc::now())
        .await
        .unwrap();
    assert!(service.store().seat_booked(ticket_id));
}

#[tokio::test]
async fn persistence_failure_changes_nothing() {
    let (service, tickets) = setup(1).await;
    let ticket_id = tickets[0];
    let (_, session) = service.begin(ticket_id, Utc::now()).await.unwrap();
    service.store().fail_persist.store(true, Ordering::SeqCst);

    let err = service
        .complete(&session, ticket_id, &card_form(&session.token.to_string()), None, Utc::now())
        .await
        .unwrap_err();

    assert!(matches!(err, AppError::Database(_)));
    assert!(!service.store().seat_booked(ticket_id));
    assert!(service.store().payments().is_empty());
    // The card was charged before the write failed, so it is handed back
    assert_eq!(service.gateway().captures.load(Ordering::SeqCst), 1);
    assert_eq!(service.gateway().refunds.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn idempotency_key_follows_the_checkout_session() {
    let (service, tickets) = setup(2).await;
    let (_, first) = service.begin(tickets[0], Utc::now()).await.unwrap();
    let (_, second) = service.begin(tickets[1], Utc::now()).await.unwrap();
    service
        .complete(&first, tickets[0], &card_form(&first.token.to_string()), None, Utc::now())
        .await
        .unwrap();
    service
        .complete(&second, tickets[1], &card_form(&second.token.to_string()), None, Utc::now())
        .await
        .unwrap();

    let keys = service.gateway().idempotency_keys.lock().unwrap().clone();
    assert_eq!(keys, [
        format!("checkout-{}-credit_card", first.token),
        format!("checkout-{}-credit_card", second.token),
    ]);
}

#[tokio::test]
async fn invalid_form_is_rejected_before_booking() {
    let (service, tickets) = setup(1).await;
    let ticket_id = tickets[0];
    let (_, session) = service.begin(ticket_id, Utc::now()).await.unwrap();
    let mut form = card_form(&session.token.to_string());
    form.cvv = Some("12".into());
    form.terms_accepted = None;

    let err = service
        .complete(&session, ticket_id, &form, None, Utc::now())
        .await
        .unwrap_err();

    let AppError::Validation(errors) = err else {
        panic!("expected validation error, got {err:?}");
    };
    assert!(errors.0.contains_key("cvv"));
    assert!(errors.0.contains_key("terms_accepted"));
    assert!(!service.store().seat_booked(ticket_id));
    assert_eq!(service.gateway().captures.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn session_for_another_ticket_is_rejected() {
    let (service, tickets) = setup(2).await;
    let (_, session) = service.begin(tickets[0], Utc::now()).await.unwrap();

    let err = service
        .complete(&session, tickets[1], &card_form(&session.token.to_string()), None, Utc::now())
        .await
        .unwrap_err();

    assert!(matches!(err, AppError::Validation(_)));
    assert!(!service.store().seat_booked(tickets[1]));
}

#[tokio::test]
async fn unknown_payment_has_no_confirmation() {
    let (service, _) = setup(1).await;
    let err = service.confirmation(12345).await.unwrap_err();
    assert!(matches!(err, AppError::NotFound("Payment")));
}
