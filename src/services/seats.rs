use tracing::info;

use crate::{
    error::{AppError, AppResult},
    models::SeatRow,
    store::BookingStore,
};

/// Seat numbers for a row of the given capacity: 1..=capacity.
pub fn seat_numbers(capacity: i32) -> AppResult<Vec<i32>> {
    if capacity <= 0 {
        return Err(AppError::validation("capacity", "Capacity must be a positive number."));
    }
    Ok((1..=capacity).collect())
}

/// Materializes the seats (and their placeholder tickets) of a freshly
/// created row. Does nothing when the row already has seats. Returns how many
/// seats were created.
pub async fn generate_seats<S: BookingStore>(store: &S, row: &SeatRow) -> AppResult<u32> {
    let numbers = seat_numbers(row.capacity)?;

    if store.count_seats(row.id).await? > 0 {
        info!("row {} ({}) already has seats, skipping generation", row.id, row.name);
        return Ok(0);
    }

    let created = store.insert_seats(row, &numbers).await?;
    info!("generated {} seats for row {} ({})", created, row.id, row.name);
    Ok(created)
}
