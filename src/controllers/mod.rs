pub mod auth;
pub mod checkout;
pub mod contact;
pub mod events;

use axum::Router;
use std::sync::Arc;

pub fn routes() -> Router<Arc<crate::AppState>> {
    Router::new()
        .merge(checkout::routes())
        .merge(auth::routes())
        .merge(contact::routes())
        .merge(events::routes())
}
