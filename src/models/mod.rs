pub mod contact;
pub mod coupon;
pub mod event;
pub mod payment;
pub mod seat;
pub mod user;

pub use contact::ContactMessage;
pub use coupon::Coupon;
pub use event::{Category, Event};
pub use payment::{BookedTicket, BookingConfirmation, Payment, PaymentStatus};
pub use seat::{SeatRow, TicketDetails};
pub use user::User;
