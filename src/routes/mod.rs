//! Route definitions for the API

mod card;
mod chat;
mod notification;
mod proposal;
mod review;
mod transaction;
mod user;
mod wishlist;

pub use card::card_routes;
pub use chat::chat_routes;
pub use notification::notification_routes;
pub use proposal::proposal_routes;
pub use review::review_routes;
pub use transaction::transaction_routes;
pub use user::user_routes;
pub use wishlist::wishlist_routes;
