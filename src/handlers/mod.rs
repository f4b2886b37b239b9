//! API handlers, grouped per resource

pub mod card;
pub mod chat;
pub mod notification;
pub mod proposal;
pub mod review;
pub mod transaction;
pub mod user;
pub mod wishlist;
