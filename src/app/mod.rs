pub mod auth;
pub mod bans;
pub mod blocks;
pub mod engagement;
pub mod moderation;
pub mod posts;
pub mod privacy;
pub mod reports;
pub mod users;
pub mod visibility;
