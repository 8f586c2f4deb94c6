//! Application services for The Last Update.
//!
//! - [`auth`] - password hashing and cookie session tokens
//! - [`push`] - web-push fan-out to browser subscriptions
//! - [`sitemap`] - debounced sitemap.xml regeneration
//! - [`media`] - uploaded image storage
//! - [`youtube`] - cached proxy for the public YouTube feed
//! - [`app`] - the shared application state container

pub mod app;
pub mod auth;
pub mod media;
pub mod push;
pub mod sitemap;
pub mod youtube;
