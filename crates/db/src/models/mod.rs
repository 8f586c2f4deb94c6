pub mod dashboard;
pub mod highlight;
pub mod member;
pub mod notification;
pub mod publication;
pub mod push_subscription;
