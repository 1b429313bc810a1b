//! Route modules. Each exposes a `router()` merged by
//! [`build_app_router`](crate::router::build_app_router).

pub mod health;
pub mod images;
pub mod logos;
