pub mod app;
pub mod auth;
pub mod certificate;
pub mod error;
pub mod handlers;
pub mod ident;
pub mod mailer;
pub mod marks;
pub mod models;
pub mod orm;
pub mod router;
pub mod settings;
pub mod state;
pub mod storage;
pub mod template;

inventory::collect!(crate::orm::Migration);
