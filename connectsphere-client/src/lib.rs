// Client core for ConnectSphere
#[macro_use]
pub mod logging;

pub mod api;
pub mod auth;
pub mod avatars;
pub mod comments;
pub mod config;
pub mod display_mode;
pub mod error;
pub mod notice;
pub mod session;
pub mod store;
pub mod thread;
pub mod validation;
pub mod view;
