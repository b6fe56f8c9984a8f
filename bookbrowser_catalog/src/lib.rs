pub mod api;
pub mod book_specification;
pub mod conversion;
pub mod entity;

#[cfg(any(feature = "client", test))]
pub mod client;

#[cfg(any(feature = "server", test))]
pub mod app_config;
#[cfg(any(feature = "server", test))]
pub mod book_service;
#[cfg(any(feature = "server", test))]
pub mod books_repository;
#[cfg(any(feature = "server", test))]
mod handlers;
#[cfg(any(feature = "server", test))]
pub mod settings;
