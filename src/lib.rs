pub mod api;
pub mod backend;
pub mod common;
pub mod entities;
pub mod models;
pub mod repositories;
pub mod settings;
pub mod sync;
pub mod usecases;
pub mod workers;
