pub mod catalog;
pub mod config;
pub mod editor;
pub mod gateway;
pub mod migrate;
pub mod reconcile;
pub mod record;
pub mod runtime;
pub mod store;
pub mod title;
pub mod wordcount;
