pub mod accounting;
pub mod backend;
pub mod budget;
pub mod compare;
pub mod config;
pub mod error;
pub mod executor;
pub mod feed;
pub mod reconcile;
pub mod run;
