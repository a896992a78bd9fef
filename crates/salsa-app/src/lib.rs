pub mod config;
pub mod controller;
pub mod dispatch;
pub mod error;
pub mod resync;
pub mod runner;
