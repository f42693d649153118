pub mod activate;
pub mod boot;
pub mod classify;
pub mod compat;
pub mod config;
pub mod console;
pub mod deps;
pub mod kernel;
pub mod outcome;
pub mod pipeline;
pub mod profile;
pub mod repo;
pub mod runner;
pub mod service;
pub mod state;
pub mod system;
pub mod token;
