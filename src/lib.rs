// Library exports for DietLens
// This allows integration tests and external code to use DietLens modules

pub mod auth;
pub mod config;
pub mod detection;
pub mod error;
pub mod extractors;
pub mod nutrition;
pub mod pages;
pub mod recommend;
pub mod routes;
pub mod state;
pub mod storage;
