// Library for tests to access modules

pub mod config;
pub mod delta;
pub mod error;
pub mod models;
pub mod poller;
pub mod publisher;
pub mod routes;
pub mod sampler;
pub mod worker;
