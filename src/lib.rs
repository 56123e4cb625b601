// Library for tests to access modules

pub mod agent_loop;
pub mod command;
pub mod config;
pub mod control_client;
pub mod counters;
pub mod latency;
pub mod models;
pub mod mutator;
pub mod rates;
pub mod routes;
pub mod task_queue;
pub mod version;
