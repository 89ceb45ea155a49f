pub mod agent;
pub mod auth;
pub mod dispatch;
pub mod error;
pub mod literal;
pub mod live_agents;
pub mod pool;
pub mod postprocess;
pub mod report;
pub mod telemetry;
