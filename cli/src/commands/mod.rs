pub mod chat;
pub mod health;
pub mod live_agent;
pub mod pool;
pub mod report;
