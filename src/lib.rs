pub mod cec;
pub mod metrics;
pub mod server;
pub mod tv;
pub mod wol;
