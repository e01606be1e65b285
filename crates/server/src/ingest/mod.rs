pub mod log_ingester;
pub mod refresh;

pub use log_ingester::LogIngester;
