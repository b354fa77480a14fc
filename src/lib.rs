pub mod cli;
pub mod config;
pub mod engine;
pub mod error;
pub mod matcher;
pub mod model;
pub mod notify;
pub mod ocr;
pub mod outline;
pub mod pipeline;
pub mod policy;
pub mod probe;
pub mod region;
pub mod render;
pub mod report;
pub mod store;
pub mod util;
