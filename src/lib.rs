pub mod aggregate;
pub mod cli;
pub mod config;
pub mod element;
pub mod error;
pub mod model;
pub mod parsers;
pub mod processor;
pub mod report;
pub mod signature;
pub mod threshold;
