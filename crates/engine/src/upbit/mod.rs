pub mod rest;

pub use rest::UpbitClient;
