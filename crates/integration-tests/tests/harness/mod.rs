#![allow(dead_code)]

pub mod config;
pub mod mock_bfl;
pub mod mock_openai;
pub mod server;
