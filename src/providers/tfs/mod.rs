mod builds;
mod client;
mod dto;
mod version_control;

pub use client::TfsClient;
