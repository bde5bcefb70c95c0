mod client;
mod projects;
mod pulls;
mod releases;
mod types;

pub use client::GitHubClient;
