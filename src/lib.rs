//! Instagram media scraper library.
//!
//! Paginates an account's media feed, writes per-item metadata to a CSV
//! file, and downloads the referenced media through a bounded worker pool.

pub mod cli;
pub mod config;
pub mod download;
pub mod extract;
pub mod feed;
pub mod humanize;
pub mod scraper;
pub mod session;
pub mod sink;
