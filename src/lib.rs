//! Social feed service with like engagement kept in a key-value cache beside
//! the relational store of record.

pub mod application;
pub mod cache;
pub mod config;
pub mod domain;
pub mod infra;
