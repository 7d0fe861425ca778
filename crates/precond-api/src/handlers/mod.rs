//! HTTP request handlers

pub mod precondition;
