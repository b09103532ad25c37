//! Retrieval pipeline.
//!
//! This module provides:
//! - `chunker`: cuts corpus records into overlapping character windows
//! - `embedder`: turns text into normalized dense vectors
//! - `index`: exact nearest-neighbor search over those vectors
//! - `retriever`: owns the published index and answers top-K queries

pub mod chunker;
pub mod embedder;
pub mod index;
pub mod retriever;
