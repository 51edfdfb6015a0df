// src/collections/mod.rs
//! Generic data structures used by the kernel and its hosts

pub mod min_heap;

pub use min_heap::MinHeap;
