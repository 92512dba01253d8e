pub mod error;
pub mod point;
pub mod knn;
pub mod distance;
pub mod graph;
pub mod forces;
pub mod layering;
pub mod split;
pub mod engine;
pub mod snapshot;
pub mod evaluation;
pub mod config;
pub mod io;
pub mod render;
pub mod progress;
pub mod pipeline;
