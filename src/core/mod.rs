pub mod centroids;
pub mod clusterer;
pub mod config;
pub mod error;
pub mod segment;
