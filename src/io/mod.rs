pub mod annotations;
pub mod dataset;
pub mod output;

pub use annotations::{load_predefined, Annotation};
pub use dataset::Dataset;
pub use output::{read_centroids, CentroidsFile, OutputWriter};
