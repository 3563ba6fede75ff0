pub mod euclidean;
pub mod validity;
