pub mod config;
pub mod loss;
pub mod model;

pub use config::Config;
pub use loss::{negative_cosine_similarity, symmetric_loss, unit_normalize};
pub use model::{Backbone, Predictor, Projector, ResNet18, ResNet18Config, SimSiam, SimSiamConfig};
