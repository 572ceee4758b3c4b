pub mod backbone;
pub mod predictor;
pub mod projector;
pub mod resnet;
pub mod simsiam;

pub use backbone::Backbone;
pub use predictor::Predictor;
pub use projector::Projector;
pub use resnet::{ResNet18, ResNet18Config};
pub use simsiam::{SimSiam, SimSiamConfig};
