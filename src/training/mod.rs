//! Head training on cached backbone features, with Keras-style callbacks.

pub mod callbacks;
pub mod history;
pub mod trainer;
