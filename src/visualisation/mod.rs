//! The visualisation pipeline: binds attributes to visual channels and
//! produces per-element visuals, same shape as [`crate::transform`] one
//! layer up the document stack.

pub mod channel;
pub mod config;
pub mod pipeline;

pub use channel::{Channel, Colour, ElementVisual, Mapping};
pub use config::{parse_visualisation_config, VisualisationConfig};
pub use pipeline::{apply_visualisations, VisualisationResult};
