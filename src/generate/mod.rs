//! AI recipe generation: the fallback path when no stored recipe matches.

mod client;
mod pipeline;

pub use client::{ChatProvider, Sampling, TextGenerator};
pub use pipeline::{generate_recipe, GeneratedRecipe, NutritionFacts, PANTRY_SEASONINGS};

use thiserror::Error;

#[derive(Error, Debug)]
pub enum GenerateError {
    #[error("request failed: {0}")]
    Request(String),

    #[error("provider returned {status}: {message}")]
    Api { status: u16, message: String },

    #[error("malformed provider response: {0}")]
    Parse(String),
}
