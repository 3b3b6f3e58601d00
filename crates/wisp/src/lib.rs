pub mod agent;
pub mod context;
pub mod errors;
pub mod models;
pub mod prompt_template;
pub mod providers;
pub mod token_counter;
pub mod tools;
