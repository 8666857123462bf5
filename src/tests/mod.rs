mod filter_tests;
mod mailer_tests;
mod pipeline_tests;
pub mod utils;
