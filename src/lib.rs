pub mod config;
pub use config::Config;

pub mod feed;
pub mod frontmatter;
pub mod gemini;
pub mod library;
pub mod links;
pub mod lists;

pub mod process;
pub use process::Processor;

mod util;
