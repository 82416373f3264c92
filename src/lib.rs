pub mod analyzer;
pub mod ast;
pub mod catalog;
pub mod config;
pub mod error;
pub mod layout;
pub mod parser;
pub mod render;
pub mod resolver;
pub mod tokenizer;
