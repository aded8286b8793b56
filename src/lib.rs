pub mod attribution;
pub mod config;
pub mod docx;
pub mod fragment;
pub mod images;
pub mod metadata;
pub mod model;
pub mod pipeline;
pub mod progress;
pub mod segment;
pub mod textutil;
