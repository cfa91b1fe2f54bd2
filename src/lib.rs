pub mod cache;
pub mod config;
pub mod error;
pub mod events;
pub mod gpu;
pub mod processing;
pub mod tasks {
    pub mod decoder;
    pub mod sources;
}
