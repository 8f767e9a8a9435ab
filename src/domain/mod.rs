pub mod models;
pub mod realtime;
pub mod reconcile;
pub mod settings;
