pub mod auth;
pub mod firestore;
pub mod storage;
pub mod update;
pub mod use_project;
