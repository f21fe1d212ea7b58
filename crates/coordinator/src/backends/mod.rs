mod db;
mod rest;

pub use rest::RestBackend;
