pub mod availability;
pub mod clock;
pub mod config;
pub mod date_index;
pub mod db;
pub mod directory;
pub mod lock;
pub mod model;
pub mod reflect;
pub mod share;
pub mod store;
pub mod timegrid;
pub mod worktime;
