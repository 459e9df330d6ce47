pub mod commands;
pub mod connection;
pub mod mode_switch;
pub mod output;
pub mod protocol;
pub mod state;
pub mod statistics;
