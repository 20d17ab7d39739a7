pub mod config;
pub mod init;
pub mod probe;
pub mod run;
