//! CLI command implementations

mod config;
mod connect;
mod profiles;

pub use config::{config_init, config_path, config_show};
pub use connect::connect_command;
pub use profiles::{
    profiles_add, profiles_duplicate, profiles_export, profiles_import, profiles_list,
    profiles_remove, NewProfile,
};
