pub mod bootstrap;
pub mod config;
pub mod path_utils;

use tracing::info;

pub fn init() {
    info!("🪞 MirrorWatch core initialized");
}
