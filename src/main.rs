use std::path::PathBuf;

use barrage::app::{self, AppConfig};

fn main() -> anyhow::Result<()> {
    env_logger::init();

    let mut config = AppConfig::default();
    if let Some(dir) = std::env::args().nth(1) {
        config.scene_dir = PathBuf::from(dir);
    }
    app::run(config)
}
