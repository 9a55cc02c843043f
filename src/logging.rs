// logging.rs: 日志初始化

use std::sync::Once;

static INIT: Once = Once::new();

/// Install the global `env_logger` once; later calls are ignored.
///
/// `RUST_LOG` wins over `filter`; with neither set the level is `info`
/// with `wgpu` internals turned down to `warn`.
pub fn init_logging(filter: Option<&str>) {
    INIT.call_once(|| {
        let mut builder = env_logger::Builder::new();

        if let Ok(env) = std::env::var("RUST_LOG") {
            builder.parse_filters(&env);
        } else if let Some(filter) = filter {
            builder.parse_filters(filter);
        } else {
            builder
                .filter_level(log::LevelFilter::Info)
                .filter_module("wgpu_core", log::LevelFilter::Warn)
                .filter_module("wgpu_hal", log::LevelFilter::Warn)
                .filter_module("naga", log::LevelFilter::Warn);
        }

        builder.write_style(env_logger::WriteStyle::Auto);
        // 测试或嵌入时可能已有 logger
        if builder.try_init().is_err() {
            return;
        }

        log::debug!("logging initialized");
    });
}
