/// Initialize logging for a one-shot boot-time run. The rootfs is still
/// read-only at this point, so stderr is the only reliable sink.
pub fn init(verbose: bool) {
    let level = if verbose {
        log::LevelFilter::Debug
    } else {
        log::LevelFilter::Info
    };

    env_logger::Builder::from_default_env()
        .filter_level(level)
        .format_timestamp(None)
        .init();
}
