use anyhow::Result;

/// Everything in the application runs cooperatively on one thread. Browser events, ui commands
/// and ticks are interleaved only at await points.
pub fn single_thread_runtime() -> Result<tokio::runtime::Runtime> {
    Ok(tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?)
}
