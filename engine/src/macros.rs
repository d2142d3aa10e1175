#![macro_use]

/// Time a block and report the elapsed duration at debug level.
///
/// Evaluates to the block's value, so it can wrap expressions in place:
/// `let pose = profile!("locomotion.update", controller.update(&time, host));`
#[macro_export]
macro_rules! profile {
    ($description:expr, $block:expr) => {{
        let start = std::time::Instant::now();
        let result = $block;
        let duration = start.elapsed();
        tracing::debug!(target: "profile", "[{}]: Time elapsed: {:?}", $description, duration);
        result
    }};
}
