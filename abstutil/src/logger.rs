/// Intercept messages using the `log` crate and print them to STDERR, defaulting to `info` unless
/// `RUST_LOG` says otherwise. Call once at the start of a binary.
pub fn setup() {
    use env_logger::{Builder, Env};
    Builder::from_env(Env::default().default_filter_or("info")).init();
}
