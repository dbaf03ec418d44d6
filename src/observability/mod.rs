/// Install the default `tracing` fmt subscriber.
///
/// Library code only emits events; hosts embedding the core that already
/// have a subscriber can skip this. Returns whether the subscriber was
/// installed (false means one was already set).
pub fn init_tracing() -> bool {
    tracing_subscriber::fmt()
        .with_target(false)
        .try_init()
        .is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn second_init_is_a_noop() {
        // Whichever call wins, the second must not panic.
        let _ = init_tracing();
        assert!(!init_tracing());
    }
}
