//! Runtime filter reload against the real global subscriber.
//!
//! Kept to a single test: the subscriber can be installed once per process.

use tether_log::{Config, Format, LogError, LoggerBuilder};

#[test]
fn reloadable_logger_swaps_filter() {
    let config = Config {
        level: "warn".to_string(),
        format: Format::Json,
        reloadable: true,
        ..Config::test()
    };
    let guard = LoggerBuilder::from_config(config)
        .with_test_writer()
        .build()
        .expect("first init succeeds");

    let handle = guard.reload_handle().expect("reloadable config yields a handle");
    assert_eq!(handle.current_filter(), "warn");
    assert!(!tracing::enabled!(tracing::Level::DEBUG));

    handle.reload("debug").expect("valid directives reload");
    assert_eq!(handle.current_filter(), "debug");
    assert!(tracing::enabled!(tracing::Level::DEBUG));

    let err = handle.reload("tether=notalevel").unwrap_err();
    assert!(matches!(err, LogError::Filter { .. }));
    assert_eq!(handle.current_filter(), "debug");

    let err = tether_log::init().unwrap_err();
    assert!(matches!(err, LogError::AlreadyInitialized(_)));

    // Already installed: a no-op rather than a panic.
    tether_log::try_init_test();
}
