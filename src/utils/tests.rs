use super::error::BrokerError;
use super::logging;

#[test]
fn logging_init_accepts_levels() {
    // Should not panic
    logging::init("info");
    logging::init("debug");
    logging::init("warn");
    logging::init("nonsense");
}

#[test]
fn errors_render_readable_messages() {
    let err = BrokerError::PartialFrame {
        expected: 10,
        received: 4,
    };
    assert_eq!(
        err.to_string(),
        "partial frame: expected 10 bytes, received 4"
    );

    let err = BrokerError::FrameTooLarge(70_000);
    assert_eq!(
        err.to_string(),
        "frame body of 70000 bytes exceeds the 65535 byte limit"
    );

    let err = BrokerError::UnknownMethod("PING".to_string());
    assert_eq!(err.to_string(), "unknown method: PING");
}

#[test]
fn io_errors_convert() {
    let io = std::io::Error::new(std::io::ErrorKind::BrokenPipe, "gone");
    let err: BrokerError = io.into();
    assert!(matches!(err, BrokerError::Io(_)));
}
