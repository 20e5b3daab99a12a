use loterecon::{config::LogFormat, logging};

#[test]
fn second_initialisation_is_a_typed_error() {
    logging::init_logging(LogFormat::Json).expect("first init");

    let err = logging::init_logging(LogFormat::Text).unwrap_err();
    assert!(err.to_string().starts_with("cannot install tracing subscriber"));
    assert!(std::error::Error::source(&err).is_some());
}
