//! Custom assertion macros
//!
//! Provides assertion macros with more descriptive failure output.

/// Assert that a result is ok and return the value
#[macro_export]
macro_rules! assert_ok {
    ($result:expr) => {
        match $result {
            Ok(value) => value,
            Err(e) => panic!("Expected Ok, got Err: {:?}", e),
        }
    };
    ($result:expr, $message:expr) => {
        match $result {
            Ok(value) => value,
            Err(e) => panic!("{}: {:?}", $message, e),
        }
    };
}

/// Assert that a sync outcome is `Synced` and return its external id
#[macro_export]
macro_rules! assert_synced {
    ($outcome:expr) => {
        match $outcome {
            hazel_sync::backend::chat_sync::SyncOutcome::Synced { external_id, .. } => external_id,
            other => panic!("Expected Synced, got {:?}", other),
        }
    };
}
