use serde::{Deserialize, Serialize};

/// Represents the current state of the user dialogue
#[derive(Clone, Serialize, Deserialize, Default)]
pub enum State {
    /// Initial state: free-form input, digit strings are treated as lookups
    #[default]
    Start,
    /// The user pressed "check" and the next message is expected to be an INN
    AwaitingInn,
}
