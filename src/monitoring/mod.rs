pub mod notifier;
pub mod reporter;
pub mod state;

pub use notifier::{build_notifier, ConsoleNotifier, Notifier, TelegramNotifier};
pub use state::{KnownState, StateStore};

#[cfg(test)]
pub use notifier::MockNotifier;
