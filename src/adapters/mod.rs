pub mod telegram;
pub mod transport;

pub use telegram::TelegramNotifier;
pub use transport::{LogTransport, NotificationTransport};
