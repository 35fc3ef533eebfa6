// topup_app/src/services/mod.rs

//! Adapters behind the core's gateway and notifier boundaries.

pub mod discord_notifier;
pub mod payment_mock;
pub mod snap_gateway;

pub use discord_notifier::DiscordNotifier;
pub use payment_mock::MockGateway;
pub use snap_gateway::SnapGateway;
