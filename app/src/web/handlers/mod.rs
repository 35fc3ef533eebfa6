// topup_app/src/web/handlers/mod.rs

// Declare handler modules
pub mod admin_handlers;
pub mod order_handlers;
pub mod webhook_handlers;
