pub mod alert;
pub mod monitor_service;
pub mod telegram_service;
