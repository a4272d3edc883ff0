pub mod notification_commands;
pub mod pipeline_commands;
pub mod poll_commands;
pub mod registration_commands;
