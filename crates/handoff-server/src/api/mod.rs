pub mod events;
pub mod health;
pub mod helpers;
pub mod social;
