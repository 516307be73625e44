pub mod commands;
mod controller;
mod view;

pub use controller::{reconcile, PopupController};
pub use view::PopupView;
