//! Terminal front end for inspecting and resolving permissions

mod console;

pub use console::Console;
