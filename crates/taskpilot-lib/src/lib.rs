// TaskPilot shared library
//
// Streaming conversation session engine for the TaskPilot assistant:
// the data models, the session controller, and the connection plumbing
// that the desktop shell embeds. The shell itself (forms, pickers,
// settings screens) lives outside this crate.

pub mod models;
pub mod services;
