// Services module
// Session engine and background connection plumbing

pub mod assistant;
