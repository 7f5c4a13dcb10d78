// Audit pipeline stages, executed in numeric order. The router sits between
// detection and judgment and may short-circuit the run.

#[path = "01_validate.rs"]
pub mod validate;

#[path = "02_detect.rs"]
pub mod detect;

#[path = "03_route.rs"]
pub mod route;

#[path = "04_judgment.rs"]
pub mod judgment;

#[path = "05_guardrail.rs"]
pub mod guardrail;

#[path = "06_decide.rs"]
pub mod decide;
