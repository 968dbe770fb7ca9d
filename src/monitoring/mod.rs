/*!
 * Monitoring
 * Structured tracing setup and session spans
 */

mod tracer;

pub use tracer::{init_tracing, SessionSpan};
