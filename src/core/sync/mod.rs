/*!
 * Synchronization Primitives
 *
 * Wait/notify building blocks for worker loops. The only primitive needed is a
 * condvar-backed state cell: lifecycle commands mutate it, loops block on it.
 */

mod state_cell;

pub use state_cell::{StateCell, WaitOutcome};
