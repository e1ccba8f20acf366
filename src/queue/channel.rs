use crate::sqlite::Database;

/// A unit of work, already wrapped so that it reports its own outcome.
pub(super) type Job = Box<dyn FnOnce(&mut Database) + Send>;

pub(super) enum Command {
    Run(Job),
    Shutdown,
}
