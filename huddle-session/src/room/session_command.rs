/// Commands sent from controller handles into the session loop.
#[derive(Debug)]
pub(crate) enum SessionCommand {
    /// Tear everything down and stop the loop.
    Leave,
}
