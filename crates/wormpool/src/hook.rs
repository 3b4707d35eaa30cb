/// Observer notified about temporary worker churn.
///
/// The pool does not serialize hook invocations: temporary workers call into
/// the hook from whichever task they run on, so implementations must tolerate
/// concurrent calls.
pub trait WorkerHook: Send + Sync {
    /// A temporary worker was spawned. `count` is the number of live temporary
    /// workers including the new one.
    fn on_join(&self, count: usize);

    /// A temporary worker retired. `count` is the number of live temporary
    /// workers remaining.
    fn on_leave(&self, count: usize);

    /// A panic escaped a job that has no response callback (fire-and-forget
    /// mode) and was absorbed by the worker.
    fn on_panic(&self, _message: &str) {}
}
