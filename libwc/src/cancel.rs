/// cancellation predicate polled by the tree walk at each child iteration
pub trait CancelToken {
    fn cancelled(&self) -> bool;
}

pub struct NeverCancel;

impl CancelToken for NeverCancel {
    fn cancelled(&self) -> bool {
        false
    }
}

impl<F: Fn() -> bool> CancelToken for F {
    fn cancelled(&self) -> bool {
        self()
    }
}
