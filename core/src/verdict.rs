/// The result of evaluating a hook.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Verdict {
    /// Permit the operation.
    Ok,
    /// Deny the operation.
    Stop,
    /// Decision pending asynchronously. The caller must not treat this as a
    /// denial, and must await the request's `async_finish` completer.
    Cancel,
}

impl Verdict {
    #[inline]
    pub fn from_granted(granted: bool) -> Self {
        if granted { Verdict::Ok } else { Verdict::Stop }
    }

    #[inline]
    pub fn is_ok(self) -> bool {
        matches!(self, Verdict::Ok)
    }
}
