/// The lifecycle of an I/O request.
///
/// ```text
/// Invalid -> Allocated -> Active -> Completing -> Completed -> Free
///                |          |  ^
///                |          v  |
///                |       Suspended
///                v          |
///             Canceled <----+----- (from Allocated, Active, Suspended)
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum IoReqState {
    Invalid,
    Free,
    Allocated,
    Active,
    Suspended,
    Completing,
    Completed,
    Canceled,
}

impl IoReqState {
    /// The one transition table.
    pub const fn allows(self, next: IoReqState) -> bool {
        use IoReqState::*;

        matches!(
            (self, next),
            (Invalid, Allocated)
                | (Allocated, Active)
                | (Allocated, Suspended)
                | (Allocated, Canceled)
                | (Allocated, Free)
                | (Active, Completing)
                | (Active, Suspended)
                | (Active, Canceled)
                | (Suspended, Active)
                | (Suspended, Canceled)
                | (Completing, Completed)
                | (Completed, Free)
                | (Canceled, Free)
        )
    }
}
