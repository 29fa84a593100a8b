use crate::wrapping_id::wrapping_id;

// Id of a fixed-step simulation tick, shared by the authoritative source and the local client
wrapping_id!(Tick);

impl Tick {
    /// Tick value reserved to mean "no tick known yet"
    pub const UNSET: Tick = Tick(0);

    pub fn is_unset(&self) -> bool {
        *self == Self::UNSET
    }
}
