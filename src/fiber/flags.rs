// =============================================================================
// Fiber Flags (bitflags)
// =============================================================================

bitflags::bitflags! {
    /// Side effects recorded on a fiber during render and consumed by commit.
    ///
    /// `subtree_flags` on a fiber is the union of its descendants' flags, so
    /// commit skips any subtree whose mask does not intersect what it is
    /// looking for.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct Flags: u16 {
        const NONE = 0;
        /// Insert (or move) the host nodes of this fiber.
        const PLACEMENT = 1 << 0;
        /// Host props or text changed.
        const UPDATE = 1 << 1;
        /// `deletions` holds children to remove.
        const CHILD_DELETION = 1 << 2;
        /// A passive effect must run after commit.
        const PASSIVE_EFFECT = 1 << 3;
        /// Attach or detach a ref.
        const REF = 1 << 4;
        /// Offscreen hidden state flipped.
        const VISIBILITY = 1 << 5;
        /// Boundary must capture a suspension on its next begin.
        const SHOULD_CAPTURE = 1 << 6;
        /// Boundary captured a suspension and renders its fallback.
        const DID_CAPTURE = 1 << 7;

        const MUTATION_MASK = Self::PLACEMENT.bits()
            | Self::UPDATE.bits()
            | Self::CHILD_DELETION.bits()
            | Self::REF.bits()
            | Self::VISIBILITY.bits();
        const PASSIVE_MASK = Self::PASSIVE_EFFECT.bits() | Self::CHILD_DELETION.bits();
        const LAYOUT_MASK = Self::REF.bits();
        /// Everything commit acts on.
        const HOST_EFFECT_MASK = Self::MUTATION_MASK.bits() | Self::PASSIVE_MASK.bits();
    }
}

bitflags::bitflags! {
    /// Tag of an effect record.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct HookFlags: u8 {
        const NONE = 0;
        /// Dependencies changed: run destroy and create on this commit.
        const HAS_EFFECT = 1 << 0;
        /// Runs in the passive flush.
        const PASSIVE = 1 << 1;
    }
}
